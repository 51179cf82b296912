//! Canonicity classification over a finished reprint matrix.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::matrix::YearMatrix;
use crate::models::WorkMetadata;
use crate::years::YearWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonStatus {
    High,
    Low,
}

impl fmt::Display for CanonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonStatus::High => write!(f, "high"),
            CanonStatus::Low => write!(f, "low"),
        }
    }
}

/// One row of the canonicity summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonSummary {
    #[serde(rename = "xmlid")]
    pub work_id: String,
    pub total_counts: u32,
    pub canon_counts: u32,
    pub canon_status: CanonStatus,
    pub author: String,
    pub title: String,
}

/// Target era and threshold used to label works.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    pub window: YearWindow,
    pub threshold: u32,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            window: YearWindow::default(),
            threshold: 1,
        }
    }
}

impl Classifier {
    pub fn new(window: YearWindow, threshold: u32) -> Self {
        Self { window, threshold }
    }

    pub fn status(&self, canon_counts: u32) -> CanonStatus {
        if canon_counts > self.threshold {
            CanonStatus::High
        } else {
            CanonStatus::Low
        }
    }

    /// Summarize every work of the matrix, in column order.
    ///
    /// Author and title come from `metadata`; works missing there are logged
    /// and keep empty strings.
    pub fn summarize(&self, matrix: &YearMatrix, metadata: &[WorkMetadata]) -> Vec<CanonSummary> {
        let by_id: HashMap<&str, &WorkMetadata> =
            metadata.iter().map(|w| (w.id.as_str(), w)).collect();

        matrix
            .works()
            .iter()
            .map(|work_id| {
                let total_counts = matrix.total(work_id).unwrap_or(0);
                let canon_counts = matrix.window_sum(work_id, &self.window).unwrap_or(0);
                let (author, title) = match by_id.get(work_id.as_str()) {
                    Some(w) => (w.author.clone(), w.title.clone()),
                    None => {
                        warn!("{work_id}: not in metadata table, summary row has no author/title");
                        (String::new(), String::new())
                    }
                };
                CanonSummary {
                    work_id: work_id.clone(),
                    total_counts,
                    canon_counts,
                    canon_status: self.status(canon_counts),
                    author,
                    title,
                }
            })
            .collect()
    }
}

/// Write the summary as tab-separated text.
///
/// Fields holding a tab, a quote or a line break are quoted.
pub fn write_summary<W: Write>(writer: W, rows: &[CanonSummary]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_strict() {
        let c = Classifier::default();
        assert_eq!(c.status(2), CanonStatus::High);
        assert_eq!(c.status(1), CanonStatus::Low);
        assert_eq!(c.status(0), CanonStatus::Low);

        let strict = Classifier::new(YearWindow::default(), 3);
        assert_eq!(strict.status(3), CanonStatus::Low);
        assert_eq!(strict.status(4), CanonStatus::High);
    }

    #[test]
    fn summary_counts_and_metadata() {
        let mut m = YearMatrix::new();
        m.set_column("w1", &[0, 1899, 1975, 2000]);
        m.set_column("w2", &[1975]);
        m.set_column("w3", &[]);
        let meta = vec![
            WorkMetadata::new("w1", "w1_a", "Nana", "Zola, Émile"),
            WorkMetadata::new("w2", "w2_b", "Lélia", "Sand, George"),
        ];

        let rows = Classifier::default().summarize(&m, &meta);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].total_counts, 4);
        assert_eq!(rows[0].canon_counts, 2);
        assert_eq!(rows[0].canon_status, CanonStatus::High);
        assert_eq!(rows[0].title, "Nana");
        assert_eq!(rows[1].canon_status, CanonStatus::Low);
        assert_eq!(rows[2].total_counts, 0);
        assert_eq!(rows[2].author, "");
    }

    #[test]
    fn custom_window_is_indexed_by_year() {
        let mut m = YearMatrix::new();
        m.set_column("w1", &[1850, 1851, 1900]);
        let c = Classifier::new(YearWindow::new(1850, 1851).unwrap(), 1);
        let rows = c.summarize(&m, &[]);
        assert_eq!(rows[0].canon_counts, 2);
        assert_eq!(rows[0].canon_status, CanonStatus::High);
    }

    #[test]
    fn summary_tsv_layout() {
        let rows = vec![CanonSummary {
            work_id: "w1".into(),
            total_counts: 4,
            canon_counts: 2,
            canon_status: CanonStatus::High,
            author: "Zola, Émile".into(),
            title: "Nana".into(),
        }];
        let mut buf = Vec::new();
        write_summary(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "xmlid\ttotal_counts\tcanon_counts\tcanon_status\tauthor\ttitle\n\
             w1\t4\t2\thigh\tZola, Émile\tNana\n"
        );
    }

    #[test]
    fn summary_fields_with_tabs_stay_in_their_column() {
        let rows = vec![CanonSummary {
            work_id: "w1".into(),
            total_counts: 1,
            canon_counts: 0,
            canon_status: CanonStatus::Low,
            author: "Hugo, Victor".into(),
            title: "Les Misérables\tTome I".into(),
        }];
        let mut buf = Vec::new();
        write_summary(&mut buf, &rows).unwrap();

        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_reader(buf.as_slice());
        let record = rdr.records().next().unwrap().unwrap();
        assert_eq!(record.len(), 6);
        assert_eq!(&record[4], "Hugo, Victor");
        assert_eq!(&record[5], "Les Misérables\tTome I");
    }
}
