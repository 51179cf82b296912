//! Dense year × work reprint-count matrix.
//!
//! Every work column holds one cell per matrix key (`0, 1840..=2019`), so a
//! lookup for any key in range never fails and sums need no existence checks.

use std::collections::HashMap;
use std::io::{Read, Write};

use crate::error::{CanonError, Result};
use crate::years::{YEAR_ROWS, YearWindow, row_of, year_keys};

type Column = [u32; YEAR_ROWS];

/// Label of the synthetic row holding the column sums.
pub const TOTAL_LABEL: &str = "Total";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearMatrix {
    works: Vec<String>,
    index: HashMap<String, usize>,
    columns: Vec<Column>,
}

impl YearMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an all-zero column for `work_id` if it has none yet.
    pub fn ensure_work(&mut self, work_id: &str) -> usize {
        if let Some(&i) = self.index.get(work_id) {
            return i;
        }
        let i = self.columns.len();
        self.works.push(work_id.to_string());
        self.index.insert(work_id.to_string(), i);
        self.columns.push([0; YEAR_ROWS]);
        i
    }

    /// Rebuild the column of `work_id` from its complete year list.
    ///
    /// The column is zeroed first, so calling this again with a longer list
    /// for the same work leaves exactly the counts of the last list.
    /// Years outside the matrix range count as unknown.
    pub fn set_column(&mut self, work_id: &str, years: &[i32]) {
        let i = self.ensure_work(work_id);
        let column = &mut self.columns[i];
        *column = [0; YEAR_ROWS];
        for &year in years {
            column[row_of(year).unwrap_or(0)] += 1;
        }
    }

    /// Work ids in column order.
    pub fn works(&self) -> &[String] {
        &self.works
    }

    pub fn column(&self, work_id: &str) -> Option<&[u32]> {
        self.index.get(work_id).map(|&i| &self.columns[i][..])
    }

    /// Cell value; `None` only for an unknown work or a key outside the range.
    pub fn count(&self, year: i32, work_id: &str) -> Option<u32> {
        let row = row_of(year)?;
        self.column(work_id).map(|c| c[row])
    }

    /// Sum over every year row, sentinel included.
    pub fn total(&self, work_id: &str) -> Option<u32> {
        self.column(work_id).map(|c| c.iter().sum())
    }

    /// Sum over the rows of `window`.
    pub fn window_sum(&self, work_id: &str, window: &YearWindow) -> Option<u32> {
        self.column(work_id).map(|c| c[window.rows()].iter().sum())
    }

    /// The synthetic total row: one sum per work, in column order.
    pub fn totals(&self) -> Vec<u32> {
        self.columns.iter().map(|c| c.iter().sum()).collect()
    }

    // ─── CSV ───────────────────────────────────────────────

    /// Write the matrix as comma-separated text: header of work ids, one row
    /// per matrix key and a final `Total` row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = Vec::with_capacity(self.works.len() + 1);
        header.push(String::new());
        header.extend(self.works.iter().cloned());
        wtr.write_record(&header)?;

        for (row, year) in year_keys().enumerate() {
            let mut record = Vec::with_capacity(self.works.len() + 1);
            record.push(year.to_string());
            record.extend(self.columns.iter().map(|c| c[row].to_string()));
            wtr.write_record(&record)?;
        }

        let mut total = vec![TOTAL_LABEL.to_string()];
        total.extend(self.totals().iter().map(u32::to_string));
        wtr.write_record(&total)?;

        wtr.flush()?;
        Ok(())
    }

    /// Read a matrix written by [`write_csv`](Self::write_csv).
    ///
    /// The `Total` row is recomputed, not trusted; rows for keys outside the
    /// matrix range are rejected.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let works = rdr
            .headers()?
            .iter()
            .skip(1)
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut matrix = Self::new();
        for work in &works {
            matrix.ensure_work(work);
        }

        for record in rdr.records() {
            let record = record?;
            let label = record.get(0).unwrap_or("").trim();
            if label == TOTAL_LABEL {
                continue;
            }
            let row = label
                .parse::<i32>()
                .ok()
                .and_then(row_of)
                .ok_or_else(|| malformed(format!("row label {label:?} is not a matrix year")))?;
            for (i, cell) in record.iter().skip(1).enumerate() {
                if i >= matrix.columns.len() {
                    return Err(malformed(format!("row {label} has more cells than the header")));
                }
                let value = cell
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| malformed(format!("cell {cell:?} in row {label} is not a count")))?;
                matrix.columns[i][row] = value;
            }
        }
        Ok(matrix)
    }
}

fn malformed(message: String) -> CanonError {
    CanonError::MalformedTable {
        path: "reprint counts".to_string(),
        message,
    }
}
