use serde::Serialize;
use tracing::{debug, info, warn};

use canonscope_core::{PublicationYears, WorkMetadata, YearMatrix, fold_pages};

use crate::error::Result;
use crate::parser::parse_page;
use crate::store::{PageStore, WorkPages};

/// Per-work outcome of reading stored pages back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TabulateReport {
    pub work_id: String,
    pub pages_read: u32,
    pub pages_unreadable: u32,
    pub no_results: bool,
    pub hits: u32,
    pub counted: u32,
}

/// Fold the stored pages of one work into its year list.
///
/// Pages that cannot be read or parsed are logged and skipped.
pub fn fold_work(
    store: &PageStore,
    work: &WorkPages,
    hit_label: &str,
) -> (PublicationYears, TabulateReport) {
    let mut report = TabulateReport {
        work_id: work.work_id.clone(),
        ..TabulateReport::default()
    };

    let mut pages = Vec::with_capacity(work.pages.len());
    for page in &work.pages {
        let label = page.label();
        let parsed = store.read(page).and_then(|html| parse_page(&html, &label));
        match parsed {
            Ok(parsed) => {
                report.pages_read += 1;
                report.no_results |= parsed.no_results.is_some();
                report.hits += parsed.records.len() as u32;
                pages.push(parsed.records);
            }
            Err(e) => {
                warn!("{label}: unreadable page skipped: {e}");
                report.pages_unreadable += 1;
            }
        }
    }

    let years = fold_pages(pages.iter().map(Vec::as_slice), hit_label);
    report.counted = years.len() as u32;
    debug!(
        "{}: {} pages, {} hits, {} counted",
        work.work_id, report.pages_read, report.hits, report.counted
    );
    (years, report)
}

/// Build the reprint matrix from every stored page.
///
/// Works of `metadata` get a column even when no page is stored for them;
/// stored works missing from `metadata` are still counted.
pub fn tabulate(
    store: &PageStore,
    metadata: &[WorkMetadata],
    hit_label: &str,
) -> Result<(YearMatrix, Vec<TabulateReport>)> {
    let mut matrix = YearMatrix::new();
    let groups = store.grouped()?;

    let mut ids = metadata.iter().map(|w| w.id.as_str()).collect::<Vec<_>>();
    ids.extend(groups.iter().map(|g| g.work_id.as_str()));
    ids.sort_unstable();
    ids.dedup();
    for id in ids {
        matrix.ensure_work(id);
    }

    let mut reports = Vec::with_capacity(groups.len());
    for group in &groups {
        if !metadata.is_empty() && !metadata.iter().any(|w| w.id == group.work_id) {
            warn!("{}: stored pages for a work missing from the metadata table", group.work_id);
        }
        let (years, report) = fold_work(store, group, hit_label);
        matrix.set_column(&group.work_id, years.years());
        reports.push(report);
    }

    info!(
        "tabulated {} works from {} pages in {}",
        matrix.works().len(),
        reports.iter().map(|r| r.pages_read).sum::<u32>(),
        store.dir().display()
    );
    Ok((matrix, reports))
}
