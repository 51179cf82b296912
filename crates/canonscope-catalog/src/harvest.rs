use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use canonscope_core::{Locale, WorkMetadata};

use crate::error::Result;
use crate::http::PageFetcher;
use crate::parser::parse_total_hits;
use crate::query::{CatalogQuery, continuation_offsets};
use crate::store::PageStore;

/// What happened while harvesting one work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub work_id: String,
    /// Total hit count printed on page 1, if any.
    pub total_hits: Option<u32>,
    /// Pages written to the store, page 1 included.
    pub pages_saved: u32,
    /// Start offsets whose fetch failed.
    pub failed_offsets: Vec<u32>,
    /// Set when the work was left alone because page 1 was already stored.
    pub skipped: bool,
    /// Set when a store write or page-1 fetch ended the work early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HarvestReport {
    fn new(work_id: &str) -> Self {
        Self {
            work_id: work_id.to_string(),
            ..Self::default()
        }
    }
}

pub struct HarvestOptions {
    pub search_url: String,
    pub page_stride: u32,
    pub concurrency: usize,
    /// Skip works whose first page is already stored.
    pub resume: bool,
}

pub struct Harvester<F: PageFetcher> {
    fetcher: F,
    store: PageStore,
    locale: Locale,
    options: HarvestOptions,
}

impl<F: PageFetcher> Harvester<F> {
    pub fn new(fetcher: F, store: PageStore, locale: Locale, options: HarvestOptions) -> Self {
        Self {
            fetcher,
            store,
            locale,
            options,
        }
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch and store every result page of one work.
    ///
    /// A failed page-1 fetch leaves the work with no pages. Failed
    /// continuation fetches are logged and the remaining offsets are still
    /// tried. Outside resume mode, pages left over from an earlier harvest of
    /// the work are removed once page 1 has been fetched. Only a store
    /// failure is returned as an error.
    pub async fn harvest_work(&self, work: &WorkMetadata) -> Result<HarvestReport> {
        let mut report = HarvestReport::new(&work.id);
        if self.options.resume && self.store.has_first_page(&work.id) {
            info!("{}: first page already stored, skipping", work.id);
            report.skipped = true;
            return Ok(report);
        }

        let query = CatalogQuery::build(&self.options.search_url, work, &self.locale);
        let first_url = query.first_page_url();
        let first = match self.fetcher.fetch(&first_url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("{}: page not found: {first_url}: {e}", work.id);
                report.failed_offsets.push(1);
                report.error = Some(e.to_string());
                return Ok(report);
            }
        };

        if !self.options.resume {
            let stale = self.store.clear_work(&work.id).await?;
            if stale > 0 {
                debug!("{}: removed {stale} pages of an earlier harvest", work.id);
            }
        }

        let mut index = 1u32;
        self.store.save(&work.id, index, &first).await?;
        report.pages_saved = 1;

        let Some(total_hits) = parse_total_hits(&first) else {
            warn!(
                "{}: no total hit count on first page, treating it as the only page",
                work.id
            );
            return Ok(report);
        };
        report.total_hits = Some(total_hits);
        info!("{}: {total_hits} catalog hits", work.id);

        for offset in continuation_offsets(total_hits, self.options.page_stride) {
            let url = query.page_url(offset);
            match self.fetcher.fetch(&url).await {
                Ok(body) => {
                    index += 1;
                    self.store.save(&work.id, index, &body).await?;
                    report.pages_saved += 1;
                }
                Err(e) => {
                    warn!("{}: page not found at offset {offset}: {e}", work.id);
                    report.failed_offsets.push(offset);
                }
            }
        }
        Ok(report)
    }

    /// Harvest every work, up to `concurrency` at a time.
    ///
    /// Reports come back sorted by work id. A work that fails is logged and
    /// reported; the rest of the collection is still harvested.
    pub async fn harvest_all(&self, works: &[WorkMetadata]) -> Vec<HarvestReport> {
        let concurrency = self.options.concurrency.max(1);
        let mut reports = stream::iter(works)
            .map(|work| async move {
                match self.harvest_work(work).await {
                    Ok(report) => report,
                    Err(e) => {
                        warn!("{}: harvest aborted: {e}", work.id);
                        HarvestReport {
                            error: Some(e.to_string()),
                            ..HarvestReport::new(&work.id)
                        }
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await;
        reports.sort_by(|a, b| a.work_id.cmp(&b.work_id));

        let pages: u32 = reports.iter().map(|r| r.pages_saved).sum();
        info!("harvested {pages} pages for {} works", reports.len());
        reports
    }
}
