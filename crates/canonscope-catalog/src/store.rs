//! On-disk store of fetched result pages.
//!
//! Pages are written as `{work_id}_html{NNN}.html`, NNN being the page's
//! sequence index within its work. Reading back never relies on plain
//! lexicographic order: names are parsed and grouped by work id, and each
//! group is sorted by numeric index.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;

const MARKER: &str = "_html";
const EXTENSION: &str = "html";

/// A stored page: which work it belongs to and where it sits in that work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub work_id: String,
    pub index: u32,
    pub path: PathBuf,
}

impl PageRef {
    /// File stem, used to name the page in diagnostics.
    pub fn label(&self) -> String {
        page_stem(&self.work_id, self.index)
    }
}

/// Stored pages of one work in sequence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkPages {
    pub work_id: String,
    pub pages: Vec<PageRef>,
}

pub struct PageStore {
    dir: PathBuf,
}

fn page_stem(work_id: &str, index: u32) -> String {
    format!("{work_id}{MARKER}{index:03}")
}

/// Split a stored file name into work id and sequence index.
///
/// Accepts unpadded indices (`w1_html12.html`). The id is everything before
/// the last `_html`, so ids containing that marker still round-trip.
pub fn parse_page_name(file_name: &str) -> Option<(String, u32)> {
    let stem = file_name.strip_suffix(".html")?;
    let (id, index) = stem.rsplit_once(MARKER)?;
    if id.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((id.to_string(), index.parse().ok()?))
}

impl PageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn page_path(&self, work_id: &str, index: u32) -> PathBuf {
        self.dir
            .join(format!("{}.{EXTENSION}", page_stem(work_id, index)))
    }

    /// Persist one page body.
    pub async fn save(&self, work_id: &str, index: u32, body: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.page_path(work_id, index);
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }

    /// Delete every stored page of `work_id`, returning how many were removed.
    pub async fn clear_work(&self, work_id: &str) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if parse_page_name(&name).is_some_and(|(id, _)| id == work_id) {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Whether the first page of `work_id` is already stored.
    pub fn has_first_page(&self, work_id: &str) -> bool {
        self.page_path(work_id, 1).exists()
            || self.dir.join(format!("{work_id}{MARKER}1.{EXTENSION}")).exists()
    }

    pub fn read(&self, page: &PageRef) -> Result<String> {
        Ok(std::fs::read_to_string(&page.path)?)
    }

    /// Every stored page, grouped by work id (ascending) and sorted by index.
    ///
    /// Files whose names do not follow the page naming scheme are logged
    /// and ignored. A missing store directory yields no pages.
    pub fn grouped(&self) -> Result<Vec<WorkPages>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut groups: BTreeMap<String, Vec<PageRef>> = BTreeMap::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            match parse_page_name(&name) {
                Some((work_id, index)) => groups.entry(work_id.clone()).or_default().push(PageRef {
                    work_id,
                    index,
                    path,
                }),
                None => warn!("ignoring {} in page store: not a result page name", path.display()),
            }
        }

        Ok(groups
            .into_iter()
            .map(|(work_id, mut pages)| {
                pages.sort_by_key(|p| p.index);
                WorkPages { work_id, pages }
            })
            .collect())
    }
}
