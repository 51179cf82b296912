use canonscope_core::{Locale, WorkMetadata};

/// Search URLs for one work: page 1 and the template for later offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub work_id: String,
    /// URL with every placeholder filled except `{start}`.
    template: String,
}

impl CatalogQuery {
    /// Fill `search_url` with the work's catalog title/author and the locale's
    /// catalog language. Title and author are percent-encoded.
    pub fn build(search_url: &str, work: &WorkMetadata, locale: &Locale) -> Self {
        let template = search_url
            .replace("{title}", &urlencoding::encode(work.search_title()))
            .replace("{author}", &urlencoding::encode(work.search_author()))
            .replace("{lang}", &urlencoding::encode(&locale.catalog_lang));
        Self {
            work_id: work.id.clone(),
            template,
        }
    }

    /// URL of the result page starting at hit `start` (1-based).
    pub fn page_url(&self, start: u32) -> String {
        self.template.replace("{start}", &start.to_string())
    }

    pub fn first_page_url(&self) -> String {
        self.page_url(1)
    }
}

/// Start offsets of the pages after the first: `1 + stride`, `1 + 2 * stride`, …
/// as long as the offset does not exceed `total_hits`.
pub fn continuation_offsets(total_hits: u32, stride: u32) -> impl Iterator<Item = u32> {
    let stride = stride.max(1);
    (1..)
        .map(move |k: u32| k.saturating_mul(stride).saturating_add(1))
        .take_while(move |&offset| offset <= total_hits && offset != u32::MAX)
}
