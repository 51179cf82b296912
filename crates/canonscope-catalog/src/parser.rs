//! Reading one catalog result page.
//!
//! A page yields the total hit count printed in the result summary (only
//! present on pages with results), a no-results report when the catalog
//! printed its error box, and one [`EditionRecord`] per hit row.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use canonscope_core::EditionRecord;

use crate::error::{CatalogError, Result};

const NO_RESULTS_MARKER: &str = "No results match your search";

static TOTAL_HITS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"of about <strong>(.*?)</strong>").expect("valid regex"));
static SEARCH_TERMS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ti:(.*?)au:(.*?)'").expect("valid regex"));
static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("valid regex"));

struct Selectors {
    error: Selector,
    hit: Selector,
    number: Selector,
    language: Selector,
    publisher: Selector,
}

impl Selectors {
    fn new() -> Result<Self> {
        Ok(Self {
            error: parse_selector("div.error-results")?,
            hit: parse_selector("tr.menuElem")?,
            number: parse_selector("div.item_number")?,
            language: parse_selector("span.itemLanguage")?,
            publisher: parse_selector("span.itemPublisher")?,
        })
    }
}

/// Search strings the catalog echoed back in its no-results message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoResults {
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    pub total_hits: Option<u32>,
    pub no_results: Option<NoResults>,
    pub records: Vec<EditionRecord>,
}

/// Total hit count from the result summary, `None` if the page has none.
pub fn parse_total_hits(html: &str) -> Option<u32> {
    let caps = TOTAL_HITS_RE.captures(html)?;
    let digits: String = caps
        .get(1)?
        .as_str()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Parse a whole page. `label` names the page in diagnostics.
pub fn parse_page(html: &str, label: &str) -> Result<ParsedPage> {
    let selectors = Selectors::new()?;
    let document = Html::parse_document(html);

    let no_results = document
        .select(&selectors.error)
        .next()
        .and_then(|el| no_results_report(&element_text(&el)));
    if let Some(report) = &no_results {
        warn!(
            "{label}: no search result in catalog; search strings: title: '{}', author: '{}'",
            report.title, report.author
        );
        return Ok(ParsedPage {
            total_hits: None,
            no_results,
            records: Vec::new(),
        });
    }

    let mut records = Vec::new();
    for row in document.select(&selectors.hit) {
        let Some(ordinal) = first_text(&row, &selectors.number).filter(|s| !s.is_empty()) else {
            warn!("{label}: skipping hit without item number");
            continue;
        };
        let language = first_text(&row, &selectors.language).unwrap_or_default();
        let year = first_text(&row, &selectors.publisher).and_then(|text| first_number(&text));
        if year.is_none() {
            warn!("{label}: no publication year found for item {ordinal}");
        }
        records.push(EditionRecord {
            ordinal,
            language,
            year,
        });
    }

    Ok(ParsedPage {
        total_hits: parse_total_hits(html),
        no_results: None,
        records,
    })
}

fn no_results_report(text: &str) -> Option<NoResults> {
    let text = text.trim();
    if !text.starts_with(NO_RESULTS_MARKER) {
        return None;
    }
    let (title, author) = SEARCH_TERMS_RE
        .captures(text)
        .map(|caps| {
            let title = caps.get(1).map_or("", |m| m.as_str());
            let author = caps.get(2).map_or("", |m| m.as_str());
            (
                title.replace(": ELTeC edition", "").trim().to_string(),
                author.trim().to_string(),
            )
        })
        .unwrap_or_default();
    Some(NoResults { title, author })
}

/// First run of digits, `None` if there is none or it does not fit.
fn first_number(text: &str) -> Option<u64> {
    DIGITS_RE.find(text)?.as_str().parse().ok()
}

fn first_text(row: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    row.select(selector).next().map(|el| element_text(&el))
}

fn parse_selector(input: &str) -> Result<Selector> {
    Selector::parse(input)
        .map_err(|e| CatalogError::Parse(format!("invalid selector {input}: {e}")))
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
