use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use canonscope_catalog::{
    CatalogError, HarvestOptions, Harvester, PageFetcher, PageStore, RateLimitedClient, tabulate,
};
use canonscope_core::{CanonStatus, Classifier, Locale, UNKNOWN_YEAR, WorkMetadata};

const SEARCH_URL: &str = "https://catalog.test/search?ti={title}&au={author}&ln={lang}&start={start}";

struct CannedFetcher {
    pages: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl CannedFetcher {
    fn new() -> Self {
        Self {
            pages: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_page(mut self, title: &str, start: u32, body: String) -> Self {
        self.pages.insert(url(title, start), body);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for CannedFetcher {
    async fn fetch(&self, url: &str) -> canonscope_catalog::Result<String> {
        self.calls.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| CatalogError::PageNotFound(url.to_string()))
    }
}

fn url(title: &str, start: u32) -> String {
    format!("https://catalog.test/search?ti={title}&au=Author&ln=fre&start={start}")
}

fn locale() -> Locale {
    Locale {
        lang: "fra".into(),
        catalog_lang: "fre".into(),
        hit_label: "French".into(),
    }
}

fn work(id: &str, title: &str) -> WorkMetadata {
    WorkMetadata::new(id, format!("{id}_file"), title, "Author, Some")
}

fn hit(n: u32, language: &str, publisher: Option<&str>) -> String {
    let publisher = publisher
        .map(|p| format!(r#"<span class="itemPublisher">{p}</span>"#))
        .unwrap_or_default();
    format!(
        r#"<tr class="menuElem"><td><div class="item_number">{n}.</div></td>
           <td><span class="itemLanguage">{language}</span>{publisher}</td></tr>"#
    )
}

fn page(total: Option<u32>, hits: &[String]) -> String {
    let summary = total
        .map(|t| format!("<td>Results of about <strong>{t}</strong></td>"))
        .unwrap_or_default();
    format!(
        "<html><body><table><tr>{summary}</tr></table><table>{}</table></body></html>",
        hits.join("\n")
    )
}

fn harvester(fetcher: CannedFetcher, dir: &TempDir, resume: bool) -> Harvester<CannedFetcher> {
    Harvester::new(
        fetcher,
        PageStore::new(dir.path().join("fra")),
        locale(),
        HarvestOptions {
            search_url: SEARCH_URL.to_string(),
            page_stride: 10,
            concurrency: 2,
            resume,
        },
    )
}

#[tokio::test]
async fn mismatched_language_is_not_counted() {
    let dir = TempDir::new().unwrap();
    let fetcher = CannedFetcher::new().with_page(
        "One",
        1,
        page(
            Some(2),
            &[
                hit(1, "French", Some("Paris : Gallimard, 1975")),
                hit(2, "English", Some("London : Penguin, 1980")),
            ],
        ),
    );
    let h = harvester(fetcher, &dir, false);
    let works = vec![work("w1", "One")];

    let reports = h.harvest_all(&works).await;
    assert_eq!(reports[0].pages_saved, 1);
    assert_eq!(reports[0].total_hits, Some(2));

    let (matrix, _) = tabulate(h.store(), &works, "French").unwrap();
    assert_eq!(matrix.count(1975, "w1"), Some(1));
    assert_eq!(matrix.count(1980, "w1"), Some(0));
    assert_eq!(matrix.total("w1"), Some(1));

    let summary = Classifier::default().summarize(&matrix, &works);
    assert_eq!(summary[0].canon_counts, 1);
    assert_eq!(summary[0].canon_status, CanonStatus::Low);
}

#[tokio::test]
async fn continuation_page_joins_the_same_year_list() {
    let dir = TempDir::new().unwrap();
    let fetcher = CannedFetcher::new()
        .with_page(
            "Two",
            1,
            page(
                Some(12),
                &[
                    hit(1, "French", Some("Paris : Lévy, 1990")),
                    hit(2, "French", Some("Paris : Lévy, 1990")),
                    hit(3, "German", Some("Berlin : Aufbau, 1995")),
                ],
            ),
        )
        .with_page(
            "Two",
            11,
            page(None, &[hit(11, "French", Some("Paris : Folio, 2001")), hit(12, "Italian", None)]),
        );
    let h = harvester(fetcher, &dir, false);
    let works = vec![work("w2", "Two")];

    let reports = h.harvest_all(&works).await;
    assert_eq!(reports[0].pages_saved, 2);
    assert!(reports[0].failed_offsets.is_empty());
    assert!(dir.path().join("fra/w2_html002.html").exists());

    let (matrix, reports) = tabulate(h.store(), &works, "French").unwrap();
    assert_eq!(reports[0].pages_read, 2);
    assert_eq!(reports[0].counted, 3);
    assert_eq!(matrix.count(1990, "w2"), Some(2));
    assert_eq!(matrix.count(2001, "w2"), Some(1));
    assert_eq!(matrix.count(UNKNOWN_YEAR, "w2"), Some(0));
    assert_eq!(matrix.total("w2"), Some(3));

    let summary = Classifier::default().summarize(&matrix, &works);
    assert_eq!(summary[0].canon_status, CanonStatus::High);
}

#[tokio::test]
async fn pages_are_grouped_per_work() {
    let dir = TempDir::new().unwrap();
    let fetcher = CannedFetcher::new()
        .with_page("A", 1, page(Some(11), &[hit(1, "French", Some("1900"))]))
        .with_page("A", 11, page(None, &[hit(11, "French", Some("1901"))]))
        .with_page("B", 1, page(Some(1), &[hit(1, "French", Some("1902"))]));
    let h = harvester(fetcher, &dir, false);
    let works = vec![work("w1", "A"), work("w2", "B")];
    h.harvest_all(&works).await;

    let (matrix, _) = tabulate(h.store(), &works, "French").unwrap();
    assert_eq!(matrix.count(1900, "w1"), Some(1));
    assert_eq!(matrix.count(1901, "w1"), Some(1));
    assert_eq!(matrix.count(1902, "w1"), Some(0));
    assert_eq!(matrix.total("w2"), Some(1));
    assert_eq!(matrix.count(1902, "w2"), Some(1));
}

#[tokio::test]
async fn failed_continuation_does_not_stop_later_offsets() {
    let dir = TempDir::new().unwrap();
    let fetcher = CannedFetcher::new()
        .with_page("Three", 1, page(Some(31), &[hit(1, "French", Some("1950"))]))
        .with_page("Three", 11, page(None, &[hit(11, "French", Some("1960"))]))
        .with_page("Three", 31, page(None, &[hit(31, "French", Some("1980"))]));
    let h = harvester(fetcher, &dir, false);
    let works = vec![work("w3", "Three")];

    let report = h.harvest_work(&works[0]).await.unwrap();
    assert_eq!(report.pages_saved, 3);
    assert_eq!(report.failed_offsets, vec![21]);

    let (matrix, _) = tabulate(h.store(), &works, "French").unwrap();
    assert_eq!(matrix.total("w3"), Some(3));
}

#[tokio::test]
async fn page_without_total_is_the_only_page() {
    let dir = TempDir::new().unwrap();
    let fetcher = CannedFetcher::new().with_page("Four", 1, page(None, &[hit(1, "French", None)]));
    let h = harvester(fetcher, &dir, false);
    let works = vec![work("w4", "Four")];

    let report = h.harvest_work(&works[0]).await.unwrap();
    assert_eq!(report.pages_saved, 1);
    assert_eq!(report.total_hits, None);

    let (matrix, _) = tabulate(h.store(), &works, "French").unwrap();
    assert_eq!(matrix.count(UNKNOWN_YEAR, "w4"), Some(1));
}

#[tokio::test]
async fn unreachable_work_contributes_zero_column() {
    let dir = TempDir::new().unwrap();
    let fetcher = CannedFetcher::new()
        .with_page("Ok", 1, page(Some(1), &[hit(1, "French", Some("2005"))]));
    let h = harvester(fetcher, &dir, false);
    let works = vec![work("w5", "Missing"), work("w6", "Ok")];

    let reports = h.harvest_all(&works).await;
    assert_eq!(reports[0].work_id, "w5");
    assert_eq!(reports[0].pages_saved, 0);
    assert_eq!(reports[0].failed_offsets, vec![1]);
    assert_eq!(reports[1].pages_saved, 1);

    let (matrix, _) = tabulate(h.store(), &works, "French").unwrap();
    assert_eq!(matrix.works(), &["w5".to_string(), "w6".to_string()]);
    assert_eq!(matrix.total("w5"), Some(0));
    assert_eq!(matrix.total("w6"), Some(1));
}

#[tokio::test]
async fn resume_skips_stored_works() {
    let dir = TempDir::new().unwrap();
    let body = page(Some(1), &[hit(1, "French", Some("1999"))]);
    let works = vec![work("w7", "Seven")];

    let first = harvester(CannedFetcher::new().with_page("Seven", 1, body.clone()), &dir, false);
    first.harvest_all(&works).await;

    let second = harvester(CannedFetcher::new().with_page("Seven", 1, body), &dir, true);
    let reports = second.harvest_all(&works).await;
    assert!(reports[0].skipped);
    assert_eq!(reports[0].pages_saved, 0);
}

#[tokio::test]
async fn reharvest_drops_pages_of_the_earlier_run() {
    let dir = TempDir::new().unwrap();
    let works = vec![work("w9", "Nine")];

    let first = harvester(
        CannedFetcher::new()
            .with_page("Nine", 1, page(Some(12), &[hit(1, "French", Some("1990"))]))
            .with_page("Nine", 11, page(None, &[hit(11, "French", Some("2001"))])),
        &dir,
        false,
    );
    assert_eq!(first.harvest_all(&works).await[0].pages_saved, 2);

    let second = harvester(
        CannedFetcher::new().with_page("Nine", 1, page(Some(1), &[hit(1, "French", Some("1990"))])),
        &dir,
        false,
    );
    assert_eq!(second.harvest_all(&works).await[0].pages_saved, 1);
    assert!(!dir.path().join("fra/w9_html002.html").exists());

    let (matrix, _) = tabulate(second.store(), &works, "French").unwrap();
    assert_eq!(matrix.total("w9"), Some(1));
    assert_eq!(matrix.count(2001, "w9"), Some(0));
}

#[tokio::test]
async fn failed_first_page_keeps_earlier_pages() {
    let dir = TempDir::new().unwrap();
    let works = vec![work("w10", "Ten")];

    let first = harvester(
        CannedFetcher::new().with_page("Ten", 1, page(Some(1), &[hit(1, "French", Some("1985"))])),
        &dir,
        false,
    );
    first.harvest_all(&works).await;

    let second = harvester(CannedFetcher::new(), &dir, false);
    let reports = second.harvest_all(&works).await;
    assert_eq!(reports[0].failed_offsets, vec![1]);
    assert!(dir.path().join("fra/w10_html001.html").exists());
}

#[tokio::test]
async fn schedule_requests_expected_offsets() {
    let dir = TempDir::new().unwrap();
    let fetcher = CannedFetcher::new()
        .with_page("Five", 1, page(Some(21), &[]))
        .with_page("Five", 11, page(None, &[]))
        .with_page("Five", 21, page(None, &[]));
    let h = harvester(fetcher, &dir, false);
    h.harvest_work(&work("w8", "Five")).await.unwrap();

    let calls = h.fetcher().calls();
    assert_eq!(calls, vec![url("Five", 1), url("Five", 11), url("Five", 21)]);
}

#[tokio::test]
async fn harvests_over_http() {
    let mut server = mockito::Server::new_async().await;
    let _p1 = server
        .mock("GET", "/search?q=Nana&start=1")
        .with_status(200)
        .with_body(page(Some(12), &[hit(1, "French", Some("Paris : Charpentier, 1880"))]))
        .create_async()
        .await;
    let _p2 = server
        .mock("GET", "/search?q=Nana&start=11")
        .with_status(200)
        .with_body(page(None, &[hit(11, "French", Some("Paris : Fasquelle, 1977"))]))
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let client =
        RateLimitedClient::new(Duration::from_secs(0), 0, Duration::from_secs(5), "canonscope-test")
            .unwrap();
    let h = Harvester::new(
        client,
        PageStore::new(dir.path()),
        locale(),
        HarvestOptions {
            search_url: format!("{}/search?q={{title}}&start={{start}}", server.url()),
            page_stride: 10,
            concurrency: 1,
            resume: false,
        },
    );
    let works = vec![WorkMetadata::new("FRA00102", "FRA00102_Zola", "Nana", "Zola, Émile")];
    let reports = h.harvest_all(&works).await;
    assert_eq!(reports[0].pages_saved, 2);

    let (matrix, _) = tabulate(h.store(), &works, "French").unwrap();
    assert_eq!(matrix.count(1880, "FRA00102"), Some(1));
    assert_eq!(matrix.count(1977, "FRA00102"), Some(1));
}
