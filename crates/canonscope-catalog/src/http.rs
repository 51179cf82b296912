use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

use canonscope_core::config::CatalogConfig;

use crate::error::{CatalogError, Result};

/// Source of raw result-page markup.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

// ─── RateLimitedClient ────────────────────────────────────────────────────────

pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
    max_retries: u32,
}

impl RateLimitedClient {
    pub fn new(
        min_interval: Duration,
        max_retries: u32,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
            max_retries,
        })
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        Self::new(
            Duration::from_millis(config.min_interval_ms),
            config.max_retries,
            Duration::from_secs(config.timeout_secs),
            &config.user_agent,
        )
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            self.wait_for_rate_limit().await;
            debug!("GET {url} (attempt {})", attempt + 1);
            let resp = self.client.get(url).send().await;
            match resp {
                Ok(r) if r.status() == 429 => {
                    let wait = r
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    if attempt >= self.max_retries {
                        return Err(CatalogError::RateLimit(url.to_string(), wait));
                    }
                    sleep(Duration::from_secs(wait)).await;
                    attempt += 1;
                }
                Ok(r) if r.status() == 404 => {
                    return Err(CatalogError::PageNotFound(url.to_string()));
                }
                Ok(r) if !r.status().is_success() => {
                    let status = r.status().as_u16();
                    return Err(CatalogError::ApiError(
                        url.to_string(),
                        format!("HTTP {status}"),
                    ));
                }
                Ok(r) => return r.text().await.map_err(CatalogError::Http),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(CatalogError::Http(e));
                    }
                    let backoff = 2u64.pow(attempt);
                    sleep(Duration::from_secs(backoff)).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl PageFetcher for RateLimitedClient {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.get(url).await
    }
}
