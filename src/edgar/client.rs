use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mime::{APPLICATION_JSON, TEXT_HTML};
use reqwest::Client;
use std::time::Duration;
use url::Url;

use super::filing::CompanyFilings;
use super::rate_limiter::RateLimiter;
use super::utils::fetch_text;

pub const TICKER_URL: &str = "https://www.sec.gov/files/company_tickers.json";
pub const EDGAR_DATA_URL: &str = "https://data.sec.gov";
pub const EDGAR_ARCHIVES_URL: &str = "https://www.sec.gov/Archives/edgar/data";

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The three SEC EDGAR endpoints the pipeline reads.
#[async_trait]
pub trait EdgarApi: Send + Sync {
    /// Raw body of the company tickers registry.
    async fn company_tickers(&self) -> Result<String>;

    /// Filing history for a zero padded CIK.
    async fn submissions(&self, cik: &str) -> Result<CompanyFilings>;

    /// Markup of a filing document.
    async fn document(&self, url: &str) -> Result<String>;
}

pub struct EdgarClient {
    client: Client,
    user_agent: String,
    rate_limiter: RateLimiter,
}

impl EdgarClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
            rate_limiter: RateLimiter::default(),
        })
    }
}

#[async_trait]
impl EdgarApi for EdgarClient {
    async fn company_tickers(&self) -> Result<String> {
        log::debug!("Fetching tickers from SEC");
        let url = Url::parse(TICKER_URL)?;
        fetch_text(
            &self.client,
            &url,
            &self.user_agent,
            APPLICATION_JSON,
            Some(&self.rate_limiter),
        )
        .await
    }

    async fn submissions(&self, cik: &str) -> Result<CompanyFilings> {
        // Ensure CIK is 10 digits with leading zeros
        let padded_cik = format!("{:0>10}", cik);
        let url = Url::parse(&format!(
            "{}/submissions/CIK{}.json",
            EDGAR_DATA_URL, padded_cik
        ))?;

        log::info!("Fetching company filings for CIK {}", padded_cik);
        let content = fetch_text(
            &self.client,
            &url,
            &self.user_agent,
            APPLICATION_JSON,
            Some(&self.rate_limiter),
        )
        .await?;

        serde_json::from_str(&content).map_err(|e| {
            log::error!("Failed to parse filings JSON for CIK {}: {}", padded_cik, e);
            anyhow!("Failed to parse filings JSON: {}", e)
        })
    }

    async fn document(&self, url: &str) -> Result<String> {
        log::info!("Fetching: {}", url);
        let url = Url::parse(url)?;
        fetch_text(&self.client, &url, &self.user_agent, TEXT_HTML, None).await
    }
}
