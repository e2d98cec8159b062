#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use coc_analyzer::{
    edgar::{filing::CompanyFilings, EdgarApi, RegistryCache},
    market::{MarketData, MarketQuote},
    oracle::Oracle,
    storage::{InMemoryStore, LeaderboardEntry, ResultStore, SaveOutcome, StoredResult},
    Analyzer, CancelHandle,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const APPLE_DOC_URL: &str =
    "https://www.sec.gov/Archives/edgar/data/320193/000130817924000010/aapl4359751-def14a.htm";

/// One company known to the fake upstreams.
#[derive(Clone)]
pub struct Company {
    pub title: &'static str,
    pub ticker: &'static str,
    pub cik: u64,
    pub market_cap: Option<u64>,
    pub has_proxy: bool,
    pub mentions_change_in_control: bool,
    pub oracle_response: String,
}

impl Company {
    pub fn new(title: &'static str, ticker: &'static str, cik: u64, payouts: &[(&str, f64)]) -> Self {
        let entries: Vec<_> = payouts
            .iter()
            .map(|(name, amount)| json!({"name": name, "amount": amount}))
            .collect();
        Self {
            title,
            ticker,
            cik,
            market_cap: Some(50_000_000_000),
            has_proxy: true,
            mentions_change_in_control: true,
            oracle_response: format!(
                "```json\n{}\n```",
                serde_json::to_string_pretty(&entries).unwrap()
            ),
        }
    }

    pub fn padded_cik(&self) -> String {
        format!("{:010}", self.cik)
    }

    /// Text the fake oracle looks for to pick this company's answer.
    pub fn marker(&self) -> String {
        format!("[[{}]]", self.ticker)
    }

    fn accession(&self) -> String {
        if self.ticker == "AAPL" {
            "0001308179-24-000010".to_string()
        } else {
            format!("0000{:06}-24-000001", self.cik % 1_000_000)
        }
    }

    fn primary_document(&self) -> String {
        if self.ticker == "AAPL" {
            "aapl4359751-def14a.htm".to_string()
        } else {
            format!("{}-def14a.htm", self.ticker.to_lowercase())
        }
    }

    fn filings(&self) -> CompanyFilings {
        let (accessions, dates, forms, documents) = if self.has_proxy {
            (
                vec![
                    "0000000000-24-000099".to_string(),
                    self.accession(),
                    "0000000000-23-000001".to_string(),
                ],
                vec!["2024-11-01", "2024-03-01", "2023-01-10"],
                vec!["10-K", "DEF 14A", "DEF 14A"],
                vec![
                    "annual-10k.htm".to_string(),
                    self.primary_document(),
                    "old-def14a.htm".to_string(),
                ],
            )
        } else {
            (
                vec!["0000000000-24-000099".to_string()],
                vec!["2024-11-01"],
                vec!["10-K"],
                vec!["annual-10k.htm".to_string()],
            )
        };

        serde_json::from_value(json!({
            "cik": self.cik.to_string(),
            "name": self.title,
            "tickers": [self.ticker],
            "filings": {
                "recent": {
                    "accessionNumber": accessions,
                    "filingDate": dates,
                    "form": forms,
                    "primaryDocument": documents,
                }
            }
        }))
        .unwrap()
    }

    fn document(&self) -> String {
        let filler = "The Compensation Committee reviewed the executive compensation program during the year. "
            .repeat(5);
        let body = if self.mentions_change_in_control {
            format!(
                "Potential payments upon a change in control {} are summarized below.",
                self.marker()
            )
        } else {
            "No severance arrangements are described in this section.".to_string()
        };
        format!(
            "<html><head><title>Proxy</title><style>p {{ margin: 0 }}</style></head>\
             <body><p>{}</p><p>{}</p><script>var x = 1;</script></body></html>",
            filler, body
        )
    }

    fn document_url(&self) -> String {
        format!(
            "https://www.sec.gov/Archives/edgar/data/{}/{}/{}",
            self.cik,
            self.accession().replace('-', ""),
            self.primary_document()
        )
    }
}

pub fn apple() -> Company {
    Company::new(
        "Apple Inc.",
        "AAPL",
        320193,
        &[("Tim Cook", 10_000_000.0), ("Jeff Williams", 2_500_000.0)],
    )
}

pub fn microsoft() -> Company {
    Company::new("MICROSOFT CORP", "MSFT", 789019, &[("Satya Nadella", 40_000_000.0)])
}

pub fn nvidia() -> Company {
    Company::new("NVIDIA CORP", "NVDA", 1045810, &[("Jensen Huang", 5_000_000.0)])
}

pub fn tesla() -> Company {
    Company::new("Tesla, Inc.", "TSLA", 1318605, &[("Vaibhav Taneja", 1_000_000.0)])
}

pub fn alphabet() -> Company {
    Company::new("Alphabet Inc.", "GOOGL", 1652044, &[("Sundar Pichai", 20_000_000.0)])
}

/// EDGAR backed by a fixed company list. Records submissions and document calls.
pub struct FakeEdgar {
    companies: Vec<Company>,
    tickers_offline: bool,
    pub submissions_calls: Mutex<Vec<String>>,
    pub document_calls: Mutex<Vec<String>>,
}

impl FakeEdgar {
    pub fn new(companies: Vec<Company>) -> Self {
        Self {
            companies,
            tickers_offline: false,
            submissions_calls: Mutex::new(Vec::new()),
            document_calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail every company registry download.
    pub fn tickers_offline(mut self) -> Self {
        self.tickers_offline = true;
        self
    }

    pub fn submissions_for(&self, cik: &str) -> usize {
        self.submissions_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == cik)
            .count()
    }
}

#[async_trait]
impl EdgarApi for FakeEdgar {
    async fn company_tickers(&self) -> Result<String> {
        if self.tickers_offline {
            return Err(anyhow!("503 from company_tickers.json"));
        }
        let registry: serde_json::Map<String, serde_json::Value> = self
            .companies
            .iter()
            .enumerate()
            .map(|(i, c)| {
                (
                    i.to_string(),
                    json!({"cik_str": c.cik, "ticker": c.ticker, "title": c.title}),
                )
            })
            .collect();
        Ok(serde_json::Value::Object(registry).to_string())
    }

    async fn submissions(&self, cik: &str) -> Result<CompanyFilings> {
        self.submissions_calls.lock().unwrap().push(cik.to_string());
        self.companies
            .iter()
            .find(|c| c.padded_cik() == cik)
            .map(Company::filings)
            .ok_or_else(|| anyhow!("404 for CIK {}", cik))
    }

    async fn document(&self, url: &str) -> Result<String> {
        self.document_calls.lock().unwrap().push(url.to_string());
        self.companies
            .iter()
            .find(|c| c.document_url() == url)
            .map(Company::document)
            .ok_or_else(|| anyhow!("404 for {}", url))
    }
}

/// Market data keyed by ticker, with optional search aliases.
pub struct FakeMarket {
    companies: Vec<Company>,
    aliases: HashMap<String, &'static str>,
    cancel_on: Option<(&'static str, CancelHandle)>,
    pub lookup_calls: Mutex<Vec<String>>,
    pub market_cap_calls: Mutex<Vec<String>>,
}

impl FakeMarket {
    pub fn new(companies: Vec<Company>) -> Self {
        Self {
            companies,
            aliases: HashMap::new(),
            cancel_on: None,
            lookup_calls: Mutex::new(Vec::new()),
            market_cap_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_alias(mut self, term: &str, ticker: &'static str) -> Self {
        self.aliases.insert(term.to_string(), ticker);
        self
    }

    /// Flip `handle` when the market cap of `ticker` is requested.
    pub fn cancel_on(mut self, ticker: &'static str, handle: CancelHandle) -> Self {
        self.cancel_on = Some((ticker, handle));
        self
    }
}

#[async_trait]
impl MarketData for FakeMarket {
    async fn lookup(&self, term: &str) -> Result<Option<MarketQuote>> {
        self.lookup_calls.lock().unwrap().push(term.to_string());
        let Some(ticker) = self.aliases.get(term) else {
            return Ok(None);
        };
        Ok(self
            .companies
            .iter()
            .find(|c| c.ticker == *ticker)
            .map(|c| MarketQuote {
                symbol: c.ticker.to_string(),
                name: c.title.to_string(),
                price: Some(100.0),
            }))
    }

    async fn market_cap(&self, ticker: &str) -> Result<Option<u64>> {
        self.market_cap_calls.lock().unwrap().push(ticker.to_string());
        if let Some((trigger, handle)) = &self.cancel_on {
            if *trigger == ticker {
                handle.cancel();
            }
        }
        Ok(self
            .companies
            .iter()
            .find(|c| c.ticker == ticker)
            .and_then(|c| c.market_cap))
    }
}

/// Answers with the response of whichever company's marker is in the prompt.
pub struct FakeOracle {
    companies: Vec<Company>,
    panic_on: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeOracle {
    pub fn new(companies: Vec<Company>) -> Self {
        Self {
            companies,
            panic_on: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn panicking_on(mut self, company: &Company) -> Self {
        self.panic_on = Some(company.marker());
        self
    }
}

#[async_trait]
impl Oracle for FakeOracle {
    async fn complete(&self, _system: &str, user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.panic_on {
            if user.contains(marker.as_str()) {
                panic!("oracle blew up on {}", marker);
            }
        }
        self.companies
            .iter()
            .find(|c| user.contains(&c.marker()))
            .map(|c| c.oracle_response.clone())
            .ok_or_else(|| anyhow!("model returned no choices"))
    }
}

/// A store whose writes always fail.
pub struct BrokenStore;

#[async_trait]
impl ResultStore for BrokenStore {
    async fn upsert(&self, _record: &StoredResult) -> Result<SaveOutcome> {
        Err(anyhow!("disk full"))
    }

    async fn top(&self, _limit: usize) -> Result<Vec<LeaderboardEntry>> {
        Ok(Vec::new())
    }
}

/// Fakes wired into an [`Analyzer`].
pub struct Harness {
    pub edgar: Arc<FakeEdgar>,
    pub market: Arc<FakeMarket>,
    pub oracle: Arc<FakeOracle>,
    pub store: Arc<InMemoryStore>,
}

impl Harness {
    pub fn new(companies: Vec<Company>) -> Self {
        Self::with_fakes(
            FakeEdgar::new(companies.clone()),
            FakeMarket::new(companies.clone()),
            FakeOracle::new(companies),
        )
    }

    pub fn with_fakes(edgar: FakeEdgar, market: FakeMarket, oracle: FakeOracle) -> Self {
        Self {
            edgar: Arc::new(edgar),
            market: Arc::new(market),
            oracle: Arc::new(oracle),
            store: Arc::new(InMemoryStore::new()),
        }
    }

    pub fn analyzer(&self) -> Analyzer {
        self.analyzer_with_store(self.store.clone())
    }

    pub fn analyzer_with_store(&self, store: Arc<dyn ResultStore>) -> Analyzer {
        let registry = Arc::new(RegistryCache::new(
            self.edgar.clone(),
            None,
            Duration::from_secs(3600),
        ));
        Analyzer::new(
            self.edgar.clone(),
            registry,
            self.market.clone(),
            self.oracle.clone(),
        )
        .with_store(store)
    }
}
