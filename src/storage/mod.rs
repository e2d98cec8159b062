use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{CompanyResult, PayoutEntry};

pub mod disk;
pub mod memory;

pub use self::disk::SledStore;
pub use self::memory::InMemoryStore;

/// Percentage differences below this count as unchanged.
pub const PERCENTAGE_TOLERANCE: f64 = 0.0001;

/// A persisted analysis, keyed by ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub ticker: String,
    pub company_name: String,
    pub percentage: f64,
    pub total_payments: f64,
    pub market_cap: u64,
    pub def14a_url: String,
    pub filing_date: NaiveDate,
    pub payouts: Vec<PayoutEntry>,
    pub updated_at: DateTime<Utc>,
}

impl StoredResult {
    /// The persistable view of a successful result; `None` for anything else.
    pub fn from_result(result: &CompanyResult) -> Option<Self> {
        let percentage = result.percentage.filter(|p| *p > 0.0)?;
        let identity = result.identity.as_ref()?;
        let filing = result.filing.as_ref()?;
        Some(Self {
            ticker: identity.ticker.clone(),
            company_name: identity.canonical_name.clone(),
            percentage,
            total_payments: result.total_payments,
            market_cap: result.market_cap?,
            def14a_url: filing.document_url.clone(),
            filing_date: filing.filing_date,
            payouts: result.payouts.clone(),
            updated_at: Utc::now(),
        })
    }

    pub fn leaderboard_entry(&self) -> LeaderboardEntry {
        LeaderboardEntry {
            company_name: self.company_name.clone(),
            ticker: self.ticker.clone(),
            percentage: self.percentage,
            def14a_url: self.def14a_url.clone(),
            total_payments: self.total_payments,
            market_cap: self.market_cap,
            filing_date: self.filing_date,
        }
    }
}

/// Leaderboard projection of a stored result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub company_name: String,
    pub ticker: String,
    pub percentage: f64,
    pub def14a_url: String,
    pub total_payments: f64,
    pub market_cap: u64,
    pub filing_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Updated,
    /// The stored percentage already matched within tolerance.
    Unchanged,
}

/// Decide what an upsert of `new` over `existing` does.
pub fn save_outcome(existing: Option<&StoredResult>, new: &StoredResult) -> SaveOutcome {
    match existing {
        None => SaveOutcome::Inserted,
        Some(old) if (old.percentage - new.percentage).abs() < PERCENTAGE_TOLERANCE => {
            SaveOutcome::Unchanged
        }
        Some(_) => SaveOutcome::Updated,
    }
}

/// Highest percentages first, at most `limit` entries.
pub fn rank(mut records: Vec<StoredResult>, limit: usize) -> Vec<LeaderboardEntry> {
    records.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    records
        .iter()
        .take(limit)
        .map(StoredResult::leaderboard_entry)
        .collect()
}

/// Durable, upsert-by-ticker storage of successful analyses.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn upsert(&self, record: &StoredResult) -> Result<SaveOutcome>;

    async fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>>;
}
