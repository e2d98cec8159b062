use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{rank, save_outcome, LeaderboardEntry, ResultStore, SaveOutcome, StoredResult};

/// Process-local [`ResultStore`], for tests and dry runs.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, StoredResult>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, ticker: &str) -> Option<StoredResult> {
        self.records.read().await.get(ticker).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn upsert(&self, record: &StoredResult) -> Result<SaveOutcome> {
        let mut records = self.records.write().await;
        let outcome = save_outcome(records.get(&record.ticker), record);
        if outcome != SaveOutcome::Unchanged {
            records.insert(record.ticker.clone(), record.clone());
        }
        Ok(outcome)
    }

    async fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let records = self.records.read().await.values().cloned().collect();
        Ok(rank(records, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn record(ticker: &str, percentage: f64) -> StoredResult {
        StoredResult {
            ticker: ticker.to_string(),
            company_name: ticker.to_string(),
            percentage,
            total_payments: 10.0,
            market_cap: 1_000,
            def14a_url: String::new(),
            filing_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            payouts: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_keyed_by_ticker() {
        let store = InMemoryStore::new();
        store.upsert(&record("X", 1.0)).await.unwrap();
        store.upsert(&record("Y", 3.0)).await.unwrap();
        assert_eq!(store.upsert(&record("X", 1.0)).await.unwrap(), SaveOutcome::Unchanged);
        assert_eq!(store.upsert(&record("X", 5.0)).await.unwrap(), SaveOutcome::Updated);

        assert_eq!(store.len().await, 2);
        let top = store.top(10).await.unwrap();
        assert_eq!(
            top.iter().map(|e| e.ticker.as_str()).collect::<Vec<_>>(),
            vec!["X", "Y"]
        );
    }
}
