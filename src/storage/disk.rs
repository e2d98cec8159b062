use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::Path;

use super::{rank, save_outcome, LeaderboardEntry, ResultStore, SaveOutcome, StoredResult};

/// [`ResultStore`] on an embedded sled database.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: &Path) -> Result<Self> {
        crate::utils::dirs::ensure_dir(path)?;
        let db = sled::open(path)
            .map_err(|e| anyhow!("Failed to open result store at {:?}: {}", path, e))?;
        log::debug!("Opened result store at {:?}", path);
        Ok(Self { db })
    }

    fn get(&self, ticker: &str) -> Result<Option<StoredResult>> {
        match self.db.get(ticker.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ResultStore for SledStore {
    async fn upsert(&self, record: &StoredResult) -> Result<SaveOutcome> {
        let existing = self.get(&record.ticker)?;
        let outcome = save_outcome(existing.as_ref(), record);
        if outcome != SaveOutcome::Unchanged {
            self.db
                .insert(record.ticker.as_bytes(), serde_json::to_vec(record)?)?;
            self.db.flush_async().await?;
        }
        Ok(outcome)
    }

    async fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let mut records = Vec::new();
        for item in self.db.iter() {
            let (key, value) = item?;
            match serde_json::from_slice::<StoredResult>(&value) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!(
                    "Skipping unreadable stored result {}: {}",
                    String::from_utf8_lossy(&key),
                    e
                ),
            }
        }
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
            company_name: format!("{} Corp", ticker),
            percentage,
            total_payments: 1_000_000.0,
            market_cap: 2_000_000_000,
            def14a_url: format!("https://www.sec.gov/Archives/edgar/data/1/2/{}.htm", ticker),
            filing_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            payouts: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_rank() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(&dir.path().join("results")).unwrap();

        assert_eq!(store.upsert(&record("AAA", 0.5)).await.unwrap(), SaveOutcome::Inserted);
        assert_eq!(store.upsert(&record("BBB", 1.5)).await.unwrap(), SaveOutcome::Inserted);
        assert_eq!(
            store.upsert(&record("AAA", 0.50001)).await.unwrap(),
            SaveOutcome::Unchanged
        );
        assert_eq!(store.upsert(&record("AAA", 2.0)).await.unwrap(), SaveOutcome::Updated);

        let top = store.top(10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].ticker, "AAA");
        assert_eq!(top[0].percentage, 2.0);
        assert_eq!(top[1].ticker, "BBB");

        assert_eq!(store.top(1).await.unwrap().len(), 1);
    }
}
