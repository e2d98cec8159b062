use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::RwLock;

use super::client::EdgarApi;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticker(String);

impl Ticker {
    pub fn new(ticker: String) -> Result<Self> {
        let uppercase_ticker = ticker.trim().to_uppercase();
        if uppercase_ticker.is_empty() {
            return Err(anyhow!("Ticker cannot be empty"));
        }
        if !uppercase_ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        {
            return Err(anyhow!(
                "Ticker must contain only alphanumeric characters, dots or hyphens: {}",
                ticker
            ));
        }
        Ok(Ticker(uppercase_ticker))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the SEC company tickers file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub title: String,
    pub ticker: Ticker,
    /// Ten digit, zero padded CIK.
    pub cik: String,
    normalized_title: String,
}

impl RegistryEntry {
    pub fn new(title: &str, ticker: Ticker, cik: u64) -> Self {
        Self {
            normalized_title: normalize_company_name(title),
            title: title.to_string(),
            ticker,
            cik: format!("{:010}", cik),
        }
    }
}

#[derive(Deserialize)]
struct RawEntry {
    cik_str: u64,
    ticker: String,
    title: String,
}

/// Lowercase, replace punctuation with spaces, collapse whitespace.
pub fn normalize_company_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The SEC company registry, in file order.
#[derive(Debug, Clone, Default)]
pub struct TickerRegistry {
    entries: Vec<RegistryEntry>,
    by_ticker: HashMap<String, usize>,
}

impl TickerRegistry {
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        let mut by_ticker = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            by_ticker
                .entry(entry.ticker.as_str().to_string())
                .or_insert(idx);
        }
        Self { entries, by_ticker }
    }

    /// Parse the `company_tickers.json` body.
    ///
    /// The file is an object keyed "0", "1", ...; entries keep that numeric
    /// order so the first substring match is stable across runs.
    pub fn parse(json: &str) -> Result<Self> {
        let raw: HashMap<String, RawEntry> = serde_json::from_str(json)
            .map_err(|e| anyhow!("Failed to parse tickers JSON: {}", e))?;
        log::debug!("Found {} ticker entries", raw.len());

        let mut keyed: Vec<(u64, String, RawEntry)> = raw
            .into_iter()
            .map(|(k, v)| (k.parse::<u64>().unwrap_or(u64::MAX), k, v))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut entries = Vec::with_capacity(keyed.len());
        for (_, key, raw) in keyed {
            match Ticker::new(raw.ticker.clone()) {
                Ok(ticker) => entries.push(RegistryEntry::new(&raw.title, ticker, raw.cik_str)),
                Err(e) => log::debug!("Skipping registry entry {}: {}", key, e),
            }
        }

        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry whose normalized title contains the normalized query or
    /// is contained by it.
    pub fn search_name(&self, query: &str) -> Vec<&RegistryEntry> {
        let needle = normalize_company_name(query);
        if needle.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|e| {
                !e.normalized_title.is_empty()
                    && (e.normalized_title.contains(&needle)
                        || needle.contains(&e.normalized_title))
            })
            .collect()
    }

    /// Exact, case-insensitive ticker lookup.
    pub fn find_ticker(&self, ticker: &str) -> Option<&RegistryEntry> {
        let key = ticker.trim().to_uppercase();
        self.by_ticker.get(&key).map(|&idx| &self.entries[idx])
    }
}

/// How long a failed download is not retried while a stale copy is served.
pub const REGISTRY_RETRY_AFTER: Duration = Duration::from_secs(60);

struct CachedRegistry {
    expires_at: Instant,
    registry: Arc<TickerRegistry>,
}

impl CachedRegistry {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Process-level copy of the registry with a staleness bound.
///
/// Reads go to memory while the copy is younger than `ttl`. Past that the
/// on-disk copy is tried, then the network. A failed download falls back to a
/// stale copy when one exists, and that copy is served without another
/// download attempt for `retry_after`.
pub struct RegistryCache {
    api: Arc<dyn EdgarApi>,
    cache_file: Option<PathBuf>,
    ttl: Duration,
    retry_after: Duration,
    inner: RwLock<Option<CachedRegistry>>,
}

impl RegistryCache {
    pub fn new(api: Arc<dyn EdgarApi>, cache_file: Option<PathBuf>, ttl: Duration) -> Self {
        Self {
            api,
            cache_file,
            ttl,
            retry_after: REGISTRY_RETRY_AFTER,
            inner: RwLock::new(None),
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub async fn get(&self) -> Result<Arc<TickerRegistry>> {
        if let Some(cached) = self.inner.read().await.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.registry.clone());
            }
        }

        let mut guard = self.inner.write().await;
        if let Some(cached) = guard.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.registry.clone());
            }
        }

        let (registry, valid_for) = match self.read_fresh_file() {
            Some(registry) => (Arc::new(registry), self.ttl),
            None => match self.download().await {
                Ok(registry) => (Arc::new(registry), self.ttl),
                Err(e) => match (guard.as_ref(), self.read_file()) {
                    (Some(stale), _) => {
                        log::warn!(
                            "Registry refresh failed, using stale in-memory copy for {:?}: {}",
                            self.retry_after,
                            e
                        );
                        (stale.registry.clone(), self.retry_after)
                    }
                    (None, Some(stale)) => {
                        log::warn!(
                            "Registry refresh failed, using stale cache file for {:?}: {}",
                            self.retry_after,
                            e
                        );
                        (Arc::new(stale), self.retry_after)
                    }
                    (None, None) => return Err(e),
                },
            },
        };

        *guard = Some(CachedRegistry {
            expires_at: Instant::now() + valid_for,
            registry: registry.clone(),
        });
        Ok(registry)
    }

    /// Download the registry regardless of cache age.
    pub async fn refresh(&self) -> Result<Arc<TickerRegistry>> {
        let registry = Arc::new(self.download().await?);
        *self.inner.write().await = Some(CachedRegistry {
            expires_at: Instant::now() + self.ttl,
            registry: registry.clone(),
        });
        Ok(registry)
    }

    async fn download(&self) -> Result<TickerRegistry> {
        let body = self.api.company_tickers().await?;
        let registry = TickerRegistry::parse(&body)?;
        log::info!("Loaded {} registry entries from SEC", registry.len());

        if let Some(path) = &self.cache_file {
            if let Err(e) = super::utils::save_text(path, &body) {
                log::warn!("Could not write registry cache {:?}: {}", path, e);
            }
        }
        Ok(registry)
    }

    fn read_fresh_file(&self) -> Option<TickerRegistry> {
        let path = self.cache_file.as_ref()?;
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        if age >= self.ttl {
            log::debug!("Registry cache {:?} is stale ({:?} old)", path, age);
            return None;
        }
        self.read_file()
    }

    fn read_file(&self) -> Option<TickerRegistry> {
        let path = self.cache_file.as_ref()?;
        let content = fs::read_to_string(path).ok()?;
        match TickerRegistry::parse(&content) {
            Ok(registry) => {
                log::debug!("Using registry cache file {:?}", path);
                Some(registry)
            }
            Err(e) => {
                log::warn!("Ignoring unreadable registry cache {:?}: {}", path, e);
                None
            }
        }
    }
}
