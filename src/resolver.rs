//! Company identity resolution.
//!
//! Registry titles are formal legal names while user input is colloquial, so
//! resolution runs an ordered list of stages and stops at the first hit:
//!
//! 1. substring match of the normalized query against registry titles,
//! 2. market-data search over the query and common suffix variants,
//! 3. exact ticker lookup in the registry for the symbol stage 2 found.

use itertools::Itertools;
use std::sync::Arc;
use strum::Display;

use crate::core::error::{ErrorKind, StageError};
use crate::core::types::CompanyIdentity;
use crate::edgar::tickers::{RegistryCache, RegistryEntry, TickerRegistry};
use crate::market::{MarketData, MarketQuote};

const NAME_SUFFIXES: [&str; 4] = ["Inc", "Inc.", "Corporation", "Corp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ResolutionStage {
    #[strum(to_string = "registry name match")]
    RegistryName,
    #[strum(to_string = "market data search")]
    MarketSearch,
    #[strum(to_string = "ticker cross-reference")]
    TickerCrossReference,
}

pub const RESOLUTION_ORDER: [ResolutionStage; 3] = [
    ResolutionStage::RegistryName,
    ResolutionStage::MarketSearch,
    ResolutionStage::TickerCrossReference,
];

/// What one stage produced.
#[derive(Debug)]
enum Attempt {
    Resolved(CompanyIdentity),
    /// A market symbol that still needs a registry identifier.
    Candidate(MarketQuote),
    Miss(String),
}

/// Search terms tried against market data, in order, without duplicates.
pub fn search_variants(query: &str) -> Vec<String> {
    let base = query.trim();
    std::iter::once(base.to_string())
        .chain(std::iter::once(base.to_uppercase()))
        .chain(NAME_SUFFIXES.iter().map(|s| format!("{} {}", base, s)))
        .unique()
        .collect()
}

pub struct IdentityResolver {
    registry: Arc<RegistryCache>,
    market: Arc<dyn MarketData>,
}

impl IdentityResolver {
    pub fn new(registry: Arc<RegistryCache>, market: Arc<dyn MarketData>) -> Self {
        Self { registry, market }
    }

    pub async fn resolve(&self, query: &str) -> Result<CompanyIdentity, StageError> {
        let registry = match self.registry.get().await {
            Ok(registry) => Some(registry),
            Err(e) => {
                log::warn!("Company registry unavailable: {}", e);
                None
            }
        };

        let mut candidate: Option<MarketQuote> = None;
        for stage in RESOLUTION_ORDER {
            let attempt = self
                .attempt(stage, query, registry.as_deref(), candidate.as_ref())
                .await;
            match attempt {
                Attempt::Resolved(identity) => {
                    log::info!(
                        "Resolved '{}' via {}: {} ({}, CIK {})",
                        query,
                        stage,
                        identity.canonical_name,
                        identity.ticker,
                        identity.registry_id
                    );
                    return Ok(identity);
                }
                Attempt::Candidate(quote) => {
                    log::debug!(
                        "{} found {} ({}) for '{}'",
                        stage,
                        quote.name,
                        quote.symbol,
                        query
                    );
                    candidate = Some(quote);
                }
                Attempt::Miss(reason) => log::debug!("{} missed for '{}': {}", stage, query, reason),
            }
        }

        Err(StageError::new(
            ErrorKind::NotFound,
            format!(
                "No company found matching \"{}\". Try using the full legal name (e.g., \"Apple Inc.\" instead of \"Apple\")",
                query
            ),
        ))
    }

    async fn attempt(
        &self,
        stage: ResolutionStage,
        query: &str,
        registry: Option<&TickerRegistry>,
        candidate: Option<&MarketQuote>,
    ) -> Attempt {
        match stage {
            ResolutionStage::RegistryName => {
                let Some(registry) = registry else {
                    return Attempt::Miss("registry unavailable".to_string());
                };
                let matches = registry.search_name(query);
                match matches.first() {
                    Some(entry) => {
                        if matches.len() > 1 {
                            log::debug!(
                                "'{}' matched {} registry titles, taking '{}'",
                                query,
                                matches.len(),
                                entry.title
                            );
                        }
                        Attempt::Resolved(identity_from(query, entry))
                    }
                    None => Attempt::Miss("no registry title matched".to_string()),
                }
            }
            ResolutionStage::MarketSearch => self.search_market(query).await,
            ResolutionStage::TickerCrossReference => {
                let (Some(registry), Some(quote)) = (registry, candidate) else {
                    return Attempt::Miss("no market symbol to cross-reference".to_string());
                };
                match registry.find_ticker(&quote.symbol) {
                    Some(entry) => Attempt::Resolved(identity_from(query, entry)),
                    None => Attempt::Miss(format!("{} is not in the registry", quote.symbol)),
                }
            }
        }
    }

    async fn search_market(&self, query: &str) -> Attempt {
        for variant in search_variants(query) {
            match self.market.lookup(&variant).await {
                Ok(Some(quote)) if quote.is_live() => return Attempt::Candidate(quote),
                Ok(Some(quote)) => {
                    log::debug!("Ignoring {} for '{}': no live quote", quote.symbol, variant)
                }
                Ok(None) => {}
                Err(e) => log::debug!("Market search for '{}' failed: {}", variant, e),
            }
        }
        Attempt::Miss("no variant returned a live quote".to_string())
    }
}

fn identity_from(query: &str, entry: &RegistryEntry) -> CompanyIdentity {
    CompanyIdentity {
        raw_query: query.to_string(),
        canonical_name: entry.title.clone(),
        ticker: entry.ticker.as_str().to_string(),
        registry_id: entry.cik.clone(),
    }
}
