use std::sync::Arc;

use crate::core::error::{ErrorKind, StageError};
use crate::core::types::{percentage_of_market_cap, CompanyResult, Stage};
use crate::edgar::{DocumentReducer, EdgarApi, FilingLocator, RegistryCache};
use crate::market::MarketData;
use crate::normalize::normalize;
use crate::oracle::{self, Oracle};
use crate::resolver::IdentityResolver;
use crate::storage::{ResultStore, SaveOutcome, StoredResult};

/// Receives each stage as the pipeline enters it.
pub type StageObserver<'a> = &'a (dyn Fn(Stage) + Send + Sync);

/// Runs one company from free-text query to percentage of market cap.
///
/// Stages run strictly in order; the first failure settles the result with
/// that stage's error and nothing after it runs.
pub struct Analyzer {
    resolver: IdentityResolver,
    locator: FilingLocator,
    reducer: DocumentReducer,
    market: Arc<dyn MarketData>,
    oracle: Arc<dyn Oracle>,
    store: Option<Arc<dyn ResultStore>>,
}

impl Analyzer {
    pub fn new(
        edgar: Arc<dyn EdgarApi>,
        registry: Arc<RegistryCache>,
        market: Arc<dyn MarketData>,
        oracle: Arc<dyn Oracle>,
    ) -> Self {
        Self {
            resolver: IdentityResolver::new(registry, market.clone()),
            locator: FilingLocator::new(edgar.clone()),
            reducer: DocumentReducer::new(edgar),
            market,
            oracle,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn run(&self, query: &str) -> CompanyResult {
        self.run_observed(query, &|_: Stage| {}).await
    }

    pub async fn run_observed(&self, query: &str, observer: StageObserver<'_>) -> CompanyResult {
        let mut result = CompanyResult::new(query);

        observer(Stage::Resolving);
        let identity = match self.resolver.resolve(query).await {
            Ok(identity) => identity,
            Err(e) => return settle_failure(result, Stage::Resolving, e),
        };
        result.identity = Some(identity.clone());

        observer(Stage::LocatingFiling);
        result.stage_reached = Stage::LocatingFiling;
        let filing = match self.locator.locate(&identity).await {
            Ok(filing) => filing,
            Err(e) => return settle_failure(result, Stage::LocatingFiling, e),
        };
        log::info!(
            "Found DEF 14A for {} filed on {}",
            identity.canonical_name,
            filing.filing_date
        );
        result.filing = Some(filing.clone());

        observer(Stage::FetchingMarketCap);
        result.stage_reached = Stage::FetchingMarketCap;
        let market_cap = match self.market.market_cap(&identity.ticker).await {
            Ok(Some(cap)) if cap > 0 => cap,
            Ok(_) => {
                let e = StageError::new(
                    ErrorKind::MarketCapUnavailable,
                    format!("Market cap not available for {}", identity.ticker),
                );
                return settle_failure(result, Stage::FetchingMarketCap, e);
            }
            Err(e) => {
                let e = StageError::new(
                    ErrorKind::MarketCapUnavailable,
                    format!("Error getting market cap for {}: {}", identity.ticker, e),
                );
                return settle_failure(result, Stage::FetchingMarketCap, e);
            }
        };
        result.market_cap = Some(market_cap);

        observer(Stage::ReducingDocument);
        result.stage_reached = Stage::ReducingDocument;
        let blocks = match self.reducer.reduce(&filing.document_url).await {
            Ok(blocks) => blocks,
            Err(e) => return settle_failure(result, Stage::ReducingDocument, e),
        };
        let relevant_text = blocks.join("\n\n");

        observer(Stage::QueryingOracle);
        result.stage_reached = Stage::QueryingOracle;
        let response = match oracle::analyze(self.oracle.as_ref(), &relevant_text).await {
            Ok(response) => response,
            Err(e) => {
                let e = StageError::new(ErrorKind::OracleCallFailed, e.to_string());
                return settle_failure(result, Stage::QueryingOracle, e);
            }
        };

        observer(Stage::Normalizing);
        result.stage_reached = Stage::Normalizing;
        let payouts = match normalize(&response) {
            Ok(payouts) => payouts,
            Err(e) => return settle_failure(result, Stage::Normalizing, e),
        };
        if payouts.total <= 0.0 {
            let e = StageError::new(
                ErrorKind::NoExtractableValue,
                format!(
                    "Analysis of {} produced {} payouts totalling zero",
                    identity.canonical_name,
                    payouts.entries.len()
                ),
            );
            return settle_failure(result, Stage::Normalizing, e);
        }

        let percentage = percentage_of_market_cap(payouts.total, market_cap);
        let result = result.complete(payouts.entries, payouts.total, percentage);
        log::info!(
            "{}: total payments ${:.0} on market cap ${} = {:.4}%",
            identity.ticker,
            result.total_payments,
            market_cap,
            percentage
        );

        if percentage > 0.0 {
            observer(Stage::Persisting);
            self.persist(&result).await;
        }
        observer(Stage::Complete);
        result
    }

    /// Best effort: failures are logged and the result stays a success.
    async fn persist(&self, result: &CompanyResult) {
        let (Some(store), Some(record)) = (&self.store, StoredResult::from_result(result)) else {
            return;
        };
        match store.upsert(&record).await {
            Ok(SaveOutcome::Inserted) => log::info!(
                "Saved new record for {}: {:.4}%",
                record.ticker,
                record.percentage
            ),
            Ok(SaveOutcome::Updated) => log::info!(
                "Updated {} with new percentage: {:.4}%",
                record.ticker,
                record.percentage
            ),
            Ok(SaveOutcome::Unchanged) => {
                log::debug!("Skipping {}: same percentage", record.ticker)
            }
            Err(e) => log::warn!(
                "{} for {}: {}",
                ErrorKind::PersistenceFailed,
                record.ticker,
                e
            ),
        }
    }
}

fn settle_failure(result: CompanyResult, stage: Stage, error: StageError) -> CompanyResult {
    log::warn!("'{}' stopped at {}: {}", result.query, stage, error);
    result.fail(stage, error)
}
