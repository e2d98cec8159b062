use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use super::error::{ErrorKind, StageError};

/// A user query resolved to a registry filer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyIdentity {
    pub raw_query: String,
    pub canonical_name: String,
    pub ticker: String,
    /// Ten digit, zero padded CIK.
    pub registry_id: String,
}

/// The proxy filing a company result was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingReference {
    pub registry_id: String,
    pub filing_date: NaiveDate,
    pub accession_id: String,
    pub primary_document: String,
    pub document_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutEntry {
    pub name: String,
    pub amount: f64,
}

/// The furthest point a single company analysis got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
pub enum Stage {
    #[strum(to_string = "Resolving company")]
    Resolving,
    #[strum(to_string = "Searching for DEF 14A filing")]
    LocatingFiling,
    #[strum(to_string = "Fetching market cap")]
    FetchingMarketCap,
    #[strum(to_string = "Reading filing document")]
    ReducingDocument,
    #[strum(to_string = "Analyzing change in control information")]
    QueryingOracle,
    #[strum(to_string = "Calculating total payments")]
    Normalizing,
    #[strum(to_string = "Saving result")]
    Persisting,
    #[strum(to_string = "Complete")]
    Complete,
}

/// Outcome of one company analysis.
///
/// Starts empty, gains fields as stages succeed, and is settled exactly once by
/// either [`CompanyResult::fail`] or [`CompanyResult::complete`]. A settled
/// result has either `error` or `percentage`, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyResult {
    /// The input exactly as the user typed it.
    pub query: String,
    pub identity: Option<CompanyIdentity>,
    pub filing: Option<FilingReference>,
    pub market_cap: Option<u64>,
    pub payouts: Vec<PayoutEntry>,
    pub total_payments: f64,
    pub percentage: Option<f64>,
    pub error: Option<StageError>,
    pub stage_reached: Stage,
}

impl CompanyResult {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            identity: None,
            filing: None,
            market_cap: None,
            payouts: Vec::new(),
            total_payments: 0.0,
            percentage: None,
            error: None,
            stage_reached: Stage::Resolving,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.error.is_some() || self.percentage.is_some()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Freeze the result at `stage` with `error`. Payout data is dropped.
    pub fn fail(mut self, stage: Stage, error: StageError) -> Self {
        self.stage_reached = stage;
        self.payouts.clear();
        self.total_payments = 0.0;
        self.percentage = None;
        self.error = Some(error);
        self
    }

    /// Freeze the result as a success.
    pub fn complete(mut self, payouts: Vec<PayoutEntry>, total: f64, percentage: f64) -> Self {
        self.stage_reached = Stage::Complete;
        self.payouts = payouts;
        self.total_payments = total;
        self.percentage = Some(percentage);
        self.error = None;
        self
    }

    pub fn display_name(&self) -> &str {
        self.identity
            .as_ref()
            .map(|i| i.canonical_name.as_str())
            .unwrap_or(&self.query)
    }

    pub fn ticker(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.ticker.as_str())
    }
}

/// `total / market_cap * 100`.
pub fn percentage_of_market_cap(total: f64, market_cap: u64) -> f64 {
    total / market_cap as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_of_market_cap() {
        let pct = percentage_of_market_cap(12_500_000.0, 50_000_000_000);
        assert!((pct - 0.025).abs() < 1e-12);
        assert_eq!(format!("{:.4}", pct), "0.0250");
    }

    #[test]
    fn test_fail_clears_payouts() {
        let result = CompanyResult::new("Apple")
            .complete(
                vec![PayoutEntry {
                    name: "Jane Doe".to_string(),
                    amount: 10.0,
                }],
                10.0,
                1.0,
            )
            .fail(
                Stage::Persisting,
                StageError::new(ErrorKind::Unexpected, "boom"),
            );

        assert!(result.payouts.is_empty());
        assert!(result.percentage.is_none());
        assert_eq!(result.error_kind(), Some(ErrorKind::Unexpected));
        assert!(result.is_settled());
    }

    #[test]
    fn test_new_result_is_unsettled() {
        let result = CompanyResult::new("Apple");
        assert!(!result.is_settled());
        assert_eq!(result.display_name(), "Apple");
    }
}
