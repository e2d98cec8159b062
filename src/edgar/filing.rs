use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::client::{EdgarApi, EDGAR_ARCHIVES_URL};
use super::report::ReportType;
use crate::core::error::{ErrorKind, StageError};
use crate::core::types::{CompanyIdentity, FilingReference};

/// Parallel arrays of the `filings.recent` block in the submissions API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilingEntry {
    #[serde(rename = "accessionNumber", default)]
    pub accession_number: Vec<String>,
    #[serde(rename = "filingDate", default)]
    pub filing_date: Vec<NaiveDate>,
    #[serde(rename = "form", default)]
    pub report_type: Vec<ReportType>,
    #[serde(rename = "primaryDocument", default)]
    pub primary_document: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilingsData {
    #[serde(default)]
    pub recent: FilingEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyFilings {
    #[serde(default)]
    pub cik: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub filings: FilingsData,
}

/// Archive URL of a filing's primary document.
///
/// The archive path uses the CIK without leading zeros and the accession
/// number without dashes.
pub fn document_url(cik: &str, accession_number: &str, primary_document: &str) -> String {
    let cik = cik.trim_start_matches('0');
    let accession_number = accession_number.replace('-', "");
    format!(
        "{}/{}/{}/{}",
        EDGAR_ARCHIVES_URL, cik, accession_number, primary_document
    )
}

/// The most recent filing of `report_type` in `entry`, if any.
pub fn latest_filing(
    entry: &FilingEntry,
    cik: &str,
    report_type: &ReportType,
) -> Option<FilingReference> {
    let latest = entry
        .report_type
        .iter()
        .zip(&entry.filing_date)
        .zip(&entry.accession_number)
        .zip(&entry.primary_document)
        .filter(|(((rt, _), _), _)| *rt == report_type)
        .max_by_key(|(((_, date), _), _)| **date)?;

    let (((_, filing_date), accession_number), primary_document) = latest;
    let url = document_url(cik, accession_number, primary_document);
    log::debug!("Constructed document URL: {}", url);

    Some(FilingReference {
        registry_id: cik.to_string(),
        filing_date: *filing_date,
        accession_id: accession_number.clone(),
        primary_document: primary_document.clone(),
        document_url: url,
    })
}

/// Finds the latest proxy filing of a resolved company.
pub struct FilingLocator {
    api: Arc<dyn EdgarApi>,
    report_type: ReportType,
}

impl FilingLocator {
    pub fn new(api: Arc<dyn EdgarApi>) -> Self {
        Self {
            api,
            report_type: ReportType::FormDEF14A,
        }
    }

    pub fn with_report_type(mut self, report_type: ReportType) -> Self {
        self.report_type = report_type;
        self
    }

    pub async fn locate(&self, identity: &CompanyIdentity) -> Result<FilingReference, StageError> {
        let filings = self
            .api
            .submissions(&identity.registry_id)
            .await
            .map_err(|e| {
                StageError::new(
                    ErrorKind::FilingsUnavailable,
                    format!(
                        "Could not retrieve filings for {}: {}",
                        identity.canonical_name, e
                    ),
                )
            })?;

        let recent = &filings.filings.recent;
        log::debug!(
            "Retrieved {} recent filings for {}",
            recent.accession_number.len(),
            identity.canonical_name
        );

        latest_filing(recent, &identity.registry_id, &self.report_type).ok_or_else(|| {
            StageError::new(
                ErrorKind::NoFilingFound,
                format!(
                    "{} has no {} filings. This could mean the company is private, foreign, or has not filed a proxy statement recently.",
                    identity.canonical_name, self.report_type
                ),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> FilingEntry {
        serde_json::from_str(
            r#"{
                "accessionNumber": ["0000320193-24-000006", "0001308179-24-000010", "0000320193-23-000106"],
                "filingDate": ["2024-01-10", "2024-03-01", "2023-11-02"],
                "form": ["10-K", "DEF 14A", "8-K"],
                "primaryDocument": ["aapl-20231230.htm", "aapl4359751-def14a.htm", "aapl-20231102.htm"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_latest_filing_selects_def14a() {
        let filing =
            latest_filing(&sample_entry(), "0000320193", &ReportType::FormDEF14A).unwrap();
        assert_eq!(
            filing.filing_date,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(filing.accession_id, "0001308179-24-000010");
        assert_eq!(
            filing.document_url,
            "https://www.sec.gov/Archives/edgar/data/320193/000130817924000010/aapl4359751-def14a.htm"
        );
    }

    #[test]
    fn test_latest_filing_prefers_most_recent_date() {
        let entry: FilingEntry = serde_json::from_str(
            r#"{
                "accessionNumber": ["a-1", "b-2", "c-3"],
                "filingDate": ["2022-04-01", "2024-04-02", "2023-04-03"],
                "form": ["DEF 14A", "DEF 14A", "DEF 14A"],
                "primaryDocument": ["a.htm", "b.htm", "c.htm"]
            }"#,
        )
        .unwrap();
        let filing = latest_filing(&entry, "0000000001", &ReportType::FormDEF14A).unwrap();
        assert_eq!(filing.primary_document, "b.htm");
    }

    #[test]
    fn test_latest_filing_none_without_proxy() {
        let entry: FilingEntry = serde_json::from_str(
            r#"{
                "accessionNumber": ["a-1"],
                "filingDate": ["2022-04-01"],
                "form": ["10-K"],
                "primaryDocument": ["a.htm"]
            }"#,
        )
        .unwrap();
        assert!(latest_filing(&entry, "0000000001", &ReportType::FormDEF14A).is_none());
    }

    #[test]
    fn test_parse_company_filings_ignores_unknown_fields() {
        let filings: CompanyFilings = serde_json::from_str(
            r#"{
                "cik": "320193",
                "entityType": "operating",
                "name": "Apple Inc.",
                "tickers": ["AAPL"],
                "filings": {
                    "recent": {
                        "accessionNumber": ["0001308179-24-000010"],
                        "filingDate": ["2024-03-01"],
                        "form": ["DEF 14A"],
                        "primaryDocument": ["def14a.htm"],
                        "isXBRL": [0]
                    },
                    "files": []
                }
            }"#,
        )
        .unwrap();
        assert_eq!(filings.name, "Apple Inc.");
        assert_eq!(filings.filings.recent.report_type, vec![ReportType::FormDEF14A]);
    }
}
