use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// SEC form codes the analyzer cares about; everything else is `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReportType {
    Form10K,
    Form10Q,
    Form8K,
    FormDEF14A,
    FormDEFA14A,
    FormPRE14A,
    Other(String),
}

impl TryFrom<String> for ReportType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ReportType::from_str(&s)
    }
}

impl From<ReportType> for String {
    fn from(rt: ReportType) -> Self {
        rt.to_string()
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportType::Form10K => write!(f, "10-K"),
            ReportType::Form10Q => write!(f, "10-Q"),
            ReportType::Form8K => write!(f, "8-K"),
            ReportType::FormDEF14A => write!(f, "DEF 14A"),
            ReportType::FormDEFA14A => write!(f, "DEFA14A"),
            ReportType::FormPRE14A => write!(f, "PRE 14A"),
            ReportType::Other(s) => write!(f, "{}", s),
        }
    }
}

impl FromStr for ReportType {
    type Err = String;

    // Form codes are compared exactly; "DEF 14A" and "def 14a" are not the
    // same code in EDGAR submissions data.
    fn from_str(s: &str) -> std::result::Result<ReportType, std::string::String> {
        match s {
            "10-K" => Ok(ReportType::Form10K),
            "10-Q" => Ok(ReportType::Form10Q),
            "8-K" => Ok(ReportType::Form8K),
            "DEF 14A" => Ok(ReportType::FormDEF14A),
            "DEFA14A" => Ok(ReportType::FormDEFA14A),
            "PRE 14A" => Ok(ReportType::FormPRE14A),
            _ => Ok(ReportType::Other(s.to_string())),
        }
    }
}
