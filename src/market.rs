use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use url::Url;

use crate::edgar::client::{CONNECT_TIMEOUT, HTTP_TIMEOUT};

const SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";
const QUOTE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query2.finance.yahoo.com/v1/test/getcrumb";
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// A market-data hit for a search term.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketQuote {
    pub symbol: String,
    pub name: String,
    /// Present only when the symbol is actively quoted.
    pub price: Option<f64>,
}

impl MarketQuote {
    pub fn is_live(&self) -> bool {
        self.price.is_some_and(|p| p > 0.0)
    }
}

/// Market-data lookups: symbol search and market capitalization.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Best symbol for a free-text term (company name, nickname or ticker).
    async fn lookup(&self, term: &str) -> Result<Option<MarketQuote>>;

    /// Current market capitalization in whole currency units.
    async fn market_cap(&self, ticker: &str) -> Result<Option<u64>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    quotes: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    symbol: String,
    #[serde(default)]
    longname: Option<String>,
    #[serde(default)]
    shortname: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Quote {
    symbol: String,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    market_cap: Option<f64>,
}

/// Quote request for `symbol`, authorized by a session `crumb`.
pub fn quote_url(symbol: &str, crumb: &str) -> Result<Url> {
    Ok(Url::parse_with_params(QUOTE_URL, &[("symbols", symbol), ("crumb", crumb)])?)
}

/// The crumb endpoint answers with the bare token. Anything that looks like
/// markup or a JSON error body is rejected.
pub fn parse_crumb(body: &str) -> Option<String> {
    let crumb = body.trim();
    if crumb.is_empty()
        || crumb.contains(char::is_whitespace)
        || crumb.starts_with('<')
        || crumb.starts_with('{')
    {
        return None;
    }
    Some(crumb.to_string())
}

/// Yahoo Finance backed [`MarketData`].
///
/// The quote endpoint needs a session cookie plus the crumb issued for it.
/// Both are obtained on first use and the crumb is reused until a quote
/// request fails.
pub struct YahooFinance {
    client: Client,
    crumb: Mutex<Option<String>>,
}

impl YahooFinance {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .cookie_store(true)
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            crumb: Mutex::new(None),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        log::debug!("Market data request URL: {}", url);
        let response = self.client.get(url.as_str()).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Market data request failed with status: {}",
                response.status()
            ));
        }
        Ok(response.json().await?)
    }

    async fn crumb(&self) -> Result<String> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // Sets the session cookie. The page itself is usually a 404.
        if let Err(e) = self.client.get(COOKIE_URL).send().await {
            log::debug!("Market data cookie request failed: {}", e);
        }

        let response = self.client.get(CRUMB_URL).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Market data crumb request failed with status: {}",
                response.status()
            ));
        }
        let body = response.text().await?;
        let crumb = parse_crumb(&body).ok_or_else(|| anyhow!("Invalid market data crumb"))?;
        log::debug!("Obtained market data crumb");
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    async fn quote(&self, symbol: &str) -> Result<Option<Quote>> {
        let crumb = self.crumb().await?;
        let envelope: QuoteEnvelope = match self.get_json(quote_url(symbol, &crumb)?).await {
            Ok(envelope) => envelope,
            Err(e) => {
                log::debug!("Quote for {} failed, renewing crumb: {}", symbol, e);
                *self.crumb.lock().await = None;
                let crumb = self.crumb().await?;
                self.get_json(quote_url(symbol, &crumb)?).await?
            }
        };
        Ok(envelope.quote_response.result.into_iter().next())
    }
}

#[async_trait]
impl MarketData for YahooFinance {
    async fn lookup(&self, term: &str) -> Result<Option<MarketQuote>> {
        let url = Url::parse_with_params(
            SEARCH_URL,
            &[("q", term), ("quotesCount", "1"), ("newsCount", "0")],
        )?;
        let search: SearchResponse = self.get_json(url).await?;
        let Some(hit) = search.quotes.into_iter().next() else {
            return Ok(None);
        };

        let quote = self.quote(&hit.symbol).await?;
        let price = quote.as_ref().and_then(|q| q.regular_market_price);
        let name = quote
            .as_ref()
            .and_then(|q| q.long_name.clone().or_else(|| q.short_name.clone()))
            .or(hit.longname)
            .or(hit.shortname)
            .unwrap_or_default();

        Ok(Some(MarketQuote {
            symbol: quote.map(|q| q.symbol).unwrap_or(hit.symbol),
            name,
            price,
        }))
    }

    async fn market_cap(&self, ticker: &str) -> Result<Option<u64>> {
        let quote = self.quote(ticker).await?;
        Ok(quote
            .and_then(|q| q.market_cap)
            .filter(|cap| *cap > 0.0)
            .map(|cap| cap.round() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quote_envelope() {
        let envelope: QuoteEnvelope = serde_json::from_str(
            r#"{"quoteResponse":{"result":[{"symbol":"AAPL","longName":"Apple Inc.","regularMarketPrice":189.5,"marketCap":2950000000000}],"error":null}}"#,
        )
        .unwrap();
        let quote = &envelope.quote_response.result[0];
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.market_cap, Some(2_950_000_000_000.0));
    }

    #[test]
    fn test_quote_liveness() {
        let quote = MarketQuote {
            symbol: "XYZ".to_string(),
            name: "Xyz".to_string(),
            price: None,
        };
        assert!(!quote.is_live());
    }

    #[test]
    fn test_quote_url_carries_encoded_crumb() {
        let url = quote_url("BRK-B", "a/b=c").unwrap();
        assert!(url.as_str().starts_with(QUOTE_URL));
        assert_eq!(url.query(), Some("symbols=BRK-B&crumb=a%2Fb%3Dc"));

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("symbols".to_string(), "BRK-B".to_string()),
                ("crumb".to_string(), "a/b=c".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_crumb() {
        assert_eq!(parse_crumb("Xy1.aBc/9\n"), Some("Xy1.aBc/9".to_string()));
        assert_eq!(parse_crumb(""), None);
        assert_eq!(parse_crumb("  \n"), None);
        assert_eq!(parse_crumb("Too Many Requests"), None);
        assert_eq!(parse_crumb("<html><body>blocked</body></html>"), None);
        assert_eq!(parse_crumb(r#"{"finance":{"error":{"code":"Unauthorized"}}}"#), None);
    }
}
