use anyhow::{anyhow, Result};
use mime::Mime;
use reqwest::Client;
use std::path::Path;
use url::Url;

use super::rate_limiter::RateLimiter;

/// GET `url` and return the body as text.
///
/// Sends the SEC-required identifying `User-Agent`. When a rate limiter is
/// given, the request waits for it first.
pub async fn fetch_text(
    client: &Client,
    url: &Url,
    user_agent: &str,
    accept: Mime,
    rate_limiter: Option<&RateLimiter>,
) -> Result<String> {
    let _permit = match rate_limiter {
        Some(limiter) => Some(
            limiter
                .acquire()
                .await
                .ok_or_else(|| anyhow!("Rate limiter closed"))?,
        ),
        None => None,
    };

    log::debug!("Fetching URL: {}", url);

    let response = client
        .get(url.as_str())
        .header(reqwest::header::USER_AGENT, user_agent)
        .header(reqwest::header::ACCEPT, accept.as_ref())
        .header(reqwest::header::ACCEPT_ENCODING, "gzip, deflate")
        .send()
        .await?;

    log::debug!("Response status: {}", response.status());

    if !response.status().is_success() {
        return Err(anyhow!(
            "HTTP request to {} failed with status: {}",
            url,
            response.status()
        ));
    }

    let content = response.text().await?;
    log::debug!("Received content length: {}", content.len());

    Ok(content)
}

pub fn save_text(filepath: &Path, content: &str) -> Result<()> {
    if let Some(parent) = filepath.parent() {
        crate::utils::dirs::ensure_dir(parent)?;
    }
    std::fs::write(filepath, content)?;
    log::debug!("Saved content to {:?}", filepath);
    Ok(())
}
