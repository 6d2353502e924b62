use crate::errors::{ApiError, Result};
use crate::metrics;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

/// Third-party URL shortening service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlShortener: Send + Sync {
    async fn shorten(&self, long_url: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ShortUrl {
    url_short: String,
}

/// Client for the `short_url/shorten.json` API: `GET ?source=<key>&url_long=<url>`
/// answering `[{"url_short": ...}]`.
pub struct SinaShortener {
    endpoint: String,
    app_key: String,
    client: Client,
}

impl SinaShortener {
    pub fn new(endpoint: String, app_key: String, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(SinaShortener {
            endpoint,
            app_key,
            client,
        })
    }

    fn failed(message: String) -> ApiError {
        metrics::SHORTENER_FAILURES.inc();
        error!("{}", message);
        ApiError::Shortener(message)
    }
}

#[async_trait]
impl UrlShortener for SinaShortener {
    async fn shorten(&self, long_url: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("source", self.app_key.as_str()), ("url_long", long_url)])
            .send()
            .await
            .map_err(|e| Self::failed(format!("Shorten request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::failed(format!(
                "Shorten failed with status {}: {}",
                status, error_text
            )));
        }

        let urls = response
            .json::<Vec<ShortUrl>>()
            .await
            .map_err(|e| Self::failed(format!("Failed to parse shorten response: {}", e)))?;

        let short = urls
            .into_iter()
            .next()
            .map(|u| u.url_short)
            .ok_or_else(|| Self::failed("Shorten response was empty".to_string()))?;

        info!(long_url, short_url = %short, "url shortened");
        Ok(short)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shape() {
        let urls: Vec<ShortUrl> =
            serde_json::from_str(r#"[{"url_short":"http://t.cn/abc","url_long":"http://x/1/","type":0}]"#)
                .unwrap();
        assert_eq!(urls[0].url_short, "http://t.cn/abc");
    }
}
