use crate::config::Settings;
use crate::domain::price::{normalize_series, PricePoint};
use crate::ingest::period::Period;
use crate::ingest::types::ChartEnvelope;
use crate::time::market_date::trading_date;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) stockpick/0.1";

// Yahoo reports unknown symbols with this chart error code (and HTTP 404).
const NOT_FOUND_CODE: &str = "Not Found";

/// Source of daily closing prices, ascending by date.
///
/// An unknown ticker or one without bars yields `Ok(vec![])`; transport and provider failures are
/// errors.
#[async_trait::async_trait]
pub trait PriceProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_closes(&self, ticker: &str, period: Period) -> Result<Vec<PricePoint>>;
}

#[derive(Debug, Clone)]
pub struct YahooChartProvider {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl YahooChartProvider {
    pub fn new(base_url: &str, timeout: Duration, retries: u32, user_agent: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("failed to build price provider http client")?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            retries: retries.max(1),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .price_provider_base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL);

        let timeout_secs = std::env::var("PRICE_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("PRICE_PROVIDER_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let user_agent = std::env::var("PRICE_PROVIDER_USER_AGENT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        Self::new(
            base_url,
            Duration::from_secs(timeout_secs),
            retries,
            &user_agent,
        )
    }

    fn url(&self, ticker: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("invalid price provider base url: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("price provider base url cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", ticker]);
        Ok(url)
    }

    async fn fetch_once(&self, ticker: &str, period: Period) -> Result<Vec<PricePoint>> {
        let url = self.url(ticker)?;

        let res = self
            .http
            .get(url)
            .query(&[("range", period.as_str()), ("interval", "1d")])
            .send()
            .await
            .context("price provider request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read price provider response")?;

        if status == StatusCode::NOT_FOUND {
            tracing::debug!(%ticker, "price provider does not know ticker");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            anyhow::bail!("price provider HTTP {status}: {text}");
        }

        parse_chart(&text)
    }
}

#[async_trait::async_trait]
impl PriceProvider for YahooChartProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch_closes(&self, ticker: &str, period: Period) -> Result<Vec<PricePoint>> {
        anyhow::ensure!(!ticker.trim().is_empty(), "ticker must be non-empty");

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(ticker, period).await {
                Ok(points) => return Ok(points),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(%ticker, attempt, ?backoff, error = %err, "price fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Turns a chart body into an ascending close series. Null closes are skipped.
pub fn parse_chart(text: &str) -> Result<Vec<PricePoint>> {
    let envelope = serde_json::from_str::<ChartEnvelope>(text)
        .with_context(|| format!("price provider response is not valid chart JSON: {text}"))?;

    if let Some(err) = envelope.chart.error {
        if err.code == NOT_FOUND_CODE {
            return Ok(Vec::new());
        }
        anyhow::bail!("price provider chart error {}: {}", err.code, err.description);
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    if result.timestamp.is_empty() {
        return Ok(Vec::new());
    }

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();
    anyhow::ensure!(
        closes.len() == result.timestamp.len(),
        "chart has {} timestamps but {} closes",
        result.timestamp.len(),
        closes.len()
    );

    let gmtoffset = result.meta.gmtoffset;
    let mut points = Vec::with_capacity(closes.len());
    for (&ts, close) in result.timestamp.iter().zip(closes) {
        let Some(close) = close.filter(|c| c.is_finite()) else {
            continue;
        };
        points.push(PricePoint::new(trading_date(ts, gmtoffset)?, close));
    }

    Ok(normalize_series(points))
}
