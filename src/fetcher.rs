//! Rate-limited access to the CoinGecko market-chart endpoint.
//!
//! The public API tolerates roughly one call every few seconds; every call
//! in the session funnels through one [`RateLimiter`] clock.

use crate::config::Currency;
use crate::error::FetchError;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

pub const BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Minimum spacing between the start of two upstream calls.
pub const MIN_INTERVAL: Duration = Duration::from_millis(2500);

/// Raw market-chart response. `[[timestamp_ms, value], ...]`, oldest-first.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMarketChart {
    pub prices: Vec<(i64, f64)>,
    pub total_volumes: Vec<(i64, f64)>,
}

/// Session-wide throttle. The clock is stamped only after a successful
/// call, so a failed request does not consume budget against itself.
#[derive(Debug)]
pub struct RateLimiter {
    last_call_at: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            last_call_at: None,
            min_interval: MIN_INTERVAL,
        }
    }

    /// Sleep out whatever remains of the cooldown from the previous
    /// successful call.
    pub async fn wait_for_slot(&self) {
        if let Some(last) = self.last_call_at {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "rate limit cooldown");
                tokio::time::sleep(wait).await;
            }
        }
    }

    /// Stamp the clock at the completion time of a successful call.
    pub fn mark_success(&mut self) {
        self.last_call_at = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// The seam between the cache layer and the network, so cache behavior is
/// testable against a stub.
#[allow(async_fn_in_trait)]
pub trait MarketSource {
    async fn market_chart(
        &mut self,
        coin_id: &str,
        currency: Currency,
        days: u32,
    ) -> Result<RawMarketChart, FetchError>;
}

/// HTTP client for the market-chart endpoint.
#[derive(Debug)]
pub struct MarketClient {
    http: Client,
    limiter: RateLimiter,
    base_url: String,
}

impl MarketClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            limiter: RateLimiter::new(),
            base_url: BASE_URL.to_string(),
        }
    }
}

impl Default for MarketClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketSource for MarketClient {
    async fn market_chart(
        &mut self,
        coin_id: &str,
        currency: Currency,
        days: u32,
    ) -> Result<RawMarketChart, FetchError> {
        self.limiter.wait_for_slot().await;

        let url = format!("{}/coins/{}/market_chart", self.base_url, coin_id);
        let days_str = days.to_string();
        info!(coin_id, currency = currency.as_str(), days, "fetching market chart");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("vs_currency", currency.as_str()),
                ("days", days_str.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| String::new());
            return Err(FetchError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let chart: RawMarketChart =
            serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))?;

        if chart.prices.is_empty() || chart.total_volumes.is_empty() {
            return Err(FetchError::EmptySeries);
        }

        self.limiter.mark_success();
        Ok(chart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn back_to_back_calls_are_spaced_by_min_interval() {
        let mut limiter = RateLimiter::new();

        // First call: no previous stamp, no wait.
        let t0 = Instant::now();
        limiter.wait_for_slot().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
        limiter.mark_success();

        let t1 = Instant::now();
        limiter.wait_for_slot().await;
        assert_eq!(t1.elapsed(), MIN_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_cooldown_waits_only_the_remainder() {
        let mut limiter = RateLimiter::new();
        limiter.wait_for_slot().await;
        limiter.mark_success();

        tokio::time::sleep(Duration::from_millis(1000)).await;

        let t0 = Instant::now();
        limiter.wait_for_slot().await;
        assert_eq!(t0.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_call_does_not_stamp_the_clock() {
        let limiter = RateLimiter::new();
        limiter.wait_for_slot().await;
        // Upstream failed: mark_success is never called, so the next call
        // owes nothing.
        let t0 = Instant::now();
        limiter.wait_for_slot().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_already_elapsed_means_no_wait() {
        let mut limiter = RateLimiter::new();
        limiter.wait_for_slot().await;
        limiter.mark_success();

        tokio::time::sleep(MIN_INTERVAL * 2).await;

        let t0 = Instant::now();
        limiter.wait_for_slot().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
    }

    #[test]
    fn market_chart_schema_parses_pair_arrays() {
        let body = r#"{
            "prices": [[1700000000000, 42000.5], [1700003600000, 42100.0]],
            "market_caps": [[1700000000000, 8.2e11]],
            "total_volumes": [[1700000000000, 1.5e10], [1700003600000, 1.6e10]]
        }"#;

        let chart: RawMarketChart = serde_json::from_str(body).unwrap();
        assert_eq!(chart.prices.len(), 2);
        assert_eq!(chart.prices[0], (1_700_000_000_000, 42000.5));
        assert_eq!(chart.total_volumes[1].1, 1.6e10);
    }

    #[test]
    fn malformed_chart_body_is_a_parse_error() {
        let err = serde_json::from_str::<RawMarketChart>(r#"{"prices": "nope"}"#)
            .map_err(|e| FetchError::Parse(e.to_string()))
            .unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
