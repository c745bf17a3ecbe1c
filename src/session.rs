//! Session context: the fetch cache and its slicing policy.
//!
//! The upstream API serves hourly granularity up to 90 days and daily
//! granularity beyond that. We always fetch the widest window of the
//! selected cadence once, then serve smaller requested windows as suffix
//! slices of the cached series — scrubbing the days control inside one
//! bucket never touches the network.

use crate::coins::{Coin, CoinCatalog};
use crate::config::Currency;
use crate::error::{CatalogError, FetchError};
use crate::fetcher::{MarketClient, MarketSource};
use crate::series::{self, Series};
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::{debug, info};

pub const MAX_HOURLY_DAYS: u32 = 90;
pub const MAX_DAILY_DAYS: u32 = 365;
const HOURLY_POINTS_PER_DAY: usize = 24;

/// Granularity regime, selected solely by the requested window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cadence {
    Hourly90,
    Daily365,
}

impl Cadence {
    /// Requests of up to 90 days ride the hourly feed; anything longer is
    /// daily. Hard upstream boundary, not configurable.
    pub fn for_days(requested_days: u32) -> Self {
        if requested_days <= MAX_HOURLY_DAYS {
            Cadence::Hourly90
        } else {
            Cadence::Daily365
        }
    }

    /// The full window width fetched for this cadence.
    pub fn fetch_days(&self) -> u32 {
        match self {
            Cadence::Hourly90 => MAX_HOURLY_DAYS,
            Cadence::Daily365 => MAX_DAILY_DAYS,
        }
    }

    /// How many trailing points a requested window maps to.
    pub fn slice_len(&self, requested_days: u32) -> usize {
        match self {
            Cadence::Hourly90 => requested_days as usize * HOURLY_POINTS_PER_DAY,
            Cadence::Daily365 => requested_days as usize,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Cadence::Hourly90 => "hourly",
            Cadence::Daily365 => "daily",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub coin_id: String,
    pub currency: Currency,
    pub cadence: Cadence,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub prices: Series,
    pub volumes: Series,
    pub fetched_at: Instant,
}

/// A requested window sliced out of a cached full-width fetch.
#[derive(Debug, Clone)]
pub struct WindowSlice {
    pub prices: Series,
    pub volumes: Series,
    /// Hourly data had fewer points than requested; everything available
    /// is returned. Advisory, not an error.
    pub partial: bool,
    /// Whether this request was served without a network call.
    pub from_cache: bool,
}

/// What the user is currently looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewParams {
    pub coin_id: String,
    pub currency: Currency,
    pub days: u32,
}

/// True iff moving from `prev` to `next` needs a network fetch: the coin,
/// the currency, or the cadence bucket changed. A days change inside one
/// bucket is always served by re-slicing the cache.
pub fn should_refetch(prev: &ViewParams, next: &ViewParams) -> bool {
    prev.coin_id != next.coin_id
        || prev.currency != next.currency
        || Cadence::for_days(prev.days) != Cadence::for_days(next.days)
}

/// All mutable state of one dashboard session: the fetch cache, the
/// rate-limited market source, and the coin catalog memo. Owned and passed
/// explicitly — nothing global.
pub struct Session<S = MarketClient> {
    source: S,
    cache: HashMap<CacheKey, CacheEntry>,
    pub catalog: CoinCatalog,
}

impl Session<MarketClient> {
    pub fn new() -> Self {
        Self::with_source(MarketClient::new())
    }
}

impl Default for Session<MarketClient> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MarketSource> Session<S> {
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            cache: HashMap::new(),
            catalog: CoinCatalog::new(),
        }
    }

    /// Serve a requested window, fetching the bucket's full width on the
    /// first request for its key and slicing the cache afterwards.
    pub async fn get_window(
        &mut self,
        coin_id: &str,
        currency: Currency,
        requested_days: u32,
    ) -> Result<WindowSlice, FetchError> {
        Self::window_from(&mut self.source, &mut self.cache, coin_id, currency, requested_days)
            .await
    }

    /// Refresh the coin catalog and the requested window concurrently.
    /// The catalog is not subject to the market-chart throttle, so the two
    /// overlap; both memos make repeat calls cheap.
    pub async fn refresh(
        &mut self,
        params: &ViewParams,
    ) -> (Result<Vec<Coin>, CatalogError>, Result<WindowSlice, FetchError>) {
        let (coins, window) = futures::join!(
            self.catalog.list(),
            Self::window_from(
                &mut self.source,
                &mut self.cache,
                &params.coin_id,
                params.currency,
                params.days,
            )
        );
        (coins.map(|c| c.to_vec()), window)
    }

    async fn window_from(
        source: &mut S,
        cache: &mut HashMap<CacheKey, CacheEntry>,
        coin_id: &str,
        currency: Currency,
        requested_days: u32,
    ) -> Result<WindowSlice, FetchError> {
        let cadence = Cadence::for_days(requested_days);
        let key = CacheKey {
            coin_id: coin_id.to_string(),
            currency,
            cadence,
        };

        let from_cache = cache.contains_key(&key);
        if from_cache {
            debug!(coin_id, cadence = cadence.label(), "serving window from cache");
        } else {
            // Failures propagate without touching the cache; only a
            // successful full-width fetch is stored.
            let chart = source
                .market_chart(coin_id, currency, cadence.fetch_days())
                .await?;
            info!(
                coin_id,
                cadence = cadence.label(),
                points = chart.prices.len(),
                "cached full-width fetch"
            );
            cache.insert(
                key.clone(),
                CacheEntry {
                    prices: series::from_pairs(&chart.prices),
                    volumes: series::from_pairs(&chart.total_volumes),
                    fetched_at: Instant::now(),
                },
            );
        }

        let entry = &cache[&key];
        let want = cadence.slice_len(requested_days);

        let prices: Series = entry.prices[entry.prices.len().saturating_sub(want)..].to_vec();
        let volumes: Series = entry.volumes[entry.volumes.len().saturating_sub(want)..].to_vec();

        if prices.is_empty() || volumes.is_empty() {
            return Err(FetchError::EmptySeries);
        }

        let partial =
            cadence == Cadence::Hourly90 && prices.len() < want && requested_days > 1;

        Ok(WindowSlice {
            prices,
            volumes,
            partial,
            from_cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::RawMarketChart;

    /// Counts upstream calls and serves synthetic series; the value of
    /// point `i` is `100 + i` so slices are easy to check.
    struct StubSource {
        calls: u32,
        hourly_points: usize,
        fail_next: bool,
    }

    impl StubSource {
        fn new() -> Self {
            Self {
                calls: 0,
                hourly_points: MAX_HOURLY_DAYS as usize * 24,
                fail_next: false,
            }
        }
    }

    impl MarketSource for StubSource {
        async fn market_chart(
            &mut self,
            _coin_id: &str,
            _currency: Currency,
            days: u32,
        ) -> Result<RawMarketChart, FetchError> {
            self.calls += 1;
            if self.fail_next {
                self.fail_next = false;
                return Err(FetchError::Http {
                    status: 429,
                    message: "throttled".to_string(),
                });
            }
            let n = match days {
                d if d == MAX_HOURLY_DAYS => self.hourly_points,
                d if d == MAX_DAILY_DAYS => MAX_DAILY_DAYS as usize,
                d => d as usize,
            };
            let point = |i: usize| (i as i64 * 3_600_000, 100.0 + i as f64);
            Ok(RawMarketChart {
                prices: (0..n).map(point).collect(),
                total_volumes: (0..n).map(|i| (i as i64 * 3_600_000, 1000.0)).collect(),
            })
        }
    }

    fn params(coin_id: &str, currency: Currency, days: u32) -> ViewParams {
        ViewParams {
            coin_id: coin_id.to_string(),
            currency,
            days,
        }
    }

    #[test]
    fn bucket_boundary_is_exactly_90_days() {
        assert_eq!(Cadence::for_days(1), Cadence::Hourly90);
        assert_eq!(Cadence::for_days(90), Cadence::Hourly90);
        assert_eq!(Cadence::for_days(91), Cadence::Daily365);
        assert_eq!(Cadence::for_days(365), Cadence::Daily365);
    }

    #[test]
    fn should_refetch_only_on_coin_currency_or_bucket_change() {
        let base = params("bitcoin", Currency::Usd, 30);
        assert!(!should_refetch(&base, &params("bitcoin", Currency::Usd, 30)));
        assert!(!should_refetch(&base, &params("bitcoin", Currency::Usd, 90)));
        assert!(should_refetch(&base, &params("ethereum", Currency::Usd, 30)));
        assert!(should_refetch(&base, &params("bitcoin", Currency::Eur, 30)));
        assert!(should_refetch(&base, &params("bitcoin", Currency::Usd, 91)));
    }

    #[tokio::test]
    async fn days_changes_within_a_bucket_fetch_at_most_once() {
        let mut session = Session::with_source(StubSource::new());

        for days in [5, 30, 1, 90, 45] {
            let slice = session
                .get_window("bitcoin", Currency::Usd, days)
                .await
                .unwrap();
            assert_eq!(slice.prices.len(), days as usize * 24);
        }
        assert_eq!(session.source.calls, 1);
    }

    #[tokio::test]
    async fn first_request_is_a_full_width_fetch_sliced_down() {
        let mut session = Session::with_source(StubSource::new());

        let slice = session
            .get_window("bitcoin", Currency::Usd, 5)
            .await
            .unwrap();

        assert!(!slice.from_cache);
        assert!(!slice.partial);
        assert_eq!(slice.prices.len(), 120);
        assert_eq!(slice.volumes.len(), 120);
        // Last 120 of 2160 hourly points, oldest-first.
        assert_eq!(slice.prices[0].value, 100.0 + 2040.0);
        assert_eq!(slice.prices[119].value, 100.0 + 2159.0);
        assert!(slice.prices[0].timestamp_ms < slice.prices[119].timestamp_ms);
    }

    #[tokio::test]
    async fn daily_slice_returns_exactly_the_last_n_points() {
        let mut session = Session::with_source(StubSource::new());

        let slice = session
            .get_window("bitcoin", Currency::Usd, 100)
            .await
            .unwrap();
        assert_eq!(slice.prices.len(), 100);

        let slice = session
            .get_window("bitcoin", Currency::Usd, 30)
            .await
            .unwrap();
        assert_eq!(slice.prices.len(), 30);
        assert!(slice.from_cache);
        // 365 daily points cached; the slice is the suffix.
        assert_eq!(slice.prices[0].value, 100.0 + 335.0);
        assert_eq!(slice.prices[29].value, 100.0 + 364.0);
        assert_eq!(session.source.calls, 1);
    }

    #[tokio::test]
    async fn crossing_the_bucket_boundary_forces_a_second_fetch() {
        let mut session = Session::with_source(StubSource::new());

        session.get_window("bitcoin", Currency::Usd, 80).await.unwrap();
        assert_eq!(session.source.calls, 1);

        session.get_window("bitcoin", Currency::Usd, 100).await.unwrap();
        assert_eq!(session.source.calls, 2);

        // Both entries stay live; going back re-slices.
        session.get_window("bitcoin", Currency::Usd, 80).await.unwrap();
        assert_eq!(session.source.calls, 2);
    }

    #[tokio::test]
    async fn coin_or_currency_change_starts_a_fresh_key() {
        let mut session = Session::with_source(StubSource::new());

        session.get_window("bitcoin", Currency::Usd, 30).await.unwrap();
        session.get_window("bitcoin", Currency::Eur, 30).await.unwrap();
        session.get_window("ethereum", Currency::Usd, 30).await.unwrap();
        assert_eq!(session.source.calls, 3);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let mut source = StubSource::new();
        source.fail_next = true;
        let mut session = Session::with_source(source);

        let err = session
            .get_window("bitcoin", Currency::Usd, 30)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Http { status: 429, .. }));

        let slice = session
            .get_window("bitcoin", Currency::Usd, 30)
            .await
            .unwrap();
        assert!(!slice.from_cache);
        assert_eq!(session.source.calls, 2);
    }

    #[tokio::test]
    async fn short_hourly_data_is_partial_and_served_whole() {
        let mut source = StubSource::new();
        source.hourly_points = 50;
        let mut session = Session::with_source(source);

        let slice = session
            .get_window("bitcoin", Currency::Usd, 5)
            .await
            .unwrap();
        assert_eq!(slice.prices.len(), 50);
        assert!(slice.partial);
    }

    #[tokio::test]
    async fn five_day_window_feeds_the_indicator_pipeline() {
        use crate::indicators;

        let mut session = Session::with_source(StubSource::new());
        let slice = session
            .get_window("bitcoin", Currency::Usd, 5)
            .await
            .unwrap();

        let (prices, volumes) = series::align(&slice.prices, &slice.volumes);
        let table = indicators::compute_indicators(&prices, &volumes);

        assert_eq!(table.len(), 120);
        assert!(table.sma_10[..9].iter().all(Option::is_none));
        assert!(table.sma_10[9].is_some());
        assert!(table.sma_30[..29].iter().all(Option::is_none));
        assert!(table.sma_30[29].is_some());
        assert_eq!(session.source.calls, 1);
    }

    #[tokio::test]
    async fn one_day_requests_never_raise_the_partial_advisory() {
        let mut source = StubSource::new();
        source.hourly_points = 10;
        let mut session = Session::with_source(source);

        let slice = session
            .get_window("bitcoin", Currency::Usd, 1)
            .await
            .unwrap();
        assert_eq!(slice.prices.len(), 10);
        assert!(!slice.partial);
    }
}
