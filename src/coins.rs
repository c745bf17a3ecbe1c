//! Coin catalog: the static list of tradeable assets and its 24h memo.

use crate::error::CatalogError;
use crate::fetcher::BASE_URL;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// The catalog barely changes; refetch at most once a day.
const CATALOG_TTL: Duration = Duration::from_secs(86_400);

/// Coins pinned to the top of the selection list, in this order.
const COMMON_COINS: &[&str] = &[
    "Bitcoin", "Ethereum", "Ripple", "Litecoin", "Cardano", "Solana", "Dogecoin", "Tron",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

/// Session-scoped memo of the `/coins/list` response. Owns its own HTTP
/// client: the catalog endpoint is not subject to the market-chart
/// throttle, so catalog and market fetches can overlap.
#[derive(Debug)]
pub struct CoinCatalog {
    http: reqwest::Client,
    cached: Option<(Instant, Vec<Coin>)>,
}

impl CoinCatalog {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            cached: None,
        }
    }

    fn is_stale(&self) -> bool {
        match &self.cached {
            Some((fetched_at, _)) => fetched_at.elapsed() >= CATALOG_TTL,
            None => true,
        }
    }

    fn store(&mut self, coins: Vec<Coin>) {
        self.cached = Some((Instant::now(), coins));
    }

    /// The memoized coin list, refetched after the TTL expires.
    ///
    /// A failed refetch propagates `CatalogError` and leaves the memo
    /// untouched; callers degrade to an empty selection list.
    pub async fn list(&mut self) -> Result<&[Coin], CatalogError> {
        if self.is_stale() {
            let coins = fetch_coin_list(&self.http).await?;
            info!(count = coins.len(), "coin catalog refreshed");
            self.store(coins);
        }
        match &self.cached {
            Some((_, coins)) => Ok(coins),
            None => Ok(&[]),
        }
    }
}

impl Default for CoinCatalog {
    fn default() -> Self {
        Self::new()
    }
}

async fn fetch_coin_list(http: &reqwest::Client) -> Result<Vec<Coin>, CatalogError> {
    let url = format!("{}/coins/list", BASE_URL);
    let coins = http
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<Vec<Coin>>()
        .await?;
    Ok(coins)
}

/// Ordering used by the selection list: common coins first (in their fixed
/// order), everything else alphabetical by name.
pub fn display_order(coins: &[Coin]) -> Vec<Coin> {
    let mut pinned: Vec<Coin> = Vec::new();
    for name in COMMON_COINS {
        if let Some(coin) = coins.iter().find(|c| c.name == *name) {
            pinned.push(coin.clone());
        }
    }

    let mut rest: Vec<Coin> = coins
        .iter()
        .filter(|c| !COMMON_COINS.contains(&c.name.as_str()))
        .cloned()
        .collect();
    rest.sort_by(|a, b| a.name.cmp(&b.name));

    pinned.extend(rest);
    pinned
}
