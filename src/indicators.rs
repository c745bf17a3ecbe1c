//! Derived-indicator pipeline: pure functions of an aligned price/volume
//! window. Everything is recomputed in full per call; columns with a
//! warm-up requirement hold `None` until enough history exists.

use crate::series::{self, TimeSeriesPoint};

pub const SMA_SHORT: usize = 10;
pub const SMA_LONG: usize = 30;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const RSI_PERIOD: usize = 14;

/// Exponential moving average, seeded with the first observation:
/// `ema[0] = x[0]`, `ema[i] = α·x[i] + (1−α)·ema[i−1]`, `α = 2/(window+1)`.
#[derive(Debug, Clone)]
struct Ema {
    alpha: f64,
    value: f64,
    seeded: bool,
}

impl Ema {
    fn new(window: usize) -> Self {
        Self {
            alpha: 2.0 / (window as f64 + 1.0),
            value: 0.0,
            seeded: false,
        }
    }

    fn update(&mut self, x: f64) -> f64 {
        if self.seeded {
            self.value = self.alpha * x + (1.0 - self.alpha) * self.value;
        } else {
            self.value = x;
            self.seeded = true;
        }
        self.value
    }
}

/// The timestamp-aligned table of derived columns the presentation layer
/// consumes. Never cached; rebuilt from a window slice per render.
#[derive(Debug, Clone, Default)]
pub struct DerivedTable {
    pub timestamps_ms: Vec<i64>,
    pub price: Vec<f64>,
    pub volume: Vec<f64>,
    /// Period-over-period return in percent. `None` at index 0.
    pub returns: Vec<Option<f64>>,
    pub sma_10: Vec<Option<f64>>,
    pub sma_30: Vec<Option<f64>>,
    pub macd_line: Vec<f64>,
    pub macd_signal: Vec<f64>,
    pub macd_histogram: Vec<f64>,
    pub rsi_14: Vec<Option<f64>>,
    /// Absolute price change vs the previous point; its sign colors the
    /// volume bars.
    pub price_delta: Vec<Option<f64>>,
}

impl DerivedTable {
    pub fn len(&self) -> usize {
        self.price.len()
    }

    pub fn is_empty(&self) -> bool {
        self.price.is_empty()
    }

    /// MACD values exist from index 0 but are still warming up until the
    /// slow EMA period has elapsed; treat earlier values as low-confidence.
    pub fn macd_is_confident(&self) -> bool {
        self.len() >= MACD_SLOW
    }

    /// Sample standard deviation of the return column (the volatility
    /// measure the commentary thresholds apply to).
    pub fn volatility(&self) -> Option<f64> {
        let observed: Vec<f64> = self.returns.iter().flatten().copied().collect();
        sample_std(&observed)
    }

    /// Lag-1 Pearson autocorrelation of returns over pairwise-complete
    /// observations.
    pub fn autocorrelation_lag1(&self) -> Option<f64> {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for i in 1..self.returns.len() {
            if let (Some(a), Some(b)) = (self.returns[i - 1], self.returns[i]) {
                xs.push(a);
                ys.push(b);
            }
        }
        pearson(&xs, &ys)
    }

    pub fn mean_volume(&self) -> Option<f64> {
        mean(&self.volume)
    }

    pub fn last_price(&self) -> Option<f64> {
        self.price.last().copied()
    }

    pub fn last_volume(&self) -> Option<f64> {
        self.volume.last().copied()
    }

    pub fn last_rsi(&self) -> Option<f64> {
        self.rsi_14.last().copied().flatten()
    }
}

/// Align the two series on timestamp and derive every column.
pub fn compute_indicators(
    prices: &[TimeSeriesPoint],
    volumes: &[TimeSeriesPoint],
) -> DerivedTable {
    let (prices, volumes) = series::align(prices, volumes);
    let n = prices.len();

    let timestamps_ms: Vec<i64> = prices.iter().map(|p| p.timestamp_ms).collect();
    let price: Vec<f64> = prices.iter().map(|p| p.value).collect();
    let volume: Vec<f64> = volumes.iter().map(|v| v.value).collect();

    let mut returns = vec![None; n];
    let mut price_delta = vec![None; n];
    for i in 1..n {
        price_delta[i] = Some(price[i] - price[i - 1]);
        if price[i - 1] != 0.0 {
            returns[i] = Some((price[i] / price[i - 1] - 1.0) * 100.0);
        }
    }

    let sma_10 = sma(&price, SMA_SHORT);
    let sma_30 = sma(&price, SMA_LONG);

    let mut ema_fast = Ema::new(MACD_FAST);
    let mut ema_slow = Ema::new(MACD_SLOW);
    let mut ema_signal = Ema::new(MACD_SIGNAL);
    let mut macd_line = Vec::with_capacity(n);
    let mut macd_signal = Vec::with_capacity(n);
    let mut macd_histogram = Vec::with_capacity(n);
    for &p in &price {
        let line = ema_fast.update(p) - ema_slow.update(p);
        let signal = ema_signal.update(line);
        macd_line.push(line);
        macd_signal.push(signal);
        macd_histogram.push(line - signal);
    }

    let rsi_14 = rsi(&price, RSI_PERIOD);

    DerivedTable {
        timestamps_ms,
        price,
        volume,
        returns,
        sma_10,
        sma_30,
        macd_line,
        macd_signal,
        macd_histogram,
        rsi_14,
        price_delta,
    }
}

/// Trailing simple moving average; `None` until the window is full.
fn sma(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let mut sum = 0.0;
    for i in 0..values.len() {
        sum += values[i];
        if i >= window {
            sum -= values[i - window];
        }
        if i + 1 >= window {
            out[i] = Some(sum / window as f64);
        }
    }
    out
}

/// Wilder RSI: averages seeded over the first `period` gains/losses, then
/// smoothed as `avg = (avg·(period−1) + x) / period`. `None` until
/// `period` return observations exist; 100 whenever the average loss is
/// zero (a flat or pure-gain window saturates rather than oscillates).
fn rsi(price: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = price.len();
    let mut out = vec![None; n];
    if period == 0 {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..n {
        let change = price[i] - price[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i < period {
            avg_gain += gain;
            avg_loss += loss;
            continue;
        }
        if i == period {
            avg_gain = (avg_gain + gain) / period as f64;
            avg_loss = (avg_loss + loss) / period as f64;
        } else {
            let w = period as f64;
            avg_gain = (avg_gain * (w - 1.0) + gain) / w;
            avg_loss = (avg_loss * (w - 1.0) + loss) / w;
        }

        out[i] = Some(if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        });
    }
    out
}

// Summary statistics

/// Descriptive statistics in the shape of pandas `describe()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

pub fn describe(values: &[f64]) -> Option<Describe> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    Some(Describe {
        count: values.len(),
        mean: mean(values)?,
        std: sample_std(values),
        min: sorted[0],
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
    })
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n−1 denominator); `None` with fewer than two
/// observations.
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Linear-interpolation quantile over a sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        var_x += (x - mx).powi(2);
        var_y += (y - my).powi(2);
    }
    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return None;
    }
    Some(cov / denom)
}
