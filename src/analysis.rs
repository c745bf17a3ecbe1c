//! Rule-based market commentary derived from the indicator table.
//!
//! Thresholds are fixed: volatility 0.5/0.2, volume 1.5x/0.5x of average,
//! RSI 70/30 zones, autocorrelation ±0.05. Every rule degrades to a
//! "not enough data" line when its minimum window is unmet.

use crate::indicators::{DerivedTable, MACD_SLOW, SMA_LONG};

/// Mirrors the severity levels the status lines use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Positive,
    Negative,
    Caution,
    Neutral,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub section: &'static str,
    pub tone: Tone,
    pub text: String,
}

fn comment(section: &'static str, tone: Tone, text: String) -> Comment {
    Comment {
        section,
        tone,
        text,
    }
}

/// Build the full commentary for one derived table.
pub fn commentary(coin_name: &str, table: &DerivedTable) -> Vec<Comment> {
    let mut out = Vec::new();
    volatility_comment(coin_name, table, &mut out);
    trend_comment(coin_name, table, &mut out);
    macd_comment(coin_name, table, &mut out);
    rsi_comment(coin_name, table, &mut out);
    volume_comment(coin_name, table, &mut out);
    autocorrelation_comment(coin_name, table, &mut out);
    out
}

fn volatility_comment(coin_name: &str, table: &DerivedTable, out: &mut Vec<Comment>) {
    const SECTION: &str = "Volatility";
    match table.volatility() {
        Some(std) if std > 0.5 => out.push(comment(
            SECTION,
            Tone::Neutral,
            format!(
                "{coin_name} has shown HIGH volatility in returns ({std:.2}%): significant price swings and higher risk/reward."
            ),
        )),
        Some(std) if std > 0.2 => out.push(comment(
            SECTION,
            Tone::Neutral,
            format!(
                "{coin_name} has shown MODERATE volatility in returns ({std:.2}%): notable price movements."
            ),
        )),
        Some(std) => out.push(comment(
            SECTION,
            Tone::Neutral,
            format!(
                "{coin_name} has shown LOW volatility in returns ({std:.2}%): relatively stable price movements."
            ),
        )),
        None => out.push(comment(
            SECTION,
            Tone::Caution,
            format!("Not enough data to measure volatility for {coin_name}."),
        )),
    }
}

fn trend_comment(coin_name: &str, table: &DerivedTable, out: &mut Vec<Comment>) {
    const SECTION: &str = "Trend";
    let last_short = table.sma_10.last().copied().flatten();
    let last_long = table.sma_30.last().copied().flatten();
    let price = table.last_price();

    let (Some(short), Some(long), Some(price)) = (last_short, last_long, price) else {
        out.push(comment(
            SECTION,
            Tone::Caution,
            format!(
                "Not enough data for {coin_name} to compute moving averages and determine a trend."
            ),
        ));
        return;
    };
    if table.len() < SMA_LONG {
        out.push(comment(
            SECTION,
            Tone::Caution,
            format!(
                "Not enough data for {coin_name} to compute moving averages and determine a trend."
            ),
        ));
        return;
    }

    if short > long {
        if price > short {
            out.push(comment(
                SECTION,
                Tone::Positive,
                format!(
                    "{coin_name} appears to be in an UPTREND: SMA 10 is above SMA 30 and the price is above both, suggesting bullish momentum."
                ),
            ));
        } else {
            out.push(comment(
                SECTION,
                Tone::Neutral,
                format!(
                    "{coin_name} is in a POTENTIAL UPTREND: SMA 10 is above SMA 30 but the price sits below the short average, possibly a pullback or consolidation."
                ),
            ));
        }
    } else if short < long {
        if price < short {
            out.push(comment(
                SECTION,
                Tone::Negative,
                format!(
                    "{coin_name} appears to be in a DOWNTREND: SMA 10 is below SMA 30 and the price is below both, suggesting bearish momentum."
                ),
            ));
        } else {
            out.push(comment(
                SECTION,
                Tone::Caution,
                format!(
                    "{coin_name} is in a POTENTIAL DOWNTREND: SMA 10 is below SMA 30 but the price sits above the short average, possibly a rebound or consolidation."
                ),
            ));
        }
    } else {
        out.push(comment(
            SECTION,
            Tone::Caution,
            format!(
                "{coin_name} is in a SIDEWAYS or CONSOLIDATION phase: the moving averages are intertwined."
            ),
        ));
    }
}

fn macd_comment(coin_name: &str, table: &DerivedTable, out: &mut Vec<Comment>) {
    const SECTION: &str = "MACD";
    if table.len() < MACD_SLOW {
        out.push(comment(
            SECTION,
            Tone::Caution,
            format!("Not enough data to calculate MACD for {coin_name}."),
        ));
        return;
    }

    let n = table.len();
    let line = table.macd_line[n - 1];
    let signal = table.macd_signal[n - 1];
    // Crossover = the previous bar sat on the other side of the signal.
    let crossed_up = n < 2 || table.macd_line[n - 2] <= table.macd_signal[n - 2];
    let crossed_down = n < 2 || table.macd_line[n - 2] >= table.macd_signal[n - 2];

    if line > signal && crossed_up {
        out.push(comment(
            SECTION,
            Tone::Positive,
            format!(
                "MACD bullish crossover: the MACD line for {coin_name} has just crossed above the signal line, suggesting upward momentum."
            ),
        ));
    } else if line < signal && crossed_down {
        out.push(comment(
            SECTION,
            Tone::Negative,
            format!(
                "MACD bearish crossover: the MACD line for {coin_name} has just crossed below the signal line, suggesting downward momentum."
            ),
        ));
    } else if line > signal {
        out.push(comment(
            SECTION,
            Tone::Neutral,
            format!(
                "MACD is bullish: the MACD line for {coin_name} is above its signal line."
            ),
        ));
    } else if line < signal {
        out.push(comment(
            SECTION,
            Tone::Caution,
            format!(
                "MACD is bearish: the MACD line for {coin_name} is below its signal line."
            ),
        ));
    } else {
        out.push(comment(
            SECTION,
            Tone::Neutral,
            format!("MACD for {coin_name} is flat against the signal line: neutral momentum."),
        ));
    }

    if line > 0.0 {
        out.push(comment(
            SECTION,
            Tone::Neutral,
            "MACD is above the zero line, reinforcing bullish momentum.".to_string(),
        ));
    } else if line < 0.0 {
        out.push(comment(
            SECTION,
            Tone::Neutral,
            "MACD is below the zero line, reinforcing bearish momentum.".to_string(),
        ));
    }
}

fn rsi_comment(coin_name: &str, table: &DerivedTable, out: &mut Vec<Comment>) {
    const SECTION: &str = "RSI";
    let Some(rsi) = table.last_rsi() else {
        out.push(comment(
            SECTION,
            Tone::Caution,
            format!("Not enough data to calculate RSI for {coin_name}."),
        ));
        return;
    };

    if rsi >= 70.0 {
        out.push(comment(
            SECTION,
            Tone::Caution,
            format!(
                "RSI for {coin_name} ({rsi:.2}) is in the OVERBOUGHT zone (>=70): possible temporary top and pullback."
            ),
        ));
    } else if rsi <= 30.0 {
        out.push(comment(
            SECTION,
            Tone::Positive,
            format!(
                "RSI for {coin_name} ({rsi:.2}) is in the OVERSOLD zone (<=30): possible temporary bottom and rebound."
            ),
        ));
    } else {
        out.push(comment(
            SECTION,
            Tone::Neutral,
            format!("RSI for {coin_name} ({rsi:.2}) is in the neutral zone between 30 and 70."),
        ));
    }
}

fn volume_comment(coin_name: &str, table: &DerivedTable, out: &mut Vec<Comment>) {
    const SECTION: &str = "Volume";
    let (Some(avg), Some(last)) = (table.mean_volume(), table.last_volume()) else {
        out.push(comment(
            SECTION,
            Tone::Caution,
            format!("Not enough data to analyze volume for {coin_name}."),
        ));
        return;
    };

    if last > avg * 1.5 {
        out.push(comment(
            SECTION,
            Tone::Positive,
            format!(
                "Current trading volume for {coin_name} ({last:.2e}) is significantly HIGHER than the average ({avg:.2e}): strong interest behind recent moves."
            ),
        ));
    } else if last < avg * 0.5 {
        out.push(comment(
            SECTION,
            Tone::Caution,
            format!(
                "Current trading volume for {coin_name} ({last:.2e}) is significantly LOWER than the average ({avg:.2e}): little conviction behind recent moves."
            ),
        ));
    } else {
        out.push(comment(
            SECTION,
            Tone::Neutral,
            format!(
                "Current trading volume for {coin_name} ({last:.2e}) is in line with the average ({avg:.2e})."
            ),
        ));
    }
}

fn autocorrelation_comment(coin_name: &str, table: &DerivedTable, out: &mut Vec<Comment>) {
    const SECTION: &str = "Autocorrelation";
    let Some(ac) = table.autocorrelation_lag1() else {
        out.push(comment(
            SECTION,
            Tone::Caution,
            format!("Not enough data to calculate autocorrelation for {coin_name}."),
        ));
        return;
    };

    if ac.abs() < 0.05 {
        out.push(comment(
            SECTION,
            Tone::Neutral,
            format!(
                "Returns for {coin_name} show VERY LOW lag-1 autocorrelation ({ac:.4}): past moves are not a strong predictor of the next one."
            ),
        ));
    } else if ac > 0.05 {
        out.push(comment(
            SECTION,
            Tone::Caution,
            format!(
                "Returns for {coin_name} show POSITIVE lag-1 autocorrelation ({ac:.4}): some short-term momentum."
            ),
        ));
    } else if ac < -0.05 {
        out.push(comment(
            SECTION,
            Tone::Caution,
            format!(
                "Returns for {coin_name} show NEGATIVE lag-1 autocorrelation ({ac:.4}): some short-term mean reversion."
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::compute_indicators;
    use crate::series::TimeSeriesPoint;

    fn table(prices: &[f64], volumes: &[f64]) -> DerivedTable {
        let to_series = |values: &[f64]| -> Vec<TimeSeriesPoint> {
            values
                .iter()
                .enumerate()
                .map(|(i, &value)| TimeSeriesPoint {
                    timestamp_ms: i as i64 * 3_600_000,
                    value,
                })
                .collect()
        };
        compute_indicators(&to_series(prices), &to_series(volumes))
    }

    fn section<'a>(comments: &'a [Comment], name: &str) -> Vec<&'a Comment> {
        comments.iter().filter(|c| c.section == name).collect()
    }

    #[test]
    fn every_section_is_present() {
        let prices: Vec<f64> = (1..=60).map(|i| 100.0 + i as f64).collect();
        let volumes = vec![1000.0; 60];
        let comments = commentary("Bitcoin", &table(&prices, &volumes));

        for name in ["Volatility", "Trend", "MACD", "RSI", "Volume", "Autocorrelation"] {
            assert!(!section(&comments, name).is_empty(), "missing {name}");
        }
    }

    #[test]
    fn short_window_degrades_every_rule_to_a_caution() {
        let comments = commentary("Bitcoin", &table(&[1.0, 2.0], &[10.0, 20.0]));
        for name in ["Trend", "MACD", "RSI"] {
            let c = section(&comments, name);
            assert_eq!(c.len(), 1);
            assert_eq!(c[0].tone, Tone::Caution, "{name} should degrade");
            assert!(c[0].text.contains("Not enough data"));
        }
    }

    #[test]
    fn steady_uptrend_reads_as_bullish() {
        let prices: Vec<f64> = (1..=60).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let volumes = vec![1000.0; 60];
        let comments = commentary("Bitcoin", &table(&prices, &volumes));

        let trend = section(&comments, "Trend");
        assert_eq!(trend[0].tone, Tone::Positive);
        assert!(trend[0].text.contains("UPTREND"));

        let rsi = section(&comments, "RSI");
        assert!(rsi[0].text.contains("OVERBOUGHT"));

        let macd = section(&comments, "MACD");
        assert!(macd.iter().any(|c| c.text.contains("zero line")));
    }

    #[test]
    fn steady_downtrend_reads_as_bearish() {
        let prices: Vec<f64> = (1..=60).map(|i| 100.0 * 0.99f64.powi(i)).collect();
        let volumes = vec![1000.0; 60];
        let comments = commentary("Bitcoin", &table(&prices, &volumes));

        let trend = section(&comments, "Trend");
        assert_eq!(trend[0].tone, Tone::Negative);
        assert!(trend[0].text.contains("DOWNTREND"));

        let rsi = section(&comments, "RSI");
        assert!(rsi[0].text.contains("OVERSOLD"));
    }

    #[test]
    fn rsi_zone_boundaries_are_inclusive() {
        let mut t = DerivedTable::default();
        t.price = vec![1.0; 20];
        t.volume = vec![1.0; 20];
        t.rsi_14 = vec![None; 19]
            .into_iter()
            .chain(std::iter::once(Some(70.0)))
            .collect();

        let mut out = Vec::new();
        rsi_comment("Bitcoin", &t, &mut out);
        assert!(out[0].text.contains("OVERBOUGHT"));

        *t.rsi_14.last_mut().unwrap() = Some(30.0);
        out.clear();
        rsi_comment("Bitcoin", &t, &mut out);
        assert!(out[0].text.contains("OVERSOLD"));

        *t.rsi_14.last_mut().unwrap() = Some(50.0);
        out.clear();
        rsi_comment("Bitcoin", &t, &mut out);
        assert!(out[0].text.contains("neutral zone"));
    }

    #[test]
    fn volume_thresholds_compare_last_to_mean() {
        // 59 bars of 1000 plus a 10x spike at the end.
        let prices: Vec<f64> = (1..=60).map(|i| 100.0 + (i % 7) as f64).collect();
        let mut volumes = vec![1000.0; 59];
        volumes.push(10_000.0);
        let comments = commentary("Bitcoin", &table(&prices, &volumes));
        assert!(section(&comments, "Volume")[0].text.contains("HIGHER"));

        let mut volumes = vec![1000.0; 59];
        volumes.push(100.0);
        let comments = commentary("Bitcoin", &table(&prices, &volumes));
        assert!(section(&comments, "Volume")[0].text.contains("LOWER"));

        let volumes = vec![1000.0; 60];
        let comments = commentary("Bitcoin", &table(&prices, &volumes));
        assert!(section(&comments, "Volume")[0].text.contains("in line"));
    }

    #[test]
    fn macd_crossover_is_detected_from_the_previous_bar() {
        let mut t = DerivedTable::default();
        let n = 30;
        t.price = vec![100.0; n];
        t.volume = vec![1.0; n];
        t.rsi_14 = vec![None; n];
        t.sma_10 = vec![None; n];
        t.sma_30 = vec![None; n];
        t.returns = vec![None; n];
        t.price_delta = vec![None; n];
        t.macd_line = vec![0.0; n];
        t.macd_signal = vec![0.0; n];
        t.macd_histogram = vec![0.0; n];

        // Previous bar below signal, last bar above: bullish crossover.
        t.macd_line[n - 2] = -1.0;
        t.macd_signal[n - 2] = 0.0;
        t.macd_line[n - 1] = 1.0;
        t.macd_signal[n - 1] = 0.5;

        let mut out = Vec::new();
        macd_comment("Bitcoin", &t, &mut out);
        assert_eq!(out[0].tone, Tone::Positive);
        assert!(out[0].text.contains("bullish crossover"));

        // Still above, no crossover: plain bullish.
        t.macd_line[n - 2] = 1.0;
        t.macd_signal[n - 2] = 0.5;
        out.clear();
        macd_comment("Bitcoin", &t, &mut out);
        assert_eq!(out[0].tone, Tone::Neutral);
        assert!(out[0].text.contains("MACD is bullish"));

        // Mirror image: bearish crossover.
        t.macd_line[n - 2] = 1.0;
        t.macd_signal[n - 2] = 0.0;
        t.macd_line[n - 1] = -1.0;
        t.macd_signal[n - 1] = -0.5;
        out.clear();
        macd_comment("Bitcoin", &t, &mut out);
        assert_eq!(out[0].tone, Tone::Negative);
        assert!(out[0].text.contains("bearish crossover"));
    }

    #[test]
    fn autocorrelation_thresholds() {
        // Strict alternation: autocorrelation −1 → mean reversion note.
        let mut prices = vec![100.0];
        for i in 0..40 {
            let last = *prices.last().unwrap();
            prices.push(if i % 2 == 0 { last * 1.05 } else { last / 1.05 });
        }
        let volumes = vec![1000.0; prices.len()];
        let comments = commentary("Bitcoin", &table(&prices, &volumes));
        assert!(
            section(&comments, "Autocorrelation")[0]
                .text
                .contains("NEGATIVE")
        );
    }
}
