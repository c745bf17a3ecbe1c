//! Time-series primitives shared by the fetcher, cache and indicator
//! pipeline.

use serde::{Deserialize, Serialize};

/// One observation: millisecond timestamp plus value, as returned by the
/// market-chart endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp_ms: i64,
    pub value: f64,
}

/// Ordered oldest-first, timestamps non-decreasing.
pub type Series = Vec<TimeSeriesPoint>;

/// Convert the raw `[[ts_ms, value], ...]` pairs from the API into a Series.
pub fn from_pairs(pairs: &[(i64, f64)]) -> Series {
    pairs
        .iter()
        .map(|&(timestamp_ms, value)| TimeSeriesPoint {
            timestamp_ms,
            value,
        })
        .collect()
}

/// Inner-join two series on timestamp, keeping only instants present in
/// both. Prices and volumes come from the same API call and are normally
/// already aligned, so this is a safety net rather than a merge step.
pub fn align(left: &[TimeSeriesPoint], right: &[TimeSeriesPoint]) -> (Series, Series) {
    let mut out_left = Vec::with_capacity(left.len().min(right.len()));
    let mut out_right = Vec::with_capacity(left.len().min(right.len()));

    let mut i = 0;
    let mut j = 0;
    while i < left.len() && j < right.len() {
        let a = left[i];
        let b = right[j];
        if a.timestamp_ms == b.timestamp_ms {
            out_left.push(a);
            out_right.push(b);
            i += 1;
            j += 1;
        } else if a.timestamp_ms < b.timestamp_ms {
            i += 1;
        } else {
            j += 1;
        }
    }

    (out_left, out_right)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: &[(i64, f64)]) -> Series {
        from_pairs(points)
    }

    #[test]
    fn align_keeps_shared_timestamps_only() {
        let prices = series(&[(1, 10.0), (2, 11.0), (3, 12.0), (5, 14.0)]);
        let volumes = series(&[(2, 100.0), (3, 110.0), (4, 120.0), (5, 130.0)]);

        let (p, v) = align(&prices, &volumes);

        let ts: Vec<i64> = p.iter().map(|x| x.timestamp_ms).collect();
        assert_eq!(ts, vec![2, 3, 5]);
        assert_eq!(p.len(), v.len());
        assert_eq!(v[0].value, 100.0);
        assert_eq!(p[2].value, 14.0);
    }

    #[test]
    fn align_of_identical_timestamps_is_identity() {
        let prices = series(&[(1, 1.0), (2, 2.0)]);
        let volumes = series(&[(1, 9.0), (2, 8.0)]);

        let (p, v) = align(&prices, &volumes);
        assert_eq!(p, prices);
        assert_eq!(v, volumes);
    }

    #[test]
    fn align_with_disjoint_series_is_empty() {
        let prices = series(&[(1, 1.0)]);
        let volumes = series(&[(2, 2.0)]);

        let (p, v) = align(&prices, &volumes);
        assert!(p.is_empty());
        assert!(v.is_empty());
    }
}
