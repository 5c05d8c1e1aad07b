use crate::error::{Error, Result};
use statrs::statistics::Statistics;

/// Width of the acceptance fence around the percentile range.
pub const RANGE_MULTIPLIER: f64 = 1.5;

/// Lower/upper percentile used to fence out outliers, stored as fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileBounds {
    low: f64,
    high: f64,
}

impl PercentileBounds {
    /// Q1/Q3, i.e. the classic interquartile range.
    pub const QUARTILES: PercentileBounds = PercentileBounds {
        low: 0.25,
        high: 0.75,
    };

    /// 1%/3%, the default fence for finished-item sale history.
    pub const SALE_HISTORY: PercentileBounds = PercentileBounds {
        low: 0.01,
        high: 0.03,
    };

    /// Build from percentages (1.0 = 1%). The sign is ignored.
    pub fn from_percent(low: f64, high: f64) -> Result<Self> {
        let low = normalize("low", low)?;
        let high = normalize("high", high)?;
        if low > high {
            return Err(Error::InvalidPercentileBound {
                name: "low",
                value: low * 100.0,
                reason: "low bound is above high bound",
            });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }
}

fn normalize(name: &'static str, percent: f64) -> Result<f64> {
    if !percent.is_finite() {
        return Err(Error::InvalidPercentileBound {
            name,
            value: percent,
            reason: "not a finite number",
        });
    }
    let fraction = percent.abs() / 100.0;
    if fraction > 1.0 {
        return Err(Error::InvalidPercentileBound {
            name,
            value: percent,
            reason: "must be within 0..=100",
        });
    }
    Ok(fraction)
}

/// Mean of the prices after dropping anything beyond 1.5x the interquartile
/// range. None for an empty sample set.
pub fn iqr_average(prices: &[u64]) -> Option<f64> {
    ipr_average(prices, PercentileBounds::QUARTILES)
}

/// Interpercentile generalization of [`iqr_average`].
///
/// With one or two samples both indices collapse to 0 and the filter
/// degenerates; that is accepted.
pub fn ipr_average(prices: &[u64], bounds: PercentileBounds) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }

    let mut sorted: Vec<f64> = prices.iter().map(|&p| p as f64).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let lower = at_fraction(&sorted, bounds.low);
    let upper = at_fraction(&sorted, bounds.high);
    let threshold = RANGE_MULTIPLIER * (upper - lower);
    let (min, max) = (lower - threshold, upper + threshold);

    // `lower` itself is always kept, so this is never empty
    let kept: Vec<f64> = sorted
        .into_iter()
        .filter(|&p| p >= min && p <= max)
        .collect();

    Some(kept.mean())
}

/// Value at index floor(n * fraction), clamped to the last element.
fn at_fraction(sorted: &[f64], fraction: f64) -> f64 {
    let idx = (sorted.len() as f64 * fraction).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
