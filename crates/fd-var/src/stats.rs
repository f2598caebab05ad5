//! Descriptive statistics shared by the VaR models.

use statrs::statistics::Statistics;

/// Quantile of an ascending-sorted slice with linear interpolation between
/// order statistics.
///
/// Uses the position `h = (n - 1) * q`, matching the default percentile
/// definition of most numerical libraries. Returns `NaN` for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let h = (n - 1) as f64 * q.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = h - lo as f64;
            sorted[lo] + frac * (sorted[hi] - sorted[lo])
        }
    }
}

/// Quantile of an unsorted sample; see [`quantile_sorted`].
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, q)
}

/// Slope and intercept of a degree-1 least-squares fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    /// Change in `y` per unit `x`
    pub slope: f64,
    /// Value of `y` at `x = 0`
    pub intercept: f64,
}

impl LinearFit {
    /// Ordinary least squares of `y` on `x`.
    ///
    /// A constant `x` gives a non-finite slope; callers treat that as an
    /// unusable fit.
    pub fn ols(x: &[f64], y: &[f64]) -> Self {
        debug_assert_eq!(x.len(), y.len());
        if x.windows(2).all(|pair| pair[0] == pair[1]) {
            return Self {
                slope: f64::NAN,
                intercept: f64::NAN,
            };
        }
        let x_bar = x.iter().mean();
        let y_bar = y.iter().mean();
        let (sxy, sxx) = x
            .iter()
            .zip(y)
            .fold((0.0, 0.0), |(sxy, sxx), (xi, yi)| {
                let dx = xi - x_bar;
                (sxy + dx * (yi - y_bar), sxx + dx * dx)
            });
        let slope = sxy / sxx;
        Self {
            slope,
            intercept: y_bar - slope * x_bar,
        }
    }

    /// Evaluate the fitted line at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Whether both coefficients are finite.
    pub fn is_finite(&self) -> bool {
        self.slope.is_finite() && self.intercept.is_finite()
    }
}
