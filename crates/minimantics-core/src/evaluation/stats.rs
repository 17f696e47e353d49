//! Correlation and significance tests between gold and predicted scores.
//!
//! This module provides:
//! - Pearson's r, Spearman's rho and Kendall's tau-b with two-sided p-values
//! - The Wilcoxon signed-rank test (normal approximation)
//! - Average (fractional) ranks with tie handling
//!
//! # P-values
//!
//! | Test | Statistic | Distribution |
//! |------|-----------|--------------|
//! | Pearson, Spearman | t = r·sqrt((n-2)/(1-r²)) | Student t, n-2 df |
//! | Kendall | (C-D) / sqrt(var), tie-corrected variance | normal |
//! | Wilcoxon | (W - n(n+1)/4) / se, tie-corrected se | normal |
//!
//! Undefined results (too few points, constant input) are NaN rather than
//! errors: a degenerate column must not stop the other measures.
//!
//! # References
//!
//! - Kendall (1945). "The treatment of ties in ranking problems"
//! - Wilcoxon (1945). "Individual comparisons by ranking methods"

use serde::Serialize;
use std::cmp::Ordering;

/// A correlation coefficient with its two-sided p-value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Correlation {
    /// Coefficient in [-1, 1], NaN when undefined
    pub coefficient: f64,
    /// Two-sided p-value, NaN when undefined
    pub p_value: f64,
}

impl Correlation {
    fn undefined() -> Self {
        Self {
            coefficient: f64::NAN,
            p_value: f64::NAN,
        }
    }
}

/// Result of a Wilcoxon signed-rank test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WilcoxonResult {
    /// W = min(W+, W-)
    pub statistic: f64,
    /// Two-sided p-value (normal approximation)
    pub p_value: f64,
}

/// Arithmetic mean (NaN for an empty slice).
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Ranks of `values` starting at 1; tied values share their average rank.
///
/// # Example
///
/// ```
/// use minimantics_core::evaluation::stats::average_ranks;
///
/// assert_eq!(average_ranks(&[10.0, 30.0, 20.0, 20.0]), vec![1.0, 4.0, 2.5, 2.5]);
/// ```
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end (0-based) hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

/// Sizes of the groups of equal values (only groups larger than one).
fn tie_groups(values: &[f64]) -> Vec<usize> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut groups = Vec::new();
    let mut start = 0;
    while start < sorted.len() {
        let mut end = start + 1;
        while end < sorted.len() && sorted[end] == sorted[start] {
            end += 1;
        }
        if end - start > 1 {
            groups.push(end - start);
        }
        start = end;
    }
    groups
}

/// Pearson correlation between two aligned samples.
///
/// # Returns
///
/// NaN coefficient and p-value for mismatched lengths, fewer than two
/// points, or a constant sample.
pub fn pearson(x: &[f64], y: &[f64]) -> Correlation {
    let n = x.len();
    if n != y.len() || n < 2 {
        return Correlation::undefined();
    }
    let mx = mean(x);
    let my = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx) * (a - mx);
        syy += (b - my) * (b - my);
    }
    if sxx == 0.0 || syy == 0.0 {
        return Correlation::undefined();
    }
    let r = (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0);
    Correlation {
        coefficient: r,
        p_value: correlation_p_value(r, n),
    }
}

/// Spearman rank correlation: Pearson over average ranks.
pub fn spearman(x: &[f64], y: &[f64]) -> Correlation {
    if x.len() != y.len() {
        return Correlation::undefined();
    }
    pearson(&average_ranks(x), &average_ranks(y))
}

/// Kendall's tau-b with a tie-corrected normal approximation for the
/// p-value.
///
/// Pairs are compared exhaustively (O(n²)).
pub fn kendall_tau(x: &[f64], y: &[f64]) -> Correlation {
    let n = x.len();
    if n != y.len() || n < 2 {
        return Correlation::undefined();
    }

    let mut con_minus_dis = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let sx = sign(x[i] - x[j]);
            let sy = sign(y[i] - y[j]);
            con_minus_dis += sx * sy;
        }
    }

    let tot = (n * (n - 1) / 2) as f64;
    let (xtie, x0, x1) = tie_terms(&tie_groups(x));
    let (ytie, y0, y1) = tie_terms(&tie_groups(y));
    if xtie == tot || ytie == tot {
        return Correlation::undefined();
    }

    let tau = (con_minus_dis / ((tot - xtie).sqrt() * (tot - ytie).sqrt())).clamp(-1.0, 1.0);

    let nf = n as f64;
    let m = nf * (nf - 1.0);
    let mut var = (m * (2.0 * nf + 5.0) - x1 - y1) / 18.0 + (2.0 * xtie * ytie) / m;
    if n > 2 {
        var += x0 * y0 / (9.0 * m * (nf - 2.0));
    }
    let z = con_minus_dis.abs() / var.sqrt();
    Correlation {
        coefficient: tau,
        p_value: 2.0 * (1.0 - normal_cdf(z)),
    }
}

/// Σt(t-1)/2, Σt(t-1)(t-2), Σt(t-1)(2t+5) over tie group sizes t.
fn tie_terms(groups: &[usize]) -> (f64, f64, f64) {
    groups.iter().fold((0.0, 0.0, 0.0), |(a, b, c), &t| {
        let t = t as f64;
        (
            a + t * (t - 1.0) / 2.0,
            b + t * (t - 1.0) * (t - 2.0),
            c + t * (t - 1.0) * (2.0 * t + 5.0),
        )
    })
}

fn sign(v: f64) -> f64 {
    match v.partial_cmp(&0.0) {
        Some(Ordering::Greater) => 1.0,
        Some(Ordering::Less) => -1.0,
        _ => 0.0,
    }
}

/// Wilcoxon signed-rank test on paired samples.
///
/// Zero differences are dropped. The statistic is the smaller of the
/// positive and negative rank sums; the p-value uses the normal
/// approximation with tie correction and no continuity correction.
///
/// # Returns
///
/// NaN statistic and p-value for mismatched lengths; NaN p-value when every
/// difference is zero.
pub fn wilcoxon(x: &[f64], y: &[f64]) -> WilcoxonResult {
    if x.len() != y.len() {
        return WilcoxonResult {
            statistic: f64::NAN,
            p_value: f64::NAN,
        };
    }
    let diffs: Vec<f64> = x
        .iter()
        .zip(y)
        .map(|(a, b)| a - b)
        .filter(|d| *d != 0.0)
        .collect();
    let n = diffs.len() as f64;

    let abs: Vec<f64> = diffs.iter().map(|d| d.abs()).collect();
    let ranks = average_ranks(&abs);
    let (mut plus, mut minus) = (0.0, 0.0);
    for (d, r) in diffs.iter().zip(&ranks) {
        if *d > 0.0 {
            plus += r;
        } else {
            minus += r;
        }
    }
    let statistic = plus.min(minus);

    let mn = n * (n + 1.0) / 4.0;
    let mut se = n * (n + 1.0) * (2.0 * n + 1.0);
    for t in tie_groups(&ranks) {
        let t = t as f64;
        se -= 0.5 * t * (t * t - 1.0);
    }
    let se = (se / 24.0).sqrt();

    let p_value = if se > 0.0 {
        let z = (statistic - mn) / se;
        2.0 * (1.0 - normal_cdf(z.abs()))
    } else {
        f64::NAN
    };
    WilcoxonResult { statistic, p_value }
}

/// Two-sided p-value of a correlation coefficient with n points.
fn correlation_p_value(r: f64, n: usize) -> f64 {
    let df = n - 2;
    if df == 0 {
        return 1.0;
    }
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return 0.0;
    }
    let t = r * (df as f64 / denom).sqrt();
    t_distribution_p_value(t.abs(), df)
}

// ============================================================================
// Internal: T-distribution p-value approximation
// ============================================================================

/// Approximates two-tailed p-value from t-distribution.
///
/// Uses the incomplete beta function relationship:
/// p = I_{df/(df+t²)}(df/2, 1/2)
///
/// For large df, approximates using normal distribution.
fn t_distribution_p_value(t_abs: f64, df: usize) -> f64 {
    if df > 100 {
        return 2.0 * (1.0 - normal_cdf(t_abs));
    }

    let x = df as f64 / (df as f64 + t_abs * t_abs);
    incomplete_beta(df as f64 / 2.0, 0.5, x)
}

/// Normal CDF using error function approximation.
pub(crate) fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / 2.0_f64.sqrt()))
}

/// Error function approximation (Abramowitz and Stegun).
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

/// Regularized incomplete beta function using continued fraction.
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let bt = (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();

    if x < (a + 1.0) / (a + b + 2.0) {
        bt * beta_cf(a, b, x) / a
    } else {
        1.0 - bt * beta_cf(b, a, 1.0 - x) / b
    }
}

/// Continued fraction for incomplete beta.
fn beta_cf(a: f64, b: f64, x: f64) -> f64 {
    let max_iter = 200;
    let eps = 1e-10;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < 1e-30 {
        d = 1e-30;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=max_iter {
        let m = m as f64;
        let m2 = 2.0 * m;

        // Even step
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < 1e-30 {
            d = 1e-30;
        }
        c = 1.0 + aa / c;
        if c.abs() < 1e-30 {
            c = 1e-30;
        }
        d = 1.0 / d;
        h *= d * c;

        // Odd step
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < 1e-30 {
            d = 1e-30;
        }
        c = 1.0 + aa / c;
        if c.abs() < 1e-30 {
            c = 1e-30;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;

        if (del - 1.0).abs() < eps {
            break;
        }
    }

    h
}

/// Log gamma function (Lanczos approximation).
fn ln_gamma(x: f64) -> f64 {
    let coeffs = [
        76.18009172947146,
        -86.50532032941677,
        24.01409824083091,
        -1.231739572450155,
        0.1208650973866179e-2,
        -0.5395239384953e-5,
    ];

    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();

    let mut ser = 1.000000000190015;
    for (i, &coeff) in coeffs.iter().enumerate() {
        ser += coeff / (x + 1.0 + i as f64);
    }

    -tmp + (2.5066282746310005 * ser / x).ln()
}

// ============================================================================
// Tests
// ============================================================================
