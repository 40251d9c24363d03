//! Correlation coefficients with two-sided p-values.
//!
//! Fewer than two samples, or an input without variation, give `NaN` for
//! both the statistic and the p-value.

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub statistic: f64,
    pub p_value: f64,
}

impl Correlation {
    const UNDEFINED: Correlation = Correlation {
        statistic: f64::NAN,
        p_value: f64::NAN,
    };
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Exact comparison; the centered sum of squares of a constant input need
/// not round to zero.
fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

/// Two-sided p-value of `r` under Student's t with `n - 2` degrees of
/// freedom.
fn t_test_p_value(r: f64, n: usize) -> f64 {
    if n <= 2 {
        return 1.0;
    }
    if r.abs() >= 1.0 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    StudentsT::new(0.0, 1.0, df)
        .map(|dist| (2.0 * dist.sf(t.abs())).min(1.0))
        .unwrap_or(f64::NAN)
}

pub fn pearson(x: &[f64], y: &[f64]) -> Correlation {
    let n = x.len().min(y.len());
    if n < 2 {
        return Correlation::UNDEFINED;
    }
    let (x, y) = (&x[..n], &y[..n]);
    if is_constant(x) || is_constant(y) {
        return Correlation::UNDEFINED;
    }
    let (mx, my) = (mean(x), mean(y));
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return Correlation::UNDEFINED;
    }
    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    Correlation {
        statistic: r,
        p_value: t_test_p_value(r, n),
    }
}

/// 1-based ranks; tied values share the mean of their ranks.
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
        let rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

pub fn spearman(x: &[f64], y: &[f64]) -> Correlation {
    let n = x.len().min(y.len());
    pearson(&average_ranks(&x[..n]), &average_ranks(&y[..n]))
}

/// Sizes of the runs of equal values in a sorted sequence.
fn tie_groups<T: PartialEq>(sorted: &[T]) -> Vec<f64> {
    let mut groups = Vec::new();
    let mut start = 0;
    for end in 1..=sorted.len() {
        if end == sorted.len() || sorted[end] != sorted[start] {
            let size = end - start;
            if size > 1 {
                groups.push(size as f64);
            }
            start = end;
        }
    }
    groups
}

/// `(sum t(t-1)/2, sum t(t-1)(t-2), sum t(t-1)(2t+5))` over tie groups.
fn tie_terms(groups: &[f64]) -> (f64, f64, f64) {
    groups.iter().fold((0.0, 0.0, 0.0), |(pairs, v0, v1), &t| {
        (
            pairs + t * (t - 1.0) / 2.0,
            v0 + t * (t - 1.0) * (t - 2.0),
            v1 + t * (t - 1.0) * (2.0 * t + 5.0),
        )
    })
}

/// Stable merge sort that returns the number of strict inversions.
fn sort_counting_inversions(values: &mut [f64]) -> u64 {
    let n = values.len();
    let mut buffer = values.to_vec();
    let mut swaps = 0u64;
    let mut width = 1;
    while width < n {
        let mut start = 0;
        while start < n {
            let middle = (start + width).min(n);
            let end = (start + 2 * width).min(n);
            let (mut i, mut j, mut k) = (start, middle, start);
            while i < middle && j < end {
                if values[j] < values[i] {
                    buffer[k] = values[j];
                    swaps += (middle - i) as u64;
                    j += 1;
                } else {
                    buffer[k] = values[i];
                    i += 1;
                }
                k += 1;
            }
            buffer[k..k + (middle - i)].copy_from_slice(&values[i..middle]);
            k += middle - i;
            buffer[k..k + (end - j)].copy_from_slice(&values[j..end]);
            start = end;
        }
        values.copy_from_slice(&buffer);
        width *= 2;
    }
    swaps
}

/// Kendall's tau-b in O(n log n) with the asymptotic normal p-value.
pub fn kendall(x: &[f64], y: &[f64]) -> Correlation {
    let n = x.len().min(y.len());
    if n < 2 {
        return Correlation::UNDEFINED;
    }
    let mut pairs: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).take(n).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let xs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let (x_ties, x0, x1) = tie_terms(&tie_groups(&xs));
    let (joint_ties, _, _) = tie_terms(&tie_groups(&pairs));

    let mut ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    let swaps = sort_counting_inversions(&mut ys) as f64;
    let (y_ties, y0, y1) = tie_terms(&tie_groups(&ys));

    let size = n as f64;
    let total = size * (size - 1.0) / 2.0;
    if x_ties == total || y_ties == total {
        return Correlation::UNDEFINED;
    }
    let con_minus_dis = total - x_ties - y_ties + joint_ties - 2.0 * swaps;
    let tau = (con_minus_dis / ((total - x_ties) * (total - y_ties)).sqrt()).clamp(-1.0, 1.0);

    let m = size * (size - 1.0);
    let mut variance = (m * (2.0 * size + 5.0) - x1 - y1) / 18.0 + 2.0 * x_ties * y_ties / m;
    if n > 2 {
        variance += x0 * y0 / (9.0 * m * (size - 2.0));
    }
    let z = con_minus_dis / variance.sqrt();
    let p_value = Normal::new(0.0, 1.0)
        .map(|dist| (2.0 * dist.sf(z.abs())).min(1.0))
        .unwrap_or(f64::NAN);

    Correlation {
        statistic: tau,
        p_value,
    }
}
