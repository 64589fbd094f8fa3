use std::collections::BTreeMap;

use rayon::prelude::*;
use statrs::statistics::{Data, Median, Statistics};

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(Data::new(values.to_vec()).median())
}

/// Quantile of ascending `sorted` values by linear interpolation between order statistics.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

pub fn quantiles(values: &[f64], qs: &[f64]) -> Option<Vec<f64>> {
    let mut sorted = values.to_vec();
    sorted.par_sort_unstable_by(f64::total_cmp);
    qs.iter().map(|&q| quantile_sorted(&sorted, q)).collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().mean())
    }
}

/// Unbiased (n - 1) sample variance.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        None
    } else {
        Some(values.iter().variance())
    }
}

/// Standard deviation with n in the denominator.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().population_std_dev())
    }
}

/// Pearson correlation of paired samples. `None` when undefined.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let sx = xs.iter().std_dev();
    let sy = ys.iter().std_dev();
    if sx == 0.0 || sy == 0.0 || !sx.is_finite() || !sy.is_finite() {
        return None;
    }
    let r = xs.iter().covariance(ys.iter()) / (sx * sy);
    r.is_finite().then_some(r.clamp(-1.0, 1.0))
}

/// Median of the values collected under each key. Groups are reduced in parallel.
pub fn group_medians<K, I>(pairs: I) -> BTreeMap<K, f64>
where
    K: Ord + Send,
    I: IntoIterator<Item = (K, f64)>,
{
    let mut groups: BTreeMap<K, Vec<f64>> = BTreeMap::new();
    for (key, value) in pairs {
        groups.entry(key).or_default().push(value);
    }
    groups
        .into_par_iter()
        .filter_map(|(key, values)| median(&values).map(|m| (key, m)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_quantiles_interpolate() {
        let q = quantiles(&[1.0, 2.0, 3.0, 4.0], &[0.25, 0.5, 0.75]).unwrap();
        assert!(close(q[0], 1.75));
        assert!(close(q[1], 2.5));
        assert!(close(q[2], 3.25));
        assert_eq!(quantiles(&[], &[0.5]), None);
        assert_eq!(quantiles(&[7.0], &[0.25, 0.75]), Some(vec![7.0, 7.0]));
    }

    #[test]
    fn test_spread() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(close(mean(&v).unwrap(), 5.0));
        assert!(close(population_std_dev(&v).unwrap(), 2.0));
        assert!(close(sample_variance(&v).unwrap(), 32.0 / 7.0));
        assert_eq!(sample_variance(&[1.0]), None);
    }

    #[test]
    fn test_pearson() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!(close(pearson(&xs, &[2.0, 4.0, 6.0, 8.0]).unwrap(), 1.0));
        assert!(close(pearson(&xs, &[8.0, 6.0, 4.0, 2.0]).unwrap(), -1.0));
        assert_eq!(pearson(&xs, &[1.0, 1.0, 1.0, 1.0]), None);
        assert_eq!(pearson(&[1.0], &[1.0]), None);
    }

    #[test]
    fn test_group_medians() {
        let medians = group_medians([("a", 1.0), ("b", 10.0), ("a", 3.0), ("a", 2.0)]);
        assert_eq!(medians.get("a"), Some(&2.0));
        assert_eq!(medians.get("b"), Some(&10.0));
    }
}
