//! Order statistics over sample collections.

/// Computes the `p`-th percentile of `samples` by linear interpolation
/// between the two closest ranks (the inclusive method).
///
/// Input order does not matter. `p` is clamped to `0..=100`. Returns `None`
/// for an empty input.
pub fn percentile<I>(samples: I, p: f64) -> Option<f64>
where
    I: IntoIterator<Item = i64>,
{
    let mut sorted: Vec<i64> = samples.into_iter().collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_unstable();
    Some(percentile_of_sorted(&sorted, p))
}

/// Interpolates over `sorted`, which callers keep ascending and non-empty.
fn percentile_of_sorted(sorted: &[i64], p: f64) -> f64 {
    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let lo_value = sorted[lo] as f64;
    let hi_value = sorted[hi] as f64;

    lo_value + (hi_value - lo_value) * (rank - lo as f64)
}

/// p50 and p90 of a collection, computed from a single sort.
pub fn p50_p90<I>(samples: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = i64>,
{
    let mut sorted: Vec<i64> = samples.into_iter().collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_unstable();
    Some((
        percentile_of_sorted(&sorted, 50.0),
        percentile_of_sorted(&sorted, 90.0),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_percentile() {
        assert_eq!(percentile(Vec::new(), 50.0), None);
        assert_eq!(p50_p90(Vec::new()), None);
    }

    #[test]
    fn empty_has_no_percentile_at_any_rank() {
        for p in [0.0, 90.0, 100.0, -1.0, f64::NAN] {
            assert_eq!(percentile(std::iter::empty(), p), None);
        }
    }

    #[test]
    fn single_element() {
        assert_eq!(percentile([42], 50.0), Some(42.0));
        assert_eq!(percentile([42], 90.0), Some(42.0));
    }

    #[test]
    fn interpolates_between_ranks() {
        let samples = [10, 20, 30, 40];
        assert_eq!(percentile(samples, 50.0), Some(25.0));
        assert_eq!(percentile(samples, 90.0), Some(37.0));
    }

    #[test]
    fn order_independent() {
        let sorted = [1, 5, 9, 13, 200, 201, 350];
        let shuffled = [201, 9, 350, 1, 13, 200, 5];
        for p in [0.0, 10.0, 50.0, 90.0, 99.0, 100.0] {
            assert_eq!(percentile(sorted, p), percentile(shuffled, p));
        }
    }

    #[test]
    fn extremes_are_min_and_max() {
        let samples = [3, -7, 12, 0];
        assert_eq!(percentile(samples, 0.0), Some(-7.0));
        assert_eq!(percentile(samples, 100.0), Some(12.0));
    }

    #[test]
    fn out_of_range_is_clamped() {
        let samples = [1, 2, 3];
        assert_eq!(percentile(samples, -5.0), Some(1.0));
        assert_eq!(percentile(samples, 150.0), Some(3.0));
    }

    #[test]
    fn odd_length_median_is_middle_element() {
        assert_eq!(percentile([9, 1, 5], 50.0), Some(5.0));
    }

    #[test]
    fn p50_p90_matches_individual_calls() {
        let samples = vec![120, 80, 95, 300, 101, 99];
        let (p50, p90) = p50_p90(samples.clone()).unwrap();
        assert_eq!(Some(p50), percentile(samples.clone(), 50.0));
        assert_eq!(Some(p90), percentile(samples, 90.0));
    }
}
