//! Block-average resampling of fixed-step series.

/// Collapse every `ratio` consecutive samples into one.
///
/// Each block becomes the mean of its non-null samples, or `None` when the
/// whole block is null. A trailing partial block averages what it has.
/// A ratio of 0 or 1 returns the series unchanged.
pub fn resample(series: &[Option<f64>], ratio: usize) -> Vec<Option<f64>> {
    if ratio <= 1 {
        return series.to_vec();
    }

    series
        .chunks(ratio)
        .map(|block| {
            let (sum, count) = block
                .iter()
                .flatten()
                .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
            (count > 0).then(|| sum / count as f64)
        })
        .collect()
}

/// Grouping factor between two steps: how many fine samples fit in one
/// coarse sample, rounded up.
pub fn step_ratio(coarse: i64, fine: i64) -> usize {
    if fine <= 0 || coarse <= fine {
        return 1;
    }
    ((coarse + fine - 1) / fine) as usize
}
