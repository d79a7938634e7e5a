//! Hurst exponent estimation via rescaled-range (R/S) analysis.
//!
//! The return series is split into non-overlapping chunks at doubling
//! sizes; each chunk contributes its range of mean-adjusted cumulative
//! deviations divided by its standard deviation. The Hurst estimate is the
//! least-squares slope of log(R/S) against log(chunk size).
//!
//! Degenerate inputs (too short, zero variance, no usable chunks) yield the
//! neutral 0.5 rather than an error; callers gate history length themselves.

const MIN_CHUNK: usize = 8;

pub fn estimate(returns: &[f64]) -> f64 {
    let n = returns.len();
    if n < 2 * MIN_CHUNK {
        return 0.5;
    }

    let mean = returns.iter().sum::<f64>() / n as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n as f64;
    if var < 1e-18 {
        return 0.5;
    }

    let mut points: Vec<(f64, f64)> = Vec::new();
    let mut size = MIN_CHUNK;
    while size <= n / 2 {
        if let Some(rs) = average_rescaled_range(returns, size) {
            if rs > 0.0 {
                points.push(((size as f64).ln(), rs.ln()));
            }
        }
        size *= 2;
    }

    if points.len() < 2 {
        return 0.5;
    }

    slope(&points).clamp(0.0, 1.0)
}

/// Mean R/S over all full chunks of `size` elements.
fn average_rescaled_range(returns: &[f64], size: usize) -> Option<f64> {
    let chunk_count = returns.len() / size;
    let mut sum = 0.0;
    let mut used = 0usize;

    for k in 0..chunk_count {
        let chunk = &returns[k * size..(k + 1) * size];
        let mean = chunk.iter().sum::<f64>() / size as f64;

        let mut cum = 0.0;
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut sq = 0.0;
        for &r in chunk {
            let dev = r - mean;
            cum += dev;
            min = min.min(cum);
            max = max.max(cum);
            sq += dev * dev;
        }

        let std = (sq / size as f64).sqrt();
        if std > 0.0 {
            sum += (max - min) / std;
            used += 1;
        }
    }

    (used > 0).then(|| sum / used as f64)
}

fn slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in points {
        num += (x - mean_x) * (y - mean_y);
        den += (x - mean_x) * (x - mean_x);
    }
    if den == 0.0 { 0.5 } else { num / den }
}
