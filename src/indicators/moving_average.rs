/// Smoothing factor for an EWMA with the given span
pub fn ewma_alpha(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Exponentially weighted moving average over the whole series
///
/// Recursive form seeded with the first value (no warm-up bias correction),
/// so the output has the same length as the input.
pub fn ewma_series(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = ewma_alpha(span);
    let mut out = Vec::with_capacity(values.len());

    let mut iter = values.iter();
    if let Some(&first) = iter.next() {
        let mut ema = first;
        out.push(ema);
        for &value in iter {
            ema = alpha * value + (1.0 - alpha) * ema;
            out.push(ema);
        }
    }

    out
}
