/// Exponentially weighted mean with bias-adjusted weights
///
/// Output `t` is `Σ (1-α)^i · x[t-i] / Σ (1-α)^i` over every observation seen so
/// far, so the first output equals the first input and early outputs are
/// weighted averages of the short history. Positions with fewer than
/// `min_periods` observations are `None`.
pub fn ewm_mean(values: &[f64], alpha: f64, min_periods: usize) -> Vec<Option<f64>> {
    let decay = 1.0 - alpha;
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            weighted_sum = value + decay * weighted_sum;
            weight_total = 1.0 + decay * weight_total;
            (i + 1 >= min_periods).then(|| weighted_sum / weight_total)
        })
        .collect()
}

/// Smoothing factor for a span-parameterised EMA
pub fn alpha_from_span(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Smoothing factor for a centre-of-mass parameterised EMA
pub fn alpha_from_com(com: f64) -> f64 {
    1.0 / (1.0 + com)
}

/// Calculate Exponential Moving Average (EMA) for every position of `values`
pub fn calculate_ema_series(values: &[f64], span: usize) -> Vec<f64> {
    ewm_mean(values, alpha_from_span(span), 1)
        .into_iter()
        .flatten()
        .collect()
}
