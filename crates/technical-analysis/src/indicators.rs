//! Indicator primitives.
//!
//! Every series returned here is aligned 1:1 with its input: position `i`
//! describes the bar at position `i`, and `None` marks warmup rows where the
//! indicator is not yet defined.

use analysis_core::Bar;

/// Simple Moving Average over a growing-then-full window.
///
/// Uses however many values are available when fewer than `period` exist, so
/// the first element is the first value itself and nothing is ever `None`
/// for a non-empty input.
pub fn sma(data: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; data.len()];
    }

    let mut result = Vec::with_capacity(data.len());
    let mut window_sum = 0.0;
    for i in 0..data.len() {
        window_sum += data[i];
        if i >= period {
            window_sum -= data[i - period];
        }
        let count = (i + 1).min(period);
        result.push(Some(window_sum / count as f64));
    }
    result
}

/// Exponential Moving Average, seeded with the SMA of the first `period` values
pub fn ema(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut prev = data[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = Some(prev);

    for i in period..data.len() {
        prev = (data[i] - prev) * multiplier + prev;
        result[i] = Some(prev);
    }

    result
}

/// EMA over a partially defined series: leading `None`s are skipped and the
/// EMA is computed over the defined tail, keeping alignment.
fn ema_of_defined(data: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let first = match data.iter().position(|v| v.is_some()) {
        Some(idx) => idx,
        None => return vec![None; data.len()],
    };
    let tail: Vec<f64> = data[first..].iter().map(|v| v.unwrap_or(f64::NAN)).collect();

    let mut result = vec![None; first];
    result.extend(ema(&tail, period));
    result
}

/// Relative Strength Index with Wilder smoothing.
///
/// The first value appears once `period` price changes exist (position
/// `period`). A window with no movement at all reads 50.
pub fn rsi(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period + 1 {
        return result;
    }

    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);

    for i in 1..data.len() {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(change.abs());
        }
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    result[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        result[i + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return 50.0;
        }
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// MACD (Moving Average Convergence Divergence)
pub struct MacdResult {
    pub macd_line: Vec<Option<f64>>,
    pub signal_line: Vec<Option<f64>>,
}

/// MACD line is `EMA(fast) - EMA(slow)`; the signal line is an EMA of the
/// MACD line over `signal_period`, starting from the first defined MACD value.
pub fn macd(data: &[f64], fast_period: usize, slow_period: usize, signal_period: usize) -> MacdResult {
    if fast_period == 0 || slow_period == 0 || signal_period == 0 || slow_period < fast_period {
        return MacdResult {
            macd_line: vec![None; data.len()],
            signal_line: vec![None; data.len()],
        };
    }

    let ema_fast = ema(data, fast_period);
    let ema_slow = ema(data, slow_period);

    let macd_line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(fast, slow)| match (fast, slow) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let signal_line = ema_of_defined(&macd_line, signal_period);

    MacdResult { macd_line, signal_line }
}

/// Average True Range with Wilder smoothing.
///
/// True range needs the previous close, so the first ATR appears at position
/// `period`.
pub fn atr(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; bars.len()];
    if period == 0 || bars.len() < period + 1 {
        return result;
    }

    let mut true_ranges = Vec::with_capacity(bars.len() - 1);

    for i in 1..bars.len() {
        let high_low = bars[i].high - bars[i].low;
        let high_close = (bars[i].high - bars[i - 1].close).abs();
        let low_close = (bars[i].low - bars[i - 1].close).abs();

        let tr = high_low.max(high_close).max(low_close);
        true_ranges.push(tr);
    }

    let mut atr = true_ranges[..period].iter().sum::<f64>() / period as f64;
    result[period] = Some(atr);

    for i in period..true_ranges.len() {
        atr = (atr * (period - 1) as f64 + true_ranges[i]) / period as f64;
        result[i + 1] = Some(atr);
    }

    result
}

/// Current value divided by a reference series, position by position
pub fn ratio(values: &[f64], reference: &[Option<f64>]) -> Vec<Option<f64>> {
    values
        .iter()
        .zip(reference.iter())
        .map(|(v, r)| r.and_then(|r| finite(v / r)))
        .collect()
}

/// Drop NaN and infinities.
pub fn finite(value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}
