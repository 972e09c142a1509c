use analysis_core::{Bar, FeatureRow};

use crate::indicators::*;

pub const MA_SHORT: usize = 20;
pub const MA_LONG: usize = 200;
pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const ATR_PERIOD: usize = 14;
pub const VOLUME_WINDOW: usize = 20;

/// Compute one feature row per bar.
///
/// `bars` must be ascending by timestamp and belong to a single
/// (instrument, timeframe). The output is parallel to the input. Every value
/// passes through [`finite`], so a stored row never carries NaN or infinity.
pub fn compute_features(bars: &[Bar]) -> Vec<FeatureRow> {
    if bars.is_empty() {
        return Vec::new();
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    let ma20 = sma(&closes, MA_SHORT);
    let ma200 = sma(&closes, MA_LONG);
    let rsi14 = rsi(&closes, RSI_PERIOD);
    let macd_result = macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    let atr14 = atr(bars, ATR_PERIOD);
    let vol20_mean = sma(&volumes, VOLUME_WINDOW);
    let vol20_ratio = ratio(&volumes, &vol20_mean);

    let clean = |v: Option<f64>| v.and_then(finite);

    bars.iter()
        .enumerate()
        .map(|(i, bar)| FeatureRow {
            timestamp: bar.timestamp,
            ma20: clean(ma20[i]),
            ma200: clean(ma200[i]),
            rsi14: clean(rsi14[i]),
            macd: clean(macd_result.macd_line[i]),
            macd_signal: clean(macd_result.signal_line[i]),
            atr14: clean(atr14[i]),
            vol20_mean: clean(vol20_mean[i]),
            vol20_ratio: clean(vol20_ratio[i]),
        })
        .collect()
}
