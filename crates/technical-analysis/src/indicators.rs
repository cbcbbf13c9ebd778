use analysis_core::stats;
use analysis_core::PricePoint;

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result.push(sum / period as f64);
    }
    result
}

/// Exponential Moving Average, seeded with the SMA of the first `period` values.
/// Element `j` of the output lines up with `data[period - 1 + j]`.
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(data.len() - period + 1);
    let mut prev = data[..period].iter().sum::<f64>() / period as f64;
    result.push(prev);

    for &value in &data[period..] {
        prev = (value - prev) * multiplier + prev;
        result.push(prev);
    }

    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

/// Relative Strength Index (Wilder smoothing)
pub fn rsi(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period + 1 {
        return vec![];
    }

    let changes: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| if c > 0.0 { c } else { 0.0 };
    let loss = |c: f64| if c < 0.0 { -c } else { 0.0 };

    let mut avg_gain = changes[..period].iter().map(|&c| gain(c)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|&c| loss(c)).sum::<f64>() / period as f64;

    let mut rsi_values = Vec::with_capacity(changes.len() - period + 1);
    rsi_values.push(rsi_from_averages(avg_gain, avg_loss));

    for &change in &changes[period..] {
        avg_gain = (avg_gain * (period - 1) as f64 + gain(change)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss(change)) / period as f64;
        rsi_values.push(rsi_from_averages(avg_gain, avg_loss));
    }

    rsi_values
}

/// MACD (Moving Average Convergence Divergence)
pub struct MacdResult {
    pub macd_line: Vec<f64>,
    pub signal_line: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(data: &[f64], fast_period: usize, slow_period: usize, signal_period: usize) -> MacdResult {
    let empty = MacdResult { macd_line: vec![], signal_line: vec![], histogram: vec![] };
    if fast_period == 0 || signal_period == 0 || slow_period <= fast_period || data.len() < slow_period {
        return empty;
    }

    let ema_fast = ema(data, fast_period);
    let ema_slow = ema(data, slow_period);

    // ema_fast[j] aligns with data[fast - 1 + j]; ema_slow[j] with data[slow - 1 + j]
    let offset = slow_period - fast_period;
    let macd_line: Vec<f64> = ema_slow
        .iter()
        .enumerate()
        .map(|(j, slow)| ema_fast[j + offset] - slow)
        .collect();

    let signal_line = ema(&macd_line, signal_period);
    let histogram: Vec<f64> = signal_line
        .iter()
        .enumerate()
        .map(|(k, signal)| macd_line[k + signal_period - 1] - signal)
        .collect();

    MacdResult {
        macd_line,
        signal_line,
        histogram,
    }
}

/// Bollinger Bands
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger_bands(data: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    if period == 0 || data.len() < period {
        return BollingerBands { upper: vec![], middle: vec![], lower: vec![] };
    }

    let middle = sma(data, period);
    let mut upper = Vec::with_capacity(middle.len());
    let mut lower = Vec::with_capacity(middle.len());

    for i in period - 1..data.len() {
        let slice = &data[i + 1 - period..=i];
        let mean = middle[i + 1 - period];
        let variance: f64 = slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let std = variance.sqrt();

        upper.push(mean + std_dev * std);
        lower.push(mean - std_dev * std);
    }

    BollingerBands {
        upper,
        middle,
        lower,
    }
}

fn true_range(current: &PricePoint, previous: &PricePoint) -> f64 {
    let high_low = current.high - current.low;
    let high_close = (current.high - previous.close).abs();
    let low_close = (current.low - previous.close).abs();
    high_low.max(high_close).max(low_close)
}

/// Average True Range
pub fn atr(prices: &[PricePoint], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period + 1 {
        return vec![];
    }

    let true_ranges: Vec<f64> = prices.windows(2).map(|w| true_range(&w[1], &w[0])).collect();

    let mut atr_values = Vec::with_capacity(true_ranges.len() - period + 1);
    let mut atr = true_ranges[..period].iter().sum::<f64>() / period as f64;
    atr_values.push(atr);

    for tr in &true_ranges[period..] {
        atr = (atr * (period - 1) as f64 + tr) / period as f64;
        atr_values.push(atr);
    }

    atr_values
}

/// Average Directional Index (ADX), trend strength on a 0-100 scale
pub struct AdxResult {
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
}

pub fn adx(prices: &[PricePoint], period: usize) -> AdxResult {
    if period == 0 || prices.len() < period * 2 {
        return AdxResult { adx: vec![], plus_di: vec![], minus_di: vec![] };
    }

    let mut plus_dm = Vec::with_capacity(prices.len() - 1);
    let mut minus_dm = Vec::with_capacity(prices.len() - 1);
    let mut true_ranges = Vec::with_capacity(prices.len() - 1);

    for w in prices.windows(2) {
        let up_move = w[1].high - w[0].high;
        let down_move = w[0].low - w[1].low;

        plus_dm.push(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
        minus_dm.push(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });
        true_ranges.push(true_range(&w[1], &w[0]));
    }

    // Wilder smoothing, seeded with the plain sum of the first period
    let mut smoothed_plus_dm = plus_dm[..period].iter().sum::<f64>();
    let mut smoothed_minus_dm = minus_dm[..period].iter().sum::<f64>();
    let mut smoothed_tr = true_ranges[..period].iter().sum::<f64>();

    let mut plus_di_values = Vec::new();
    let mut minus_di_values = Vec::new();
    let mut dx_values = Vec::new();

    for i in period - 1..plus_dm.len() {
        if i >= period {
            smoothed_plus_dm = smoothed_plus_dm - smoothed_plus_dm / period as f64 + plus_dm[i];
            smoothed_minus_dm = smoothed_minus_dm - smoothed_minus_dm / period as f64 + minus_dm[i];
            smoothed_tr = smoothed_tr - smoothed_tr / period as f64 + true_ranges[i];
        }

        let pdi = if smoothed_tr > 0.0 { 100.0 * smoothed_plus_dm / smoothed_tr } else { 0.0 };
        let mdi = if smoothed_tr > 0.0 { 100.0 * smoothed_minus_dm / smoothed_tr } else { 0.0 };

        plus_di_values.push(pdi);
        minus_di_values.push(mdi);

        let di_sum = pdi + mdi;
        let dx = if di_sum > 0.0 { 100.0 * (pdi - mdi).abs() / di_sum } else { 0.0 };
        dx_values.push(dx);
    }

    if dx_values.len() < period {
        return AdxResult { adx: vec![], plus_di: plus_di_values, minus_di: minus_di_values };
    }

    let mut adx_values = Vec::new();
    let mut adx_val = dx_values[..period].iter().sum::<f64>() / period as f64;
    adx_values.push(adx_val);

    for dx in &dx_values[period..] {
        adx_val = (adx_val * (period - 1) as f64 + dx) / period as f64;
        adx_values.push(adx_val);
    }

    AdxResult {
        adx: adx_values,
        plus_di: plus_di_values,
        minus_di: minus_di_values,
    }
}

/// Simple returns between consecutive closes
pub fn returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Sample standard deviation of simple returns over the last `lookback` returns.
/// `None` when fewer than `lookback + 1` closes are available.
pub fn returns_std_dev(closes: &[f64], lookback: usize) -> Option<f64> {
    if lookback < 2 || closes.len() < lookback + 1 {
        return None;
    }
    let window = &closes[closes.len() - lookback - 1..];
    Some(stats::std_dev(&returns(window)))
}
