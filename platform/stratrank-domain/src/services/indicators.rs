use std::collections::VecDeque;

/// Rolling mean that reports partial windows (at least one sample).
#[derive(Debug, Clone)]
pub struct RollingMean {
    window: usize,
    buf: VecDeque<f64>,
    sum: f64,
}

impl RollingMean {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            buf: VecDeque::new(),
            sum: 0.0,
        }
    }

    pub fn update(&mut self, value: f64) -> f64 {
        self.buf.push_back(value);
        self.sum += value;
        while self.buf.len() > self.window {
            if let Some(front) = self.buf.pop_front() {
                self.sum -= front;
            }
        }
        self.sum / self.buf.len() as f64
    }
}

/// Exponential moving average seeded with the simple mean of the first `period` values.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: f64,
    seen: usize,
    seed_sum: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            seen: 0,
            seed_sum: 0.0,
            value: None,
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.seen += 1;
        match self.value {
            Some(prev) => {
                let next = self.alpha * value + (1.0 - self.alpha) * prev;
                self.value = Some(next);
            }
            None => {
                self.seed_sum += value;
                if self.seen == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }
}

/// Relative strength index over running moving averages (RMA) of gains and losses.
///
/// Each average is an adjusted exponential mean with `alpha = 1 / period`: every
/// observed change is weighted by `(1 - alpha)^age` and divided by the sum of the
/// weights, with no simple-mean seed. The shared weight sum cancels in the ratio, so
/// only the decayed sums are kept. Defined once `period` changes have been seen; a
/// window without any movement has no value.
#[derive(Debug, Clone)]
pub struct RmaRsi {
    period: usize,
    decay: f64,
    prev_close: Option<f64>,
    changes: usize,
    gain_sum: f64,
    loss_sum: f64,
}

impl RmaRsi {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            decay: 1.0 - 1.0 / period as f64,
            prev_close: None,
            changes: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close)?;

        let diff = close - prev;
        self.gain_sum = diff.max(0.0) + self.decay * self.gain_sum;
        self.loss_sum = (-diff).max(0.0) + self.decay * self.loss_sum;
        self.changes += 1;

        let total = self.gain_sum + self.loss_sum;
        if self.changes < self.period || total == 0.0 {
            return None;
        }
        Some(100.0 * self.gain_sum / total)
    }
}

#[cfg(test)]
mod tests {
    use super::{Ema, RmaRsi, RollingMean};

    #[test]
    fn rolling_mean_reports_partial_windows() {
        let mut mean = RollingMean::new(3);
        assert_eq!(mean.update(3.0), 3.0);
        assert_eq!(mean.update(5.0), 4.0);
        assert_eq!(mean.update(7.0), 5.0);
        assert_eq!(mean.update(9.0), 7.0);
    }

    #[test]
    fn ema_is_seeded_with_simple_mean() {
        let mut ema = Ema::new(3);
        assert_eq!(ema.update(1.0), None);
        assert_eq!(ema.update(2.0), None);
        assert_eq!(ema.update(3.0), Some(2.0));
        // alpha = 0.5
        assert_eq!(ema.update(6.0), Some(4.0));
    }

    #[test]
    fn rsi_needs_period_changes() {
        let mut rsi = RmaRsi::new(2);
        assert_eq!(rsi.update(10.0), None);
        assert_eq!(rsi.update(11.0), None);
        assert_eq!(rsi.update(10.5), Some(50.0));
        // gains 1.0 + 0.25, losses 0.25
        let value = rsi.update(11.5).expect("defined");
        assert!((value - 83.333_333_333).abs() < 1e-6);
    }

    #[test]
    fn rsi_weights_every_change_from_the_start() {
        let mut rsi = RmaRsi::new(3);
        let mut values = Vec::new();
        for close in [10.0, 9.0, 8.0, 7.0, 6.0, 7.0] {
            values.push(rsi.update(close));
        }
        assert!(values[..3].iter().all(Option::is_none));
        assert_eq!(values[3], Some(0.0));
        // one gain against four losses decayed by (2/3)^1..4
        let value = values[5].expect("defined");
        assert!((value - 8_100.0 / 211.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_of_flat_series_is_undefined() {
        let mut rsi = RmaRsi::new(3);
        let mut last = Some(0.0);
        for _ in 0..6 {
            last = rsi.update(10.0);
        }
        assert_eq!(last, None);
    }

    #[test]
    fn rsi_is_bounded() {
        let mut rsi = RmaRsi::new(4);
        for close in [10.0, 12.0, 9.0, 15.0, 14.0, 20.0, 1.0, 30.0] {
            if let Some(value) = rsi.update(close) {
                assert!((0.0..=100.0).contains(&value));
            }
        }
    }
}
