//! Rolling price-tick indicators shared by the ladder and single-position
//! strategies: a bounded window plus ATR/MA/Bollinger/RSI estimators
//! derived from it. Strategies only observe price ticks, not OHLC klines,
//! so ATR here is approximated from rolling tick-to-tick volatility rather
//! than true high-low-close ranges.

use std::collections::VecDeque;

use rust_decimal::Decimal;

pub struct RollingWindow {
    buf: VecDeque<Decimal>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self { buf: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, price: Decimal) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(price);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn last(&self) -> Option<Decimal> {
        self.buf.back().copied()
    }

    pub fn mean(&self) -> Option<Decimal> {
        if self.buf.is_empty() {
            return None;
        }
        Some(self.buf.iter().sum::<Decimal>() / Decimal::from(self.buf.len()))
    }

    /// Mean of `|price[i] - price[i-1]| / price[i-1] * 100`, an ATR-percent
    /// surrogate built from consecutive tick deltas.
    pub fn atr_pct(&self) -> Option<Decimal> {
        if self.buf.len() < 2 {
            return None;
        }
        let mut total = Decimal::ZERO;
        let mut count = 0u32;
        for pair in self.buf.iter().collect::<Vec<_>>().windows(2) {
            let (prev, cur) = (*pair[0], *pair[1]);
            if prev.is_zero() {
                continue;
            }
            total += ((cur - prev) / prev).abs() * Decimal::from(100);
            count += 1;
        }
        if count == 0 {
            return None;
        }
        Some(total / Decimal::from(count))
    }

    /// Simple moving average over the last `n` entries (or the whole
    /// window if shorter).
    pub fn sma(&self, n: usize) -> Option<Decimal> {
        if self.buf.is_empty() {
            return None;
        }
        let take = n.min(self.buf.len());
        let sum: Decimal = self.buf.iter().rev().take(take).sum();
        Some(sum / Decimal::from(take))
    }

    pub fn max(&self) -> Option<Decimal> {
        self.buf.iter().copied().reduce(|a, b| if b > a { b } else { a })
    }

    pub fn stdev(&self) -> Option<Decimal> {
        let mean = self.mean()?;
        if self.buf.len() < 2 {
            return None;
        }
        let variance: Decimal =
            self.buf.iter().map(|p| (*p - mean) * (*p - mean)).sum::<Decimal>() / Decimal::from(self.buf.len());
        Some(sqrt_decimal(variance))
    }

    pub fn bollinger(&self, k: Decimal) -> Option<(Decimal, Decimal, Decimal)> {
        let mid = self.mean()?;
        let sd = self.stdev()?;
        Some((mid - sd * k, mid, mid + sd * k))
    }

    /// Wilder-style RSI over the whole window.
    pub fn rsi(&self) -> Option<Decimal> {
        if self.buf.len() < 2 {
            return None;
        }
        let mut gain = Decimal::ZERO;
        let mut loss = Decimal::ZERO;
        for pair in self.buf.iter().collect::<Vec<_>>().windows(2) {
            let delta = *pair[1] - *pair[0];
            if delta >= Decimal::ZERO {
                gain += delta;
            } else {
                loss -= delta;
            }
        }
        if gain + loss == Decimal::ZERO {
            return Some(Decimal::from(50));
        }
        if loss == Decimal::ZERO {
            return Some(Decimal::from(100));
        }
        let rs = gain / loss;
        Some(Decimal::from(100) - Decimal::from(100) / (Decimal::ONE + rs))
    }
}

/// Integer power for `Decimal` (the `maths` feature gating `Decimal::powi`
/// isn't enabled in this workspace, so the ladder strategies' geometric
/// scale factors go through this instead).
pub fn pow_decimal(base: Decimal, exp: u32) -> Decimal {
    let mut result = Decimal::ONE;
    for _ in 0..exp {
        result *= base;
    }
    result
}

/// Newton's method square root for `Decimal` (no native `sqrt` on the type).
fn sqrt_decimal(value: Decimal) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let mut guess = value;
    for _ in 0..40 {
        guess = (guess + value / guess) / Decimal::from(2);
    }
    guess
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sma_uses_most_recent_n() {
        let mut w = RollingWindow::new(10);
        for p in [dec!(1), dec!(2), dec!(3), dec!(4)] {
            w.push(p);
        }
        assert_eq!(w.sma(2), Some(dec!(3.5)));
    }

    #[test]
    fn rsi_is_100_with_no_losses() {
        let mut w = RollingWindow::new(10);
        for p in [dec!(1), dec!(2), dec!(3), dec!(4)] {
            w.push(p);
        }
        assert_eq!(w.rsi(), Some(dec!(100)));
    }

    #[test]
    fn window_evicts_oldest_past_capacity() {
        let mut w = RollingWindow::new(2);
        w.push(dec!(1));
        w.push(dec!(2));
        w.push(dec!(3));
        assert_eq!(w.len(), 2);
        assert_eq!(w.last(), Some(dec!(3)));
    }
}
