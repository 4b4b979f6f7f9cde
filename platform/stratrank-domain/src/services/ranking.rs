use std::cmp::Ordering;

/// Two-sided 95% normal quantile.
pub const Z_95: f64 = 1.96;

/// Wilson score lower bound of a success proportion `p` observed over `n` trials,
/// clamped to `[0, 1]`.
pub fn wilson_lower_bound(p: f64, n: u64) -> f64 {
    wilson_lower_bound_with_z(p, n, Z_95)
}

pub fn wilson_lower_bound_with_z(p: f64, n: u64, z: f64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let z2 = z * z;
    let centre = p + z2 / (2.0 * n);
    let margin = z * ((p * (1.0 - p) + z2 / (4.0 * n)) / n).sqrt();
    ((centre - margin) / (1.0 + z2 / n)).clamp(0.0, 1.0)
}

pub fn expectancy(total_return: f64, trade_count: u64) -> f64 {
    if trade_count == 0 {
        0.0
    } else {
        total_return / trade_count as f64
    }
}

/// Keeps the `capacity` highest-scoring items seen so far.
///
/// Ties never displace an earlier entry.
#[derive(Debug, Clone)]
pub struct TopN<T> {
    capacity: usize,
    entries: Vec<(f64, T)>,
}

impl<T> TopN<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns whether `item` was kept.
    pub fn offer(&mut self, score: f64, item: T) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.entries.len() < self.capacity {
            self.entries.push((score, item));
            return true;
        }

        let mut min_idx = 0;
        for (idx, (entry_score, _)) in self.entries.iter().enumerate().skip(1) {
            if *entry_score < self.entries[min_idx].0 {
                min_idx = idx;
            }
        }
        if score > self.entries[min_idx].0 {
            self.entries.remove(min_idx);
            self.entries.push((score, item));
            true
        } else {
            false
        }
    }

    /// Entries by descending score; equal scores keep insertion order.
    pub fn into_sorted(self) -> Vec<(f64, T)> {
        let mut entries = self.entries;
        entries.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        entries
    }
}
