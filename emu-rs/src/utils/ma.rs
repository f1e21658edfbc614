use crate::Real;
use getset::CopyGetters;
use std::collections::VecDeque;

/// A trailing moving average over the last `window` observations.
///
/// Before the window is full the mean is taken over the observations seen so
/// far.
#[derive(Debug, Default, Clone, PartialEq, CopyGetters)]
pub struct Window {
    #[getset(get_copy = "pub")]
    window: usize,
    buffer: VecDeque<Real>,
}

impl Window {
    /// Create an empty window. A zero-sized window is treated as size 1.
    pub fn new(n: usize) -> Window {
        let window = n.max(1);
        Window {
            window,
            buffer: VecDeque::with_capacity(window),
        }
    }

    /// Add single observation of value x
    pub fn add(&mut self, x: Real) {
        if self.buffer.len() == self.window {
            self.buffer.pop_front();
        }
        self.buffer.push_back(x);
    }

    /// Add many observations in order.
    pub fn add_many(&mut self, xs: impl IntoIterator<Item = Real>) {
        for x in xs {
            self.add(x);
        }
    }

    pub fn mean(&self) -> Real {
        let tot: Real = self.buffer.iter().sum();
        tot / self.buffer.len() as Real
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Trailing moving average of `data`, using `history` (oldest first) to fill
/// the window at the start of the series.
pub fn moving_average(history: &[Real], data: &[Real], n: usize) -> Vec<Real> {
    let mut w = Window::new(n);
    let skip = history.len().saturating_sub(w.window() - 1);
    w.add_many(history[skip..].iter().cloned());
    data.iter()
        .map(|&x| {
            w.add(x);
            w.mean()
        })
        .collect()
}
