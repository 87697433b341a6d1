use std::collections::VecDeque;

/// Mean of the last `window` recorded values.
#[derive(Clone, Debug)]
pub struct MovingAverager {
    values: VecDeque<f32>,
    window: usize,
}

impl MovingAverager {
    pub fn new(window: usize) -> Self {
        MovingAverager {
            values: VecDeque::with_capacity(window),
            window,
        }
    }

    /// Record a value, dropping the oldest one once the window is full.
    pub fn append(&mut self, value: f32) {
        if self.window == 0 {
            return;
        }
        if self.values.len() >= self.window {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Arithmetic mean of the values currently held, `None` before the first append.
    pub fn average(&self) -> Option<f32> {
        if self.values.is_empty() {
            return None;
        }
        let sum: f64 = self.values.iter().map(|&v| v as f64).sum();
        Some((sum / self.values.len() as f64) as f32)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.window
    }

    pub fn window(&self) -> usize {
        self.window
    }
}
