//! Per-epoch training controls driven by validation metrics.

/// Signals a stop once validation loss has not improved for `patience` epochs
#[derive(Debug)]
pub struct EarlyStopping {
    patience: usize,
    best: f32,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f32::INFINITY,
            wait: 0,
        }
    }

    /// Record an epoch's validation loss. Returns true when training should stop.
    pub fn update(&mut self, loss: f32) -> bool {
        if loss < self.best {
            self.best = loss;
            self.wait = 0;
            return false;
        }
        self.wait += 1;
        self.wait >= self.patience
    }
}

/// Cuts the learning rate when validation loss plateaus
#[derive(Debug)]
pub struct ReduceLrOnPlateau {
    factor: f64,
    patience: usize,
    min_lr: f64,
    min_delta: f32,
    best: f32,
    wait: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(factor: f64, patience: usize, min_lr: f64) -> Self {
        Self {
            factor,
            patience,
            min_lr,
            min_delta: 1e-4,
            best: f32::INFINITY,
            wait: 0,
        }
    }

    /// Record an epoch's validation loss. Returns the new learning rate when it should change.
    pub fn update(&mut self, loss: f32, current_lr: f64) -> Option<f64> {
        if loss < self.best - self.min_delta {
            self.best = loss;
            self.wait = 0;
            return None;
        }

        self.wait += 1;
        if self.wait < self.patience || current_lr <= self.min_lr {
            return None;
        }

        self.wait = 0;
        Some((current_lr * self.factor).max(self.min_lr))
    }
}

/// Tracks the best validation accuracy seen; only strict improvements are saved
#[derive(Debug, Default)]
pub struct BestCheckpoint {
    best: Option<f32>,
}

impl BestCheckpoint {
    /// Returns true when `accuracy` beats every previous epoch.
    pub fn improved(&mut self, accuracy: f32) -> bool {
        match self.best {
            Some(best) if accuracy <= best => false,
            _ => {
                self.best = Some(accuracy);
                true
            }
        }
    }

    pub fn best(&self) -> Option<f32> {
        self.best
    }
}
