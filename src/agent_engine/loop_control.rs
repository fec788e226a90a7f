/// Bounds on one agent run. The perception-action loop has no natural
/// in-band limit, so the controller enforces one out of band.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoopConfig {
    /// Maximum perception-action iterations before the run is stopped.
    pub max_iterations: Option<u32>,
    /// Maximum failed observations before the run is stopped.
    pub max_failures: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: Some(40),
            max_failures: Some(5),
        }
    }
}

impl LoopConfig {
    /// No bounds at all. The loop then terminates only on an explicit stop
    /// or an empty action batch.
    pub fn unbounded() -> Self {
        Self {
            max_iterations: None,
            max_failures: None,
        }
    }
}

pub struct LoopController {
    config: LoopConfig,
    iterations: u32,
    failure_count: u32,
}

impl LoopController {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            iterations: 0,
            failure_count: 0,
        }
    }

    pub fn begin_iteration(&mut self) {
        self.iterations += 1;
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn should_stop(&self) -> bool {
        if let Some(max_iter) = self.config.max_iterations {
            if self.iterations >= max_iter {
                return true;
            }
        }
        if let Some(max_fail) = self.config.max_failures {
            if self.failure_count >= max_fail {
                return true;
            }
        }
        false
    }
}
