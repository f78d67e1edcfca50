use std::time::Duration;

/// What `submit` does when a bounded intake queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueuePolicy {
    /// Wait until a worker frees a slot.
    #[default]
    Block,
    /// Fail immediately with `ResourceExhausted`.
    Reject,
}

impl std::str::FromStr for QueuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(QueuePolicy::Block),
            "reject" => Ok(QueuePolicy::Reject),
            other => Err(format!("unknown queue policy: {}", other)),
        }
    }
}

/// Tolerances and limits for the adaptive integrator.
///
/// Defaults match the tolerances of the classic LSODA driver
/// (`sqrt(f64::EPSILON)` for both relative and absolute error).
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratorConfig {
    /// Relative error tolerance per step.
    pub rtol: f64,
    /// Absolute error tolerance per step.
    pub atol: f64,
    /// Maximum accepted plus rejected steps between two mesh points.
    pub max_steps_per_interval: usize,
    /// First trial step. Chosen automatically when `None`.
    pub initial_step: Option<f64>,
    /// Wall-clock budget for a whole solve. No limit when `None`.
    pub solve_timeout: Option<Duration>,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            rtol: 1.49012e-8,
            atol: 1.49012e-8,
            max_steps_per_interval: 100_000,
            initial_step: None,
            solve_timeout: None,
        }
    }
}

impl IntegratorConfig {
    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    pub fn with_solve_timeout(mut self, timeout: Duration) -> Self {
        self.solve_timeout = Some(timeout);
        self
    }

    pub fn with_max_steps_per_interval(mut self, steps: usize) -> Self {
        self.max_steps_per_interval = steps;
        self
    }
}

/// Data reduction applied by the postprocessor before a trajectory is
/// handed to the visualization layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Keep every `stride`-th mesh sample.
    pub stride: usize,
    /// Number of trailing samples an animation frame draws as a trace.
    pub trace_len: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            stride: 10,
            trace_len: 50,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of concurrent solver workers.
    pub pool_size: usize,
    /// Intake capacity. Unbounded when `None`.
    pub queue_capacity: Option<usize>,
    /// Behaviour of a full bounded intake. Ignored when unbounded.
    pub queue_policy: QueuePolicy,
    pub integrator: IntegratorConfig,
    pub export: ExportConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            queue_capacity: None,
            queue_policy: QueuePolicy::Block,
            integrator: IntegratorConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Default::default()
        }
    }

    pub fn with_queue(mut self, capacity: usize, policy: QueuePolicy) -> Self {
        self.queue_capacity = Some(capacity);
        self.queue_policy = policy;
        self
    }

    pub fn with_integrator(mut self, integrator: IntegratorConfig) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn with_export(mut self, export: ExportConfig) -> Self {
        self.export = export;
        self
    }
}

/// Configuration of the boundary service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub scheduler: SchedulerConfig,
    /// Buffered completion events per subscriber before lagging ones are dropped.
    pub event_buffer: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            event_buffer: 1024,
        }
    }
}
