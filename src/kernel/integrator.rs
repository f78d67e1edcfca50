use std::cell::RefCell;
use std::time::{Duration, Instant};

use ode_solvers::dop_shared::{IntegrationError, OutputType, System};
use ode_solvers::{DVector, Dopri5};

use crate::config::IntegratorConfig;
use crate::error::{GravityError, Result};
use crate::kernel::system::OdeSystem;

// Step controller settings handed to Dopri5.
const SAFETY: f64 = 0.9;
const BETA: f64 = 0.04;
const FAC_MIN: f64 = 0.2;
const FAC_MAX: f64 = 10.0;
const STIFFNESS_CHECK_EVERY: u32 = 1000;

/// Adapts an [`OdeSystem`] to the stepper.
///
/// `System::system` cannot fail, so the first error is parked in `fault`,
/// the derivative is poisoned with NaN and `solout` stops the run.
struct Stepped<'a, S> {
    system: &'a S,
    fault: &'a RefCell<Option<GravityError>>,
    deadline: Option<(Instant, Duration)>,
}

impl<S> Stepped<'_, S> {
    fn record(&self, error: GravityError) {
        let mut fault = self.fault.borrow_mut();
        if fault.is_none() {
            *fault = Some(error);
        }
    }
}

impl<S: OdeSystem> System<f64, DVector<f64>> for Stepped<'_, S> {
    fn system(&self, t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        if let Err(e) = self.system.derivative(t, y.as_slice(), dy.as_mut_slice()) {
            self.record(e);
            dy.fill(f64::NAN);
        }
    }

    fn solout(&mut self, _t: f64, _y: &DVector<f64>, _dy: &DVector<f64>) -> bool {
        if let Some((started, budget)) = self.deadline {
            if started.elapsed() >= budget {
                self.record(GravityError::Timeout(budget));
            }
        }
        self.fault.borrow().is_some()
    }
}

/// Integrate `system` from `y0` at `mesh[0]` and sample the state at every
/// mesh point.
///
/// Returns the trajectory row-major: `mesh.len()` rows of `y0.len()` values.
/// Each mesh interval is one adaptive Dormand–Prince 5(4) run, so every
/// sample lands on its mesh point exactly.
pub fn integrate<S: OdeSystem>(
    system: &S,
    y0: &[f64],
    mesh: &[f64],
    config: &IntegratorConfig,
) -> Result<Vec<f64>> {
    let n = system.state_len();
    if y0.len() != n {
        return Err(GravityError::InvalidProblem(format!(
            "initial state has length {}, system expects {}",
            y0.len(),
            n
        )));
    }
    let Some(&t0) = mesh.first() else {
        return Err(GravityError::InvalidProblem("empty time mesh".to_string()));
    };

    let started = Instant::now();
    let mut out = trajectory_buffer(mesh.len(), n)?;
    out.extend_from_slice(y0);
    if mesh.len() == 1 {
        return Ok(out);
    }

    let mut dy = vec![0.0; n];
    system.derivative(t0, y0, &mut dy)?;
    ensure_finite(&dy, t0)?;

    let fault = RefCell::new(None);
    let deadline = config.solve_timeout.map(|budget| (started, budget));
    let n_max = u32::try_from(config.max_steps_per_interval).unwrap_or(u32::MAX);
    let h0 = config.initial_step.filter(|h| *h > 0.0).unwrap_or(0.0);

    let mut t = t0;
    let mut y = DVector::from_column_slice(y0);
    for &target in &mesh[1..] {
        if target.is_nan() || target <= t {
            return Err(GravityError::InvalidProblem(format!(
                "time mesh is not strictly increasing at t = {}",
                target
            )));
        }

        let span = target - t;
        let mut stepper = Dopri5::from_param(
            Stepped {
                system,
                fault: &fault,
                deadline,
            },
            t,
            target,
            span,
            y,
            config.rtol,
            config.atol,
            SAFETY,
            BETA,
            FAC_MIN,
            FAC_MAX,
            span,
            h0.min(span),
            n_max,
            STIFFNESS_CHECK_EVERY,
            OutputType::Sparse,
        );
        let outcome = stepper.integrate();

        if let Some(e) = fault.borrow_mut().take() {
            return Err(e);
        }
        outcome.map_err(|e| diverged(&e, target))?;

        y = match stepper.y_out().last() {
            Some(last) => last.clone(),
            None => {
                return Err(GravityError::Internal(format!(
                    "stepper produced no output before t = {}",
                    target
                )))
            }
        };
        ensure_finite(y.as_slice(), target)?;
        out.extend_from_slice(y.as_slice());
        t = target;
    }

    Ok(out)
}

/// Room for `rows * width` values, or `InvalidProblem` when that cannot be
/// allocated.
fn trajectory_buffer(rows: usize, width: usize) -> Result<Vec<f64>> {
    let len = rows.checked_mul(width).ok_or_else(|| {
        GravityError::InvalidProblem(format!(
            "trajectory of {} samples by {} values overflows",
            rows, width
        ))
    })?;
    let mut out = Vec::new();
    out.try_reserve_exact(len).map_err(|e| {
        GravityError::InvalidProblem(format!(
            "cannot allocate a trajectory of {} values: {}",
            len, e
        ))
    })?;
    Ok(out)
}

fn diverged(error: &IntegrationError, target: f64) -> GravityError {
    let reason = match error {
        IntegrationError::MaxNumStepReached { x, n_step } => {
            format!("excess work: more than {} steps at t = {}", n_step, x)
        }
        IntegrationError::StepSizeUnderflow { x } => format!("step size underflow at t = {}", x),
        IntegrationError::StiffnessDetected { x } => format!("problem became stiff at t = {}", x),
    };
    GravityError::NumericalDivergence(format!("{} (next sample t = {})", reason, target))
}

fn ensure_finite(values: &[f64], t: f64) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(GravityError::NumericalDivergence(format!(
            "non-finite state at t = {}",
            t
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::linspace;
    use approx::assert_relative_eq;

    /// y' = -y
    struct Decay;

    impl OdeSystem for Decay {
        fn state_len(&self) -> usize {
            1
        }

        fn derivative(&self, _t: f64, y: &[f64], dy: &mut [f64]) -> Result<()> {
            dy[0] = -y[0];
            Ok(())
        }
    }

    /// x'' = -x as (x, v)
    struct Oscillator;

    impl OdeSystem for Oscillator {
        fn state_len(&self) -> usize {
            2
        }

        fn derivative(&self, _t: f64, y: &[f64], dy: &mut [f64]) -> Result<()> {
            dy[0] = y[1];
            dy[1] = -y[0];
            Ok(())
        }
    }

    /// y' = y^2 blows up at t = 1 for y(0) = 1
    struct BlowUp;

    impl OdeSystem for BlowUp {
        fn state_len(&self) -> usize {
            1
        }

        fn derivative(&self, _t: f64, y: &[f64], dy: &mut [f64]) -> Result<()> {
            dy[0] = y[0] * y[0];
            Ok(())
        }
    }

    /// y' = 1 until y reaches 1, then the evaluation fails.
    struct Wall;

    impl OdeSystem for Wall {
        fn state_len(&self) -> usize {
            1
        }

        fn derivative(&self, t: f64, y: &[f64], dy: &mut [f64]) -> Result<()> {
            if y[0] >= 1.0 {
                return Err(GravityError::NumericalDivergence(format!("wall hit at t = {}", t)));
            }
            dy[0] = 1.0;
            Ok(())
        }
    }

    #[test]
    fn exponential_decay_matches_closed_form() {
        let mesh = linspace(0.0, 5.0, 51);
        let out = integrate(&Decay, &[1.0], &mesh, &IntegratorConfig::default()).unwrap();
        assert_eq!(out.len(), 51);
        for (t, y) in mesh.iter().zip(&out) {
            assert_relative_eq!(*y, (-t).exp(), epsilon = 1e-6);
        }
    }

    #[test]
    fn oscillator_returns_to_start_after_one_period() {
        let period = 2.0 * std::f64::consts::PI;
        let mesh = linspace(0.0, period, 100);
        let out = integrate(&Oscillator, &[1.0, 0.0], &mesh, &IntegratorConfig::default())
            .unwrap();
        let last = &out[out.len() - 2..];
        assert_relative_eq!(last[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(last[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn hits_every_mesh_point() {
        let mesh = vec![0.0, 0.1, 0.5, 0.51, 3.0];
        let out = integrate(&Decay, &[2.0], &mesh, &IntegratorConfig::default()).unwrap();
        assert_eq!(out.len(), mesh.len());
        assert_eq!(out[0], 2.0);
        assert_relative_eq!(out[3], 2.0 * (-0.51f64).exp(), epsilon = 1e-6);
        assert_relative_eq!(out[4], 2.0 * (-3.0f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn coarse_mesh_lands_on_the_end_point() {
        let out = integrate(&Decay, &[1.0], &[0.0, 10.0], &IntegratorConfig::default()).unwrap();
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out[1], (-10.0f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn negative_start_times_are_supported() {
        let mesh = linspace(-2.0, 2.0, 9);
        let out = integrate(&Decay, &[1.0], &mesh, &IntegratorConfig::default()).unwrap();
        assert_relative_eq!(out[8], (-4.0f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn finite_time_blow_up_fails() {
        let mesh = linspace(0.0, 2.0, 5);
        let result = integrate(&BlowUp, &[1.0], &mesh, &IntegratorConfig::default());
        assert!(matches!(result, Err(GravityError::NumericalDivergence(_))));
    }

    #[test]
    fn failing_evaluation_stops_the_run() {
        let mesh = linspace(0.0, 3.0, 4);
        let err = integrate(&Wall, &[0.0], &mesh, &IntegratorConfig::default()).unwrap_err();
        match err {
            GravityError::NumericalDivergence(msg) => assert!(msg.contains("wall hit")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn step_cap_reports_excess_work() {
        let mesh = vec![0.0, 100.0];
        let config = IntegratorConfig::default().with_max_steps_per_interval(3);
        let result = integrate(&Oscillator, &[1.0, 0.0], &mesh, &config);
        match result {
            Err(GravityError::NumericalDivergence(msg)) => assert!(msg.contains("excess work")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn exhausted_budget_times_out() {
        let mesh = linspace(0.0, 1.0e6, 3);
        let config = IntegratorConfig::default().with_solve_timeout(Duration::ZERO);
        let result = integrate(&Oscillator, &[1.0, 0.0], &mesh, &config);
        assert_eq!(result, Err(GravityError::Timeout(Duration::ZERO)));
    }

    #[test]
    fn rejects_mismatched_state_and_bad_mesh() {
        let config = IntegratorConfig::default();
        assert!(integrate(&Decay, &[1.0, 2.0], &[0.0, 1.0], &config).is_err());
        assert!(integrate(&Decay, &[1.0], &[], &config).is_err());
        assert!(integrate(&Decay, &[1.0], &[0.0, 1.0, 1.0], &config).is_err());
        assert!(integrate(&Decay, &[1.0], &[0.0, f64::NAN], &config).is_err());
    }

    #[test]
    fn single_point_mesh_returns_initial_state() {
        let out = integrate(&Decay, &[3.0], &[4.0], &IntegratorConfig::default()).unwrap();
        assert_eq!(out, vec![3.0]);
    }

    #[test]
    fn oversized_trajectory_is_invalid() {
        assert!(matches!(
            trajectory_buffer(usize::MAX, 2),
            Err(GravityError::InvalidProblem(_))
        ));
        assert!(matches!(
            trajectory_buffer(usize::MAX / 4, 1),
            Err(GravityError::InvalidProblem(_))
        ));
    }
}
