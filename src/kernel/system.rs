use crate::error::{GravityError, Result};
use crate::problem::Problem;

/// A first-order ODE system `y' = f(t, y)`.
pub trait OdeSystem {
    /// Length of the state vector.
    fn state_len(&self) -> usize;

    /// Write `f(t, y)` into `dy`.
    fn derivative(&self, t: f64, y: &[f64], dy: &mut [f64]) -> Result<()>;
}

/// Newtonian gravitation between the bodies of a [`Problem`].
///
/// Every ordered pair `i != j` contributes `g * m_j * (r_j - r_i) / |r_j - r_i|^3`
/// to the acceleration of body `i`. Two distinct bodies at the same point are
/// a singularity and fail the evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Gravitation<'a> {
    problem: &'a Problem,
}

impl<'a> Gravitation<'a> {
    pub fn new(problem: &'a Problem) -> Self {
        Self { problem }
    }
}

impl OdeSystem for Gravitation<'_> {
    fn state_len(&self) -> usize {
        self.problem.state_len()
    }

    fn derivative(&self, t: f64, y: &[f64], dy: &mut [f64]) -> Result<()> {
        let p = self.problem;
        let (order, dimension) = (p.order, p.dimension);

        for i in 0..order {
            for k in 0..dimension {
                let s = p.slot(i, k);
                dy[s] = y[s + 1];
                dy[s + 1] = 0.0;
            }
        }

        for i in 0..order {
            for j in 0..order {
                if i == j {
                    continue;
                }

                let mut dist2 = 0.0;
                for k in 0..dimension {
                    let diff = y[p.slot(j, k)] - y[p.slot(i, k)];
                    dist2 += diff * diff;
                }

                if dist2 == 0.0 {
                    return Err(GravityError::NumericalDivergence(format!(
                        "bodies {} and {} coincide at t = {}",
                        i, j, t
                    )));
                }
                if !dist2.is_finite() {
                    return Err(GravityError::NumericalDivergence(format!(
                        "non-finite distance between bodies {} and {} at t = {}",
                        i, j, t
                    )));
                }

                let scale = p.g * p.mass[j] / (dist2 * dist2.sqrt());
                for k in 0..dimension {
                    let diff = y[p.slot(j, k)] - y[p.slot(i, k)];
                    dy[p.slot(i, k) + 1] += scale * diff;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{BodyPayload, ProblemPayload, TimeRange};
    use approx::assert_relative_eq;

    fn problem(bodies: Vec<BodyPayload>, g: f64) -> Problem {
        Problem::build(&ProblemPayload::new(bodies, g, TimeRange(0.0, 1.0, 2))).unwrap()
    }

    #[test]
    fn two_bodies_attract_each_other() {
        let p = problem(
            vec![
                BodyPayload::new(vec![0.0, 0.0], vec![1.0, 2.0], 1.0),
                BodyPayload::new(vec![2.0, 0.0], vec![3.0, 4.0], 4.0),
            ],
            1.0,
        );
        let system = Gravitation::new(&p);
        let mut dy = vec![0.0; system.state_len()];
        system.derivative(0.0, &p.initial_state, &mut dy).unwrap();

        // velocities echoed into the position slots
        assert_eq!(dy[0], 1.0);
        assert_eq!(dy[2], 2.0);
        assert_eq!(dy[4], 3.0);
        assert_eq!(dy[6], 4.0);

        // a_0 = 1 * 4 * 2 / 8 = 1 towards +x, a_1 = 1 * 1 * -2 / 8 = -0.25
        assert_relative_eq!(dy[1], 1.0);
        assert_relative_eq!(dy[3], 0.0);
        assert_relative_eq!(dy[5], -0.25);
        assert_relative_eq!(dy[7], 0.0);
    }

    #[test]
    fn single_body_has_no_acceleration() {
        let p = problem(
            vec![BodyPayload::new(vec![1.0, 1.0, 1.0], vec![0.1, 0.2, 0.3], 5.0)],
            1.0,
        );
        let system = Gravitation::new(&p);
        let mut dy = vec![f64::NAN; system.state_len()];
        system.derivative(0.0, &p.initial_state, &mut dy).unwrap();
        assert_eq!(dy, vec![0.1, 0.0, 0.2, 0.0, 0.3, 0.0]);
    }

    #[test]
    fn coincident_bodies_diverge() {
        let p = problem(
            vec![
                BodyPayload::at_rest(vec![1.0, 1.0], 1.0),
                BodyPayload::at_rest(vec![1.0, 1.0], 1.0),
            ],
            1.0,
        );
        let system = Gravitation::new(&p);
        let mut dy = vec![0.0; system.state_len()];
        let err = system.derivative(0.0, &p.initial_state, &mut dy).unwrap_err();
        assert!(matches!(err, GravityError::NumericalDivergence(_)));
    }

    #[test]
    fn forces_scale_with_g() {
        let bodies = vec![
            BodyPayload::at_rest(vec![0.0, 0.0], 1.0),
            BodyPayload::at_rest(vec![0.0, 1.0], 1.0),
        ];
        let weak = problem(bodies.clone(), 1.0);
        let strong = problem(bodies, 3.0);

        let mut dy_weak = vec![0.0; 8];
        let mut dy_strong = vec![0.0; 8];
        Gravitation::new(&weak)
            .derivative(0.0, &weak.initial_state, &mut dy_weak)
            .unwrap();
        Gravitation::new(&strong)
            .derivative(0.0, &strong.initial_state, &mut dy_strong)
            .unwrap();

        assert_relative_eq!(dy_strong[3], 3.0 * dy_weak[3]);
        assert_relative_eq!(dy_weak[3], 1.0);
        assert_relative_eq!(dy_weak[7], -1.0);
    }
}
