use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{GravityError, Result};
use crate::problem::payload::{BodyPayload, ProblemPayload};

/// Largest body count a single job may carry.
pub const MAX_BODIES: usize = 1_024;

/// Largest number of mesh samples a single job may request.
pub const MAX_SAMPLES: usize = 1_000_000;

/// Numeric description of an N-body initial value problem.
///
/// `initial_state` holds `2 * order * dimension` values. For body `i` and
/// axis `k` the pair of slots starting at `2 * (i * dimension + k)` stores
/// the position component followed by the velocity component, so positions
/// live in the even slots and velocities in the odd ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub order: usize,
    pub dimension: usize,
    pub mass: Vec<f64>,
    pub g: f64,
    pub mesh: Vec<f64>,
    pub initial_state: Vec<f64>,
}

impl Problem {
    /// Validate a client payload and pack it into a `Problem`.
    pub fn build(payload: &ProblemPayload) -> Result<Self> {
        let bodies = &payload.initial;
        let first = bodies
            .first()
            .ok_or_else(|| invalid("at least one body is required"))?;

        if bodies.len() > MAX_BODIES {
            return Err(invalid(format!(
                "at most {} bodies are supported, got {}",
                MAX_BODIES,
                bodies.len()
            )));
        }

        let dimension = first.r.len();
        if !(2..=3).contains(&dimension) {
            return Err(invalid(format!(
                "dimension must be 2 or 3, got {}",
                dimension
            )));
        }

        for (index, body) in bodies.iter().enumerate() {
            check_body(index, body, dimension)?;
        }

        let g = payload.physics.g;
        if !g.is_finite() {
            return Err(invalid("gravitational constant must be finite"));
        }

        let t = payload.physics.t;
        if t.samples() < 2 {
            return Err(invalid(format!(
                "time range needs at least 2 samples, got {}",
                t.samples()
            )));
        }
        if t.samples() > MAX_SAMPLES {
            return Err(invalid(format!(
                "time range allows at most {} samples, got {}",
                MAX_SAMPLES,
                t.samples()
            )));
        }
        if !t.start().is_finite() || !t.end().is_finite() {
            return Err(invalid("time range bounds must be finite"));
        }
        if t.end() <= t.start() {
            return Err(invalid(format!(
                "time range must be increasing, got [{}, {}]",
                t.start(),
                t.end()
            )));
        }

        let order = bodies.len();
        let mut initial_state = Vec::with_capacity(2 * order * dimension);
        for body in bodies {
            for k in 0..dimension {
                initial_state.push(body.r[k]);
                initial_state.push(body.dr[k]);
            }
        }

        Ok(Self {
            order,
            dimension,
            mass: bodies.iter().map(|b| b.m).collect(),
            g,
            mesh: linspace(t.start(), t.end(), t.samples()),
            initial_state,
        })
    }

    /// Length of the flat state vector.
    pub fn state_len(&self) -> usize {
        2 * self.order * self.dimension
    }

    /// Index of the position component `k` of body `i` in the state vector.
    /// The matching velocity component sits right after it.
    pub fn slot(&self, body: usize, axis: usize) -> usize {
        2 * (body * self.dimension + axis)
    }
}

fn check_body(index: usize, body: &BodyPayload, dimension: usize) -> Result<()> {
    if body.r.len() != dimension {
        return Err(invalid(format!(
            "body {} has position of length {}, expected {}",
            index,
            body.r.len(),
            dimension
        )));
    }
    if body.dr.len() != dimension {
        return Err(invalid(format!(
            "body {} has velocity of length {}, expected {}",
            index,
            body.dr.len(),
            dimension
        )));
    }
    if body.r.iter().chain(body.dr.iter()).any(|v| !v.is_finite()) {
        return Err(invalid(format!("body {} has non-finite coordinates", index)));
    }
    if !body.m.is_finite() || body.m < 0.0 {
        return Err(invalid(format!(
            "body {} has invalid mass {}",
            index, body.m
        )));
    }
    Ok(())
}

fn invalid(msg: impl Into<String>) -> GravityError {
    GravityError::InvalidProblem(msg.into())
}

/// `count` evenly spaced samples over `[start, end]`, both ends included.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    let mut mesh = Array1::linspace(start, end, count).to_vec();
    if count > 1 {
        // pin the last sample so rounding never overshoots
        mesh[count - 1] = end;
    }
    mesh
}
