use serde::{Deserialize, Serialize};

/// One body as sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyPayload {
    /// Position vector
    pub r: Vec<f64>,
    /// Velocity vector
    pub dr: Vec<f64>,
    /// Mass
    pub m: f64,
}

impl BodyPayload {
    pub fn new(r: Vec<f64>, dr: Vec<f64>, m: f64) -> Self {
        Self { r, dr, m }
    }

    /// A body at rest at `r`.
    pub fn at_rest(r: Vec<f64>, m: f64) -> Self {
        let dr = vec![0.0; r.len()];
        Self { r, dr, m }
    }
}

/// `(t_start, t_end, sample_count)`, serialized as a three element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange(pub f64, pub f64, pub usize);

impl TimeRange {
    pub fn start(&self) -> f64 {
        self.0
    }

    pub fn end(&self) -> f64 {
        self.1
    }

    pub fn samples(&self) -> usize {
        self.2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsPayload {
    pub g: f64,
    pub t: TimeRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemPayload {
    pub initial: Vec<BodyPayload>,
    pub physics: PhysicsPayload,
}

impl ProblemPayload {
    pub fn new(initial: Vec<BodyPayload>, g: f64, t: TimeRange) -> Self {
        Self {
            initial,
            physics: PhysicsPayload { g, t },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_wire_shape() {
        let json = r#"{
            "initial": [
                {"r": [0.0, 1.0], "dr": [0.5, 0.0], "m": 2.0},
                {"r": [0.0, -1.0], "dr": [-0.5, 0.0], "m": 2.0}
            ],
            "physics": {"g": 1.0, "t": [0.0, 10.0, 101]}
        }"#;

        let payload: ProblemPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.initial.len(), 2);
        assert_eq!(payload.initial[1].dr, vec![-0.5, 0.0]);
        assert_eq!(payload.physics.g, 1.0);
        assert_eq!(payload.physics.t, TimeRange(0.0, 10.0, 101));
    }

    #[test]
    fn time_range_serializes_as_array() {
        let json = serde_json::to_string(&TimeRange(0.0, 2.5, 3)).unwrap();
        assert_eq!(json, "[0.0,2.5,3]");
    }

    #[test]
    fn at_rest_has_zero_velocity() {
        let body = BodyPayload::at_rest(vec![1.0, 2.0, 3.0], 4.0);
        assert_eq!(body.dr, vec![0.0, 0.0, 0.0]);
    }
}
