//! Boundary to the persistent trajectory row store.
//!
//! Durable storage is owned by an outside collaborator. The scheduler only
//! writes finished trajectories through this trait and reads them back when a
//! postprocess request misses the in-memory result store.

use std::collections::HashMap;
use std::sync::RwLock;

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::kernel::Solution;

/// One persisted row: the time mesh and both trajectory arrays of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedTrajectory {
    pub job_id: String,
    pub mesh: Vec<f64>,
    pub positions: Array3<f64>,
    pub velocities: Array3<f64>,
}

impl ArchivedTrajectory {
    pub fn from_solution(job_id: impl Into<String>, solution: &Solution) -> Self {
        Self {
            job_id: job_id.into(),
            mesh: solution.mesh.clone(),
            positions: solution.positions.clone(),
            velocities: solution.velocities.clone(),
        }
    }

    pub fn into_solution(self) -> Solution {
        Solution {
            status: true,
            mesh: self.mesh,
            positions: self.positions,
            velocities: self.velocities,
        }
    }
}

pub trait TrajectoryArchive: Send + Sync {
    fn save(&self, row: ArchivedTrajectory);
    fn load(&self, job_id: &str) -> Option<ArchivedTrajectory>;
}

/// Archive kept in process memory, keyed by job id.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    rows: RwLock<HashMap<String, ArchivedTrajectory>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TrajectoryArchive for MemoryArchive {
    fn save(&self, row: ArchivedTrajectory) {
        match self.rows.write() {
            Ok(mut rows) => {
                rows.insert(row.job_id.clone(), row);
            }
            Err(e) => tracing::error!(error = %e, "Trajectory archive lock poisoned"),
        }
    }

    fn load(&self, job_id: &str) -> Option<ArchivedTrajectory> {
        self.rows.read().ok()?.get(job_id).cloned()
    }
}
