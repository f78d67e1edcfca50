
use approx::assert_relative_eq;
use ndarray::Axis;

use gravity_jobs::config::IntegratorConfig;
use gravity_jobs::kernel::diagnostics::{linear_momentum, max_relative_drift, total_energy};
use gravity_jobs::kernel::{self, Solution};
use gravity_jobs::problem::{BodyPayload, Problem, ProblemPayload, TimeRange};
use gravity_jobs::GravityError;
use test_harness::{binary_payload, coincident_payload, three_body_payload};

fn energies(problem: &Problem, solution: &Solution) -> Vec<f64> {
    (0..solution.samples())
        .map(|m| {
            total_energy(
                &problem.mass,
                problem.g,
                solution.positions_at(m),
                solution.velocities_at(m),
            )
        })
        .collect()
}

#[test]
fn test_two_body_conserves_energy_and_momentum() {
    let problem = Problem::build(&binary_payload(20.0, 2000)).unwrap();
    let solution = kernel::solve(&problem, &IntegratorConfig::default());
    assert!(solution.status);

    let energy = energies(&problem, &solution);
    assert_relative_eq!(energy[0], -0.25, epsilon = 1e-12);
    assert!(max_relative_drift(&energy) < 1e-3);

    let p0 = linear_momentum(&problem.mass, solution.velocities_at(0));
    for m in 0..solution.samples() {
        let p = linear_momentum(&problem.mass, solution.velocities_at(m));
        for (a, b) in p.iter().zip(&p0) {
            assert!((a - b).abs() < 1e-3);
        }
    }
}

#[test]
fn test_circular_orbit_returns_after_one_period() {
    // radius 1, speed 0.5: period 2*pi*r/v = 4*pi
    let period = 4.0 * std::f64::consts::PI;
    let problem = Problem::build(&ProblemPayload::new(
        binary_payload(1.0, 2).initial,
        1.0,
        TimeRange(0.0, period, 3),
    ))
    .unwrap();
    let solution = kernel::solve(&problem, &IntegratorConfig::default());
    assert!(solution.status);

    assert_relative_eq!(solution.positions[[2, 0, 0]], -1.0, epsilon = 1e-5);
    assert_relative_eq!(solution.positions[[2, 0, 1]], 0.0, epsilon = 1e-5);
    // half a period puts the bodies on opposite sides
    assert_relative_eq!(solution.positions[[1, 0, 0]], 1.0, epsilon = 1e-5);
}

#[test]
fn test_shapes_match_problem() {
    let problem = Problem::build(&ProblemPayload::new(
        vec![
            BodyPayload::new(vec![0.0, 0.0, 0.0], vec![0.0, 0.0, 0.1], 5.0),
            BodyPayload::new(vec![3.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], 1.0),
            BodyPayload::new(vec![0.0, -4.0, 0.0], vec![0.8, 0.0, 0.0], 1.0),
            BodyPayload::at_rest(vec![0.0, 0.0, 6.0], 0.5),
        ],
        1.0,
        TimeRange(0.0, 2.0, 40),
    ))
    .unwrap();
    let solution = kernel::solve(&problem, &IntegratorConfig::default());

    assert!(solution.status);
    assert_eq!(solution.shape(), (40, 4, 3));
    assert_eq!(solution.velocities.dim(), (40, 4, 3));
    assert_eq!(solution.mesh.len(), 40);
    assert_eq!(solution.positions[[0, 1, 0]], 3.0);
    assert_eq!(solution.velocities[[0, 2, 0]], 0.8);
}

#[test]
fn test_three_body_scenario_succeeds() {
    let problem = Problem::build(&three_body_payload(10_000)).unwrap();
    let solution = kernel::solve(&problem, &IntegratorConfig::default());

    assert!(solution.status);
    assert_eq!(solution.shape(), (10_000, 3, 2));
    assert_eq!(solution.mesh[0], 0.0);
    assert_eq!(solution.mesh[9_999], 100.0);

    // the centre of mass starts at (1/2, -1/2) and stays there
    let total: f64 = problem.mass.iter().sum();
    let last = solution.positions.index_axis(Axis(0), 9_999);
    for k in 0..2 {
        let com: f64 = (0..3).map(|i| problem.mass[i] * last[[i, k]]).sum::<f64>() / total;
        let expected = if k == 0 { 0.5 } else { -0.5 };
        assert!((com - expected).abs() < 1e-3);
    }
}

#[test]
fn test_coincident_bodies_fail() {
    let problem = Problem::build(&coincident_payload()).unwrap();

    let solution = kernel::solve(&problem, &IntegratorConfig::default());
    assert!(!solution.status);
    assert_eq!(solution.samples(), 0);

    assert!(matches!(
        kernel::try_solve(&problem, &IntegratorConfig::default()),
        Err(GravityError::NumericalDivergence(_))
    ));
}

#[test]
fn test_single_body_moves_uniformly() {
    let problem = Problem::build(&ProblemPayload::new(
        vec![BodyPayload::new(vec![0.0, 0.0], vec![1.0, -2.0], 3.0)],
        1.0,
        TimeRange(0.0, 4.0, 5),
    ))
    .unwrap();
    let solution = kernel::solve(&problem, &IntegratorConfig::default());

    assert!(solution.status);
    assert_relative_eq!(solution.positions[[4, 0, 0]], 4.0, epsilon = 1e-9);
    assert_relative_eq!(solution.positions[[4, 0, 1]], -8.0, epsilon = 1e-9);
    assert_relative_eq!(solution.velocities[[4, 0, 1]], -2.0, epsilon = 1e-12);
}
