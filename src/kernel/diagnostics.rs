//! Conserved quantities of a sampled N-body state.

use ndarray::ArrayView2;

/// Kinetic plus potential energy of one snapshot.
///
/// `positions` and `velocities` are shaped `(order, dimension)`.
pub fn total_energy(
    mass: &[f64],
    g: f64,
    positions: ArrayView2<'_, f64>,
    velocities: ArrayView2<'_, f64>,
) -> f64 {
    let order = mass.len();

    let kinetic: f64 = (0..order)
        .map(|i| 0.5 * mass[i] * velocities.row(i).iter().map(|v| v * v).sum::<f64>())
        .sum();

    let mut potential = 0.0;
    for i in 0..order {
        for j in (i + 1)..order {
            let dist = positions
                .row(i)
                .iter()
                .zip(positions.row(j).iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            potential -= g * mass[i] * mass[j] / dist;
        }
    }

    kinetic + potential
}

/// Total linear momentum, one component per axis.
pub fn linear_momentum(mass: &[f64], velocities: ArrayView2<'_, f64>) -> Vec<f64> {
    let dimension = velocities.ncols();
    (0..dimension)
        .map(|k| {
            mass.iter()
                .enumerate()
                .map(|(i, m)| m * velocities[[i, k]])
                .sum()
        })
        .collect()
}

/// Largest relative deviation of `values` from `values[0]`.
///
/// Falls back to absolute deviation when the reference is zero.
pub fn max_relative_drift(values: &[f64]) -> f64 {
    let Some(&reference) = values.first() else {
        return 0.0;
    };
    let denom = if reference == 0.0 { 1.0 } else { reference.abs() };
    values
        .iter()
        .map(|v| (v - reference).abs() / denom)
        .fold(0.0, f64::max)
}
