//! Closed-form Poisson solver in the cosine-transform domain.
//!
//! The Laplacian of [`crate::operators`] is diagonalized by the 2D DCT-II, with
//! eigenvalues `kappa[m, n] = 2 * (cos(pi*m/M) + cos(pi*n/N) - 2)`. The
//! regularized equation
//!
//! `(mu * L^2 - lmbd * L + epsilon) T = rhs`
//!
//! therefore becomes an elementwise division in the DCT domain:
//!
//! `T = idct2(dct2(rhs) / (mu * kappa^2 - lmbd * kappa + epsilon))`
//!
//! which costs two fast transforms per channel instead of an iterative solve.

use std::f64::consts::PI;

use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use rustdct::{Dct2, Dct3, DctPlanner};

use crate::error::{Error, Result};

/// Eigenvalues of the discrete Laplacian in the DCT-II basis for a
/// `rows x cols` field.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn eigenvalues(rows: usize, cols: usize) -> Array2<f64> {
    let m = Array1::from_shape_fn(rows, |i| (PI * i as f64 / rows as f64).cos());
    let n = Array1::from_shape_fn(cols, |j| (PI * j as f64 / cols as f64).cos());
    Array2::from_shape_fn((rows, cols), |(i, j)| 2.0 * (m[i] + n[j] - 2.0))
}

/// Spectral denominator `mu * kappa^2 - lmbd * kappa + epsilon`.
#[must_use]
pub fn denominator(kappa: ArrayView2<'_, f64>, mu: f64, lmbd: f64, epsilon: f64) -> Array2<f64> {
    kappa.mapv(|k| mu * k * k - lmbd * k + epsilon)
}

/// Orthonormal 2D DCT-II.
#[must_use]
pub fn dct2(field: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut planner = DctPlanner::new();
    let mut out = field.to_owned();
    transform_lanes(&mut out, Axis(1), &mut planner, Direction::Forward);
    transform_lanes(&mut out, Axis(0), &mut planner, Direction::Forward);
    out
}

/// Orthonormal 2D DCT-III, the inverse of [`dct2`].
#[must_use]
pub fn idct2(coeffs: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut planner = DctPlanner::new();
    let mut out = coeffs.to_owned();
    transform_lanes(&mut out, Axis(1), &mut planner, Direction::Inverse);
    transform_lanes(&mut out, Axis(0), &mut planner, Direction::Inverse);
    out
}

/// Solve the regularized Poisson equation for one channel.
///
/// Builds the eigenvalue matrix and denominator from the shape of `rhs` and
/// delegates to [`solve_with_denominator`]. The result is not rescaled.
///
/// # Errors
///
/// Returns [`Error::NumericDegeneracy`] if the denominator has an exact zero,
/// which can only happen when `epsilon` is `0`.
pub fn solve(rhs: ArrayView2<'_, f64>, mu: f64, lmbd: f64, epsilon: f64) -> Result<Array2<f64>> {
    let (rows, cols) = rhs.dim();
    let kappa = eigenvalues(rows, cols);
    let denom = denominator(kappa.view(), mu, lmbd, epsilon);
    solve_with_denominator(rhs, denom.view())
}

/// Solve `idct2(dct2(rhs) / denom)` for a precomputed spectral denominator.
///
/// # Errors
///
/// Returns [`Error::NumericDegeneracy`] if `denom` contains an exact zero or
/// its shape differs from `rhs`.
#[allow(clippy::float_cmp)]
pub fn solve_with_denominator(
    rhs: ArrayView2<'_, f64>,
    denom: ArrayView2<'_, f64>,
) -> Result<Array2<f64>> {
    if rhs.dim() != denom.dim() {
        return Err(Error::NumericDegeneracy(format!(
            "denominator shape {:?} does not match right-hand side {:?}",
            denom.dim(),
            rhs.dim()
        )));
    }
    if let Some((idx, _)) = denom.indexed_iter().find(|&(_, &d)| d == 0.0) {
        return Err(Error::NumericDegeneracy(format!(
            "spectral denominator is zero at {idx:?}"
        )));
    }

    let mut spectrum = dct2(rhs);
    Zip::from(&mut spectrum).and(&denom).for_each(|u, &d| *u /= d);
    Ok(idct2(spectrum.view()))
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Inverse,
}

/// Apply an orthonormal 1D DCT to every lane of `data` along `axis`.
#[allow(clippy::cast_precision_loss)]
fn transform_lanes(
    data: &mut Array2<f64>,
    axis: Axis,
    planner: &mut DctPlanner<f64>,
    direction: Direction,
) {
    let len = data.len_of(axis);
    if len == 0 {
        return;
    }

    let dct = planner.plan_dct2(len);
    let dc_scale = (1.0 / len as f64).sqrt();
    let ac_scale = (2.0 / len as f64).sqrt();
    let mut buffer = vec![0.0; len];

    for mut lane in data.lanes_mut(axis) {
        for (b, &v) in buffer.iter_mut().zip(lane.iter()) {
            *b = v;
        }

        match direction {
            Direction::Forward => {
                dct.process_dct2(&mut buffer);
                buffer[0] *= dc_scale;
                buffer[1..].iter_mut().for_each(|b| *b *= ac_scale);
            }
            Direction::Inverse => {
                // rustdct's DCT-III halves the DC term.
                buffer[0] *= 2.0 * dc_scale;
                buffer[1..].iter_mut().for_each(|b| *b *= ac_scale);
                dct.process_dct3(&mut buffer);
            }
        }

        for (v, &b) in lane.iter_mut().zip(buffer.iter()) {
            *v = b;
        }
    }
}
