//! Finite-difference operators over a 2D scalar field.
//!
//! The gradient uses forward differences with a zero trailing boundary: the
//! last column of the horizontal component and the last row of the vertical
//! component are always `0`. [`divergence`] is the matching backward-difference
//! operator, so that `divergence(gradient(f))` is the 5-point Laplacian with
//! Neumann-like boundaries. This is exactly the operator diagonalized by the
//! DCT-II, which is what makes the closed-form solve in [`crate::poisson`]
//! possible.

use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis};

/// Index of the horizontal (along columns) gradient component.
pub const GRAD_X: usize = 0;

/// Index of the vertical (along rows) gradient component.
pub const GRAD_Y: usize = 1;

/// Compute the forward-difference gradient of a 2D field.
///
/// Returns an array of shape `(rows, cols, 2)`, where `[.., .., GRAD_X]` holds
/// `f[r, c + 1] - f[r, c]` and `[.., .., GRAD_Y]` holds `f[r + 1, c] - f[r, c]`.
/// Differences that would reach past the last column or row are `0`.
#[must_use]
pub fn gradient(field: ArrayView2<'_, f64>) -> Array3<f64> {
    let (rows, cols) = field.dim();
    let mut grad = Array3::zeros((rows, cols, 2));

    if cols > 1 {
        let dx = &field.slice(s![.., 1..]) - &field.slice(s![.., ..-1]);
        grad.slice_mut(s![.., ..-1, GRAD_X]).assign(&dx);
    }
    if rows > 1 {
        let dy = &field.slice(s![1.., ..]) - &field.slice(s![..-1, ..]);
        grad.slice_mut(s![..-1, .., GRAD_Y]).assign(&dy);
    }

    grad
}

/// Compute the backward-difference divergence of a gradient field.
///
/// For each component the left (or upper) neighbor is subtracted from the
/// current value, with out-of-bounds neighbors treated as `0`, and the two
/// results are summed. This is the negative adjoint of [`gradient`].
///
/// # Panics
///
/// Panics if the last axis of `grad` does not have length 2.
#[must_use]
pub fn divergence(grad: ArrayView3<'_, f64>) -> Array2<f64> {
    let (rows, cols, dims) = grad.dim();
    assert_eq!(dims, 2, "gradient field must have exactly 2 components");

    let gx = grad.index_axis(Axis(2), GRAD_X);
    let gy = grad.index_axis(Axis(2), GRAD_Y);
    let mut div = &gx + &gy;

    if cols > 1 {
        let mut inner = div.slice_mut(s![.., 1..]);
        inner -= &gx.slice(s![.., ..-1]);
    }
    if rows > 1 {
        let mut inner = div.slice_mut(s![1.., ..]);
        inner -= &gy.slice(s![..-1, ..]);
    }

    div
}

/// Discrete Laplacian with an optional edge threshold.
///
/// With `h = Some(t)`, every gradient vector whose Euclidean norm is strictly
/// below `t` is zeroed before taking the divergence. Weak gradients are
/// attributed to the reflection layer and dropped, strong edges are kept.
/// With `h = None` this is the plain 5-point Laplacian.
#[must_use]
pub fn laplacian(field: ArrayView2<'_, f64>, h: Option<f64>) -> Array2<f64> {
    let mut grad = gradient(field);

    if let Some(h) = h {
        for mut g in grad.lanes_mut(Axis(2)) {
            if g[GRAD_X].hypot(g[GRAD_Y]) < h {
                g.fill(0.0);
            }
        }
    }

    divergence(grad.view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Zip};

    #[allow(clippy::cast_precision_loss)]
    fn wavy_field(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(r, c)| {
            (0.37 * r as f64 + 1.3 * (c as f64).powi(2)).sin() + 0.1 * (r * c) as f64
        })
    }

    fn assert_close(actual: &Array2<f64>, expected: &Array2<f64>) {
        assert_eq!(actual.dim(), expected.dim());
        Zip::indexed(actual).and(expected).for_each(|idx, &a, &e| {
            assert!((a - e).abs() < 1e-9, "mismatch at {idx:?}: {a} vs {e}");
        });
    }

    fn sample_field() -> Array2<f64> {
        array![
            [1.0, 2.0, 4.0, 5.0],
            [4.0, 8.0, 16.0, 14.0],
            [5.0, 12.0, 10.0, 3.0],
            [3.0, 5.0, 2.0, 3.0]
        ]
    }

    fn sample_gradient() -> (Array2<f64>, Array2<f64>) {
        let gx = array![
            [1.0, 2.0, 1.0, 0.0],
            [4.0, 8.0, -2.0, 0.0],
            [7.0, -2.0, -7.0, 0.0],
            [2.0, -3.0, 1.0, 0.0]
        ];
        let gy = array![
            [3.0, 6.0, 12.0, 9.0],
            [1.0, 4.0, -6.0, -11.0],
            [-2.0, -7.0, -8.0, 0.0],
            [0.0, 0.0, 0.0, 0.0]
        ];
        (gx, gy)
    }

    #[test]
    fn gradient_matches_known_values() {
        let grad = gradient(sample_field().view());
        let (gx, gy) = sample_gradient();

        assert_eq!(grad.dim(), (4, 4, 2));
        assert_close(&grad.index_axis(Axis(2), GRAD_X).to_owned(), &gx);
        assert_close(&grad.index_axis(Axis(2), GRAD_Y).to_owned(), &gy);
    }

    #[test]
    fn divergence_matches_known_values() {
        let (gx, gy) = sample_gradient();
        let grad = ndarray::stack(Axis(2), &[gx.view(), gy.view()]).unwrap();

        let expected = array![
            [4.0, 7.0, 11.0, 8.0],
            [2.0, 2.0, -28.0, -18.0],
            [4.0, -20.0, -7.0, 18.0],
            [4.0, 2.0, 12.0, -1.0]
        ];
        assert_close(&divergence(grad.view()), &expected);
    }

    #[test]
    fn laplacian_matches_known_values() {
        let field = array![[1.0, 2.0], [4.0, 8.0]];
        let expected = array![[4.0, 5.0], [1.0, -10.0]];
        assert_close(&laplacian(field.view(), None), &expected);
    }

    #[test]
    fn laplacian_is_five_point_stencil_in_interior() {
        let f = wavy_field(7, 9);
        let lapl = laplacian(f.view(), None);

        for r in 1..6 {
            for c in 1..8 {
                let stencil =
                    f[[r - 1, c]] + f[[r + 1, c]] + f[[r, c - 1]] + f[[r, c + 1]] - 4.0 * f[[r, c]];
                assert!(
                    (lapl[[r, c]] - stencil).abs() < 1e-12,
                    "stencil mismatch at ({r},{c})"
                );
            }
        }
    }

    #[test]
    fn divergence_is_negative_adjoint_of_gradient() {
        let f = wavy_field(6, 5);
        #[allow(clippy::cast_precision_loss)]
        let mut g = Array3::from_shape_fn((6, 5, 2), |(r, c, k)| {
            (0.9 * r as f64 - 0.4 * c as f64 + k as f64).cos()
        });
        // Identity holds for fields that respect the zero trailing boundary.
        g.slice_mut(s![.., -1, GRAD_X]).fill(0.0);
        g.slice_mut(s![-1, .., GRAD_Y]).fill(0.0);

        let lhs = (&gradient(f.view()) * &g).sum();
        let rhs = -(&f * &divergence(g.view())).sum();
        assert!((lhs - rhs).abs() < 1e-9, "adjointness violated: {lhs} vs {rhs}");
    }

    #[test]
    fn zero_threshold_matches_plain_laplacian_for_generic_field() {
        let f = wavy_field(8, 8);
        assert_eq!(laplacian(f.view(), Some(0.0)), laplacian(f.view(), None));
    }

    #[test]
    fn large_threshold_removes_all_gradients() {
        let f = wavy_field(5, 6);
        let lapl = laplacian(f.view(), Some(1e6));
        assert!(lapl.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn threshold_keeps_strong_edges_and_drops_weak_ones() {
        // Faint checkerboard on the left, one strong vertical step in the middle.
        let f = Array2::from_shape_fn((4, 6), |(r, c)| {
            if c >= 3 {
                1.0
            } else if c < 2 && (r + c) % 2 == 0 {
                0.01
            } else {
                0.0
            }
        });

        let lapl = laplacian(f.view(), Some(0.5));
        // Only the step survives: it contributes +1 left of the edge, -1 right of it.
        for r in 0..4 {
            assert!((lapl[[r, 2]] - 1.0).abs() < 1e-12);
            assert!((lapl[[r, 3]] + 1.0).abs() < 1e-12);
            for c in [0, 1, 4, 5] {
                assert!(lapl[[r, c]].abs() < 1e-12, "residual at ({r},{c})");
            }
        }
    }

    #[test]
    fn operators_handle_degenerate_shapes() {
        let single = array![[0.5]];
        assert_eq!(gradient(single.view()), Array3::<f64>::zeros((1, 1, 2)));
        assert_eq!(laplacian(single.view(), None), array![[0.0]]);

        let row = array![[1.0, 3.0, 6.0]];
        let grad = gradient(row.view());
        assert_eq!(grad.index_axis(Axis(2), GRAD_X), array![[2.0, 3.0, 0.0]]);
        assert_eq!(grad.index_axis(Axis(2), GRAD_Y), array![[0.0, 0.0, 0.0]]);
    }
}
