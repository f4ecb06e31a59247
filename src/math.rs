//! Dense vector/matrix primitives shared by the RNN cell and the learning
//! algorithms: outer and Kronecker products, flattening/unflattening to the
//! canonical parameter layout, and a power-iteration spectral-radius
//! estimate.
//!
//! Kept independent of any BLAS/LAPACK backend -- the tensors here are the
//! size of a single RNN's hidden state and parameter count, not a GPU
//! workload, so a handful of `ndarray` loops are both sufficient and
//! dependency-light.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Outer product `x ⊗ y`, an `(x.len(), y.len())` matrix.
pub fn outer(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Array2<f64> {
    let mut out = Array2::zeros((x.len(), y.len()));
    for (i, &xi) in x.iter().enumerate() {
        for (j, &yj) in y.iter().enumerate() {
            out[[i, j]] = xi * yj;
        }
    }
    out
}

/// Kronecker product of two vectors, `x ⊗ y` flattened to length
/// `x.len() * y.len()`, with `x` varying slowest (row-major over the outer
/// product above). Used for `â ⊗ diag(φ'(h))`-style constructions where the
/// result is immediately reshaped against the canonical column-major
/// parameter layout.
pub fn kron_vec(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Array1<f64> {
    let mut out = Array1::zeros(x.len() * y.len());
    let mut k = 0;
    for &xi in x.iter() {
        for &yj in y.iter() {
            out[k] = xi * yj;
            k += 1;
        }
    }
    out
}

/// Kronecker product of two matrices `A (m×n)` and `B (p×q)`, shape
/// `(m*p, n*q)`.
pub fn kron_mat(a: ArrayView2<f64>, b: ArrayView2<f64>) -> Array2<f64> {
    let (m, n) = a.dim();
    let (p, q) = b.dim();
    let mut out = Array2::zeros((m * p, n * q));
    for i in 0..m {
        for j in 0..n {
            let aij = a[[i, j]];
            if aij == 0.0 {
                continue;
            }
            for k in 0..p {
                for l in 0..q {
                    out[[i * p + k, j * q + l]] = aij * b[[k, l]];
                }
            }
        }
    }
    out
}

/// View a vector as a `(1, n)` row matrix, for feeding into [`kron_mat`].
pub fn to_row(v: ArrayView1<f64>) -> Array2<f64> {
    let n = v.len();
    Array2::from_shape_fn((1, n), |(_, j)| v[j])
}

/// Unflatten a length-`rows*cols` vector into an `(rows, cols)` matrix,
/// column-major: `flat[j*rows + i]` becomes `out[[i, j]]`. The inverse of
/// reading a matrix out in the canonical parameter order.
pub fn unflatten_col_major(flat: ArrayView1<f64>, rows: usize, cols: usize) -> Array2<f64> {
    assert_eq!(flat.len(), rows * cols, "unflatten_col_major: length mismatch");
    Array2::from_shape_fn((rows, cols), |(i, j)| flat[j * rows + i])
}

/// Flatten a matrix column-major into a length-`rows*cols` vector: the
/// inverse of [`unflatten_col_major`].
pub fn flatten_col_major(m: ArrayView2<f64>) -> Array1<f64> {
    let (rows, cols) = m.dim();
    let mut out = Array1::zeros(rows * cols);
    let mut k = 0;
    for j in 0..cols {
        for i in 0..rows {
            out[k] = m[[i, j]];
            k += 1;
        }
    }
    out
}

/// Diagonal matrix with `v` on the diagonal.
pub fn diag(v: ArrayView1<f64>) -> Array2<f64> {
    let n = v.len();
    let mut out = Array2::zeros((n, n));
    for i in 0..n {
        out[[i, i]] = v[i];
    }
    out
}

/// Euclidean (L2) norm of a flat slice of values, used both for vectors and
/// (by flattening) matrices.
pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Euclidean norm of an `Array1`.
pub fn norm1(v: ArrayView1<f64>) -> f64 {
    v.dot(&v).sqrt()
}

/// Euclidean (Frobenius) norm of an `Array2`.
pub fn norm2(m: ArrayView2<f64>) -> f64 {
    m.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Estimate the spectral radius (modulus of the dominant eigenvalue) of a
/// square matrix via power iteration. Converges for the diagonalizable,
/// well-conditioned Jacobians and sensitivity matrices this crate monitors;
/// avoids pulling in a full eigensolver for a quantity that is only ever
/// used for diagnostic monitoring, never for control flow.
pub fn spectral_radius(m: ArrayView2<f64>) -> f64 {
    let n = m.nrows();
    if n == 0 || n != m.ncols() {
        return f64::NAN;
    }
    let mut v = Array1::from_elem(n, 1.0 / (n as f64).sqrt());
    let mut eigenvalue = 0.0;
    for _ in 0..200 {
        let mv = m.dot(&v);
        let mv_norm = norm1(mv.view());
        if mv_norm < 1e-300 {
            return 0.0;
        }
        let next = &mv / mv_norm;
        eigenvalue = next.dot(&m.dot(&next));
        if norm1((&next - &v).view()) < 1e-12 {
            v = next;
            break;
        }
        v = next;
    }
    eigenvalue.abs()
}

/// `true` if every element of `v` is finite.
pub fn all_finite1(v: ArrayView1<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// `true` if every element of `m` is finite.
pub fn all_finite2(m: ArrayView2<f64>) -> bool {
    m.iter().all(|x| x.is_finite())
}

/// Concatenate vectors along their single axis, e.g. building the augmented
/// input `â = [a_{t-1}; x_t; 1]`.
pub fn concat(parts: &[ArrayView1<f64>]) -> Array1<f64> {
    ndarray::concatenate(Axis(0), parts).expect("concat: mismatched axis lengths")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn outer_product_shape_and_values() {
        let x = array![1.0, 2.0];
        let y = array![3.0, 4.0, 5.0];
        let o = outer(x.view(), y.view());
        assert_eq!(o.dim(), (2, 3));
        assert_relative_eq!(o[[1, 2]], 10.0);
    }

    #[test]
    fn kron_vec_matches_definition() {
        let x = array![1.0, 2.0];
        let y = array![3.0, 4.0];
        let k = kron_vec(x.view(), y.view());
        assert_eq!(k, array![3.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn spectral_radius_of_diagonal_matrix() {
        let m = array![[2.0, 0.0], [0.0, -3.0]];
        assert_relative_eq!(spectral_radius(m.view()), 3.0, epsilon = 1e-6);
    }

    #[test]
    fn col_major_flatten_and_unflatten_round_trip() {
        let m = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let flat = flatten_col_major(m.view());
        assert_eq!(flat, array![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        let back = unflatten_col_major(flat.view(), 2, 3);
        assert_eq!(back, m);
    }
}
