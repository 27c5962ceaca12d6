//! Dense linear algebra by partial-pivot row reduction.
//!
//! All routines copy their input into a row-major `f64` scratch matrix and
//! reduce that in place. Pivots are chosen per column among the rows not
//! yet used: an entry of exactly 1 is taken immediately, otherwise the
//! entry whose binary exponent is closest to zero, ignoring entries below
//! [`PIVOT_EPSILON`].

use num_traits::Float;
use tracing::debug;

use crate::array::{IntoArray, NdArray};
use crate::config::PIVOT_EPSILON;
use crate::index::{IndexItem, SliceSpec};
use crate::kind::ElementKind;
use crate::ufunc;
use crate::{LinAlgError, Result};

/// Outcome of [`row_reduce`].
#[derive(Debug, Clone, PartialEq)]
pub struct RowReduction {
    /// Columns that received a pivot, in increasing order.
    pub pivot_columns: Vec<usize>,
    /// Product of the reciprocals of all normalization divisors.
    pub determinant_factor: f64,
}

impl RowReduction {
    pub fn pivot_count(&self) -> usize {
        self.pivot_columns.len()
    }

    /// Pivots that landed in the first `n` columns.
    pub fn pivots_within(&self, n: usize) -> usize {
        self.pivot_columns.iter().filter(|&&c| c < n).count()
    }
}

/// Exponent `e` of `x = m * 2^e` with `0.5 <= |m| < 1`.
fn binary_exponent(x: f64) -> i32 {
    if x == 0.0 || !x.is_finite() {
        return 0;
    }
    let (mantissa, exp, _) = x.integer_decode();
    exp as i32 + (64 - mantissa.leading_zeros()) as i32
}

/// Swap rows `a` and `b`, negating the one moved down so the determinant is unchanged.
fn swap_negate_rows(data: &mut [f64], width: usize, a: usize, b: usize) {
    for i in 0..width {
        let tmp = data[a * width + i];
        data[a * width + i] = data[b * width + i];
        data[b * width + i] = -tmp;
    }
}

/// Subtract a multiple of `pivot_row` from `row` so that `row[col]` becomes zero.
fn subtract_to_zero(data: &mut [f64], width: usize, col: usize, pivot_row: usize, row: usize) {
    let multiple = data[row * width + col] / data[pivot_row * width + col];
    if multiple != 0.0 {
        data[row * width + col] = 0.0;
        for i in col + 1..width {
            data[row * width + i] -= data[pivot_row * width + i] * multiple;
        }
    }
}

fn divide_row(data: &mut [f64], width: usize, col: usize, row: usize, d: f64) {
    for x in &mut data[row * width + col..(row + 1) * width] {
        *x /= d;
    }
}

/// Row-reduce a row-major `height x width` matrix in place.
///
/// With `full_diagonalize`, the pivot column is cleared in every other
/// row (Gauss-Jordan); otherwise only below the pivot. With `normalize`,
/// each pivot row is divided by its pivot and the divisor folded into
/// [`RowReduction::determinant_factor`].
///
/// # Panics
/// Panics if `data.len() < height * width`.
pub fn row_reduce(
    data: &mut [f64],
    height: usize,
    width: usize,
    full_diagonalize: bool,
    normalize: bool,
) -> RowReduction {
    let mut pivot_columns = Vec::with_capacity(height.min(width));
    let mut factor = 1.0;
    let mut row = 0usize;

    for col in 0..width {
        if row >= height {
            break;
        }
        let mut best: Option<usize> = None;
        let mut best_exponent = i32::MAX;
        for r in row..height {
            let v = data[r * width + col];
            if v.abs() < PIVOT_EPSILON {
                continue;
            }
            if v == 1.0 {
                best = Some(r);
                break;
            }
            let e = binary_exponent(v).abs();
            if e < best_exponent {
                best = Some(r);
                best_exponent = e;
            }
        }
        let Some(pivot) = best else {
            continue;
        };

        if pivot != row {
            swap_negate_rows(data, width, row, pivot);
        }
        let targets = if full_diagonalize { 0 } else { row + 1 };
        for r in targets..height {
            if r != row {
                subtract_to_zero(data, width, col, row, r);
            }
        }
        if normalize {
            let d = data[row * width + col];
            divide_row(data, width, col, row, d);
            factor /= d;
        }
        pivot_columns.push(col);
        row += 1;
    }

    debug!(
        height,
        width,
        pivots = pivot_columns.len(),
        "row reduction"
    );
    RowReduction {
        pivot_columns,
        determinant_factor: factor,
    }
}

fn matrix_dims(a: &NdArray) -> Result<(usize, usize)> {
    match a.shape()[..] {
        [rows, cols] => Ok((rows, cols)),
        _ => Err(LinAlgError::NotMatrix { rank: a.rank() }.into()),
    }
}

fn square_size(a: &NdArray) -> Result<usize> {
    let (rows, cols) = matrix_dims(a)?;
    if rows != cols {
        return Err(LinAlgError::NonSquare { rows, cols }.into());
    }
    Ok(rows)
}

fn columns(start: usize, stop: usize) -> [IndexItem; 2] {
    [
        IndexItem::Slice(SliceSpec::full()),
        IndexItem::Slice(SliceSpec::range(start as isize, stop as isize)),
    ]
}

/// `n x (n + extra)` float scratch with `a` in the left block.
fn augmented(a: &NdArray, n: usize, extra: usize) -> Result<NdArray> {
    let scratch = NdArray::allocate(ElementKind::Float64, &[n, n + extra])?;
    ufunc::copy_into(&scratch.view_item(&columns(0, n))?, a)?;
    Ok(scratch)
}

fn check_singular(red: &RowReduction, n: usize) -> Result<()> {
    let pivots = red.pivots_within(n);
    if pivots < n {
        debug!(pivots, size = n, "singular matrix");
        return Err(LinAlgError::Singular { pivots, size: n }.into());
    }
    Ok(())
}

/// Normalized row-echelon form, written back into `matrix`, which is returned.
pub fn re(matrix: impl IntoArray) -> Result<NdArray> {
    let matrix = matrix.into_array()?;
    let (rows, cols) = matrix_dims(&matrix)?;
    let mut data = matrix.to_f64_vec()?;
    row_reduce(&mut data, rows, cols, false, true);
    ufunc::copy_into(&matrix, &NdArray::from_shape_vec(&[rows, cols], data)?)?;
    Ok(matrix)
}

/// Determinant of a square matrix; `0.0` when singular.
pub fn det(matrix: impl IntoArray) -> Result<f64> {
    let matrix = matrix.into_array()?;
    let n = square_size(&matrix)?;
    let mut data = matrix.to_f64_vec()?;
    let red = row_reduce(&mut data, n, n, false, true);
    if red.pivots_within(n) < n {
        return Ok(0.0);
    }
    Ok(1.0 / red.determinant_factor)
}

/// Inverse of a square matrix by Gauss-Jordan elimination on `[A | I]`.
pub fn inv(matrix: impl IntoArray) -> Result<NdArray> {
    let matrix = matrix.into_array()?;
    let n = square_size(&matrix)?;
    let scratch = augmented(&matrix, n, n)?;
    for i in 0..n {
        scratch.set(&[i, n + i], 1.0)?;
    }
    let mut data = scratch.to_f64_vec()?;
    let red = row_reduce(&mut data, n, 2 * n, true, true);
    check_singular(&red, n)?;
    NdArray::from_shape_vec(&[n, 2 * n], data)?
        .view_item(&columns(n, 2 * n))?
        .to_owned_contiguous()
}

/// Solve `a x = b` for a square `a` and a vector `b`.
pub fn solve(a: impl IntoArray, b: impl IntoArray) -> Result<NdArray> {
    let (a, b) = (a.into_array()?, b.into_array()?);
    let n = square_size(&a)?;
    if b.shape() != [n] {
        return Err(LinAlgError::RhsMismatch {
            expected: n,
            found: b.shape(),
        }
        .into());
    }
    let scratch = augmented(&a, n, 1)?;
    let last = scratch.view_item(&[
        IndexItem::Slice(SliceSpec::full()),
        IndexItem::Int(n as isize),
    ])?;
    ufunc::copy_into(&last, &b)?;
    let mut data = scratch.to_f64_vec()?;
    let red = row_reduce(&mut data, n, n + 1, true, true);
    check_singular(&red, n)?;
    let x: Vec<f64> = data.chunks_exact(n + 1).map(|row| row[n]).collect();
    NdArray::from_shape_vec(&[n], x)
}
