//! Generalized dot product.
//!
//! `lhs`'s last axis is contracted against `rhs`'s second-to-last axis (its
//! only axis when `rhs` is 1-d). The result has `lhs`'s leading axes
//! followed by `rhs`'s remaining axes.

use smallvec::SmallVec;
use tracing::debug;

use crate::array::{IntoArray, Item, NdArray};
use crate::kernel::Odometer;
use crate::kind::ElementKind;
use crate::ops;
use crate::value::{BinaryOp, Value};
use crate::{NdError, Result, MAX_DIMS};

fn result_kind(lhs: ElementKind, rhs: ElementKind) -> ElementKind {
    if lhs.is_float() || rhs.is_float() {
        ElementKind::Float64
    } else if lhs.is_object() || rhs.is_object() {
        ElementKind::Object
    } else {
        ElementKind::Int64
    }
}

/// Dot product with rank-dependent rules.
///
/// - either operand rank 0: elementwise multiply with broadcasting
/// - both rank 1: inner product, returned as a scalar
/// - `rhs` rank 1: contraction over `lhs`'s last axis
/// - otherwise: contraction of `lhs`'s last axis with `rhs`'s second-to-last
///
/// # Errors
/// Returns [`NdError::DimensionMismatch`] when the contracted lengths
/// differ and [`NdError::TooManyDims`] when the result would exceed
/// [`MAX_DIMS`] axes.
pub fn dot(lhs: impl IntoArray, rhs: impl IntoArray) -> Result<Item> {
    let (lhs, rhs) = ops::operands(lhs, rhs)?;
    let (n, m) = (lhs.rank(), rhs.rank());
    if n == 0 || m == 0 {
        debug!("dot: scalar operand, elementwise multiply");
        return ops::binary(BinaryOp::Multiply, &lhs, &rhs);
    }

    let rhs_axis = if m == 1 { 0 } else { m - 2 };
    let lhs_k = lhs.axes()[n - 1];
    let rhs_k = rhs.axes()[rhs_axis];
    if lhs_k.len != rhs_k.len {
        return Err(NdError::DimensionMismatch {
            lhs: lhs_k.len,
            rhs: rhs_k.len,
        });
    }
    let out_rank = n - 1 + m - 1;
    if out_rank > MAX_DIMS {
        return Err(NdError::TooManyDims { rank: out_rank });
    }
    debug!(
        lhs = ?lhs.shape(),
        rhs = ?rhs.shape(),
        case = match (n, m) {
            (1, 1) => "inner",
            (_, 1) => "matrix-vector",
            _ => "general",
        },
        "dot"
    );

    // Result axes: lhs leading axes, then rhs axes without the contracted one.
    let mut lens: SmallVec<[usize; MAX_DIMS]> = SmallVec::new();
    let mut lhs_strides: SmallVec<[isize; MAX_DIMS]> = SmallVec::new();
    let mut rhs_strides: SmallVec<[isize; MAX_DIMS]> = SmallVec::new();
    for ax in &lhs.axes()[..n - 1] {
        lens.push(ax.len);
        lhs_strides.push(ax.stride);
        rhs_strides.push(0);
    }
    for (i, ax) in rhs.axes().iter().enumerate() {
        if i != rhs_axis {
            lens.push(ax.len);
            lhs_strides.push(0);
            rhs_strides.push(ax.stride);
        }
    }

    let dest = NdArray::allocate(result_kind(lhs.kind(), rhs.kind()), &lens)?;
    let dest_strides = dest.strides();
    let cells = (
        dest.buffer().as_f64(),
        lhs.buffer().as_f64(),
        rhs.buffer().as_f64(),
    );
    let zero = if dest.kind().is_float() {
        Value::Float(0.0)
    } else {
        Value::Int(0)
    };

    let offsets = Odometer::new(
        &lens,
        [dest.base_offset(), lhs.base_offset(), rhs.base_offset()],
        [&dest_strides[..], &lhs_strides[..], &rhs_strides[..]],
    );
    let k = lhs_k.len;
    for [d, l, r] in offsets {
        match cells {
            (Some(out), Some(a), Some(b)) => {
                let mut acc = 0.0;
                for i in 0..k as isize {
                    acc += a[(l + i * lhs_k.stride) as usize].get()
                        * b[(r + i * rhs_k.stride) as usize].get();
                }
                out[d as usize].set(acc);
            }
            _ => {
                let (lbuf, rbuf) = (lhs.buffer(), rhs.buffer());
                let mut acc = zero;
                for i in 0..k as isize {
                    let prod = Value::binary_op(
                        BinaryOp::Multiply,
                        lbuf.get((l + i * lhs_k.stride) as usize),
                        rbuf.get((r + i * rhs_k.stride) as usize),
                    )?;
                    acc = Value::binary_op(BinaryOp::Add, acc, prod)?;
                }
                dest.buffer().set(d as usize, acc)?;
            }
        }
    }
    Item::from_array(dest)
}
