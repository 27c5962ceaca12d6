//! Operator surface: unary, binary, in-place and reflected operators.

use tracing::debug;

use crate::array::{IntoArray, Item, NdArray};
use crate::broadcast::broadcast;
use crate::dot::dot;
use crate::ufunc::{self, binary_result_kind};
use crate::value::{BinaryOp, UnaryOp};
use crate::{NdError, Result};

/// `op a`, keeping the element kind.
pub fn unary(op: UnaryOp, a: impl IntoArray) -> Result<Item> {
    let src = a.into_array()?;
    let (kind, spec) = ufunc::find_unary_op_spec(op, &src);
    let dest = NdArray::allocate(kind, &src.shape())?;
    ufunc::apply_unary(&spec, &dest, &src)?;
    Item::from_array(dest)
}

/// Convert both operands; a host operand is stored in the kind of the array operand.
pub(crate) fn operands(lhs: impl IntoArray, rhs: impl IntoArray) -> Result<(NdArray, NdArray)> {
    match (lhs.is_array(), rhs.is_array()) {
        (true, false) => {
            let lhs = lhs.into_array()?;
            let rhs = rhs.into_array_as(lhs.kind())?;
            Ok((lhs, rhs))
        }
        (false, true) => {
            let rhs = rhs.into_array()?;
            let lhs = lhs.into_array_as(rhs.kind())?;
            Ok((lhs, rhs))
        }
        _ => Ok((lhs.into_array()?, rhs.into_array()?)),
    }
}

/// `lhs op rhs` with broadcasting.
pub fn binary(op: BinaryOp, lhs: impl IntoArray, rhs: impl IntoArray) -> Result<Item> {
    let (lhs, rhs) = operands(lhs, rhs)?;
    let bc = broadcast(&lhs, &rhs)?;
    let kind = binary_result_kind(op, lhs.kind(), rhs.kind(), false);
    let dest = NdArray::allocate(kind, &bc.left.shape())?;
    let spec = ufunc::find_binary_spec(op, &dest, &bc.left, &bc.right);
    ufunc::apply_binary(&spec, &dest, &bc.left, &bc.right)?;
    Item::from_array(dest)
}

/// `other op array`, for a host value on the left of an array.
pub fn binary_reflected(op: BinaryOp, array: impl IntoArray, other: impl IntoArray) -> Result<Item> {
    binary(op, other, array)
}

/// `lhs op= rhs`: the result is written into `lhs` in its own element kind.
///
/// # Errors
/// Returns [`NdError::DestinationBroadcast`] when broadcasting would have to
/// expand `lhs`.
pub fn binary_in_place(op: BinaryOp, lhs: &NdArray, rhs: impl IntoArray) -> Result<()> {
    let mut rhs = rhs.into_array_as(lhs.kind())?;
    if rhs.shares_buffer(lhs) && !rhs.is_same(lhs) {
        debug!("in-place operand overlaps destination, copying first");
        rhs = rhs.to_owned_contiguous()?;
    }
    let bc = broadcast(lhs, &rhs)?;
    if bc.left_expanded {
        return Err(NdError::DestinationBroadcast {
            dest: lhs.shape(),
            broadcast: bc.left.shape(),
        });
    }
    let spec = ufunc::find_binary_spec(op, lhs, lhs, &bc.right);
    ufunc::apply_binary(&spec, lhs, lhs, &bc.right)
}

/// `lhs @ rhs`.
pub fn matmul(lhs: impl IntoArray, rhs: impl IntoArray) -> Result<Item> {
    dot(lhs, rhs)
}

pub fn add(lhs: impl IntoArray, rhs: impl IntoArray) -> Result<Item> {
    binary(BinaryOp::Add, lhs, rhs)
}

pub fn subtract(lhs: impl IntoArray, rhs: impl IntoArray) -> Result<Item> {
    binary(BinaryOp::Subtract, lhs, rhs)
}

pub fn multiply(lhs: impl IntoArray, rhs: impl IntoArray) -> Result<Item> {
    binary(BinaryOp::Multiply, lhs, rhs)
}

pub fn true_divide(lhs: impl IntoArray, rhs: impl IntoArray) -> Result<Item> {
    binary(BinaryOp::TrueDivide, lhs, rhs)
}
