//! Broadcasting of two operands to a common shape.
//!
//! Operands are right-aligned; a missing or length-1 axis on one side is
//! stretched to the other side's length with stride 0.

use crate::array::{Axes, DimInfo, NdArray};
use crate::{NdError, Result};

/// Two views of equal shape produced by [`broadcast`].
#[derive(Debug, Clone)]
pub struct Broadcasted {
    pub left: NdArray,
    pub right: NdArray,
    /// Whether the left operand had to be expanded.
    pub left_expanded: bool,
}

/// Compute the broadcast shape of two shapes.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let max_rank = a.len().max(b.len());
    let mut result = vec![0usize; max_rank];

    for i in 0..max_rank {
        let a_dim = if i < a.len() { a[a.len() - 1 - i] } else { 1 };
        let b_dim = if i < b.len() { b[b.len() - 1 - i] } else { 1 };

        if a_dim == b_dim || b_dim == 1 {
            result[max_rank - 1 - i] = a_dim;
        } else if a_dim == 1 {
            result[max_rank - 1 - i] = b_dim;
        } else {
            return None;
        }
    }

    Some(result)
}

/// Broadcast `left` and `right` against each other without copying.
///
/// # Errors
/// Returns [`NdError::BroadcastMismatch`] if an aligned axis pair has
/// different lengths and neither is 1.
pub fn broadcast(left: &NdArray, right: &NdArray) -> Result<Broadcasted> {
    let out_rank = left.rank().max(right.rank());
    let mismatch = || NdError::BroadcastMismatch(left.shape(), right.shape());

    let padded = |arr: &NdArray| -> Axes {
        let pad = out_rank - arr.rank();
        (0..pad)
            .map(|_| DimInfo::new(1, 0))
            .chain(arr.axes().iter().copied())
            .collect()
    };
    let mut l = padded(left);
    let mut r = padded(right);
    let mut left_expanded = left.rank() < out_rank;
    let mut right_expanded = right.rank() < out_rank;

    for (la, ra) in l.iter_mut().zip(r.iter_mut()) {
        if la.len == ra.len {
            continue;
        }
        if la.len == 1 {
            *la = DimInfo::new(ra.len, 0);
            left_expanded = true;
        } else if ra.len == 1 {
            *ra = DimInfo::new(la.len, 0);
            right_expanded = true;
        } else {
            return Err(mismatch());
        }
    }

    let left = if left_expanded {
        left.view_of(left.base_offset(), l)
    } else {
        left.clone()
    };
    let right = if right_expanded {
        right.view_of(right.base_offset(), r)
    } else {
        right.clone()
    };
    Ok(Broadcasted {
        left,
        right,
        left_expanded,
    })
}
