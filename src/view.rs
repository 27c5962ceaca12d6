//! Axis reordering and reshaping.

use smallvec::SmallVec;
use tracing::debug;

use crate::array::{row_major_axes, Axes, NdArray};
use crate::{NdError, Result, MAX_DIMS};

impl NdArray {
    /// Reorder axes; `None` reverses them.
    ///
    /// # Errors
    /// Returns [`NdError::InvalidPermutation`] if `order` is not a
    /// permutation of `0..rank`.
    pub fn transpose(&self, order: Option<&[usize]>) -> Result<NdArray> {
        match order {
            Some(order) => self.permute(order),
            None => {
                let axes: Axes = self.axes().iter().rev().copied().collect();
                Ok(self.view_of(self.base_offset(), axes))
            }
        }
    }

    /// View with axis `perm[i]` of `self` as axis `i`.
    pub fn permute(&self, perm: &[usize]) -> Result<NdArray> {
        let rank = self.rank();
        if perm.len() != rank {
            return Err(NdError::InvalidPermutation(perm.to_vec()));
        }
        let mut seen: SmallVec<[bool; MAX_DIMS]> = SmallVec::from_elem(false, rank);
        for &p in perm {
            if p >= rank || seen[p] {
                return Err(NdError::InvalidPermutation(perm.to_vec()));
            }
            seen[p] = true;
        }
        let axes: Axes = perm.iter().map(|&p| self.axes()[p]).collect();
        Ok(self.view_of(self.base_offset(), axes))
    }

    /// View with new lengths and the same number of elements.
    ///
    /// An array that is not contiguous-owned is first copied into a fresh
    /// contiguous buffer.
    pub fn reshape(&self, lens: &[usize]) -> Result<NdArray> {
        if lens.len() > MAX_DIMS {
            return Err(NdError::TooManyDims { rank: lens.len() });
        }
        let to: usize = lens.iter().product();
        if to != self.size() {
            return Err(NdError::SizeMismatch {
                from: self.size(),
                to,
            });
        }
        let base = if self.is_contiguous_owned() {
            self.clone()
        } else {
            debug!(shape = ?self.shape(), "reshape materializes non-contiguous source");
            self.to_owned_contiguous()?
        };
        Ok(base.view_of(0, row_major_axes(lens)))
    }
}
