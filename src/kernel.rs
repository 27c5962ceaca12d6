//! Non-recursive n-dimensional iteration.
//!
//! [`Odometer`] walks every index combination of a set of axes in row-major
//! order (outermost axis slowest) and yields the running element offset of
//! each of `N` operands. Counters count down from each axis length; an
//! exhausted counter is reset, its `len * stride` is rewound from each
//! offset, and the carry moves one axis outward. Stack depth is constant in
//! the rank.

use smallvec::SmallVec;

use crate::MAX_DIMS;

/// Offset iterator over the outer axes of `N` operands sharing one shape.
#[derive(Debug, Clone)]
pub struct Odometer<const N: usize> {
    lens: SmallVec<[usize; MAX_DIMS]>,
    strides: [SmallVec<[isize; MAX_DIMS]>; N],
    counters: SmallVec<[usize; MAX_DIMS]>,
    offsets: [isize; N],
    done: bool,
}

impl<const N: usize> Odometer<N> {
    /// Iterate `lens` starting from `bases`, each operand advancing by its own strides.
    ///
    /// With no axes the iterator yields `bases` exactly once; with any
    /// zero-length axis it yields nothing.
    ///
    /// # Panics
    /// Panics if a stride list is shorter than `lens`.
    pub fn new(lens: &[usize], bases: [isize; N], strides: [&[isize]; N]) -> Self {
        let strides = strides.map(|s| s[..lens.len()].iter().copied().collect());
        Self {
            lens: lens.iter().copied().collect(),
            strides,
            counters: lens.iter().copied().collect(),
            offsets: bases,
            done: lens.contains(&0),
        }
    }

    /// Number of index combinations still to be yielded when freshly built.
    pub fn total(&self) -> usize {
        if self.done {
            0
        } else {
            self.lens.iter().product()
        }
    }

    fn advance(&mut self) {
        for ax in (0..self.lens.len()).rev() {
            self.counters[ax] -= 1;
            if self.counters[ax] > 0 {
                for (off, s) in self.offsets.iter_mut().zip(&self.strides) {
                    *off += s[ax];
                }
                return;
            }
            // Exhausted: rewind this axis and carry outward.
            self.counters[ax] = self.lens[ax];
            let rewind = (self.lens[ax] - 1) as isize;
            for (off, s) in self.offsets.iter_mut().zip(&self.strides) {
                *off -= rewind * s[ax];
            }
        }
        self.done = true;
    }
}

impl<const N: usize> Iterator for Odometer<N> {
    type Item = [isize; N];

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let current = self.offsets;
        self.advance();
        Some(current)
    }
}
