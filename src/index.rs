//! Subscript resolution: integers, slices, ellipsis and new axes.

use std::ops::Range;

use tracing::debug;

use crate::array::{Axes, DimInfo, IntoArray, Item, NdArray};
use crate::broadcast::broadcast;
use crate::ufunc;
use crate::{NdError, Result, MAX_DIMS};

/// A `start:stop:step` slice; missing parts take their defaults for the sign of `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SliceSpec {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: Option<isize>,
}

impl SliceSpec {
    pub fn new(start: Option<isize>, stop: Option<isize>, step: Option<isize>) -> Self {
        Self { start, stop, step }
    }

    /// `:`
    pub fn full() -> Self {
        Self::default()
    }

    /// `start:stop`
    pub fn range(start: isize, stop: isize) -> Self {
        Self::new(Some(start), Some(stop), None)
    }

    /// `::-1`
    pub fn reversed() -> Self {
        Self::new(None, None, Some(-1))
    }

    /// Resolve against an axis of length `len`.
    ///
    /// Returns `(start, step, count)` with out-of-range bounds clamped and
    /// negative bounds counted from the end.
    pub fn indices(&self, len: usize) -> Result<(isize, isize, usize)> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(NdError::InvalidArgument("slice step cannot be zero"));
        }
        let len = len as isize;
        let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
        let clamp = |bound: isize| {
            if bound < 0 {
                (bound + len).max(lower)
            } else {
                bound.min(upper)
            }
        };
        let start = self
            .start
            .map_or(if step < 0 { upper } else { lower }, clamp);
        let stop = self.stop.map_or(if step < 0 { lower } else { upper }, clamp);

        let count = if step < 0 {
            if start > stop {
                (start - stop - 1) / -step + 1
            } else {
                0
            }
        } else if stop > start {
            (stop - start - 1) / step + 1
        } else {
            0
        };
        Ok((start, step, count as usize))
    }
}

impl From<Range<isize>> for SliceSpec {
    fn from(r: Range<isize>) -> Self {
        SliceSpec::range(r.start, r.end)
    }
}

/// One item of a subscript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexItem {
    Int(isize),
    Slice(SliceSpec),
    Ellipsis,
    NewAxis,
}

impl IndexItem {
    fn consumes_axis(&self) -> bool {
        matches!(self, IndexItem::Int(_) | IndexItem::Slice(_))
    }
}

impl From<isize> for IndexItem {
    fn from(i: isize) -> Self {
        IndexItem::Int(i)
    }
}

impl From<SliceSpec> for IndexItem {
    fn from(s: SliceSpec) -> Self {
        IndexItem::Slice(s)
    }
}

impl From<Range<isize>> for IndexItem {
    fn from(r: Range<isize>) -> Self {
        IndexItem::Slice(r.into())
    }
}

/// Compute the `(base_offset, axes)` selected by `items` on `src`.
pub(crate) fn resolve(src: &NdArray, items: &[IndexItem]) -> Result<(isize, Axes)> {
    let rank = src.rank();
    let consuming = items.iter().filter(|it| it.consumes_axis()).count();
    if consuming > rank {
        return Err(NdError::TooManyIndices {
            count: consuming,
            rank,
        });
    }
    if items.iter().filter(|it| **it == IndexItem::Ellipsis).count() > 1 {
        return Err(NdError::MultipleEllipsis);
    }

    let src_axes = src.axes();
    let mut offset = src.base_offset();
    let mut axes = Axes::new();
    let mut cursor = 0usize;
    let mut remaining = consuming;

    for item in items {
        match *item {
            IndexItem::Int(i) => {
                let ax = src_axes[cursor];
                let k = if i < 0 { i + ax.len as isize } else { i };
                if k < 0 || k >= ax.len as isize {
                    return Err(NdError::IndexOutOfRange {
                        index: i,
                        len: ax.len,
                    });
                }
                offset += k * ax.stride;
                cursor += 1;
                remaining -= 1;
            }
            IndexItem::Slice(s) => {
                let ax = src_axes[cursor];
                let (start, step, count) = s.indices(ax.len)?;
                if count > 0 {
                    offset += start * ax.stride;
                }
                axes.push(DimInfo::new(count, ax.stride * step));
                cursor += 1;
                remaining -= 1;
            }
            IndexItem::NewAxis => axes.push(DimInfo::new(1, 0)),
            IndexItem::Ellipsis => {
                let copy_up_to = rank - remaining;
                axes.extend_from_slice(&src_axes[cursor..copy_up_to]);
                cursor = copy_up_to;
            }
        }
        if axes.len() > MAX_DIMS {
            return Err(NdError::TooManyDims { rank: axes.len() });
        }
    }
    axes.extend_from_slice(&src_axes[cursor..]);
    if axes.len() > MAX_DIMS {
        return Err(NdError::TooManyDims { rank: axes.len() });
    }
    Ok((offset, axes))
}

impl NdArray {
    /// Read a subscript: a scalar for a rank-0 selection, otherwise a view.
    pub fn get_item(&self, items: &[IndexItem]) -> Result<Item> {
        let (offset, axes) = resolve(self, items)?;
        Item::from_array(self.view_of(offset, axes))
    }

    /// The selected view, even when it has rank 0.
    pub fn view_item(&self, items: &[IndexItem]) -> Result<NdArray> {
        let (offset, axes) = resolve(self, items)?;
        Ok(self.view_of(offset, axes))
    }

    /// Assign `value` to a subscript, broadcasting it to the selected shape.
    pub fn set_item(&self, items: &[IndexItem], value: impl IntoArray) -> Result<()> {
        let dest = self.view_item(items)?;
        let mut src = value.into_array_as(self.kind())?;
        if src.shares_buffer(self) {
            debug!("set_item source aliases destination, copying first");
            src = src.to_owned_contiguous()?;
        }
        let bc = broadcast(&dest, &src)?;
        if bc.left_expanded {
            return Err(NdError::DestinationBroadcast {
                dest: dest.shape(),
                broadcast: bc.left.shape(),
            });
        }
        ufunc::copy_into(&bc.left, &bc.right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ElementKind;
    use crate::value::Value;

    fn arange(shape: &[usize]) -> NdArray {
        let n: usize = shape.iter().product();
        NdArray::from_shape_vec(shape, (0..n).map(|i| i as f64).collect()).unwrap()
    }

    fn sl(start: Option<isize>, stop: Option<isize>, step: Option<isize>) -> IndexItem {
        IndexItem::Slice(SliceSpec::new(start, stop, step))
    }

    #[test]
    fn test_slice_indices() {
        assert_eq!(SliceSpec::full().indices(5).unwrap(), (0, 1, 5));
        assert_eq!(SliceSpec::reversed().indices(5).unwrap(), (4, -1, 5));
        assert_eq!(SliceSpec::range(1, 3).indices(5).unwrap(), (1, 1, 2));
        assert_eq!(SliceSpec::range(-2, 100).indices(5).unwrap(), (3, 1, 2));
        assert_eq!(
            SliceSpec::new(None, None, Some(2)).indices(5).unwrap(),
            (0, 2, 3)
        );
        assert_eq!(
            SliceSpec::new(Some(4), Some(0), Some(-3)).indices(5).unwrap(),
            (4, -3, 2)
        );
        assert_eq!(SliceSpec::range(3, 1).indices(5).unwrap().2, 0);
        assert_eq!(SliceSpec::reversed().indices(0).unwrap().2, 0);
        assert!(SliceSpec::new(None, None, Some(0)).indices(5).is_err());
    }

    #[test]
    fn test_integer_index_scalar() {
        let a = arange(&[3, 4]);
        let item = a.get_item(&[IndexItem::Int(1), IndexItem::Int(-1)]).unwrap();
        assert_eq!(item.as_scalar(), Some(Value::Float(7.0)));
        assert!(matches!(
            a.get_item(&[IndexItem::Int(3)]),
            Err(NdError::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert!(a.get_item(&[IndexItem::Int(-4)]).is_err());
    }

    #[test]
    fn test_row_view() {
        let a = arange(&[3, 4]);
        let row = a.get_item(&[IndexItem::Int(2)]).unwrap().into_array().unwrap();
        assert_eq!(row.shape(), vec![4]);
        assert_eq!(row.to_f64_vec().unwrap(), vec![8., 9., 10., 11.]);
        assert!(row.shares_buffer(&a));
    }

    #[test]
    fn test_slice_view() {
        let a = arange(&[5]);
        let v = a.get_item(&[IndexItem::Slice(SliceSpec::range(1, 3))]).unwrap().into_array().unwrap();
        assert_eq!(v.to_f64_vec().unwrap(), vec![1.0, 2.0]);
        let r = a.get_item(&[sl(None, None, Some(-2))]).unwrap().into_array().unwrap();
        assert_eq!(r.to_f64_vec().unwrap(), vec![4.0, 2.0, 0.0]);
        assert_eq!(r.strides(), vec![-2]);
    }

    #[test]
    fn test_ellipsis_aligns_tail() {
        let a = arange(&[2, 3, 4]);
        let v = a
            .get_item(&[IndexItem::Ellipsis, IndexItem::Int(1)])
            .unwrap()
            .into_array()
            .unwrap();
        assert_eq!(v.shape(), vec![2, 3]);
        assert_eq!(v.get(&[1, 2]).unwrap(), Value::Float(21.0));

        let w = a
            .get_item(&[IndexItem::Int(0), IndexItem::Ellipsis, IndexItem::Int(2)])
            .unwrap()
            .into_array()
            .unwrap();
        assert_eq!(w.to_f64_vec().unwrap(), vec![2.0, 6.0, 10.0]);
    }

    #[test]
    fn test_ellipsis_errors() {
        let a = arange(&[2, 2]);
        assert!(matches!(
            a.get_item(&[IndexItem::Ellipsis, IndexItem::Ellipsis]),
            Err(NdError::MultipleEllipsis)
        ));
        assert!(matches!(
            a.get_item(&[IndexItem::Int(0), IndexItem::Int(0), IndexItem::Int(0)]),
            Err(NdError::TooManyIndices { count: 3, rank: 2 })
        ));
    }

    #[test]
    fn test_new_axis() {
        let a = arange(&[3]);
        let v = a
            .get_item(&[IndexItem::NewAxis, IndexItem::Slice(SliceSpec::full())])
            .unwrap()
            .into_array()
            .unwrap();
        assert_eq!(v.shape(), vec![1, 3]);
        let w = a
            .get_item(&[IndexItem::Ellipsis, IndexItem::NewAxis])
            .unwrap()
            .into_array()
            .unwrap();
        assert_eq!(w.shape(), vec![3, 1]);
    }

    #[test]
    fn test_set_item_broadcasts_scalar() {
        let a = arange(&[2, 3]);
        a.set_item(&[IndexItem::Int(0)], 9.0).unwrap();
        assert_eq!(
            a.to_f64_vec().unwrap(),
            vec![9., 9., 9., 3., 4., 5.]
        );
    }

    #[test]
    fn test_set_item_rejects_expanding_destination() {
        let a = arange(&[3]);
        let src = arange(&[2, 3]);
        assert!(matches!(
            a.set_item(&[IndexItem::Slice(SliceSpec::full())], &src),
            Err(NdError::DestinationBroadcast { .. })
        ));
        assert!(matches!(
            a.set_item(&[IndexItem::Slice(SliceSpec::full())], vec![1.0, 2.0]),
            Err(NdError::BroadcastMismatch(..))
        ));
    }

    #[test]
    fn test_set_item_overlapping_source() {
        let a = arange(&[5]);
        let head = a.view_item(&[IndexItem::Slice(SliceSpec::range(0, 4))]).unwrap();
        a.set_item(&[IndexItem::Slice(SliceSpec::range(1, 5))], &head).unwrap();
        assert_eq!(a.to_f64_vec().unwrap(), vec![0., 0., 1., 2., 3.]);
    }

    #[test]
    fn test_set_item_casts_into_kind() {
        let a = NdArray::allocate(ElementKind::Int32, &[2]).unwrap();
        a.set_item(&[IndexItem::Int(1)], 2.7).unwrap();
        assert_eq!(a.to_vec(), vec![Value::Int(0), Value::Int(2)]);
    }
}
