//! The strided array model.
//!
//! The address of logical index `(i0, ..., i{r-1})` is
//! `base_offset + sum(ik * stride_k)`. Every view operation is a rewrite of
//! `(base_offset, axes)` over the same shared buffer.

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::kernel::Odometer;
use crate::kind::ElementKind;
use crate::storage::Storage;
use crate::ufunc;
use crate::value::{Nested, Value};
use crate::{NdError, Result, MAX_DIMS};

/// Length and stride (in elements) of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimInfo {
    pub len: usize,
    pub stride: isize,
}

impl DimInfo {
    pub fn new(len: usize, stride: isize) -> Self {
        Self { len, stride }
    }
}

/// Axis list of an array. Never exceeds [`MAX_DIMS`] entries.
pub type Axes = SmallVec<[DimInfo; MAX_DIMS]>;

/// Row-major strides for the given lengths.
pub(crate) fn row_major_axes(lens: &[usize]) -> Axes {
    let mut axes: Axes = lens.iter().map(|&len| DimInfo::new(len, 0)).collect();
    let mut stride = 1isize;
    for ax in axes.iter_mut().rev() {
        ax.stride = stride;
        stride *= ax.len.max(1) as isize;
    }
    axes
}

/// An n-dimensional array or a view over another array's buffer.
///
/// Cloning is cheap and produces another handle onto the same elements.
#[derive(Clone)]
pub struct NdArray {
    kind: ElementKind,
    axes: Axes,
    base_offset: isize,
    buffer: Rc<Storage>,
    contiguous_owned: bool,
}

impl fmt::Debug for NdArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdArray")
            .field("kind", &self.kind)
            .field("shape", &self.shape())
            .field("strides", &self.strides())
            .field("base_offset", &self.base_offset)
            .field("contiguous_owned", &self.contiguous_owned)
            .finish()
    }
}

impl NdArray {
    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    /// Allocate a zero-filled, row-major owning array.
    ///
    /// Rank 0 is permitted and holds a single element.
    pub fn allocate(kind: ElementKind, lens: &[usize]) -> Result<Self> {
        if lens.len() > MAX_DIMS {
            return Err(NdError::TooManyDims { rank: lens.len() });
        }
        let size: usize = lens.iter().product();
        Ok(Self {
            kind,
            axes: row_major_axes(lens),
            base_offset: 0,
            buffer: Rc::new(Storage::new(kind, size)),
            contiguous_owned: true,
        })
    }

    /// Alias of [`NdArray::allocate`].
    pub fn zeros(kind: ElementKind, lens: &[usize]) -> Result<Self> {
        Self::allocate(kind, lens)
    }

    /// A non-owning view sharing this array's buffer with new offset and axes.
    pub fn view_of(&self, base_offset: isize, axes: Axes) -> Self {
        Self {
            kind: self.kind,
            axes,
            base_offset,
            buffer: Rc::clone(&self.buffer),
            contiguous_owned: false,
        }
    }

    /// Allocate with the leading `rank - trim` lengths of `other`.
    pub fn like_trimmed(kind: ElementKind, other: &NdArray, trim: usize) -> Result<Self> {
        let keep = other.rank().saturating_sub(trim);
        let lens: SmallVec<[usize; MAX_DIMS]> =
            other.axes[..keep].iter().map(|ax| ax.len).collect();
        Self::allocate(kind, &lens)
    }

    /// A rank-0 array holding one value.
    pub fn from_scalar(value: Value, kind: ElementKind) -> Result<Self> {
        let arr = Self::allocate(kind, &[])?;
        arr.buffer.set(0, value)?;
        Ok(arr)
    }

    /// Build from a nested sequence; shape comes from the first element at each depth.
    pub fn from_nested(nested: &Nested, kind: ElementKind) -> Result<Self> {
        let mut lens: SmallVec<[usize; MAX_DIMS]> = SmallVec::new();
        let mut cursor = nested;
        while let Nested::Seq(items) = cursor {
            if lens.len() == MAX_DIMS {
                return Err(NdError::TooManyDims { rank: MAX_DIMS + 1 });
            }
            lens.push(items.len());
            match items.first() {
                Some(first) => cursor = first,
                None => break,
            }
        }
        let arr = Self::allocate(kind, &lens)?;
        let mut next = 0usize;
        fill_nested(&arr, nested, &lens, &mut next)?;
        Ok(arr)
    }

    /// Build a rank-1 array from an iterator of known length.
    pub fn from_exact_iter<I>(iter: I, kind: ElementKind) -> Result<Self>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
        I::Item: Into<Value>,
    {
        let iter = iter.into_iter();
        let len = iter.len();
        let arr = Self::allocate(kind, &[len])?;
        let mut count = 0usize;
        for v in iter {
            if count == len {
                return Err(NdError::ShapeMismatch(vec![len], vec![count + 1]));
            }
            arr.buffer.set(count, v.into())?;
            count += 1;
        }
        if count != len {
            return Err(NdError::ShapeMismatch(vec![len], vec![count]));
        }
        Ok(arr)
    }

    /// Build a `Float64` array of the given shape from row-major data.
    pub fn from_shape_vec(lens: &[usize], data: Vec<f64>) -> Result<Self> {
        let size: usize = lens.iter().product();
        if size != data.len() {
            return Err(NdError::SizeMismatch {
                from: data.len(),
                to: size,
            });
        }
        let arr = Self::allocate(ElementKind::Float64, lens)?;
        if let Some(cells) = arr.buffer.as_f64() {
            for (c, x) in cells.iter().zip(data) {
                c.set(x);
            }
        }
        Ok(arr)
    }

    /// Copy of another array, optionally cast to a different kind.
    pub fn from_array(src: &NdArray, kind: Option<ElementKind>) -> Result<Self> {
        let dest = Self::allocate(kind.unwrap_or(src.kind), &src.shape())?;
        ufunc::copy_into(&dest, src)?;
        Ok(dest)
    }

    /// Host-level constructor: any input, optional element kind.
    pub fn array(input: impl IntoArray, kind: Option<ElementKind>) -> Result<Self> {
        let arr = match kind {
            Some(kind) => input.into_array_as(kind)?,
            None => input.into_array()?,
        };
        Self::from_array(&arr, kind)
    }

    /// Materialize into a fresh contiguous owning copy of the same kind.
    pub fn to_owned_contiguous(&self) -> Result<Self> {
        Self::from_array(self, None)
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn rank(&self) -> usize {
        self.axes.len()
    }

    pub fn axes(&self) -> &[DimInfo] {
        &self.axes
    }

    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(|ax| ax.len).collect()
    }

    pub fn strides(&self) -> Vec<isize> {
        self.axes.iter().map(|ax| ax.stride).collect()
    }

    pub fn base_offset(&self) -> isize {
        self.base_offset
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.axes.iter().map(|ax| ax.len).product()
    }

    pub fn is_contiguous_owned(&self) -> bool {
        self.contiguous_owned
    }

    /// Length of the first axis.
    pub fn len_first_axis(&self) -> Result<usize> {
        self.axes.first().map(|ax| ax.len).ok_or(NdError::Unsized)
    }

    /// Truth value of a single-element array.
    pub fn truthy(&self) -> Result<bool> {
        if self.size() != 1 {
            return Err(NdError::AmbiguousTruth);
        }
        let zero: SmallVec<[usize; MAX_DIMS]> = SmallVec::from_elem(0, self.rank());
        Ok(self.get(&zero)?.truthy())
    }

    /// Whether both handles describe exactly the same elements.
    pub fn is_same(&self, other: &NdArray) -> bool {
        Rc::ptr_eq(&self.buffer, &other.buffer)
            && self.kind == other.kind
            && self.base_offset == other.base_offset
            && self.axes == other.axes
    }

    /// Whether both arrays use the same underlying buffer.
    pub fn shares_buffer(&self, other: &NdArray) -> bool {
        Rc::ptr_eq(&self.buffer, &other.buffer)
    }

    // ------------------------------------------------------------------------
    // Element access
    // ------------------------------------------------------------------------

    /// Buffer position of a logical index.
    pub fn address(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.rank() {
            return Err(NdError::TooManyIndices {
                count: index.len(),
                rank: self.rank(),
            });
        }
        let mut addr = self.base_offset;
        for (&i, ax) in index.iter().zip(&self.axes) {
            if i >= ax.len {
                return Err(NdError::IndexOutOfRange {
                    index: i as isize,
                    len: ax.len,
                });
            }
            addr += i as isize * ax.stride;
        }
        Ok(addr as usize)
    }

    pub fn get(&self, index: &[usize]) -> Result<Value> {
        Ok(self.buffer.get(self.address(index)?))
    }

    pub fn set(&self, index: &[usize], value: impl Into<Value>) -> Result<()> {
        self.buffer.set(self.address(index)?, value.into())
    }

    /// All elements in row-major logical order.
    pub fn to_vec(&self) -> Vec<Value> {
        let strides = self.strides();
        Odometer::new(&self.shape(), [self.base_offset], [&strides[..]])
            .map(|[off]| self.buffer.get(off as usize))
            .collect()
    }

    /// All elements as `f64`, in row-major logical order.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        Ok(self.to_vec().into_iter().map(Value::as_f64).collect())
    }

    pub(crate) fn buffer(&self) -> &Storage {
        &self.buffer
    }
}

fn fill_nested(arr: &NdArray, nested: &Nested, lens: &[usize], next: &mut usize) -> Result<()> {
    match (nested, lens.split_first()) {
        (Nested::Scalar(v), None) => {
            arr.buffer.set(*next, *v)?;
            *next += 1;
            Ok(())
        }
        (Nested::Seq(items), Some((&len, rest))) if items.len() == len => {
            for item in items {
                fill_nested(arr, item, rest, next)?;
            }
            Ok(())
        }
        _ => Err(NdError::RaggedSequence),
    }
}

// ============================================================================
// Host input conversion
// ============================================================================

/// Conversion of host inputs into arrays.
///
/// Arrays pass through as handles onto the same buffer and keep their
/// kind. Scalars and sequences are stored in the requested kind when it can
/// hold them: ints never narrow to `Bool`, and floats never narrow to an
/// integer kind (both fall back to `Int64` / `Float64`). Without a requested
/// kind, host values become `Float64`.
pub trait IntoArray: Sized {
    fn into_array_as(self, kind: ElementKind) -> Result<NdArray>;

    fn into_array(self) -> Result<NdArray> {
        self.into_array_as(ElementKind::Float64)
    }

    /// Whether the input already is an array, whose own kind is kept.
    fn is_array(&self) -> bool {
        false
    }
}

/// Kind a host value of `widest`'s category is stored in when `requested` is asked for.
fn host_kind(requested: ElementKind, widest: Value) -> ElementKind {
    match widest {
        Value::Bool(_) => requested,
        Value::Int(_) if requested != ElementKind::Bool => requested,
        Value::Int(_) => ElementKind::Int64,
        Value::Float(_) if requested.is_float() || requested.is_object() => requested,
        Value::Float(_) => ElementKind::Float64,
    }
}

/// Widest leaf category of a nested input: bool < int < float.
fn widest_leaf(nested: &Nested) -> Value {
    fn rank(v: Value) -> u8 {
        match v {
            Value::Bool(_) => 0,
            Value::Int(_) => 1,
            Value::Float(_) => 2,
        }
    }
    match nested {
        Nested::Scalar(v) => *v,
        Nested::Seq(items) => items
            .iter()
            .map(widest_leaf)
            .max_by_key(|v| rank(*v))
            .unwrap_or(Value::Bool(false)),
    }
}

impl IntoArray for NdArray {
    fn into_array_as(self, _kind: ElementKind) -> Result<NdArray> {
        Ok(self)
    }

    fn is_array(&self) -> bool {
        true
    }
}

impl IntoArray for &NdArray {
    fn into_array_as(self, _kind: ElementKind) -> Result<NdArray> {
        Ok(self.clone())
    }

    fn is_array(&self) -> bool {
        true
    }
}

impl IntoArray for Value {
    fn into_array_as(self, kind: ElementKind) -> Result<NdArray> {
        NdArray::from_scalar(self, host_kind(kind, self))
    }
}

impl IntoArray for f64 {
    fn into_array_as(self, kind: ElementKind) -> Result<NdArray> {
        Value::Float(self).into_array_as(kind)
    }
}

impl IntoArray for i64 {
    fn into_array_as(self, kind: ElementKind) -> Result<NdArray> {
        Value::Int(self).into_array_as(kind)
    }
}

impl IntoArray for bool {
    fn into_array_as(self, kind: ElementKind) -> Result<NdArray> {
        Value::Bool(self).into_array_as(kind)
    }
}

impl IntoArray for &Nested {
    fn into_array_as(self, kind: ElementKind) -> Result<NdArray> {
        NdArray::from_nested(self, host_kind(kind, widest_leaf(self)))
    }
}

impl IntoArray for Nested {
    fn into_array_as(self, kind: ElementKind) -> Result<NdArray> {
        (&self).into_array_as(kind)
    }
}

impl IntoArray for Vec<f64> {
    fn into_array_as(self, kind: ElementKind) -> Result<NdArray> {
        match host_kind(kind, Value::Float(0.0)) {
            ElementKind::Float64 => {
                let len = self.len();
                NdArray::from_shape_vec(&[len], self)
            }
            other => NdArray::from_exact_iter(self, other),
        }
    }
}

impl IntoArray for &[f64] {
    fn into_array_as(self, kind: ElementKind) -> Result<NdArray> {
        self.to_vec().into_array_as(kind)
    }
}

impl IntoArray for Item {
    fn into_array_as(self, kind: ElementKind) -> Result<NdArray> {
        match self {
            Item::Scalar(v) => v.into_array_as(kind),
            Item::Array(a) => Ok(a),
        }
    }

    fn is_array(&self) -> bool {
        matches!(self, Item::Array(_))
    }
}

// ============================================================================
// Operation results
// ============================================================================

/// Result of an operation: rank-0 results are unwrapped to scalars.
#[derive(Debug, Clone)]
pub enum Item {
    Scalar(Value),
    Array(NdArray),
}

impl Item {
    /// Wrap an array, unwrapping rank 0 into its single value.
    pub fn from_array(arr: NdArray) -> Result<Self> {
        if arr.rank() == 0 {
            Ok(Item::Scalar(arr.get(&[])?))
        } else {
            Ok(Item::Array(arr))
        }
    }

    /// The array, with a scalar materialized as a rank-0 `Float64` array.
    pub fn into_array(self) -> Result<NdArray> {
        match self {
            Item::Scalar(v) => IntoArray::into_array(v),
            Item::Array(a) => Ok(a),
        }
    }

    pub fn as_scalar(&self) -> Option<Value> {
        match self {
            Item::Scalar(v) => Some(*v),
            Item::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Item::Scalar(_) => None,
            Item::Array(a) => Some(a),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_row_major() {
        let a = NdArray::allocate(ElementKind::Float64, &[2, 3, 4]).unwrap();
        assert_eq!(a.shape(), vec![2, 3, 4]);
        assert_eq!(a.strides(), vec![12, 4, 1]);
        assert!(a.is_contiguous_owned());
        assert_eq!(a.size(), 24);
    }

    #[test]
    fn test_allocate_rank0_and_empty() {
        let s = NdArray::allocate(ElementKind::Int32, &[]).unwrap();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.size(), 1);
        assert_eq!(s.get(&[]).unwrap(), Value::Int(0));

        let e = NdArray::allocate(ElementKind::Float64, &[0, 3]).unwrap();
        assert_eq!(e.size(), 0);
        assert!(e.to_vec().is_empty());
    }

    #[test]
    fn test_allocate_too_many_dims() {
        let err = NdArray::allocate(ElementKind::Float64, &[1; 9]).unwrap_err();
        assert!(matches!(err, NdError::TooManyDims { rank: 9 }));
    }

    #[test]
    fn test_view_of_shares_buffer() {
        let a = NdArray::from_shape_vec(&[2, 3], vec![0., 1., 2., 3., 4., 5.]).unwrap();
        let col = a.view_of(1, [DimInfo::new(2, 3)].into_iter().collect());
        assert!(!col.is_contiguous_owned());
        assert_eq!(col.to_f64_vec().unwrap(), vec![1.0, 4.0]);
        col.set(&[1], 40.0).unwrap();
        assert_eq!(a.get(&[1, 1]).unwrap(), Value::Float(40.0));
        assert!(a.shares_buffer(&col));
        assert!(!a.is_same(&col));
    }

    #[test]
    fn test_like_trimmed() {
        let a = NdArray::allocate(ElementKind::Float64, &[2, 3, 4]).unwrap();
        let t = NdArray::like_trimmed(ElementKind::Bool, &a, 2).unwrap();
        assert_eq!(t.shape(), vec![2]);
        assert_eq!(t.kind(), ElementKind::Bool);
    }

    #[test]
    fn test_from_nested() {
        let n = Nested::from_rows([[1, 2, 3], [4, 5, 6]]);
        let a = NdArray::from_nested(&n, ElementKind::Int64).unwrap();
        assert_eq!(a.shape(), vec![2, 3]);
        assert_eq!(a.get(&[1, 2]).unwrap(), Value::Int(6));
    }

    #[test]
    fn test_from_nested_ragged() {
        let n = Nested::Seq(vec![
            Nested::from_values([1.0, 2.0]),
            Nested::from_values([3.0]),
        ]);
        assert!(matches!(
            NdArray::from_nested(&n, ElementKind::Float64),
            Err(NdError::RaggedSequence)
        ));
        let mixed = Nested::Seq(vec![Nested::from_values([1.0]), Nested::from(2.0)]);
        assert!(NdArray::from_nested(&mixed, ElementKind::Float64).is_err());
    }

    #[test]
    fn test_from_nested_scalar_is_rank0() {
        let a = NdArray::from_nested(&Nested::from(3.5), ElementKind::Float64).unwrap();
        assert_eq!(a.rank(), 0);
        assert_eq!(a.get(&[]).unwrap(), Value::Float(3.5));
    }

    #[test]
    fn test_from_exact_iter() {
        let a = NdArray::from_exact_iter([1i64, 2, 3], ElementKind::Int8).unwrap();
        assert_eq!(a.shape(), vec![3]);
        assert_eq!(a.get(&[2]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_from_array_casts() {
        let a = NdArray::from_shape_vec(&[3], vec![1.5, -2.5, 3.0]).unwrap();
        let b = NdArray::from_array(&a, Some(ElementKind::Int32)).unwrap();
        assert_eq!(b.kind(), ElementKind::Int32);
        assert_eq!(
            b.to_vec(),
            vec![Value::Int(1), Value::Int(-2), Value::Int(3)]
        );
        assert!(!b.shares_buffer(&a));
    }

    #[test]
    fn test_len_and_truthy() {
        let a = NdArray::from_shape_vec(&[2, 2], vec![0.0; 4]).unwrap();
        assert_eq!(a.len_first_axis().unwrap(), 2);
        assert!(matches!(a.truthy(), Err(NdError::AmbiguousTruth)));

        let s = NdArray::from_scalar(Value::Float(2.0), ElementKind::Float64).unwrap();
        assert!(matches!(s.len_first_axis(), Err(NdError::Unsized)));
        assert!(s.truthy().unwrap());
    }

    #[test]
    fn test_address_formula() {
        let a = NdArray::allocate(ElementKind::Float64, &[3, 4]).unwrap();
        let v = a.view_of(11, [DimInfo::new(3, -4), DimInfo::new(4, -1)].into_iter().collect());
        assert_eq!(v.address(&[0, 0]).unwrap(), 11);
        assert_eq!(v.address(&[2, 3]).unwrap(), 0);
        assert!(v.address(&[3, 0]).is_err());
    }

    #[test]
    fn test_item_from_array() {
        let s = NdArray::from_scalar(Value::Int(4), ElementKind::Int64).unwrap();
        assert_eq!(Item::from_array(s).unwrap().as_scalar(), Some(Value::Int(4)));
        let a = NdArray::allocate(ElementKind::Float64, &[1]).unwrap();
        assert!(Item::from_array(a).unwrap().as_array().is_some());
    }
}
