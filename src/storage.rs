//! Typed element buffers.
//!
//! Buffers are shared between an owner and all of its views through `Rc`,
//! and elements live in `Cell`s so writes through one view are visible
//! through every overlapping view, including an operand that aliases the
//! destination of the same operation.

use std::cell::Cell;

use num_traits::{NumCast, ToPrimitive};

use crate::kind::ElementKind;
use crate::value::Value;
use crate::{NdError, Result};

/// Native element types and their conversion to and from host values.
pub(crate) trait Element: Copy + Default {
    const KIND: ElementKind;

    fn to_value(self) -> Value;

    /// `None` when the value does not fit.
    fn from_value(v: Value) -> Option<Self>;
}

macro_rules! impl_int_element {
    ($($t:ty => $kind:ident),* $(,)?) => {$(
        impl Element for $t {
            const KIND: ElementKind = ElementKind::$kind;

            #[inline]
            fn to_value(self) -> Value {
                match self.to_i64() {
                    Some(i) => Value::Int(i),
                    None => Value::Float(self as f64),
                }
            }

            #[inline]
            fn from_value(v: Value) -> Option<Self> {
                match v {
                    Value::Bool(b) => Some(b as u8 as $t),
                    Value::Int(i) => <$t as NumCast>::from(i),
                    // Truncates toward zero; NaN and out-of-range give None.
                    Value::Float(x) => <$t as NumCast>::from(x),
                }
            }
        }
    )*};
}

impl_int_element!(
    i8 => Int8, u8 => UInt8, i16 => Int16, u16 => UInt16,
    i32 => Int32, u32 => UInt32, i64 => Int64, u64 => UInt64,
);

macro_rules! impl_float_element {
    ($($t:ty => $kind:ident),* $(,)?) => {$(
        impl Element for $t {
            const KIND: ElementKind = ElementKind::$kind;

            #[inline]
            fn to_value(self) -> Value {
                Value::Float(self as f64)
            }

            #[inline]
            fn from_value(v: Value) -> Option<Self> {
                match v {
                    Value::Bool(b) => Some(b as u8 as $t),
                    Value::Int(i) => Some(i as $t),
                    Value::Float(x) if !x.is_finite() => Some(x as $t),
                    Value::Float(x) => <$t as NumCast>::from(x),
                }
            }
        }
    )*};
}

impl_float_element!(f32 => Float32, f64 => Float64);

impl Element for bool {
    const KIND: ElementKind = ElementKind::Bool;

    fn to_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(v: Value) -> Option<Self> {
        Some(v.truthy())
    }
}

impl Element for Value {
    const KIND: ElementKind = ElementKind::Object;

    fn to_value(self) -> Value {
        self
    }

    fn from_value(v: Value) -> Option<Self> {
        Some(v)
    }
}

pub(crate) type Cells<T> = Box<[Cell<T>]>;

/// Backing storage of an array, one variant per element kind.
pub(crate) enum Storage {
    Bool(Cells<bool>),
    Int8(Cells<i8>),
    UInt8(Cells<u8>),
    Int16(Cells<i16>),
    UInt16(Cells<u16>),
    Int32(Cells<i32>),
    UInt32(Cells<u32>),
    Int64(Cells<i64>),
    UInt64(Cells<u64>),
    Float32(Cells<f32>),
    Float64(Cells<f64>),
    Object(Cells<Value>),
}

macro_rules! with_cells {
    ($storage:expr, $cells:ident => $body:expr) => {
        match $storage {
            Storage::Bool($cells) => $body,
            Storage::Int8($cells) => $body,
            Storage::UInt8($cells) => $body,
            Storage::Int16($cells) => $body,
            Storage::UInt16($cells) => $body,
            Storage::Int32($cells) => $body,
            Storage::UInt32($cells) => $body,
            Storage::Int64($cells) => $body,
            Storage::UInt64($cells) => $body,
            Storage::Float32($cells) => $body,
            Storage::Float64($cells) => $body,
            Storage::Object($cells) => $body,
        }
    };
}

fn zeroed<T: Element>(len: usize) -> Cells<T> {
    (0..len).map(|_| Cell::new(T::default())).collect()
}

#[inline]
fn store<T: Element>(cells: &[Cell<T>], idx: usize, v: Value) -> Result<()> {
    let x = T::from_value(v).ok_or_else(|| NdError::ValueOverflow {
        value: v.to_string(),
        kind: T::KIND.name(),
    })?;
    cells[idx].set(x);
    Ok(())
}

#[inline]
fn copy_cells<T: Copy>(src: &[Cell<T>], src_at: usize, dst: &[Cell<T>], dst_at: usize, count: usize) {
    for (d, s) in dst[dst_at..dst_at + count]
        .iter()
        .zip(&src[src_at..src_at + count])
    {
        d.set(s.get());
    }
}

impl Storage {
    /// Zero-initialized storage for `len` elements.
    pub(crate) fn new(kind: ElementKind, len: usize) -> Self {
        match kind {
            ElementKind::Bool => Storage::Bool(zeroed(len)),
            ElementKind::Int8 => Storage::Int8(zeroed(len)),
            ElementKind::UInt8 => Storage::UInt8(zeroed(len)),
            ElementKind::Int16 => Storage::Int16(zeroed(len)),
            ElementKind::UInt16 => Storage::UInt16(zeroed(len)),
            ElementKind::Int32 => Storage::Int32(zeroed(len)),
            ElementKind::UInt32 => Storage::UInt32(zeroed(len)),
            ElementKind::Int64 => Storage::Int64(zeroed(len)),
            ElementKind::UInt64 => Storage::UInt64(zeroed(len)),
            ElementKind::Float32 => Storage::Float32(zeroed(len)),
            ElementKind::Float64 => Storage::Float64(zeroed(len)),
            ElementKind::Object => Storage::Object(zeroed(len)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        with_cells!(self, c => c.len())
    }

    #[inline]
    pub(crate) fn get(&self, idx: usize) -> Value {
        with_cells!(self, c => c[idx].get().to_value())
    }

    /// Store a host value, converting it to the buffer's kind.
    #[inline]
    pub(crate) fn set(&self, idx: usize, v: Value) -> Result<()> {
        with_cells!(self, c => store(c, idx, v))
    }

    /// Native view for the `f64` fast paths.
    #[inline]
    pub(crate) fn as_f64(&self) -> Option<&[Cell<f64>]> {
        match self {
            Storage::Float64(c) => Some(c),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn as_bool(&self) -> Option<&[Cell<bool>]> {
        match self {
            Storage::Bool(c) => Some(c),
            _ => None,
        }
    }

    /// Copy a packed run of `count` elements between buffers of the same kind.
    ///
    /// Returns `false` when the kinds differ and nothing was copied.
    pub(crate) fn copy_run(
        &self,
        dst_at: usize,
        src: &Storage,
        src_at: usize,
        count: usize,
    ) -> bool {
        match (self, src) {
            (Storage::Bool(d), Storage::Bool(s)) => copy_cells(s, src_at, d, dst_at, count),
            (Storage::Int8(d), Storage::Int8(s)) => copy_cells(s, src_at, d, dst_at, count),
            (Storage::UInt8(d), Storage::UInt8(s)) => copy_cells(s, src_at, d, dst_at, count),
            (Storage::Int16(d), Storage::Int16(s)) => copy_cells(s, src_at, d, dst_at, count),
            (Storage::UInt16(d), Storage::UInt16(s)) => copy_cells(s, src_at, d, dst_at, count),
            (Storage::Int32(d), Storage::Int32(s)) => copy_cells(s, src_at, d, dst_at, count),
            (Storage::UInt32(d), Storage::UInt32(s)) => copy_cells(s, src_at, d, dst_at, count),
            (Storage::Int64(d), Storage::Int64(s)) => copy_cells(s, src_at, d, dst_at, count),
            (Storage::UInt64(d), Storage::UInt64(s)) => copy_cells(s, src_at, d, dst_at, count),
            (Storage::Float32(d), Storage::Float32(s)) => copy_cells(s, src_at, d, dst_at, count),
            (Storage::Float64(d), Storage::Float64(s)) => copy_cells(s, src_at, d, dst_at, count),
            (Storage::Object(d), Storage::Object(s)) => copy_cells(s, src_at, d, dst_at, count),
            _ => return false,
        }
        true
    }
}
