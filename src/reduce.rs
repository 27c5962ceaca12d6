//! Axis reductions.
//!
//! The axes to reduce are moved to the end with a permuted view, so every
//! output element folds one packed-in-order trailing block. Each fold runs
//! `init`, then `iterate` per element in row-major order, then `finish`.

use smallvec::SmallVec;
use tracing::debug;

use crate::array::{Axes, IntoArray, Item, NdArray};
use crate::config::ReduceOptions;
use crate::kernel::Odometer;
use crate::kind::ElementKind;
use crate::value::{BinaryOp, Value};
use crate::{NdError, Result, MAX_DIMS};

/// Reduction operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    Max,
    Min,
    Sum,
    Prod,
    Average,
    Any,
    All,
    ArgMax,
    ArgMin,
    Std,
}

impl ReduceOp {
    pub fn name(self) -> &'static str {
        match self {
            ReduceOp::Max => "max",
            ReduceOp::Min => "min",
            ReduceOp::Sum => "sum",
            ReduceOp::Prod => "prod",
            ReduceOp::Average => "average",
            ReduceOp::Any => "any",
            ReduceOp::All => "all",
            ReduceOp::ArgMax => "argmax",
            ReduceOp::ArgMin => "argmin",
            ReduceOp::Std => "std",
        }
    }

    fn is_logical(self) -> bool {
        matches!(self, ReduceOp::Any | ReduceOp::All)
    }
}

/// Axis argument: one axis or an ordered tuple, negative values counting from the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Axis {
    Single(isize),
    Many(Vec<isize>),
}

impl From<isize> for Axis {
    fn from(axis: isize) -> Self {
        Axis::Single(axis)
    }
}

impl From<Vec<isize>> for Axis {
    fn from(axes: Vec<isize>) -> Self {
        Axis::Many(axes)
    }
}

impl From<&[isize]> for Axis {
    fn from(axes: &[isize]) -> Self {
        Axis::Many(axes.to_vec())
    }
}

type AxisList = SmallVec<[usize; MAX_DIMS]>;

/// Normalize an axis argument against `rank`.
fn normalize_axes(axis: Option<&Axis>, rank: usize) -> Result<AxisList> {
    let raw: SmallVec<[isize; MAX_DIMS]> = match axis {
        None => return Ok((0..rank).collect()),
        Some(Axis::Single(a)) => smallvec::smallvec![*a],
        Some(Axis::Many(list)) if list.is_empty() => {
            return Err(NdError::InvalidArgument("axis tuple must not be empty"))
        }
        Some(Axis::Many(list)) => list.iter().copied().collect(),
    };
    let mut out = AxisList::new();
    for a in raw {
        let wrapped = if a < 0 { a + rank as isize } else { a };
        if wrapped < 0 || wrapped >= rank as isize {
            return Err(NdError::InvalidAxis { axis: a, rank });
        }
        let wrapped = wrapped as usize;
        if out.contains(&wrapped) {
            return Err(NdError::DuplicateAxis(wrapped));
        }
        out.push(wrapped);
    }
    Ok(out)
}

/// View of `src` with the remaining axes first, in order, and `axes` last, in the given order.
fn move_axes_last(src: &NdArray, axes: &[usize]) -> NdArray {
    let rank = src.rank();
    let trailing = axes.iter().copied().eq(rank - axes.len()..rank);
    if trailing {
        return src.clone();
    }
    let perm: Axes = (0..rank)
        .filter(|a| !axes.contains(a))
        .chain(axes.iter().copied())
        .map(|a| src.axes()[a])
        .collect();
    debug!(?axes, "reduction permutes axes to the end");
    src.view_of(src.base_offset(), perm)
}

// ============================================================================
// Fold state
// ============================================================================

/// Accumulator protocol shared by the native and generic reducers.
trait Reducer {
    type Elem: Copy;

    fn init(&mut self);
    fn iterate(&mut self, x: Self::Elem) -> Result<()>;
    fn finish(&mut self, count: usize) -> Result<Value>;
}

/// Native `f64` reducer.
struct FloatReducer {
    op: ReduceOp,
    acc: f64,
    is_first: bool,
}

impl FloatReducer {
    fn new(op: ReduceOp) -> Self {
        Self {
            op,
            acc: 0.0,
            is_first: true,
        }
    }
}

impl Reducer for FloatReducer {
    type Elem = f64;

    fn init(&mut self) {
        self.is_first = true;
        self.acc = match self.op {
            ReduceOp::Prod | ReduceOp::All => 1.0,
            _ => 0.0,
        };
    }

    #[inline]
    fn iterate(&mut self, x: f64) -> Result<()> {
        let first = std::mem::replace(&mut self.is_first, false);
        self.acc = match self.op {
            ReduceOp::Max if first || x > self.acc => x,
            ReduceOp::Min if first || x < self.acc => x,
            ReduceOp::Max | ReduceOp::Min => self.acc,
            ReduceOp::Sum | ReduceOp::Average => self.acc + x,
            ReduceOp::Prod => self.acc * x,
            ReduceOp::Any => f64::from(self.acc != 0.0 || x != 0.0),
            ReduceOp::All => f64::from(self.acc != 0.0 && x != 0.0),
            _ => return Err(NdError::NotImplemented(self.op.name())),
        };
        Ok(())
    }

    fn finish(&mut self, count: usize) -> Result<Value> {
        match self.op {
            ReduceOp::Max | ReduceOp::Min if self.is_first => {
                Err(NdError::EmptyReduction(self.op.name()))
            }
            ReduceOp::Average => Ok(Value::Float(self.acc / count as f64)),
            ReduceOp::Any | ReduceOp::All => Ok(Value::Bool(self.acc != 0.0)),
            _ => Ok(Value::Float(self.acc)),
        }
    }
}

/// Reducer over host values.
struct ValueReducer {
    op: ReduceOp,
    acc: Value,
    is_first: bool,
}

impl ValueReducer {
    fn new(op: ReduceOp) -> Self {
        Self {
            op,
            acc: Value::Int(0),
            is_first: true,
        }
    }
}

impl Reducer for ValueReducer {
    type Elem = Value;

    fn init(&mut self) {
        self.is_first = true;
        self.acc = match self.op {
            ReduceOp::Prod => Value::Int(1),
            ReduceOp::All => Value::Bool(true),
            ReduceOp::Any => Value::Bool(false),
            _ => Value::Int(0),
        };
    }

    fn iterate(&mut self, x: Value) -> Result<()> {
        let first = std::mem::replace(&mut self.is_first, false);
        self.acc = match self.op {
            ReduceOp::Max | ReduceOp::Min if first => x,
            ReduceOp::Max => {
                if Value::binary_op(BinaryOp::Greater, x, self.acc)?.truthy() {
                    x
                } else {
                    self.acc
                }
            }
            ReduceOp::Min => {
                if Value::binary_op(BinaryOp::Less, x, self.acc)?.truthy() {
                    x
                } else {
                    self.acc
                }
            }
            ReduceOp::Sum | ReduceOp::Average => Value::binary_op(BinaryOp::Add, self.acc, x)?,
            ReduceOp::Prod => Value::binary_op(BinaryOp::Multiply, self.acc, x)?,
            ReduceOp::Any => Value::Bool(self.acc.truthy() || x.truthy()),
            ReduceOp::All => Value::Bool(self.acc.truthy() && x.truthy()),
            _ => return Err(NdError::NotImplemented(self.op.name())),
        };
        Ok(())
    }

    fn finish(&mut self, count: usize) -> Result<Value> {
        match self.op {
            ReduceOp::Max | ReduceOp::Min if self.is_first => {
                Err(NdError::EmptyReduction(self.op.name()))
            }
            ReduceOp::Average => Ok(Value::Float(self.acc.as_f64() / count as f64)),
            _ => Ok(self.acc),
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Fold every trailing block of `src` into the matching element of `dest`.
fn run<R, F>(
    reducer: &mut R,
    dest: &NdArray,
    src: &NdArray,
    block_rank: usize,
    mut read: F,
) -> Result<()>
where
    R: Reducer,
    F: FnMut(usize) -> R::Elem,
{
    let outer = src.rank() - block_rank;
    let src_shape = src.shape();
    let src_strides = src.strides();
    let (outer_lens, block_lens) = src_shape.split_at(outer);
    let (outer_strides, block_strides) = src_strides.split_at(outer);
    let dest_strides = dest.strides();
    let count: usize = block_lens.iter().product();

    for [d, s] in Odometer::new(
        outer_lens,
        [dest.base_offset(), src.base_offset()],
        [&dest_strides[..], outer_strides],
    ) {
        reducer.init();
        for [off] in Odometer::new(block_lens, [s], [block_strides]) {
            reducer.iterate(read(off as usize))?;
        }
        dest.buffer().set(d as usize, reducer.finish(count)?)?;
    }
    Ok(())
}

/// Reduce `src` with `op` over the axes in `options`.
///
/// # Errors
/// `keepdims` and the index-returning reductions fail with
/// [`NdError::NotImplemented`]; a supplied `out` of the wrong shape fails
/// with [`NdError::ShapeMismatch`].
pub fn reduce(op: ReduceOp, src: impl IntoArray, options: ReduceOptions) -> Result<Item> {
    if options.keepdims {
        return Err(NdError::NotImplemented("keepdims"));
    }
    if matches!(op, ReduceOp::ArgMax | ReduceOp::ArgMin | ReduceOp::Std) {
        return Err(NdError::NotImplemented(op.name()));
    }
    let src = src.into_array()?;
    let axes = normalize_axes(options.axis.as_ref(), src.rank())?;
    let view = move_axes_last(&src, &axes);
    let outer = view.rank() - axes.len();

    let fast = view.kind() == ElementKind::Float64;
    let dest = match options.out {
        Some(out) => {
            let shape = view.shape();
            let expected = &shape[..outer];
            if out.shape() != expected {
                return Err(NdError::ShapeMismatch(out.shape(), expected.to_vec()));
            }
            out
        }
        None => {
            let kind = if op.is_logical() {
                ElementKind::Bool
            } else if fast {
                ElementKind::Float64
            } else if view.kind() == ElementKind::Object {
                ElementKind::Object
            } else {
                ElementKind::Float64
            };
            NdArray::like_trimmed(kind, &view, axes.len())?
        }
    };
    debug!(op = op.name(), fast, axes = ?axes, "reduce");

    match view.buffer().as_f64() {
        Some(cells) => {
            let mut reducer = FloatReducer::new(op);
            run(&mut reducer, &dest, &view, axes.len(), |i| cells[i].get())?;
        }
        None => {
            let buf = view.buffer();
            let mut reducer = ValueReducer::new(op);
            run(&mut reducer, &dest, &view, axes.len(), |i| buf.get(i))?;
        }
    }
    Item::from_array(dest)
}

macro_rules! reductions {
    ($($(#[$attr:meta])* $name:ident => $op:ident),* $(,)?) => {$(
        $(#[$attr])*
        pub fn $name(src: impl IntoArray, options: ReduceOptions) -> Result<Item> {
            reduce(ReduceOp::$op, src, options)
        }
    )*};
}

reductions!(
    max => Max,
    min => Min,
    sum => Sum,
    prod => Prod,
    /// Arithmetic mean; NaN for an empty block.
    average => Average,
    any => Any,
    all => All,
    /// Always fails with [`NdError::NotImplemented`].
    argmax => ArgMax,
    /// Always fails with [`NdError::NotImplemented`].
    argmin => ArgMin,
    /// Always fails with [`NdError::NotImplemented`].
    std => Std,
);
