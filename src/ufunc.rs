//! Elementwise dispatch engine.
//!
//! A spec pairs an inner kernel with `trailing_layers`, the number of
//! trailing axes the kernel walks itself. [`apply_unary`] and
//! [`apply_binary`] drive the kernel over every combination of the
//! remaining outer axes with an [`Odometer`]. Kernels are picked once per
//! call by the `find_*_spec` functions: native `f64` kernels when all
//! operands and the destination are `Float64`, otherwise generic kernels
//! that go through [`Value`].
//!
//! A failing kernel aborts the application; elements written before the
//! failure stay written.

use tracing::{debug, trace};

use crate::array::{DimInfo, NdArray};
use crate::config::IsCloseOptions;
use crate::kernel::Odometer;
use crate::kind::ElementKind;
use crate::math::{isclose_f64, FloatFunc};
use crate::value::{float_arith, float_compare, BinaryOp, UnaryOp, Value};
use crate::{NdError, Result};

// ============================================================================
// Specs
// ============================================================================

/// Inner kernels taking one source operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryKernel {
    /// Bulk copy of a packed run of `count` elements of the same kind.
    CopyRun { count: usize },
    /// Element copy with conversion between kinds.
    CopyCast,
    /// `f64 -> f64` unary operator over the last axis.
    UnaryFloat1d(UnaryOp),
    /// Unary operator through host values.
    Unary(UnaryOp),
    /// `f64 -> f64` float function over the last axis.
    FloatFunc1d(FloatFunc),
    /// Float function on elements of any kind.
    FloatFunc(FloatFunc),
}

/// Inner kernels taking two source operands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryKernel {
    /// `f64 x f64 -> f64` arithmetic over the last axis.
    Float1d(BinaryOp),
    /// `f64 x f64 -> bool` comparison over the last axis.
    FloatCompare1d(BinaryOp),
    /// Any operator through host values.
    Generic(BinaryOp),
    /// Tolerance comparison into a bool destination.
    IsClose { options: IsCloseOptions, fast: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnarySpec {
    pub trailing_layers: usize,
    pub kernel: UnaryKernel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinarySpec {
    pub trailing_layers: usize,
    pub kernel: BinaryKernel,
}

// ============================================================================
// Spec selection
// ============================================================================

/// Pick a copy kernel for `src -> dest` of equal shape.
///
/// For equal kinds, trailing axes whose strides in both operands equal the
/// size of the packed chunk below them are collapsed into one run copy.
/// Length-1 axes always collapse.
pub fn find_copy_spec(dest: &NdArray, src: &NdArray) -> UnarySpec {
    if dest.kind() != src.kind() {
        debug!(from = %src.kind(), to = %dest.kind(), "copy spec: cast");
        return UnarySpec {
            trailing_layers: 0,
            kernel: UnaryKernel::CopyCast,
        };
    }
    let mut chunk = 1usize;
    let mut layers = 0usize;
    for (d, s) in dest.axes().iter().zip(src.axes()).rev() {
        if d.len == 1 {
            layers += 1;
            continue;
        }
        if d.stride != chunk as isize || s.stride != chunk as isize {
            break;
        }
        chunk *= d.len;
        layers += 1;
    }
    debug!(layers, count = chunk, "copy spec: run");
    UnarySpec {
        trailing_layers: layers,
        kernel: UnaryKernel::CopyRun { count: chunk },
    }
}

/// Pick a kernel for a unary operator; the result keeps the source kind.
pub fn find_unary_op_spec(op: UnaryOp, src: &NdArray) -> (ElementKind, UnarySpec) {
    let kind = src.kind();
    let spec = if kind == ElementKind::Float64 && src.rank() > 0 {
        UnarySpec {
            trailing_layers: 1,
            kernel: UnaryKernel::UnaryFloat1d(op),
        }
    } else {
        UnarySpec {
            trailing_layers: 0,
            kernel: UnaryKernel::Unary(op),
        }
    };
    debug!(op = op.symbol(), %kind, kernel = ?spec.kernel, "unary spec");
    (kind, spec)
}

/// Pick a kernel for an elementwise float function.
pub fn find_float_func_spec(func: FloatFunc, dest: &NdArray, src: &NdArray) -> UnarySpec {
    let fast = src.rank() > 0
        && src.kind() == ElementKind::Float64
        && dest.kind() == ElementKind::Float64;
    let spec = if fast {
        UnarySpec {
            trailing_layers: 1,
            kernel: UnaryKernel::FloatFunc1d(func),
        }
    } else {
        UnarySpec {
            trailing_layers: 0,
            kernel: UnaryKernel::FloatFunc(func),
        }
    };
    debug!(func = func.name(), fast, "float function spec");
    spec
}

/// Element kind of `lhs op rhs`.
///
/// Comparisons give bool. True division gives float unless the result is
/// written back into the left operand. Otherwise equal kinds are kept, a
/// float operand wins, then an object operand, else the left kind.
pub fn binary_result_kind(
    op: BinaryOp,
    lhs: ElementKind,
    rhs: ElementKind,
    in_place: bool,
) -> ElementKind {
    if in_place {
        return lhs;
    }
    if op.is_comparison() {
        return ElementKind::Bool;
    }
    if op == BinaryOp::TrueDivide {
        return ElementKind::Float64;
    }
    if lhs == rhs {
        return lhs;
    }
    if lhs.is_float() || rhs.is_float() {
        return ElementKind::Float64;
    }
    if lhs.is_object() || rhs.is_object() {
        return ElementKind::Object;
    }
    lhs
}

/// Pick a kernel for `dest = lhs op rhs`, all of equal shape.
pub fn find_binary_spec(op: BinaryOp, dest: &NdArray, lhs: &NdArray, rhs: &NdArray) -> BinarySpec {
    let float_operands = lhs.kind() == ElementKind::Float64
        && rhs.kind() == ElementKind::Float64
        && dest.rank() > 0;
    let spec = if float_operands && op.is_comparison() && dest.kind() == ElementKind::Bool {
        BinarySpec {
            trailing_layers: 1,
            kernel: BinaryKernel::FloatCompare1d(op),
        }
    } else if float_operands
        && !op.is_comparison()
        && !op.is_bitwise()
        && dest.kind() == ElementKind::Float64
    {
        BinarySpec {
            trailing_layers: 1,
            kernel: BinaryKernel::Float1d(op),
        }
    } else {
        BinarySpec {
            trailing_layers: 0,
            kernel: BinaryKernel::Generic(op),
        }
    };
    debug!(
        op = op.symbol(),
        lhs = %lhs.kind(),
        rhs = %rhs.kind(),
        dest = %dest.kind(),
        kernel = ?spec.kernel,
        "binary spec"
    );
    spec
}

/// Pick a kernel for `isclose` into a bool destination.
pub fn find_isclose_spec(
    options: IsCloseOptions,
    dest: &NdArray,
    a: &NdArray,
    b: &NdArray,
) -> BinarySpec {
    let fast = a.kind() == ElementKind::Float64
        && b.kind() == ElementKind::Float64
        && dest.kind() == ElementKind::Bool
        && dest.rank() > 0;
    debug!(fast, "isclose spec");
    BinarySpec {
        trailing_layers: usize::from(fast),
        kernel: BinaryKernel::IsClose { options, fast },
    }
}

// ============================================================================
// Application
// ============================================================================

fn check_shapes(dest: &NdArray, other: &NdArray) -> Result<()> {
    if dest.axes().len() != other.axes().len()
        || dest.axes().iter().zip(other.axes()).any(|(d, o)| d.len != o.len)
    {
        return Err(NdError::ShapeMismatch(dest.shape(), other.shape()));
    }
    Ok(())
}

fn outer_rank(dest: &NdArray, layers: usize) -> Result<usize> {
    dest.rank()
        .checked_sub(layers)
        .ok_or(NdError::TooManyDims { rank: layers })
}

/// Apply a unary spec to every element of `dest` and `src`, which must share a shape.
pub fn apply_unary(spec: &UnarySpec, dest: &NdArray, src: &NdArray) -> Result<()> {
    check_shapes(dest, src)?;
    if dest.size() == 0 {
        return Ok(());
    }
    let outer = outer_rank(dest, spec.trailing_layers)?;
    trace!(outer, trailing = spec.trailing_layers, kernel = ?spec.kernel, "apply unary");

    let shape = dest.shape();
    let lens = &shape[..outer];
    let (ds, ss) = (dest.strides(), src.strides());
    let dest_tail = &dest.axes()[outer..];
    let src_tail = &src.axes()[outer..];
    for [d, s] in Odometer::new(lens, [dest.base_offset(), src.base_offset()], [&ds[..], &ss[..]]) {
        unary_inner(&spec.kernel, dest, d, dest_tail, src, s, src_tail)?;
    }
    Ok(())
}

/// Apply a binary spec; `dest`, `lhs` and `rhs` must share a shape.
pub fn apply_binary(spec: &BinarySpec, dest: &NdArray, lhs: &NdArray, rhs: &NdArray) -> Result<()> {
    check_shapes(dest, lhs)?;
    check_shapes(dest, rhs)?;
    if dest.size() == 0 {
        return Ok(());
    }
    let outer = outer_rank(dest, spec.trailing_layers)?;
    trace!(outer, trailing = spec.trailing_layers, kernel = ?spec.kernel, "apply binary");

    let shape = dest.shape();
    let lens = &shape[..outer];
    let (ds, ls, rs) = (dest.strides(), lhs.strides(), rhs.strides());
    let tails = [
        &dest.axes()[outer..],
        &lhs.axes()[outer..],
        &rhs.axes()[outer..],
    ];
    let bases = [dest.base_offset(), lhs.base_offset(), rhs.base_offset()];
    for offsets in Odometer::new(lens, bases, [&ds[..], &ls[..], &rs[..]]) {
        binary_inner(&spec.kernel, [dest, lhs, rhs], offsets, tails)?;
    }
    Ok(())
}

/// Copy `src` into `dest` of equal shape, converting kinds as needed.
pub fn copy_into(dest: &NdArray, src: &NdArray) -> Result<()> {
    apply_unary(&find_copy_spec(dest, src), dest, src)
}

// ============================================================================
// Inner kernels
// ============================================================================

/// Length and strides of the single trailing axis of a 1-d kernel.
#[inline]
fn last_axis(dest: &[DimInfo], src: &[DimInfo]) -> (usize, isize, isize) {
    match (dest.first(), src.first()) {
        (Some(d), Some(s)) => (d.len, d.stride, s.stride),
        _ => (1, 0, 0),
    }
}

#[inline]
fn at(base: isize, i: usize, stride: isize) -> usize {
    (base + i as isize * stride) as usize
}

fn check_domain(func: FloatFunc, x: f64, ans: f64) -> Result<f64> {
    if (ans.is_nan() && !x.is_nan()) || (ans.is_infinite() && !x.is_infinite()) {
        return Err(NdError::MathDomain(func.name()));
    }
    Ok(ans)
}

fn unary_inner(
    kernel: &UnaryKernel,
    dest: &NdArray,
    d: isize,
    dest_tail: &[DimInfo],
    src: &NdArray,
    s: isize,
    src_tail: &[DimInfo],
) -> Result<()> {
    let (dbuf, sbuf) = (dest.buffer(), src.buffer());
    match *kernel {
        UnaryKernel::CopyRun { count } => {
            if !dbuf.copy_run(d as usize, sbuf, s as usize, count) {
                // Kinds differ; only reachable through a hand-built spec.
                for i in 0..count {
                    dbuf.set(d as usize + i, sbuf.get(s as usize + i))?;
                }
            }
        }
        UnaryKernel::CopyCast => dbuf.set(d as usize, sbuf.get(s as usize))?,
        UnaryKernel::Unary(op) => {
            dbuf.set(d as usize, Value::unary_op(op, sbuf.get(s as usize))?)?;
        }
        UnaryKernel::FloatFunc(func) => {
            let x = sbuf.get(s as usize).as_f64();
            dbuf.set(d as usize, Value::Float(check_domain(func, x, func.apply(x))?))?;
        }
        UnaryKernel::UnaryFloat1d(op) => {
            let (n, dst, sst) = last_axis(dest_tail, src_tail);
            let (Some(out), Some(inp)) = (dbuf.as_f64(), sbuf.as_f64()) else {
                return Err(NdError::InvalidArgument("f64 kernel on non-f64 operands"));
            };
            for i in 0..n {
                let x = inp[at(s, i, sst)].get();
                out[at(d, i, dst)].set(match op {
                    UnaryOp::Positive => x,
                    UnaryOp::Negative => -x,
                    UnaryOp::Abs => x.abs(),
                });
            }
        }
        UnaryKernel::FloatFunc1d(func) => {
            let (n, dst, sst) = last_axis(dest_tail, src_tail);
            let (Some(out), Some(inp)) = (dbuf.as_f64(), sbuf.as_f64()) else {
                return Err(NdError::InvalidArgument("f64 kernel on non-f64 operands"));
            };
            for i in 0..n {
                let x = inp[at(s, i, sst)].get();
                out[at(d, i, dst)].set(check_domain(func, x, func.apply(x))?);
            }
        }
    }
    Ok(())
}

fn binary_inner(
    kernel: &BinaryKernel,
    [dest, lhs, rhs]: [&NdArray; 3],
    [d, l, r]: [isize; 3],
    [dest_tail, lhs_tail, rhs_tail]: [&[DimInfo]; 3],
) -> Result<()> {
    let (dbuf, lbuf, rbuf) = (dest.buffer(), lhs.buffer(), rhs.buffer());
    let n = dest_tail.first().map_or(1, |ax| ax.len);
    let dst = dest_tail.first().map_or(0, |ax| ax.stride);
    let lst = lhs_tail.first().map_or(0, |ax| ax.stride);
    let rst = rhs_tail.first().map_or(0, |ax| ax.stride);

    match *kernel {
        BinaryKernel::Generic(op) => {
            let v = Value::binary_op(op, lbuf.get(l as usize), rbuf.get(r as usize))?;
            dbuf.set(d as usize, v)?;
        }
        BinaryKernel::Float1d(op) => {
            let (Some(out), Some(a), Some(b)) = (dbuf.as_f64(), lbuf.as_f64(), rbuf.as_f64())
            else {
                return Err(NdError::InvalidArgument("f64 kernel on non-f64 operands"));
            };
            for i in 0..n {
                let x = float_arith(op, a[at(l, i, lst)].get(), b[at(r, i, rst)].get());
                out[at(d, i, dst)].set(x);
            }
        }
        BinaryKernel::FloatCompare1d(op) => {
            let (Some(out), Some(a), Some(b)) = (dbuf.as_bool(), lbuf.as_f64(), rbuf.as_f64())
            else {
                return Err(NdError::InvalidArgument("f64 kernel on non-f64 operands"));
            };
            for i in 0..n {
                let x = float_compare(op, a[at(l, i, lst)].get(), b[at(r, i, rst)].get());
                out[at(d, i, dst)].set(x);
            }
        }
        BinaryKernel::IsClose { options, fast: true } => {
            let (Some(out), Some(a), Some(b)) = (dbuf.as_bool(), lbuf.as_f64(), rbuf.as_f64())
            else {
                return Err(NdError::InvalidArgument("f64 kernel on non-f64 operands"));
            };
            for i in 0..n {
                let x = isclose_f64(a[at(l, i, lst)].get(), b[at(r, i, rst)].get(), &options);
                out[at(d, i, dst)].set(x);
            }
        }
        BinaryKernel::IsClose {
            options,
            fast: false,
        } => {
            let a = lbuf.get(l as usize).as_f64();
            let b = rbuf.get(r as usize).as_f64();
            dbuf.set(d as usize, Value::Bool(isclose_f64(a, b, &options)))?;
        }
    }
    Ok(())
}
