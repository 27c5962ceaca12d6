//! Embeddable n-dimensional strided arrays.
//!
//! An [`NdArray`] is a `(base_offset, axes)` description over a shared
//! buffer. Slicing, transposition, broadcasting and axis permutation only
//! rewrite that description; the buffer is touched by data movement alone.
//!
//! # Core Types
//!
//! - [`NdArray`]: owning array or view over a shared buffer
//! - [`ElementKind`]: element representation (bool, fixed-width ints, floats, generic object)
//! - [`Value`]: host scalar used by the generic fallback paths
//! - [`Item`]: result of an operation, either a scalar or an array
//!
//! # Operations
//!
//! - Indexing: [`NdArray::get_item`], [`NdArray::set_item`] with [`IndexItem`]
//! - Views: [`NdArray::transpose`], [`NdArray::reshape`], [`broadcast`]
//! - Elementwise: [`ops::unary`], [`ops::binary`], [`ops::binary_in_place`]
//! - Reductions: [`reduce::sum`], [`reduce::max`], ... with [`ReduceOptions`]
//! - Contraction: [`dot`]
//! - Float functions: [`math::sin`], ..., [`math::isclose`]
//! - Linear algebra (feature `linalg`): [`linalg::re`], [`linalg::det`],
//!   [`linalg::inv`], [`linalg::solve`]
//!
//! Every elementwise operation funnels through the dispatch engine in
//! [`ufunc`]: a `find_*_spec` function picks a kernel for the operand kinds
//! once per call, and [`Odometer`] drives it over all outer axes.
//!
//! # Example
//!
//! ```rust
//! use strided_ndarray::{ops, BinaryOp, IndexItem, NdArray, SliceSpec};
//!
//! let a = NdArray::from_shape_vec(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
//! let row = NdArray::from_shape_vec(&[3], vec![10.0, 20.0, 30.0]).unwrap();
//!
//! // Broadcast [3] against [2, 3] and add.
//! let sum = ops::binary(BinaryOp::Add, &a, &row).unwrap().into_array().unwrap();
//! assert_eq!(sum.shape(), vec![2, 3]);
//!
//! // Reverse the second axis without copying.
//! let rev = a
//!     .get_item(&[IndexItem::Ellipsis, IndexItem::Slice(SliceSpec::reversed())])
//!     .unwrap()
//!     .into_array()
//!     .unwrap();
//! assert_eq!(rev.to_f64_vec().unwrap(), vec![3.0, 2.0, 1.0, 6.0, 5.0, 4.0]);
//! ```

mod array;
pub mod broadcast;
pub mod config;
mod dot;
mod index;
mod kernel;
mod kind;
#[cfg(feature = "linalg")]
pub mod linalg;
pub mod math;
pub mod ops;
pub mod reduce;
mod storage;
pub mod ufunc;
mod value;
mod view;

// ============================================================================
// Array model
// ============================================================================
pub use array::{Axes, DimInfo, IntoArray, Item, NdArray};
pub use kind::ElementKind;
pub use value::{BinaryOp, Nested, UnaryOp, Value};

// ============================================================================
// Indexing, views and iteration
// ============================================================================
pub use broadcast::{broadcast, broadcast_shape, Broadcasted};
pub use index::{IndexItem, SliceSpec};
pub use kernel::Odometer;

// ============================================================================
// Operations
// ============================================================================
pub use config::{Capabilities, IsCloseOptions, MathOptions, ReduceOptions, CAPABILITIES};
pub use dot::dot;
pub use math::FloatFunc;
pub use reduce::{Axis, ReduceOp};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of axes an array may have.
pub const MAX_DIMS: usize = 8;

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur during array operations.
#[derive(Debug, thiserror::Error)]
pub enum NdError {
    /// Array shapes are incompatible for the operation.
    #[error("shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// Reshape would change the total number of elements.
    #[error("cannot reshape array of size {from} into size {to}")]
    SizeMismatch { from: usize, to: usize },

    /// More axes than [`MAX_DIMS`].
    #[error("too many dimensions: {rank} > {max}", max = MAX_DIMS)]
    TooManyDims { rank: usize },

    /// Nested input whose sibling sequences differ in length or depth.
    #[error("nested sequence is ragged")]
    RaggedSequence,

    /// Contracted axes of a dot product disagree.
    #[error("dot dimension mismatch: {lhs} vs {rhs}")]
    DimensionMismatch { lhs: usize, rhs: usize },

    /// Integer index outside `[-len, len)`.
    #[error("index {index} out of range for axis of length {len}")]
    IndexOutOfRange { index: isize, len: usize },

    /// More consuming index items than source axes.
    #[error("too many indices: {count} for rank {rank}")]
    TooManyIndices { count: usize, rank: usize },

    /// An index contained more than one ellipsis.
    #[error("an index can only have a single ellipsis")]
    MultipleEllipsis,

    /// Axis argument outside `[-rank, rank)`.
    #[error("axis {axis} out of range for rank {rank}")]
    InvalidAxis { axis: isize, rank: usize },

    /// The same axis named twice in a reduction.
    #[error("duplicate axis {0}")]
    DuplicateAxis(usize),

    /// Transpose order that is not a permutation of `0..rank`.
    #[error("invalid axis permutation {0:?}")]
    InvalidPermutation(Vec<usize>),

    /// Operand lengths that cannot be broadcast together.
    #[error("operands could not be broadcast together with shapes {0:?} {1:?}")]
    BroadcastMismatch(Vec<usize>, Vec<usize>),

    /// A destination that would itself have to be expanded.
    #[error("non-broadcastable output operand with shape {dest:?} doesn't match the broadcast shape {broadcast:?}")]
    DestinationBroadcast {
        dest: Vec<usize>,
        broadcast: Vec<usize>,
    },

    /// Linear-algebra failure.
    #[error(transparent)]
    LinAlg(#[from] LinAlgError),

    /// A float function produced NaN or infinity from a finite input.
    #[error("math domain error in {0}")]
    MathDomain(&'static str),

    /// Feature that is deliberately not provided.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// Typecode that names no element kind.
    #[error("invalid element kind {0:?}")]
    InvalidElementKind(String),

    /// Malformed argument combination.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Integer division or modulo by zero.
    #[error("division by zero")]
    ZeroDivision,

    /// Operator not defined for an operand type.
    #[error("unsupported operand type for {op}: {operand}")]
    UnsupportedOperand {
        op: &'static str,
        operand: &'static str,
    },

    /// Value outside the range of the destination kind.
    #[error("value {value} out of range for {kind}")]
    ValueOverflow { value: String, kind: &'static str },

    /// Reduction without identity over zero elements.
    #[error("zero-size reduction for {0}, which has no identity")]
    EmptyReduction(&'static str),

    /// The truth value of a multi-element array.
    #[error("the truth value of an array with more than one element is ambiguous")]
    AmbiguousTruth,

    /// `len()` of a rank-0 array.
    #[error("len() of unsized object")]
    Unsized,
}

/// Error kinds raised by the [`linalg`](crate::linalg) routines.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LinAlgError {
    /// Input must be a 2-D matrix.
    #[error("expected a 2-D matrix, got rank {rank}")]
    NotMatrix { rank: usize },

    /// Matrix is not square when a square matrix was required.
    #[error("non-square matrix: rows={rows}, cols={cols}")]
    NonSquare { rows: usize, cols: usize },

    /// Right-hand side does not match the matrix.
    #[error("right-hand side must be a vector of length {expected}, got shape {found:?}")]
    RhsMismatch { expected: usize, found: Vec<usize> },

    /// Row reduction found fewer pivots than required.
    #[error("singular matrix: {pivots} pivots for size {size}")]
    Singular { pivots: usize, size: usize },
}

/// Coarse classification of [`NdError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Shape,
    Index,
    Broadcast,
    SingularMatrix,
    Domain,
    NotImplemented,
    Value,
}

impl NdError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            NdError::ShapeMismatch(..)
            | NdError::SizeMismatch { .. }
            | NdError::TooManyDims { .. }
            | NdError::RaggedSequence
            | NdError::DimensionMismatch { .. } => ErrorCategory::Shape,
            NdError::IndexOutOfRange { .. }
            | NdError::TooManyIndices { .. }
            | NdError::MultipleEllipsis
            | NdError::InvalidAxis { .. } => ErrorCategory::Index,
            NdError::BroadcastMismatch(..) | NdError::DestinationBroadcast { .. } => {
                ErrorCategory::Broadcast
            }
            NdError::LinAlg(_) => ErrorCategory::SingularMatrix,
            NdError::MathDomain(_) => ErrorCategory::Domain,
            NdError::NotImplemented(_) => ErrorCategory::NotImplemented,
            NdError::DuplicateAxis(_)
            | NdError::InvalidPermutation(_)
            | NdError::InvalidElementKind(_)
            | NdError::InvalidArgument(_)
            | NdError::ZeroDivision
            | NdError::UnsupportedOperand { .. }
            | NdError::ValueOverflow { .. }
            | NdError::EmptyReduction(_)
            | NdError::AmbiguousTruth
            | NdError::Unsized => ErrorCategory::Value,
        }
    }
}

/// Result type for array operations.
pub type Result<T> = std::result::Result<T, NdError>;
