//! Build-time capabilities and per-operation options.

use crate::array::NdArray;
use crate::kind::ElementKind;
use crate::reduce::Axis;

/// Optional feature groups compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `sinh`, `cosh`, `tanh` and their inverses.
    pub hyperbolic: bool,
    /// The [`linalg`](crate::linalg) module.
    pub linalg: bool,
    /// Complex element kinds. Always `false`: no complex kind exists.
    pub complex: bool,
    /// Multi-threaded kernels. Always `false`: dispatch runs on the calling thread.
    pub threads: bool,
}

/// Capabilities of the current build.
pub const CAPABILITIES: Capabilities = Capabilities {
    hyperbolic: cfg!(feature = "hyperbolic"),
    linalg: cfg!(feature = "linalg"),
    complex: false,
    threads: false,
};

/// Smallest pivot magnitude row reduction will accept.
pub const PIVOT_EPSILON: f64 = 1e-12;

/// Tolerances for [`isclose`](crate::math::isclose).
///
/// `|a - b| <= atol + rtol * |b|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsCloseOptions {
    pub rtol: f64,
    pub atol: f64,
    pub equal_nan: bool,
}

impl Default for IsCloseOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-5,
            atol: 1e-8,
            equal_nan: false,
        }
    }
}

/// Arguments of the reduction functions.
#[derive(Debug, Clone, Default)]
pub struct ReduceOptions {
    /// `None` reduces over all axes.
    pub axis: Option<Axis>,
    /// Destination whose shape must equal the reduced shape.
    pub out: Option<NdArray>,
    /// Unsupported; `true` is rejected.
    pub keepdims: bool,
}

impl ReduceOptions {
    pub fn axis(axis: impl Into<Axis>) -> Self {
        Self {
            axis: Some(axis.into()),
            ..Self::default()
        }
    }

    pub fn with_out(mut self, out: NdArray) -> Self {
        self.out = Some(out);
        self
    }
}

/// Arguments of the elementwise float functions. `out` and `dtype` are exclusive.
#[derive(Debug, Clone, Default)]
pub struct MathOptions {
    pub out: Option<NdArray>,
    pub dtype: Option<ElementKind>,
}

impl MathOptions {
    pub fn out(out: NdArray) -> Self {
        Self {
            out: Some(out),
            dtype: None,
        }
    }

    pub fn dtype(dtype: ElementKind) -> Self {
        Self {
            out: None,
            dtype: Some(dtype),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isclose_defaults() {
        let o = IsCloseOptions::default();
        assert_eq!(o.rtol, 1e-5);
        assert_eq!(o.atol, 1e-8);
        assert!(!o.equal_nan);
    }

    #[test]
    fn test_capabilities_follow_features() {
        assert_eq!(CAPABILITIES.linalg, cfg!(feature = "linalg"));
        assert_eq!(CAPABILITIES.hyperbolic, cfg!(feature = "hyperbolic"));
        assert!(!CAPABILITIES.complex);
        assert!(!CAPABILITIES.threads);
    }

    #[test]
    fn test_reduce_options_builder() {
        let o = ReduceOptions::axis(-1isize);
        assert_eq!(o.axis, Some(Axis::Single(-1)));
        assert!(o.out.is_none());
        assert!(!o.keepdims);
    }
}
