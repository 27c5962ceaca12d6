//! Elementwise float functions and `isclose`.
//!
//! Each function takes its input as any [`IntoArray`] and an optional
//! `out` or `dtype`. A result of NaN or infinity from an input that was
//! neither is a [`NdError::MathDomain`] error.

use crate::array::{IntoArray, Item, NdArray};
use crate::broadcast::broadcast;
use crate::config::{IsCloseOptions, MathOptions};
use crate::kind::ElementKind;
use crate::ufunc;
use crate::{NdError, Result};

/// Elementwise `f64 -> f64` functions known to the dispatch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatFunc {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    #[cfg(feature = "hyperbolic")]
    Sinh,
    #[cfg(feature = "hyperbolic")]
    Cosh,
    #[cfg(feature = "hyperbolic")]
    Tanh,
    #[cfg(feature = "hyperbolic")]
    Asinh,
    #[cfg(feature = "hyperbolic")]
    Acosh,
    #[cfg(feature = "hyperbolic")]
    Atanh,
    Exp,
    Log,
}

impl FloatFunc {
    #[inline]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            FloatFunc::Sin => x.sin(),
            FloatFunc::Cos => x.cos(),
            FloatFunc::Tan => x.tan(),
            FloatFunc::Asin => x.asin(),
            FloatFunc::Acos => x.acos(),
            FloatFunc::Atan => x.atan(),
            #[cfg(feature = "hyperbolic")]
            FloatFunc::Sinh => x.sinh(),
            #[cfg(feature = "hyperbolic")]
            FloatFunc::Cosh => x.cosh(),
            #[cfg(feature = "hyperbolic")]
            FloatFunc::Tanh => x.tanh(),
            #[cfg(feature = "hyperbolic")]
            FloatFunc::Asinh => x.asinh(),
            #[cfg(feature = "hyperbolic")]
            FloatFunc::Acosh => x.acosh(),
            #[cfg(feature = "hyperbolic")]
            FloatFunc::Atanh => x.atanh(),
            FloatFunc::Exp => x.exp(),
            FloatFunc::Log => x.ln(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FloatFunc::Sin => "sin",
            FloatFunc::Cos => "cos",
            FloatFunc::Tan => "tan",
            FloatFunc::Asin => "asin",
            FloatFunc::Acos => "acos",
            FloatFunc::Atan => "atan",
            #[cfg(feature = "hyperbolic")]
            FloatFunc::Sinh => "sinh",
            #[cfg(feature = "hyperbolic")]
            FloatFunc::Cosh => "cosh",
            #[cfg(feature = "hyperbolic")]
            FloatFunc::Tanh => "tanh",
            #[cfg(feature = "hyperbolic")]
            FloatFunc::Asinh => "asinh",
            #[cfg(feature = "hyperbolic")]
            FloatFunc::Acosh => "acosh",
            #[cfg(feature = "hyperbolic")]
            FloatFunc::Atanh => "atanh",
            FloatFunc::Exp => "exp",
            FloatFunc::Log => "log",
        }
    }
}

/// Apply `func` elementwise.
///
/// With `out`, the input is broadcast into `out` and `out` is returned; an
/// `out` that would itself need expanding is an error. Otherwise a new
/// array of kind `dtype` (default `Float64`) is allocated.
pub fn float_func(func: FloatFunc, x: impl IntoArray, options: MathOptions) -> Result<Item> {
    let MathOptions { out, dtype } = options;
    if out.is_some() && dtype.is_some() {
        return Err(NdError::InvalidArgument("out and dtype are mutually exclusive"));
    }
    let src = x.into_array()?;
    let (dest, src) = match out {
        Some(out) => {
            let bc = broadcast(&out, &src)?;
            if bc.left_expanded {
                return Err(NdError::DestinationBroadcast {
                    dest: out.shape(),
                    broadcast: bc.left.shape(),
                });
            }
            (out, bc.right)
        }
        None => {
            let dest = NdArray::allocate(dtype.unwrap_or(ElementKind::Float64), &src.shape())?;
            (dest, src)
        }
    };
    let spec = ufunc::find_float_func_spec(func, &dest, &src);
    ufunc::apply_unary(&spec, &dest, &src)?;
    Item::from_array(dest)
}

macro_rules! float_functions {
    ($($(#[$attr:meta])* $name:ident => $func:ident),* $(,)?) => {$(
        $(#[$attr])*
        pub fn $name(x: impl IntoArray, options: MathOptions) -> Result<Item> {
            float_func(FloatFunc::$func, x, options)
        }
    )*};
}

float_functions!(
    sin => Sin,
    cos => Cos,
    tan => Tan,
    asin => Asin,
    acos => Acos,
    atan => Atan,
    #[cfg(feature = "hyperbolic")]
    sinh => Sinh,
    #[cfg(feature = "hyperbolic")]
    cosh => Cosh,
    #[cfg(feature = "hyperbolic")]
    tanh => Tanh,
    #[cfg(feature = "hyperbolic")]
    asinh => Asinh,
    #[cfg(feature = "hyperbolic")]
    acosh => Acosh,
    #[cfg(feature = "hyperbolic")]
    atanh => Atanh,
    exp => Exp,
    /// Natural logarithm.
    log => Log,
);

/// Scalar tolerance test used by both `isclose` kernels.
#[inline]
pub(crate) fn isclose_f64(a: f64, b: f64, options: &IsCloseOptions) -> bool {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => return options.equal_nan,
        (true, false) | (false, true) => return false,
        (false, false) => {}
    }
    if a == b {
        return true;
    }
    (a - b).abs() <= options.atol + options.rtol * b.abs()
}

/// Elementwise `|a - b| <= atol + rtol * |b|`, as a bool array.
pub fn isclose(a: impl IntoArray, b: impl IntoArray, options: IsCloseOptions) -> Result<Item> {
    let (a, b) = (a.into_array()?, b.into_array()?);
    let bc = broadcast(&a, &b)?;
    let dest = NdArray::allocate(ElementKind::Bool, &bc.left.shape())?;
    let spec = ufunc::find_isclose_spec(options, &dest, &bc.left, &bc.right);
    ufunc::apply_binary(&spec, &dest, &bc.left, &bc.right)?;
    Item::from_array(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use approx::assert_relative_eq;

    fn floats(item: Item) -> Vec<f64> {
        item.into_array().unwrap().to_f64_vec().unwrap()
    }

    #[test]
    fn test_sin_cos() {
        let x = vec![0.0, std::f64::consts::FRAC_PI_2];
        let s = floats(sin(x.clone(), MathOptions::default()).unwrap());
        assert_relative_eq!(s[0], 0.0);
        assert_relative_eq!(s[1], 1.0);
        let c = floats(cos(x, MathOptions::default()).unwrap());
        assert_relative_eq!(c[0], 1.0);
        assert!(c[1].abs() < 1e-15);
    }

    #[test]
    fn test_scalar_input_gives_scalar() {
        let item = exp(0.0, MathOptions::default()).unwrap();
        assert_eq!(item.as_scalar(), Some(Value::Float(1.0)));
    }

    #[test]
    fn test_domain_errors() {
        assert!(matches!(
            acos(2.0, MathOptions::default()),
            Err(NdError::MathDomain("acos"))
        ));
        assert!(matches!(
            log(0.0, MathOptions::default()),
            Err(NdError::MathDomain("log"))
        ));
        // NaN in, NaN out is not a domain error.
        assert!(sin(f64::NAN, MathOptions::default()).is_ok());
    }

    #[test]
    fn test_out_receives_broadcast_result() {
        let out = NdArray::allocate(ElementKind::Float64, &[2, 2]).unwrap();
        let item = atan(vec![0.0, 1.0], MathOptions::out(out.clone())).unwrap();
        assert!(item.as_array().unwrap().is_same(&out));
        let v = out.to_f64_vec().unwrap();
        assert_relative_eq!(v[3], std::f64::consts::FRAC_PI_4);
        assert_relative_eq!(v[1], v[3]);
    }

    #[test]
    fn test_out_must_not_expand() {
        let out = NdArray::allocate(ElementKind::Float64, &[2]).unwrap();
        let x = NdArray::allocate(ElementKind::Float64, &[3, 2]).unwrap();
        assert!(matches!(
            sin(&x, MathOptions::out(out)),
            Err(NdError::DestinationBroadcast { .. })
        ));
    }

    #[test]
    fn test_out_and_dtype_exclusive() {
        let options = MathOptions {
            out: Some(NdArray::allocate(ElementKind::Float64, &[]).unwrap()),
            dtype: Some(ElementKind::Float32),
        };
        assert!(matches!(
            sin(1.0, options),
            Err(NdError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_dtype_selects_generic_kernel() {
        let item = sin(vec![0.0, 1.0], MathOptions::dtype(ElementKind::Float32)).unwrap();
        let arr = item.into_array().unwrap();
        assert_eq!(arr.kind(), ElementKind::Float32);
        assert_relative_eq!(arr.to_f64_vec().unwrap()[1], 1f64.sin(), epsilon = 1e-6);
    }

    #[cfg(feature = "hyperbolic")]
    #[test]
    fn test_hyperbolic() {
        let t = floats(tanh(vec![0.0, 100.0], MathOptions::default()).unwrap());
        assert_relative_eq!(t[0], 0.0);
        assert_relative_eq!(t[1], 1.0);
        assert!(atanh(1.0, MathOptions::default()).is_err());
    }

    #[test]
    fn test_isclose_scalar_rules() {
        let o = IsCloseOptions::default();
        assert!(isclose_f64(1.0, 1.0 + 1e-9, &o));
        assert!(!isclose_f64(1.0, 1.1, &o));
        assert!(isclose_f64(f64::INFINITY, f64::INFINITY, &o));
        assert!(!isclose_f64(f64::NAN, f64::NAN, &o));
        assert!(!isclose_f64(f64::NAN, 1.0, &o));
        let eq = IsCloseOptions {
            equal_nan: true,
            ..o
        };
        assert!(isclose_f64(f64::NAN, f64::NAN, &eq));
        assert!(!isclose_f64(1.0, f64::NAN, &eq));
    }

    #[test]
    fn test_isclose_broadcasts() {
        let a = NdArray::from_shape_vec(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let item = isclose(&a, vec![1.0, 2.000001], IsCloseOptions::default()).unwrap();
        let arr = item.into_array().unwrap();
        assert_eq!(arr.kind(), ElementKind::Bool);
        assert_eq!(
            arr.to_vec(),
            vec![
                Value::Bool(true),
                Value::Bool(true),
                Value::Bool(false),
                Value::Bool(false)
            ]
        );
    }

    #[test]
    fn test_isclose_generic_kinds() {
        let a = NdArray::from_exact_iter([1i64, 2], ElementKind::Int32).unwrap();
        let item = isclose(&a, vec![1.0, 2.5], IsCloseOptions::default()).unwrap();
        assert_eq!(
            item.into_array().unwrap().to_vec(),
            vec![Value::Bool(true), Value::Bool(false)]
        );
    }
}
