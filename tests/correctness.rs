use approx::assert_relative_eq;
use strided_ndarray::config::{IsCloseOptions, MathOptions, ReduceOptions};
use strided_ndarray::{
    dot, math, ops, reduce, BinaryOp, ElementKind, IndexItem, Item, NdArray, NdError, Nested,
    SliceSpec, Value,
};

fn make_array(shape: &[usize]) -> NdArray {
    let n: usize = shape.iter().product();
    NdArray::from_shape_vec(shape, (0..n).map(|i| i as f64).collect()).unwrap()
}

fn floats(item: Item) -> Vec<f64> {
    item.into_array().unwrap().to_f64_vec().unwrap()
}

#[test]
fn test_view_chain_shares_buffer() {
    let a = make_array(&[4, 5]);
    let v = a
        .view_item(&[
            IndexItem::Slice(SliceSpec::new(Some(1), None, Some(2))),
            IndexItem::Slice(SliceSpec::reversed()),
        ])
        .unwrap();
    assert_eq!(v.shape(), vec![2, 5]);
    let t = v.transpose(None).unwrap();
    assert_eq!(t.shape(), vec![5, 2]);
    assert!(t.shares_buffer(&a));

    t.set(&[0, 1], -1.0).unwrap();
    // t[0, 1] = v[1, 0] = a[3, 4]
    assert_eq!(a.get(&[3, 4]).unwrap(), Value::Float(-1.0));
}

#[test]
fn test_newaxis_and_ellipsis() {
    let a = make_array(&[2, 3]);
    let v = a
        .view_item(&[IndexItem::Ellipsis, IndexItem::NewAxis])
        .unwrap();
    assert_eq!(v.shape(), vec![2, 3, 1]);
    let w = a
        .view_item(&[IndexItem::NewAxis, IndexItem::Int(-1)])
        .unwrap();
    assert_eq!(w.shape(), vec![1, 3]);
    assert_eq!(w.to_f64_vec().unwrap(), vec![3.0, 4.0, 5.0]);
    assert!(matches!(
        a.view_item(&[IndexItem::Ellipsis, IndexItem::Ellipsis]),
        Err(NdError::MultipleEllipsis)
    ));
}

#[test]
fn test_set_item_broadcasts_row() {
    let a = NdArray::zeros(ElementKind::Float64, &[3, 4]).unwrap();
    a.set_item(&[IndexItem::Slice(SliceSpec::full())], vec![1.0, 2.0, 3.0, 4.0])
        .unwrap();
    for i in 0..3 {
        assert_eq!(a.get(&[i, 2]).unwrap(), Value::Float(3.0));
    }
}

#[test]
fn test_set_item_overlapping_source() {
    let a = make_array(&[5]);
    let rev = a.view_item(&[IndexItem::Slice(SliceSpec::reversed())]).unwrap();
    a.set_item(&[IndexItem::Slice(SliceSpec::full())], &rev)
        .unwrap();
    assert_eq!(a.to_f64_vec().unwrap(), vec![4.0, 3.0, 2.0, 1.0, 0.0]);
}

#[test]
fn test_binary_transposed_operands() {
    let a = make_array(&[3, 4]);
    let b = make_array(&[4, 3]);
    let bt = b.transpose(None).unwrap();
    let r = ops::add(&a, &bt).unwrap().into_array().unwrap();
    for i in 0..3 {
        for j in 0..4 {
            let expect = (i * 4 + j) as f64 + (j * 3 + i) as f64;
            assert_relative_eq!(r.get(&[i, j]).unwrap().as_f64(), expect);
        }
    }
}

#[test]
fn test_mixed_kind_arithmetic() {
    let ints = NdArray::from_exact_iter([1i64, 2, 3], ElementKind::Int32).unwrap();
    let r = ops::multiply(&ints, 0.5).unwrap().into_array().unwrap();
    assert_eq!(r.kind(), ElementKind::Float64);
    assert_eq!(r.to_f64_vec().unwrap(), vec![0.5, 1.0, 1.5]);

    let cmp = ops::binary(BinaryOp::Less, &ints, 2i64)
        .unwrap()
        .into_array()
        .unwrap();
    assert_eq!(cmp.kind(), ElementKind::Bool);
    assert_eq!(
        cmp.to_vec(),
        vec![Value::Bool(true), Value::Bool(false), Value::Bool(false)]
    );
}

#[test]
fn test_broadcast_mismatch() {
    let err = ops::add(make_array(&[2, 3]), make_array(&[2])).unwrap_err();
    assert!(matches!(err, NdError::BroadcastMismatch(..)));
}

#[test]
fn test_nested_construction() {
    let nested = Nested::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    let a = NdArray::array(&nested, Some(ElementKind::Int16)).unwrap();
    assert_eq!(a.shape(), vec![2, 2]);
    assert_eq!(a.kind(), ElementKind::Int16);
    assert_eq!(a.get(&[1, 0]).unwrap(), Value::Int(3));

    let ragged = Nested::Seq(vec![
        Nested::from_values(vec![1.0, 2.0]),
        Nested::from_values(vec![3.0]),
    ]);
    assert!(matches!(
        NdArray::array(&ragged, None),
        Err(NdError::RaggedSequence)
    ));
}

#[test]
fn test_reductions_over_axes() {
    let a = make_array(&[2, 3, 4]);
    let s = reduce::sum(&a, ReduceOptions::axis(vec![0isize, 2])).unwrap();
    let s = floats(s);
    assert_eq!(s.len(), 3);
    for (j, v) in s.iter().enumerate() {
        let expect: f64 = (0..2)
            .flat_map(|i| (0..4).map(move |k| (i * 12 + j * 4 + k) as f64))
            .sum();
        assert_relative_eq!(*v, expect);
    }

    let m = reduce::max(&a, ReduceOptions::axis(-1isize)).unwrap();
    let m = m.into_array().unwrap();
    assert_eq!(m.shape(), vec![2, 3]);
    assert_eq!(m.get(&[1, 2]).unwrap(), Value::Float(23.0));

    let total = reduce::average(&a, ReduceOptions::default()).unwrap();
    assert_eq!(total.as_scalar(), Some(Value::Float(11.5)));
}

#[test]
fn test_reduction_into_out() {
    let a = make_array(&[3, 2]);
    let out = NdArray::zeros(ElementKind::Float64, &[2]).unwrap();
    let r = reduce::prod(&a, ReduceOptions::axis(0isize).with_out(out.clone()))
        .unwrap()
        .into_array()
        .unwrap();
    assert!(r.is_same(&out));
    assert_eq!(out.to_f64_vec().unwrap(), vec![0.0, 15.0]);
}

#[test]
fn test_unsupported_reductions() {
    let a = make_array(&[3]);
    assert!(matches!(
        reduce::argmax(&a, ReduceOptions::default()),
        Err(NdError::NotImplemented(_))
    ));
    let keep = ReduceOptions {
        keepdims: true,
        ..ReduceOptions::default()
    };
    assert!(matches!(
        reduce::sum(&a, keep),
        Err(NdError::NotImplemented(_))
    ));
}

#[test]
fn test_dot_against_loops() {
    let a = make_array(&[3, 4]);
    let b = make_array(&[4, 2]).transpose(None).unwrap().transpose(None).unwrap();
    let r = dot(&a, &b).unwrap().into_array().unwrap();
    for i in 0..3 {
        for j in 0..2 {
            let expect: f64 = (0..4)
                .map(|k| a.get(&[i, k]).unwrap().as_f64() * b.get(&[k, j]).unwrap().as_f64())
                .sum();
            assert_relative_eq!(r.get(&[i, j]).unwrap().as_f64(), expect);
        }
    }
}

#[test]
fn test_math_on_views() {
    let a = make_array(&[2, 3]);
    let t = a.transpose(None).unwrap();
    let e = math::exp(&t, MathOptions::default()).unwrap().into_array().unwrap();
    assert_eq!(e.shape(), vec![3, 2]);
    assert_relative_eq!(e.get(&[2, 1]).unwrap().as_f64(), 5.0f64.exp());
}

#[test]
fn test_math_out_broadcast() {
    let out = NdArray::zeros(ElementKind::Float64, &[2, 2]).unwrap();
    math::cos(vec![0.0, 0.0], MathOptions::out(out.clone())).unwrap();
    assert_eq!(out.to_f64_vec().unwrap(), vec![1.0; 4]);
}

#[test]
fn test_isclose_broadcast() {
    let a = NdArray::from_shape_vec(&[2], vec![1.0, 1.1]).unwrap();
    let r = math::isclose(&a, 1.0, IsCloseOptions::default())
        .unwrap()
        .into_array()
        .unwrap();
    assert_eq!(r.to_vec(), vec![Value::Bool(true), Value::Bool(false)]);

    let nan = NdArray::from_shape_vec(&[1], vec![f64::NAN]).unwrap();
    let opts = IsCloseOptions {
        equal_nan: true,
        ..IsCloseOptions::default()
    };
    let r = math::isclose(&nan, &nan, opts).unwrap().into_array().unwrap();
    assert_eq!(r.to_vec(), vec![Value::Bool(true)]);
}

#[test]
fn test_empty_arrays() {
    let a = NdArray::zeros(ElementKind::Float64, &[0, 3]).unwrap();
    let r = ops::add(&a, 1.0).unwrap().into_array().unwrap();
    assert_eq!(r.shape(), vec![0, 3]);
    assert_eq!(r.size(), 0);
    let s = reduce::sum(&a, ReduceOptions::default()).unwrap();
    assert_eq!(s.as_scalar(), Some(Value::Float(0.0)));
}
