use std::sync::Arc;

use arrow::array::{
    AsArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray, StructArray,
};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{DataType, Fields, Float32Type, Float64Type, Int32Type, Int64Type};
use arrow::ffi::to_ffi;

use adhesive_core::FnUnit;

use super::*;

/// Caller-side structs of one bridge call.
struct Call {
    in_schema: FFI_ArrowSchema,
    in_array: FFI_ArrowArray,
    out_schema: FFI_ArrowSchema,
    out_array: FFI_ArrowArray,
}

impl Call {
    fn with_input(input: &dyn Array) -> Self {
        let (in_array, in_schema) = to_ffi(&input.to_data()).unwrap();
        Self {
            in_schema,
            in_array,
            out_schema: FFI_ArrowSchema::empty(),
            out_array: FFI_ArrowArray::empty(),
        }
    }

    fn with_columns(columns: Vec<ArrayRef>) -> Self {
        let fields = columns
            .into_iter()
            .enumerate()
            .map(|(i, column)| {
                let field = Field::new(format!("_c{i}"), column.data_type().clone(), true);
                (Arc::new(field), column)
            })
            .collect::<Vec<_>>();
        Self::with_input(&StructArray::from(fields))
    }

    fn addresses(&mut self) -> FfiAddresses {
        FfiAddresses::new(
            &mut self.in_schema,
            &mut self.in_array,
            &mut self.out_schema,
            &mut self.out_array,
        )
    }

    fn output(self) -> ArrayRef {
        let data = unsafe { from_ffi(self.out_array, &self.out_schema) }.unwrap();
        make_array(data)
    }
}

fn int64s(values: Vec<Option<i64>>) -> ArrayRef {
    Arc::new(Int64Array::from(values))
}

fn sum_unit() -> Arc<dyn ComputationUnit> {
    Arc::new(FnUnit::new("t.Sum", |row| {
        let a = row.get_i64(0)?;
        let b = row.get_i64(1)?;
        Ok(a.zip(b).map(|(a, b)| Scalar::Int64(a + b)))
    }))
}

fn doubling_unit() -> Arc<dyn ComputationUnit> {
    Arc::new(FnUnit::new("t.Double", |row| {
        Ok(row.get_i64(0)?.map(|v| Scalar::Int64(v * 2)))
    }))
}

fn constant_unit(value: Scalar) -> Arc<dyn ComputationUnit> {
    Arc::new(FnUnit::new("t.Constant", move |_| Ok(Some(value))))
}

#[test]
fn test_sum_of_two_columns() {
    let unit = sum_unit();
    let mut call = Call::with_columns(vec![
        int64s(vec![Some(1), Some(2), Some(3)]),
        int64s(vec![Some(10), Some(20), Some(30)]),
    ]);

    unsafe { compute_int64(unit.as_ref(), call.addresses()) }.unwrap();

    let output = call.output();
    assert_eq!(output.len(), 3);
    assert_eq!(output.null_count(), 0);
    assert_eq!(
        output.as_primitive::<Int64Type>(),
        &Int64Array::from(vec![11, 22, 33])
    );
}

#[test]
fn test_absent_results_become_nulls() {
    let unit = doubling_unit();
    let mut call = Call::with_columns(vec![int64s(vec![None, Some(5), Some(7)])]);

    unsafe { compute_int64(unit.as_ref(), call.addresses()) }.unwrap();

    assert_eq!(
        call.output().as_primitive::<Int64Type>(),
        &Int64Array::from(vec![None, Some(10), Some(14)])
    );
}

#[test]
fn test_unit_error_propagates_and_output_untouched() {
    let unit = FnUnit::new("t.Boom", |_| Err(AdhesiveError::computation("t.Boom", "boom")));
    let mut call = Call::with_columns(vec![int64s(vec![Some(1)])]);

    let err = unsafe { compute_int64(&unit, call.addresses()) }.unwrap_err();

    match err {
        AdhesiveError::ComputationFailure { unit, message } => {
            assert_eq!(unit, "t.Boom");
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(call.out_array.is_released());
    assert!(call.in_array.is_released());
}

#[test]
fn test_non_null_entry_rejects_absent_value() {
    let unit = doubling_unit();
    let mut call = Call::with_columns(vec![int64s(vec![Some(1), None])]);

    let err = unsafe { compute_int64_non_null(unit.as_ref(), call.addresses()) }.unwrap_err();

    assert!(matches!(err, AdhesiveError::ContractViolation(_)));
    assert!(err.to_string().contains("row 1"));
    assert!(call.out_array.is_released());
}

#[test]
fn test_non_null_entry_exports_non_nullable_field() {
    let unit = doubling_unit();
    let mut call = Call::with_columns(vec![int64s(vec![Some(1), Some(2)])]);

    unsafe { compute_int64_non_null(unit.as_ref(), call.addresses()) }.unwrap();

    assert!(!call.out_schema.nullable());
    assert_eq!(
        call.output().as_primitive::<Int64Type>(),
        &Int64Array::from(vec![2, 4])
    );
}

#[test]
fn test_typed_entry_points_convert_values() {
    let mut call = Call::with_columns(vec![int64s(vec![Some(0)])]);
    unsafe { compute_int32(constant_unit(Scalar::Int64(7)).as_ref(), call.addresses()) }.unwrap();
    assert_eq!(
        call.output().as_primitive::<Int32Type>(),
        &Int32Array::from(vec![7])
    );

    let mut call = Call::with_columns(vec![int64s(vec![Some(0)])]);
    unsafe { compute_float32(constant_unit(Scalar::Float64(0.5)).as_ref(), call.addresses()) }
        .unwrap();
    assert_eq!(
        call.output().as_primitive::<Float32Type>(),
        &Float32Array::from(vec![0.5])
    );

    let mut call = Call::with_columns(vec![int64s(vec![Some(0)])]);
    unsafe { compute_float64(constant_unit(Scalar::Int32(3)).as_ref(), call.addresses()) }
        .unwrap();
    assert_eq!(
        call.output().as_primitive::<Float64Type>(),
        &Float64Array::from(vec![3.0])
    );
}

#[test]
fn test_unrepresentable_value_is_contract_violation() {
    let mut call = Call::with_columns(vec![int64s(vec![Some(0)])]);
    let unit = constant_unit(Scalar::Int64(i64::MAX));

    let err = unsafe { compute_int32(unit.as_ref(), call.addresses()) }.unwrap_err();

    assert!(matches!(err, AdhesiveError::ContractViolation(_)));
    assert!(err.to_string().contains("not representable as Int32"));
    assert!(call.out_array.is_released());
}

#[test]
fn test_float_result_rejected_by_integer_entry_point() {
    let unit = constant_unit(Scalar::Float64(2.7));

    let mut call = Call::with_columns(vec![int64s(vec![Some(0)])]);
    let err = unsafe { compute_int64(unit.as_ref(), call.addresses()) }.unwrap_err();
    assert!(matches!(err, AdhesiveError::ContractViolation(_)));
    assert!(err.to_string().contains("Int64 entry points take integer results"));
    assert!(call.out_array.is_released());

    let mut call = Call::with_columns(vec![int64s(vec![Some(0)])]);
    let whole = constant_unit(Scalar::Float32(3.0));
    let err = unsafe { compute_int32(whole.as_ref(), call.addresses()) }.unwrap_err();
    assert!(matches!(err, AdhesiveError::ContractViolation(_)));
}

#[test]
fn test_repeated_calls_are_identical() {
    let unit = sum_unit();
    let columns = || {
        vec![
            int64s(vec![Some(4), None, Some(-6)]),
            int64s(vec![Some(1), Some(2), Some(3)]),
        ]
    };

    let mut first = Call::with_columns(columns());
    let mut second = Call::with_columns(columns());
    unsafe { compute_int64(unit.as_ref(), first.addresses()) }.unwrap();
    unsafe { compute_int64(unit.as_ref(), second.addresses()) }.unwrap();

    assert_eq!(first.output().to_data(), second.output().to_data());
}

#[test]
fn test_null_address_leaves_input_alone() {
    let unit = doubling_unit();
    let mut call = Call::with_columns(vec![int64s(vec![Some(1)])]);
    let mut addresses = call.addresses();
    addresses.output_array = ptr::null_mut();

    let err = unsafe { compute_int64(unit.as_ref(), addresses) }.unwrap_err();

    assert_eq!(
        err.to_string(),
        "Contract violation: null address for output array"
    );
    assert!(!call.in_array.is_released());
}

#[test]
fn test_from_raw_addresses() {
    let unit = doubling_unit();
    let mut call = Call::with_columns(vec![int64s(vec![Some(21)])]);
    let addresses = FfiAddresses::from_raw(
        &mut call.in_schema as *mut FFI_ArrowSchema as usize,
        &mut call.in_array as *mut FFI_ArrowArray as usize,
        &mut call.out_schema as *mut FFI_ArrowSchema as usize,
        &mut call.out_array as *mut FFI_ArrowArray as usize,
    );

    unsafe { compute_int64(unit.as_ref(), addresses) }.unwrap();

    assert_eq!(
        call.output().as_primitive::<Int64Type>(),
        &Int64Array::from(vec![42])
    );
}

#[test]
fn test_released_input_is_rejected() {
    let unit = doubling_unit();
    let mut call = Call::with_columns(vec![int64s(vec![Some(1)])]);
    call.in_array = FFI_ArrowArray::empty();

    let err = unsafe { compute_int64(unit.as_ref(), call.addresses()) }.unwrap_err();

    assert_eq!(
        err.to_string(),
        "Contract violation: input array has already been released"
    );
}

#[test]
fn test_unsupported_column_type() {
    let unit = doubling_unit();
    let strings: ArrayRef = Arc::new(StringArray::from(vec!["a"]));
    let mut call = Call::with_columns(vec![strings]);

    let err = unsafe { compute_int64(unit.as_ref(), call.addresses()) }.unwrap_err();

    assert!(matches!(err, AdhesiveError::SchemaMismatch(_)));
    assert!(call.out_array.is_released());
}

#[test]
fn test_plain_array_is_a_single_column() {
    let unit = doubling_unit();
    let mut call = Call::with_input(&Int64Array::from(vec![Some(3), None]));

    unsafe { compute_int64(unit.as_ref(), call.addresses()) }.unwrap();

    assert_eq!(
        call.output().as_primitive::<Int64Type>(),
        &Int64Array::from(vec![Some(6), None])
    );
}

#[test]
fn test_struct_validity_is_ignored() {
    let unit = doubling_unit();
    let fields = Fields::from(vec![Field::new("a", DataType::Int64, true)]);
    let input = StructArray::try_new(
        fields,
        vec![int64s(vec![Some(1), Some(2)])],
        Some(NullBuffer::from(vec![true, false])),
    )
    .unwrap();
    let mut call = Call::with_input(&input);

    unsafe { compute_int64(unit.as_ref(), call.addresses()) }.unwrap();

    assert_eq!(
        call.output().as_primitive::<Int64Type>(),
        &Int64Array::from(vec![2, 4])
    );
}

#[test]
fn test_empty_batch() {
    let unit = doubling_unit();
    let mut call = Call::with_columns(vec![int64s(vec![])]);

    unsafe { compute_int64(unit.as_ref(), call.addresses()) }.unwrap();

    assert_eq!(call.output().len(), 0);
}

#[test]
fn test_compute_batch_in_process() {
    let source = RowSource::try_new(&[int64s(vec![Some(2), None])]).unwrap();
    let unit = FnUnit::new("t.Half", |row| {
        Ok(row.get_i64(0)?.map(|v| Scalar::Float64(v as f64 / 4.0)))
    });

    let output = compute_batch::<Float64Type>(&unit, &source, Nullability::Nullable).unwrap();

    assert_eq!(output, Float64Array::from(vec![Some(0.5), None]));
}
