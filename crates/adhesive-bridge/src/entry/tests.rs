use arrow::array::{AsArray, Int32Array, Int64Array};

use adhesive_core::{AdhesiveError, FnUnit, Scalar};

use super::*;

#[test]
fn test_for_data_type() {
    assert_eq!(
        EntryPoint::for_data_type(&DataType::Int64, true),
        Some(EntryPoint::Int64)
    );
    assert_eq!(
        EntryPoint::for_data_type(&DataType::Int64, false),
        Some(EntryPoint::Int64NonNull)
    );
    assert_eq!(
        EntryPoint::for_data_type(&DataType::Int32, false),
        Some(EntryPoint::Int32)
    );
    assert_eq!(
        EntryPoint::for_data_type(&DataType::Float32, true),
        Some(EntryPoint::Float32)
    );
    assert_eq!(
        EntryPoint::for_data_type(&DataType::Float64, true),
        Some(EntryPoint::Float64)
    );
    assert_eq!(EntryPoint::for_data_type(&DataType::Utf8, true), None);
}

#[test]
fn test_entry_metadata() {
    for entry in EntryPoint::ALL {
        assert_eq!(entry.data_type(), entry.result_type().data_type());
        assert_eq!(entry.is_nullable(), entry != EntryPoint::Int64NonNull);
        assert_eq!(
            EntryPoint::for_data_type(&entry.data_type(), entry.is_nullable()),
            Some(entry)
        );
    }
    assert_eq!(EntryPoint::Int64NonNull.to_string(), "compute_int64_non_null");
}

#[test]
fn test_compute_dispatches_on_result_type() {
    let input: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None]));
    let source = RowSource::try_new(&[input]).unwrap();
    let unit = FnUnit::new("t.Inc", |row| {
        Ok(row.get_i64(0)?.map(|v| Scalar::Int64(v + 1)))
    });

    let int64 = EntryPoint::Int64.compute(&unit, &source).unwrap();
    assert_eq!(
        int64.as_primitive::<Int64Type>(),
        &Int64Array::from(vec![Some(2), None])
    );

    let int32 = EntryPoint::Int32.compute(&unit, &source).unwrap();
    assert_eq!(
        int32.as_primitive::<Int32Type>(),
        &Int32Array::from(vec![Some(2), None])
    );

    let err = EntryPoint::Int64NonNull.compute(&unit, &source).unwrap_err();
    assert!(matches!(err, AdhesiveError::ContractViolation(_)));
}
