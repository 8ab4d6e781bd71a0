//! Compile-once, invoke-many scenarios through the public facade.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, Float32Array, Float64Array, Int32Array, Int64Array, StructArray,
};
use arrow::datatypes::{DataType, Field, Float32Type, Float64Type, Int32Type, Int64Type};
use arrow::ffi::{to_ffi, FFI_ArrowArray, FFI_ArrowSchema};

use adhesive::{
    AdhesiveConfig, AdhesiveContext, AdhesiveError, EntryPoint, ExecutionMode, FfiAddresses,
    FunctionDefinition, Severity,
};

fn int64s(values: Vec<Option<i64>>) -> ArrayRef {
    Arc::new(Int64Array::from(values))
}

fn named(context: &AdhesiveContext, name: &str, inputs: usize, ret: DataType) -> adhesive::AdhesiveFunction {
    context
        .create_function(
            FunctionDefinition::Name(name.to_string()),
            vec![DataType::Int64; inputs],
            ret,
        )
        .unwrap()
}

#[test]
fn test_sum_of_two_columns() {
    let context = AdhesiveContext::new();
    context
        .compile(
            "demo.Sum",
            "package demo;\nunit Sum -> i64 {\n    row.i64(0) + row.i64(1)\n}\n",
        )
        .unwrap();
    let function = named(&context, "demo.Sum", 2, DataType::Int64);

    let output = function
        .invoke(&[
            int64s(vec![Some(1), Some(2), Some(3)]),
            int64s(vec![Some(10), Some(20), Some(30)]),
        ])
        .unwrap();

    assert_eq!(output.len(), 3);
    assert_eq!(output.null_count(), 0);
    assert_eq!(
        output.as_primitive::<Int64Type>(),
        &Int64Array::from(vec![11, 22, 33])
    );
}

#[test]
fn test_null_input_gives_null_output() {
    let context = AdhesiveContext::new();
    context
        .compile(
            "demo.Double",
            "package demo;\nunit Double -> i64 {\n    let x = row.i64(0);\n    if is_null(x) { null } else { x * 2 }\n}\n",
        )
        .unwrap();
    let function = named(&context, "demo.Double", 1, DataType::Int64);

    let output = function
        .invoke(&[int64s(vec![None, Some(5), Some(7)])])
        .unwrap();

    assert_eq!(
        output.as_primitive::<Int64Type>(),
        &Int64Array::from(vec![None, Some(10), Some(14)])
    );
}

#[test]
fn test_failing_unit_leaves_output_unwritten() {
    let context = AdhesiveContext::new();
    let unit = context
        .compile("demo.Boom", "package demo; unit Boom -> i64 { fail(\"always\") }")
        .unwrap();

    let input = StructArray::from(vec![(
        Arc::new(Field::new("_c0", DataType::Int64, true)),
        int64s(vec![Some(1), Some(2)]),
    )]);
    let (mut in_array, mut in_schema) = to_ffi(&input.to_data()).unwrap();
    let mut out_schema = FFI_ArrowSchema::empty();
    let mut out_array = FFI_ArrowArray::empty();
    let addresses = FfiAddresses::new(&mut in_schema, &mut in_array, &mut out_schema, &mut out_array);

    let err = unsafe { EntryPoint::Int64.invoke(unit.as_ref(), addresses) }.unwrap_err();

    match err {
        AdhesiveError::ComputationFailure { unit, message } => {
            assert_eq!(unit, "demo.Boom");
            assert_eq!(message, "always");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(out_array.is_released());
}

#[test]
fn test_mismatched_name_registers_nothing() {
    let context = AdhesiveContext::new();
    let err = context
        .compile("demo.B", "package demo; unit A -> i64 { 1 }")
        .unwrap_err();

    assert!(matches!(err, AdhesiveError::CompilationFailed { .. }));
    assert!(!err.diagnostics().is_empty());
    assert!(context.store().resolve("demo.A").is_none());
    assert!(context.store().resolve("demo.B").is_none());
}

#[test]
fn test_syntax_error_has_a_message() {
    let err = AdhesiveContext::new()
        .compile("demo.Bad", "package demo; unit Bad -> i64 { (1 + }")
        .unwrap_err();

    let diagnostics = err.diagnostics();
    assert!(!diagnostics.is_empty());
    assert!(diagnostics
        .iter()
        .all(|d| d.severity == Severity::Error && !d.message.is_empty()));
}

#[test]
fn test_backends_agree() {
    let jit = AdhesiveContext::new();
    let interpreted =
        AdhesiveContext::with_config(AdhesiveConfig::new().with_execution(ExecutionMode::Interpreted))
            .unwrap();
    let sources = [
        "unit U -> i64 { row.i64(0) * row.i64(1) - 7 }",
        "unit U -> i64 { if row.i64(0) > row.i64(1) { row.i64(0) % 3 } else { -row.i64(1) } }",
        "unit U -> i64 { coalesce(row.i64(0), 100) + abs(row.i64(1)) }",
        "unit U -> f64 { (row.i64(0) as f64) / 3.0 + max(row.i64(1), 2) as f64 }",
        "unit U -> i64 { if row.i64(0) == 0 || row.i64(1) > 0 { 1 } else { 0 } }",
        "unit U -> i64 { row.i64(1) / row.i64(0) }",
    ];
    let a = int64s(vec![Some(4), None, Some(-9), Some(0), Some(i64::MAX)]);
    let b = int64s(vec![Some(2), Some(3), None, Some(-5), Some(2)]);

    for source in sources {
        let outputs: Vec<_> = [&jit, &interpreted]
            .into_iter()
            .map(|context| {
                let unit = context.compile_anonymous(source).unwrap();
                let ret = unit
                    .result_type()
                    .map(|t| t.data_type())
                    .unwrap_or(DataType::Int64);
                adhesive::AdhesiveFunction::new(unit, vec![DataType::Int64; 2], ret)
                    .unwrap()
                    .invoke(&[a.clone(), b.clone()])
                    .map(|array| array.to_data())
                    .map_err(|err| {
                        // The generated package differs between contexts.
                        err.to_string()
                            .split_once(": ")
                            .map(|(_, rest)| rest.to_string())
                            .unwrap_or_default()
                    })
            })
            .collect();
        assert_eq!(outputs[0], outputs[1], "{source}");
    }
}

#[test]
fn test_recompile_keeps_old_instances() {
    let context = AdhesiveContext::new();
    let old = named_after(&context, "package demo; unit Step -> i64 { row.i64(0) + 1 }");
    let new = named_after(&context, "package demo; unit Step -> i64 { row.i64(0) + 100 }");
    let input = int64s(vec![Some(1)]);

    let old_out = old.invoke(&[input.clone()]).unwrap();
    let new_out = new.invoke(&[input.clone()]).unwrap();
    let fresh_out = named(&context, "demo.Step", 1, DataType::Int64)
        .invoke(&[input])
        .unwrap();

    assert_eq!(old_out.as_primitive::<Int64Type>().value(0), 2);
    assert_eq!(new_out.as_primitive::<Int64Type>().value(0), 101);
    assert_eq!(fresh_out.as_primitive::<Int64Type>().value(0), 101);
}

fn named_after(context: &AdhesiveContext, source: &str) -> adhesive::AdhesiveFunction {
    let unit = context.compile("demo.Step", source).unwrap();
    adhesive::AdhesiveFunction::new(unit, vec![DataType::Int64], DataType::Int64).unwrap()
}

#[test]
fn test_eviction_keeps_live_units() {
    let context = AdhesiveContext::with_config(AdhesiveConfig::new().with_max_artifacts(1)).unwrap();
    let first = context
        .compile("demo.First", "package demo; unit First -> i64 { 1 }")
        .unwrap();
    context
        .compile("demo.Second", "package demo; unit Second -> i64 { 2 }")
        .unwrap();

    assert_eq!(context.store().names(), vec!["demo.Second".to_string()]);
    assert!(matches!(
        context.create_unit("demo.First").unwrap_err(),
        AdhesiveError::TypeNotFound { .. }
    ));

    let function = adhesive::AdhesiveFunction::new(first, vec![DataType::Int64], DataType::Int64).unwrap();
    let output = function.invoke(&[int64s(vec![None])]).unwrap();
    assert_eq!(output.as_primitive::<Int64Type>().value(0), 1);
}

#[test]
fn test_division_by_zero_is_a_computation_failure() {
    let context = AdhesiveContext::new();
    context
        .compile("demo.Div", "package demo; unit Div -> i64 { row.i64(0) / row.i64(1) }")
        .unwrap();
    let function = named(&context, "demo.Div", 2, DataType::Int64);

    let err = function
        .invoke(&[int64s(vec![Some(1)]), int64s(vec![Some(0)])])
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Computation failed in `demo.Div`: division by zero"
    );
}

#[test]
fn test_typed_results() {
    let context = AdhesiveContext::new();
    context
        .compile("demo.Narrow", "package demo; unit Narrow -> i32 { row.i64(0) as i32 }")
        .unwrap();
    context
        .compile("demo.Tenth", "package demo; unit Tenth -> f32 { row.i64(0) as f32 / 10.0 }")
        .unwrap();
    let input = int64s(vec![Some(5), None]);

    let narrow = named(&context, "demo.Narrow", 1, DataType::Int32)
        .invoke(&[input.clone()])
        .unwrap();
    assert_eq!(
        narrow.as_primitive::<Int32Type>(),
        &Int32Array::from(vec![Some(5), None])
    );

    let tenth = named(&context, "demo.Tenth", 1, DataType::Float32)
        .invoke(&[input.clone()])
        .unwrap();
    assert_eq!(
        tenth.as_primitive::<Float32Type>(),
        &Float32Array::from(vec![Some(0.5), None])
    );

    let widened = named(&context, "demo.Narrow", 1, DataType::Float64)
        .invoke(&[input])
        .unwrap();
    assert_eq!(
        widened.as_primitive::<Float64Type>(),
        &Float64Array::from(vec![Some(5.0), None])
    );
}
