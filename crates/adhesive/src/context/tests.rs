use arrow::array::{ArrayRef, AsArray, Float64Array, Int64Array};
use arrow::datatypes::{Float64Type, Int64Type};

use adhesive_config::ExecutionMode;
use adhesive_core::{FnUnit, Scalar};

use super::*;

#[test]
fn test_default_context() {
    let context = AdhesiveContext::new();
    assert_eq!(context.config(), &AdhesiveConfig::default());
    assert!(context.store().is_empty());
}

#[test]
fn test_with_config_validates() {
    let err = AdhesiveContext::with_config(AdhesiveConfig::new().with_max_artifacts(0)).unwrap_err();
    assert!(matches!(err, AdhesiveError::Config(_)));
    assert!(err.to_string().contains("max_artifacts"));
}

#[test]
fn test_from_toml_str() {
    let context = AdhesiveContext::from_toml_str(
        r#"
        [compiler]
        execution = "interpreted"
        generated_namespace = "tenant.units"

        [registry]
        max_artifacts = 16
        "#,
    )
    .unwrap();
    assert_eq!(context.config().compiler.execution, ExecutionMode::Interpreted);
    assert_eq!(context.store().max_artifacts(), Some(16));

    let unit = context
        .compile_anonymous("unit One -> i64 { 1 }")
        .unwrap();
    assert!(unit.name().starts_with("tenant.units.p"));
}

#[test]
fn test_from_toml_str_rejects_bad_input() {
    let err = AdhesiveContext::from_toml_str("[compiler]\nexecution = \"fast\"").unwrap_err();
    assert!(matches!(err, AdhesiveError::Config(_)));
}

#[test]
fn test_clones_share_the_registry() {
    let context = AdhesiveContext::new();
    let clone = context.clone();
    context
        .compile("demo.One", "package demo; unit One -> i64 { 1 }")
        .unwrap();
    assert!(clone.store().contains("demo.One"));
    assert!(clone.create_unit("demo.One").is_ok());
}

#[test]
fn test_native_unit_function() {
    let context = AdhesiveContext::new();
    context.register_native("host.Triple", || {
        Arc::new(FnUnit::new("host.Triple", |row| {
            Ok(row.get_i64(0)?.map(|v| Scalar::Int64(v * 3)))
        }))
    });

    let function = context
        .create_function(
            FunctionDefinition::Name("host.Triple".to_string()),
            vec![DataType::Int64],
            DataType::Int64,
        )
        .unwrap();
    let input: ArrayRef = Arc::new(Int64Array::from(vec![Some(2), None]));
    let output = function.invoke(&[input]).unwrap();
    assert_eq!(
        output.as_primitive::<Int64Type>(),
        &Int64Array::from(vec![Some(6), None])
    );
}

#[test]
fn test_source_function() {
    let context = AdhesiveContext::new();
    let function = context
        .create_function(
            FunctionDefinition::Source(
                "unit Half -> f64 { row.i64(0) as f64 / 2.0 }".to_string(),
            ),
            vec![DataType::Int64],
            DataType::Float64,
        )
        .unwrap();
    let input: ArrayRef = Arc::new(Int64Array::from(vec![3, 4]));
    let output = function.invoke(&[input]).unwrap();
    assert_eq!(
        output.as_primitive::<Float64Type>(),
        &Float64Array::from(vec![1.5, 2.0])
    );
}

#[test]
fn test_create_function_unknown_name() {
    let err = AdhesiveContext::new()
        .create_function(
            FunctionDefinition::Name("nope.Missing".to_string()),
            vec![DataType::Int64],
            DataType::Int64,
        )
        .unwrap_err();
    assert!(matches!(err, AdhesiveError::TypeNotFound { .. }));
}
