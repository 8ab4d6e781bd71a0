//! The `extern "C"` API driven the way a foreign host would drive it.

use std::ffi::{c_char, CStr, CString};
use std::ptr;
use std::sync::Arc;

use arrow::array::{make_array, Array, ArrayRef, AsArray, Float64Array, Int64Array, StructArray};
use arrow::datatypes::{Field, Float64Type, Int64Type};
use arrow::ffi::{from_ffi, to_ffi, FFI_ArrowArray, FFI_ArrowSchema};

use adhesive::ffi::*;

type ComputeFn = unsafe extern "C" fn(
    *const AdhesiveUnit,
    *mut FFI_ArrowSchema,
    *mut FFI_ArrowArray,
    *mut FFI_ArrowSchema,
    *mut FFI_ArrowArray,
) -> i32;

#[derive(Debug)]
struct Context(*mut AdhesiveContext);

impl Context {
    fn new(config: Option<&str>) -> Result<Self, i32> {
        let config = config.map(|c| CString::new(c).unwrap());
        let mut ctx = ptr::null_mut();
        let rc = unsafe {
            adhesive_context_new(
                config.as_ref().map_or(ptr::null(), |c| c.as_ptr()),
                &mut ctx,
            )
        };
        if rc == ADHESIVE_OK {
            Ok(Self(ctx))
        } else {
            Err(rc)
        }
    }

    fn compile(&self, name: &str, source: &str) -> Result<Unit, i32> {
        let name = CString::new(name).unwrap();
        let source = CString::new(source).unwrap();
        let mut unit = ptr::null_mut();
        let rc = unsafe { adhesive_compile(self.0, name.as_ptr(), source.as_ptr(), &mut unit) };
        if rc == ADHESIVE_OK {
            Ok(Unit(unit))
        } else {
            assert!(unit.is_null());
            Err(rc)
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        unsafe { adhesive_context_free(self.0) };
    }
}

#[derive(Debug)]
struct Unit(*mut AdhesiveUnit);

impl Drop for Unit {
    fn drop(&mut self) {
        unsafe { adhesive_unit_free(self.0) };
    }
}

/// Caller-side structs of one compute call.
struct Batch {
    in_schema: FFI_ArrowSchema,
    in_array: FFI_ArrowArray,
    out_schema: FFI_ArrowSchema,
    out_array: FFI_ArrowArray,
}

impl Batch {
    fn new(columns: Vec<ArrayRef>) -> Self {
        let fields = columns
            .into_iter()
            .enumerate()
            .map(|(i, c)| (Arc::new(Field::new(format!("_c{i}"), c.data_type().clone(), true)), c))
            .collect::<Vec<_>>();
        let input = StructArray::from(fields);
        let (in_array, in_schema) = to_ffi(&input.to_data()).unwrap();
        Self {
            in_schema,
            in_array,
            out_schema: FFI_ArrowSchema::empty(),
            out_array: FFI_ArrowArray::empty(),
        }
    }

    fn run(&mut self, compute: ComputeFn, unit: *const AdhesiveUnit) -> i32 {
        unsafe {
            compute(
                unit,
                &mut self.in_schema,
                &mut self.in_array,
                &mut self.out_schema,
                &mut self.out_array,
            )
        }
    }

    fn output(self) -> ArrayRef {
        make_array(unsafe { from_ffi(self.out_array, &self.out_schema) }.unwrap())
    }
}

fn int64s(values: Vec<Option<i64>>) -> ArrayRef {
    Arc::new(Int64Array::from(values))
}

fn last_error() -> String {
    let ptr = adhesive_last_error();
    assert!(!ptr.is_null());
    unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string()
}

#[test]
fn test_compile_and_compute_int64() {
    let ctx = Context::new(None).unwrap();
    let unit = ctx
        .compile("demo.Sum", "package demo; unit Sum -> i64 { row.i64(0) + row.i64(1) }")
        .unwrap();
    let mut batch = Batch::new(vec![
        int64s(vec![Some(1), Some(2), Some(3)]),
        int64s(vec![Some(10), Some(20), Some(30)]),
    ]);

    assert_eq!(batch.run(adhesive_compute_int64, unit.0), ADHESIVE_OK);
    assert!(adhesive_last_error().is_null());
    assert!(batch.in_array.is_released());
    assert_eq!(
        batch.output().as_primitive::<Int64Type>(),
        &Int64Array::from(vec![11, 22, 33])
    );
}

#[test]
fn test_compilation_error() {
    let ctx = Context::new(None).unwrap();
    let rc = ctx
        .compile("demo.Bad", "package demo; unit Bad -> i64 { nope }")
        .unwrap_err();

    assert_eq!(rc, ADHESIVE_ERR_COMPILATION);
    assert_eq!(adhesive_last_error_code(), ADHESIVE_ERR_COMPILATION);
    assert!(last_error().contains("cannot find value `nope` in this scope"));

    adhesive_clear_error();
    assert!(adhesive_last_error().is_null());
}

#[test]
fn test_division_by_zero_leaves_output_untouched() {
    let ctx = Context::new(None).unwrap();
    let unit = ctx
        .compile("demo.Div", "package demo; unit Div -> i64 { row.i64(0) / row.i64(1) }")
        .unwrap();
    let mut batch = Batch::new(vec![int64s(vec![Some(6), Some(1)]), int64s(vec![Some(3), Some(0)])]);

    assert_eq!(
        batch.run(adhesive_compute_int64, unit.0),
        ADHESIVE_ERR_COMPUTATION
    );
    assert_eq!(
        last_error(),
        "Computation failed in `demo.Div`: division by zero"
    );
    assert!(batch.out_array.is_released());
}

#[test]
fn test_non_null_entry_point_contract() {
    let ctx = Context::new(None).unwrap();
    let unit = ctx
        .compile("demo.Id", "package demo; unit Id -> i64 { row.i64(0) }")
        .unwrap();

    let mut batch = Batch::new(vec![int64s(vec![Some(1), Some(2)])]);
    assert_eq!(batch.run(adhesive_compute_int64_non_null, unit.0), ADHESIVE_OK);
    assert_eq!(batch.output().null_count(), 0);

    let mut batch = Batch::new(vec![int64s(vec![Some(1), None])]);
    assert_eq!(
        batch.run(adhesive_compute_int64_non_null, unit.0),
        ADHESIVE_ERR_CONTRACT
    );
}

#[test]
fn test_float64_entry_point_and_anonymous_compile() {
    let ctx = Context::new(Some("[compiler]\nexecution = \"interpreted\"\n")).unwrap();
    let source = CString::new("unit Half -> f64 { row.i64(0) as f64 / 2.0 }").unwrap();
    let mut unit = ptr::null_mut();
    let rc = unsafe { adhesive_compile_anonymous(ctx.0, source.as_ptr(), &mut unit) };
    assert_eq!(rc, ADHESIVE_OK);
    let unit = Unit(unit);

    let mut batch = Batch::new(vec![int64s(vec![Some(3), None])]);
    assert_eq!(batch.run(adhesive_compute_float64, unit.0), ADHESIVE_OK);
    assert_eq!(
        batch.output().as_primitive::<Float64Type>(),
        &Float64Array::from(vec![Some(1.5), None])
    );
}

#[test]
fn test_create_unit() {
    let ctx = Context::new(None).unwrap();
    ctx.compile("demo.One", "package demo; unit One -> i64 { 1 }")
        .unwrap();

    let name = CString::new("demo.One").unwrap();
    let mut unit = ptr::null_mut();
    assert_eq!(
        unsafe { adhesive_create_unit(ctx.0, name.as_ptr(), &mut unit) },
        ADHESIVE_OK
    );
    let _unit = Unit(unit);

    let missing = CString::new("demo.Missing").unwrap();
    let mut unit = ptr::null_mut();
    assert_eq!(
        unsafe { adhesive_create_unit(ctx.0, missing.as_ptr(), &mut unit) },
        ADHESIVE_ERR_TYPE_NOT_FOUND
    );
    assert_eq!(last_error(), "Type not found: demo.Missing");
}

#[test]
fn test_unit_outlives_its_context() {
    let ctx = Context::new(None).unwrap();
    let unit = ctx
        .compile("demo.Neg", "package demo; unit Neg -> i64 { -row.i64(0) }")
        .unwrap();
    drop(ctx);

    let mut batch = Batch::new(vec![int64s(vec![Some(4)])]);
    assert_eq!(batch.run(adhesive_compute_int64, unit.0), ADHESIVE_OK);
    assert_eq!(batch.output().as_primitive::<Int64Type>().value(0), -4);
}

#[test]
fn test_invalid_arguments() {
    let name = CString::new("demo.X").unwrap();
    let source = CString::new("package demo; unit X -> i64 { 1 }").unwrap();
    let mut unit = ptr::null_mut();

    let rc = unsafe { adhesive_compile(ptr::null(), name.as_ptr(), source.as_ptr(), &mut unit) };
    assert_eq!(rc, ADHESIVE_ERR_NULL_POINTER);
    assert_eq!(last_error(), "`ctx` must not be null");

    let ctx = Context::new(None).unwrap();
    let bad_utf8 = [0xffu8, 0];
    let rc = unsafe {
        adhesive_compile(
            ctx.0,
            bad_utf8.as_ptr() as *const c_char,
            source.as_ptr(),
            &mut unit,
        )
    };
    assert_eq!(rc, ADHESIVE_ERR_INVALID_UTF8);

    let mut batch = Batch::new(vec![int64s(vec![Some(1)])]);
    assert_eq!(
        batch.run(adhesive_compute_int64, ptr::null()),
        ADHESIVE_ERR_NULL_POINTER
    );
    assert!(!batch.in_array.is_released());
}

#[test]
fn test_invalid_config() {
    assert_eq!(
        Context::new(Some("[registry]\nmax_artifacts = 0\n")).err(),
        Some(ADHESIVE_ERR_CONFIG)
    );
    assert!(last_error().contains("max_artifacts"));
}

#[test]
fn test_init_logging_is_idempotent() {
    let filter = CString::new("adhesive=debug").unwrap();
    assert_eq!(unsafe { adhesive_init_logging(filter.as_ptr()) }, ADHESIVE_OK);
    assert_eq!(unsafe { adhesive_init_logging(ptr::null()) }, ADHESIVE_OK);
    assert!(adhesive::logging::is_initialized());
}

#[test]
fn test_schema_mismatch_code() {
    let ctx = Context::new(None).unwrap();
    let unit = ctx
        .compile("demo.F", "package demo; unit F -> f64 { row.f64(0) }")
        .unwrap();
    let mut batch = Batch::new(vec![int64s(vec![Some(1)])]);

    assert_eq!(
        batch.run(adhesive_compute_float64, unit.0),
        ADHESIVE_ERR_SCHEMA_MISMATCH
    );
    assert!(last_error().contains("reads column 0 as Float64"));
}
