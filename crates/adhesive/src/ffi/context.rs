//! Context and unit handles.

use std::ffi::{c_char, CStr};
use std::sync::Arc;

use adhesive_core::ComputationUnit;

use super::error::{guard, FfiError};
use crate::context::AdhesiveContext as Context;
use crate::logging;

/// Opaque context handle.
pub struct AdhesiveContext {
    inner: Context,
}

/// Opaque unit handle.
pub struct AdhesiveUnit {
    inner: Arc<dyn ComputationUnit>,
}

impl AdhesiveUnit {
    pub(crate) fn unit(&self) -> &dyn ComputationUnit {
        self.inner.as_ref()
    }
}

/// Reads a required UTF-8 string argument.
pub(crate) unsafe fn str_arg<'a>(ptr: *const c_char, what: &'static str) -> Result<&'a str, FfiError> {
    if ptr.is_null() {
        return Err(FfiError::NullPointer(what));
    }
    // SAFETY: non-null and, per the caller contract, NUL-terminated.
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| FfiError::InvalidUtf8(what))
}

/// Borrows a required handle argument.
pub(crate) unsafe fn handle_arg<'a, T>(ptr: *const T, what: &'static str) -> Result<&'a T, FfiError> {
    // SAFETY: per the caller contract a non-null handle came from this API
    // and has not been freed.
    unsafe { ptr.as_ref() }.ok_or(FfiError::NullPointer(what))
}

fn out_arg<T>(ptr: *mut *mut T, what: &'static str) -> Result<*mut *mut T, FfiError> {
    if ptr.is_null() {
        Err(FfiError::NullPointer(what))
    } else {
        Ok(ptr)
    }
}

/// Creates a context.
///
/// `config_toml` is TOML configuration text, or null for the defaults. On
/// success `*out` receives a handle to free with `adhesive_context_free`.
///
/// # Safety
///
/// * `config_toml` must be null or a NUL-terminated string
/// * `out` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn adhesive_context_new(
    config_toml: *const c_char,
    out: *mut *mut AdhesiveContext,
) -> i32 {
    guard(|| {
        let out = out_arg(out, "out")?;
        let inner = if config_toml.is_null() {
            Context::new()
        } else {
            // SAFETY: non-null, caller contract covers the rest.
            Context::from_toml_str(unsafe { str_arg(config_toml, "config_toml") }?)?
        };
        let handle = Box::new(AdhesiveContext { inner });
        // SAFETY: out is non-null (checked above).
        unsafe { *out = Box::into_raw(handle) };
        Ok(())
    })
}

/// Frees a context. Units created from it stay valid.
///
/// # Safety
///
/// `ctx` must be null or a handle from `adhesive_context_new` that has not
/// been freed.
#[no_mangle]
pub unsafe extern "C" fn adhesive_context_free(ctx: *mut AdhesiveContext) {
    if !ctx.is_null() {
        // SAFETY: ctx came from Box::into_raw in adhesive_context_new.
        drop(unsafe { Box::from_raw(ctx) });
    }
}

/// Compiles `source`, which must declare the unit `name`.
///
/// On success `*out_unit` receives a handle to free with
/// `adhesive_unit_free`. On failure the last error holds every diagnostic.
///
/// # Safety
///
/// * `ctx` must be a live context handle
/// * `name` and `source` must be NUL-terminated strings
/// * `out_unit` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn adhesive_compile(
    ctx: *const AdhesiveContext,
    name: *const c_char,
    source: *const c_char,
    out_unit: *mut *mut AdhesiveUnit,
) -> i32 {
    guard(|| {
        let out = out_arg(out_unit, "out_unit")?;
        // SAFETY: caller contract.
        let (ctx, name, source) = unsafe {
            (
                handle_arg(ctx, "ctx")?,
                str_arg(name, "name")?,
                str_arg(source, "source")?,
            )
        };
        let unit = ctx.inner.compile(name, source)?;
        // SAFETY: out is non-null (checked above).
        unsafe { write_unit(out, unit) };
        Ok(())
    })
}

/// Compiles `source` under a generated package.
///
/// # Safety
///
/// * `ctx` must be a live context handle
/// * `source` must be a NUL-terminated string
/// * `out_unit` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn adhesive_compile_anonymous(
    ctx: *const AdhesiveContext,
    source: *const c_char,
    out_unit: *mut *mut AdhesiveUnit,
) -> i32 {
    guard(|| {
        let out = out_arg(out_unit, "out_unit")?;
        // SAFETY: caller contract.
        let (ctx, source) = unsafe { (handle_arg(ctx, "ctx")?, str_arg(source, "source")?) };
        let unit = ctx.inner.compile_anonymous(source)?;
        // SAFETY: out is non-null (checked above).
        unsafe { write_unit(out, unit) };
        Ok(())
    })
}

/// Instantiates a compiled or native unit by name.
///
/// # Safety
///
/// * `ctx` must be a live context handle
/// * `name` must be a NUL-terminated string
/// * `out_unit` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn adhesive_create_unit(
    ctx: *const AdhesiveContext,
    name: *const c_char,
    out_unit: *mut *mut AdhesiveUnit,
) -> i32 {
    guard(|| {
        let out = out_arg(out_unit, "out_unit")?;
        // SAFETY: caller contract.
        let (ctx, name) = unsafe { (handle_arg(ctx, "ctx")?, str_arg(name, "name")?) };
        let unit = ctx.inner.create_unit(name)?;
        // SAFETY: out is non-null (checked above).
        unsafe { write_unit(out, unit) };
        Ok(())
    })
}

/// Frees a unit handle.
///
/// # Safety
///
/// `unit` must be null or a handle returned by this API that has not been
/// freed.
#[no_mangle]
pub unsafe extern "C" fn adhesive_unit_free(unit: *mut AdhesiveUnit) {
    if !unit.is_null() {
        // SAFETY: unit came from Box::into_raw in write_unit.
        drop(unsafe { Box::from_raw(unit) });
    }
}

/// Installs the logging subscriber.
///
/// `filter` is a `tracing` filter directive used when `RUST_LOG` is unset,
/// or null for the default.
///
/// # Safety
///
/// `filter` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn adhesive_init_logging(filter: *const c_char) -> i32 {
    guard(|| {
        if filter.is_null() {
            logging::init(&Default::default());
        } else {
            // SAFETY: non-null, caller contract covers the rest.
            logging::init_with_filter(unsafe { str_arg(filter, "filter") }?);
        }
        Ok(())
    })
}

unsafe fn write_unit(out: *mut *mut AdhesiveUnit, unit: Arc<dyn ComputationUnit>) {
    let handle = Box::new(AdhesiveUnit { inner: unit });
    // SAFETY: out is non-null and writable per the caller.
    unsafe { *out = Box::into_raw(handle) };
}

