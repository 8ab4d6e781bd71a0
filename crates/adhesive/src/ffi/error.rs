//! Status codes and thread-local error storage.

use std::any::Any;
use std::cell::RefCell;
use std::ffi::{c_char, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use adhesive_core::AdhesiveError;
use tracing::error;

/// Success.
pub const ADHESIVE_OK: i32 = 0;
/// A required pointer argument was null.
pub const ADHESIVE_ERR_NULL_POINTER: i32 = -1;
/// A string argument was not valid UTF-8.
pub const ADHESIVE_ERR_INVALID_UTF8: i32 = -2;
/// Source text failed to compile.
pub const ADHESIVE_ERR_COMPILATION: i32 = 100;
/// No compiled or native unit has the requested name.
pub const ADHESIVE_ERR_TYPE_NOT_FOUND: i32 = 200;
/// A unit or its result broke the entry point contract.
pub const ADHESIVE_ERR_CONTRACT: i32 = 300;
/// The unit's computation failed for a row.
pub const ADHESIVE_ERR_COMPUTATION: i32 = 400;
/// Input columns do not match what the unit reads.
pub const ADHESIVE_ERR_SCHEMA_MISMATCH: i32 = 500;
/// Invalid configuration.
pub const ADHESIVE_ERR_CONFIG: i32 = 600;
/// A stored artifact could not be loaded.
pub const ADHESIVE_ERR_ARTIFACT: i32 = 700;
/// Arrow C Data Interface failure.
pub const ADHESIVE_ERR_ARROW: i32 = 800;
/// Internal error, including panics caught at the boundary.
pub const ADHESIVE_ERR_INTERNAL: i32 = 900;

thread_local! {
    static LAST_ERROR: RefCell<Option<StoredError>> = const { RefCell::new(None) };
}

struct StoredError {
    code: i32,
    message: CString,
}

/// Failure of one C ABI call.
#[derive(Debug)]
pub(crate) enum FfiError {
    NullPointer(&'static str),
    InvalidUtf8(&'static str),
    Adhesive(AdhesiveError),
}

impl From<AdhesiveError> for FfiError {
    fn from(err: AdhesiveError) -> Self {
        FfiError::Adhesive(err)
    }
}

/// Maps an error kind to its status code.
pub fn error_code(err: &AdhesiveError) -> i32 {
    match err {
        AdhesiveError::CompilationFailed { .. } => ADHESIVE_ERR_COMPILATION,
        AdhesiveError::TypeNotFound { .. } => ADHESIVE_ERR_TYPE_NOT_FOUND,
        AdhesiveError::ContractViolation(_) => ADHESIVE_ERR_CONTRACT,
        AdhesiveError::ComputationFailure { .. } => ADHESIVE_ERR_COMPUTATION,
        AdhesiveError::SchemaMismatch(_) => ADHESIVE_ERR_SCHEMA_MISMATCH,
        AdhesiveError::Config(_) => ADHESIVE_ERR_CONFIG,
        AdhesiveError::InvalidArtifact { .. } => ADHESIVE_ERR_ARTIFACT,
        AdhesiveError::Arrow(_) => ADHESIVE_ERR_ARROW,
        AdhesiveError::Internal(_) => ADHESIVE_ERR_INTERNAL,
    }
}

pub(crate) fn set_last_error(code: i32, message: impl Into<String>) {
    let message = CString::new(message.into().replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(StoredError { code, message }));
}

pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

fn report(err: FfiError) -> i32 {
    let (code, message) = match err {
        FfiError::NullPointer(what) => {
            (ADHESIVE_ERR_NULL_POINTER, format!("`{what}` must not be null"))
        }
        FfiError::InvalidUtf8(what) => {
            (ADHESIVE_ERR_INVALID_UTF8, format!("`{what}` is not valid UTF-8"))
        }
        FfiError::Adhesive(err) => (error_code(&err), err.to_string()),
    };
    set_last_error(code, message);
    code
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Runs one C ABI call: resets the last error, then turns the outcome,
/// including a panic, into a status code.
pub(crate) fn guard<F>(f: F) -> i32
where
    F: FnOnce() -> Result<(), FfiError>,
{
    clear_last_error();
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => ADHESIVE_OK,
        Ok(Err(err)) => report(err),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(event = "ffi_panic", panic = message, "Panic caught at the C boundary");
            set_last_error(
                ADHESIVE_ERR_INTERNAL,
                format!("Internal error: panic at the C boundary: {message}"),
            );
            ADHESIVE_ERR_INTERNAL
        }
    }
}

/// Returns the last error message of this thread, or null if the last call
/// succeeded.
///
/// The pointer stays valid until the next `adhesive_*` call on this thread.
#[no_mangle]
pub extern "C" fn adhesive_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(stored) => stored.message.as_ptr(),
        None => ptr::null(),
    })
}

/// Returns the status code of the last failed call, or `ADHESIVE_OK`.
#[no_mangle]
pub extern "C" fn adhesive_last_error_code() -> i32 {
    LAST_ERROR.with(|e| e.borrow().as_ref().map_or(ADHESIVE_OK, |stored| stored.code))
}

/// Forgets the last error of this thread.
#[no_mangle]
pub extern "C" fn adhesive_clear_error() {
    clear_last_error();
}
