//! FFI layer for hosts that drive the engine from another language.
//!
//! This module exposes the pure query helpers as C-compatible functions.
//! Reconciliation itself needs host callbacks and stays on the Rust side;
//! what crosses the boundary is the query model, as JSON strings.
//!
//! # Memory Management
//!
//! - Strings returned by `urlstate_*` functions are allocated by Rust
//! - Caller must free them with `urlstate_string_free`
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>"}` on failure

use crate::{diff, value::base_serialize, Error, Query, Value};
use std::ffi::{c_char, CStr, CString};

/// Result wrapper for FFI responses.
#[derive(serde::Serialize)]
#[serde(untagged)]
enum FfiResult<T: serde::Serialize> {
    Ok { ok: T },
    Err { error: String },
}

impl<T: serde::Serialize> FfiResult<T> {
    fn ok(value: T) -> Self {
        FfiResult::Ok { ok: value }
    }

    fn err(message: impl Into<String>) -> Self {
        FfiResult::Err {
            error: message.into(),
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e))
    }
}

impl<T: serde::Serialize> From<crate::error::Result<T>> for FfiResult<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(value) => FfiResult::ok(value),
            Err(e) => FfiResult::err(e.to_string()),
        }
    }
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `urlstate_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => CString::new(r#"{"error":"string contained null bytes"}"#)
            .map(CString::into_raw)
            .unwrap_or(std::ptr::null_mut()),
    }
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

unsafe fn query_arg(ptr: *const c_char, name: &str) -> Result<Query, String> {
    let json = from_c_string(ptr).ok_or_else(|| format!("invalid {} string", name))?;
    serde_json::from_str(&json).map_err(|e| Error::InvalidJson(e.to_string()).to_string())
}

fn respond<T: serde::Serialize>(result: FfiResult<T>) -> *mut c_char {
    to_c_string(result.to_json())
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a valid pointer from a `urlstate_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn urlstate_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Query Strings
// ============================================================================

/// Parse a URL query string.
///
/// # Returns
/// JSON string: `{"ok": {"key": "value" | ["v1", "v2"]}}` or `{"error": "message"}`
///
/// # Safety
/// - `query_string` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `urlstate_string_free`
#[no_mangle]
pub unsafe extern "C" fn urlstate_query_parse(query_string: *const c_char) -> *mut c_char {
    let input = match from_c_string(query_string) {
        Some(s) => s,
        None => return respond(FfiResult::<()>::err("invalid query string")),
    };

    respond(FfiResult::from(Query::parse(&input)))
}

/// Encode a query object as a URL query string.
///
/// # Returns
/// JSON string: `{"ok": "a=1&b=2"}` or `{"error": "message"}`
///
/// # Safety
/// - `query_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `urlstate_string_free`
#[no_mangle]
pub unsafe extern "C" fn urlstate_query_encode(query_json: *const c_char) -> *mut c_char {
    match query_arg(query_json, "query") {
        Ok(query) => respond(FfiResult::ok(query.to_query_string())),
        Err(e) => respond(FfiResult::<()>::err(e)),
    }
}

// ============================================================================
// Equality & Diff
// ============================================================================

/// Compare two query objects. Array values compare in order.
///
/// # Returns
/// JSON string: `{"ok": true | false}` or `{"error": "message"}`
///
/// # Safety
/// - `a_json` and `b_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `urlstate_string_free`
#[no_mangle]
pub unsafe extern "C" fn urlstate_query_equal(
    a_json: *const c_char,
    b_json: *const c_char,
) -> *mut c_char {
    let (a, b) = match (query_arg(a_json, "query"), query_arg(b_json, "query")) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => return respond(FfiResult::<()>::err(e)),
    };

    respond(FfiResult::ok(diff::snapshots_equal(&a, &b)))
}

/// Keys whose values differ between two query objects.
///
/// # Returns
/// JSON string: `{"ok": ["key", ...]}` or `{"error": "message"}`
///
/// # Safety
/// - `a_json` and `b_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `urlstate_string_free`
#[no_mangle]
pub unsafe extern "C" fn urlstate_query_changed_keys(
    a_json: *const c_char,
    b_json: *const c_char,
) -> *mut c_char {
    let (a, b) = match (query_arg(a_json, "query"), query_arg(b_json, "query")) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => return respond(FfiResult::<()>::err(e)),
    };

    respond(FfiResult::ok(diff::changed_keys(&a, &b)))
}

// ============================================================================
// Serialization
// ============================================================================

/// Serialize a JSON value the way free-form fields are serialized.
///
/// # Returns
/// JSON string: `{"ok": "text" | ["a", "b"] | null}` or `{"error": "message"}`.
/// `null` means the value has no query representation.
///
/// # Safety
/// - `value_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `urlstate_string_free`
#[no_mangle]
pub unsafe extern "C" fn urlstate_serialize_value(value_json: *const c_char) -> *mut c_char {
    let json = match from_c_string(value_json) {
        Some(s) => s,
        None => return respond(FfiResult::<()>::err("invalid value string")),
    };

    let value: serde_json::Value = match serde_json::from_str(&json) {
        Ok(v) => v,
        Err(e) => return respond(FfiResult::<()>::err(Error::InvalidJson(e.to_string()).to_string())),
    };

    respond(FfiResult::ok(base_serialize(&Value::from(value))))
}

// ============================================================================
// Utility
// ============================================================================

/// Get the engine version.
///
/// # Returns
/// Static string pointer (do not free)
#[no_mangle]
pub extern "C" fn urlstate_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
