//! FFI bindings for Stridekit
//!
//! This module provides C-compatible functions for driving a step detector
//! from other languages. The detector is held behind an opaque handle;
//! snapshot functions return allocated strings that must be freed by the
//! caller using `stride_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::slice;

use crate::config::DetectorConfig;
use crate::detector::StepDetector;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Opaque handle to a StepDetector
pub struct StrideDetectorHandle {
    detector: StepDetector,
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Create a new step detector with the canonical tuning.
///
/// # Safety
/// - Returns a pointer to a newly allocated detector.
/// - Must be freed with `stride_detector_free`.
#[no_mangle]
pub unsafe extern "C" fn stride_detector_new() -> *mut StrideDetectorHandle {
    clear_last_error();
    let handle = Box::new(StrideDetectorHandle {
        detector: StepDetector::default(),
    });
    Box::into_raw(handle)
}

/// Create a new step detector from a JSON configuration.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string.
/// - Returns NULL on error; call `stride_last_error` for the message.
/// - Must be freed with `stride_detector_free`.
#[no_mangle]
pub unsafe extern "C" fn stride_detector_with_config(
    config_json: *const c_char,
) -> *mut StrideDetectorHandle {
    clear_last_error();

    let json = match cstr_to_string(config_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        }
    };

    let config: DetectorConfig = match serde_json::from_str(&json) {
        Ok(config) => config,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let handle = Box::new(StrideDetectorHandle {
        detector: StepDetector::new(config),
    });
    Box::into_raw(handle)
}

/// Free a step detector.
///
/// # Safety
/// - `detector` must be a valid pointer returned by a `stride_detector_*`
///   constructor.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stride_detector_free(detector: *mut StrideDetectorHandle) {
    if !detector.is_null() {
        drop(Box::from_raw(detector));
    }
}

// ============================================================================
// Detection
// ============================================================================

/// Ingest one accelerometer sample.
///
/// Returns 1 if the sample completed an accepted step, 0 for no step, and
/// -1 on error (call `stride_last_error` for the message).
///
/// # Safety
/// - `detector` must be a valid pointer returned by a constructor.
/// - `accel` must point to `accel_len` readable doubles.
#[no_mangle]
pub unsafe extern "C" fn stride_detector_ingest(
    detector: *mut StrideDetectorHandle,
    accel: *const f64,
    accel_len: usize,
    timestamp_ms: u64,
) -> i32 {
    clear_last_error();

    if detector.is_null() {
        set_last_error("Null detector pointer");
        return -1;
    }
    if accel.is_null() {
        set_last_error("Null accel pointer");
        return -1;
    }

    let handle = &mut *detector;
    let components = slice::from_raw_parts(accel, accel_len);

    match handle.detector.ingest(components, timestamp_ms) {
        Ok(Some(_)) => 1,
        Ok(None) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Running step total, or 0 if `detector` is NULL.
///
/// # Safety
/// - `detector` must be a valid pointer returned by a constructor, or NULL.
#[no_mangle]
pub unsafe extern "C" fn stride_detector_step_count(
    detector: *const StrideDetectorHandle,
) -> u32 {
    if detector.is_null() {
        return 0;
    }
    (*detector).detector.step_count()
}

/// Adaptive threshold currently in force, or 0.0 if `detector` is NULL.
///
/// # Safety
/// - `detector` must be a valid pointer returned by a constructor, or NULL.
#[no_mangle]
pub unsafe extern "C" fn stride_detector_threshold(
    detector: *const StrideDetectorHandle,
) -> f64 {
    if detector.is_null() {
        return 0.0;
    }
    (*detector).detector.current_threshold()
}

/// Whether the device is currently classified as still (0 or 1).
///
/// # Safety
/// - `detector` must be a valid pointer returned by a constructor, or NULL.
#[no_mangle]
pub unsafe extern "C" fn stride_detector_is_still(
    detector: *const StrideDetectorHandle,
) -> i32 {
    if detector.is_null() {
        return 0;
    }
    (*detector).detector.is_still() as i32
}

/// Clear all detector state back to construction defaults.
///
/// # Safety
/// - `detector` must be a valid pointer returned by a constructor.
#[no_mangle]
pub unsafe extern "C" fn stride_detector_reset(detector: *mut StrideDetectorHandle) {
    if !detector.is_null() {
        (*detector).detector.reset();
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Serialize the full detector state to JSON.
///
/// # Safety
/// - `detector` must be a valid pointer returned by a constructor.
/// - Returns a newly allocated string that must be freed with
///   `stride_free_string`.
/// - Returns NULL on error; call `stride_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn stride_detector_save_state(
    detector: *const StrideDetectorHandle,
) -> *mut c_char {
    clear_last_error();

    if detector.is_null() {
        set_last_error("Null detector pointer");
        return ptr::null_mut();
    }

    match (*detector).detector.to_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Restore detector state from a JSON snapshot.
///
/// Returns 0 on success, non-zero on error.
///
/// # Safety
/// - `detector` must be a valid pointer returned by a constructor.
/// - `json` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn stride_detector_load_state(
    detector: *mut StrideDetectorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if detector.is_null() {
        set_last_error("Null detector pointer");
        return -1;
    }

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match StepDetector::from_json(&json_str) {
        Ok(restored) => {
            (*detector).detector = restored;
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Stridekit functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Stridekit function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stride_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Stridekit call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn stride_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Stridekit library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn stride_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
