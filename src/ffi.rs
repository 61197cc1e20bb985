//! FFI bindings for Sleep Flux
//!
//! This module provides C-compatible functions for calling Flux from a host app.
//! The host fetches samples from its health store, serializes them as a
//! `SleepFixture` JSON document, and passes them in together with the user's
//! configuration. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `sleep_flux_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::ComputeError;
use crate::pipeline::SleepPipeline;
use crate::provider::FixtureProvider;
use crate::types::TimeWindow;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
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

/// Required string argument; records the error and returns None when missing
unsafe fn required_arg(ptr: *const c_char, name: &str) -> Option<String> {
    let value = cstr_to_string(ptr);
    if value.is_none() {
        set_last_error(&format!("Invalid {name} string pointer"));
    }
    value
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, ComputeError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ComputeError::ParseError(format!("invalid RFC 3339 timestamp {value:?}: {e}")))
}

/// Configuration from optional JSON; NULL selects the defaults
fn load_config(json: Option<String>) -> Result<EngineConfig, ComputeError> {
    match json {
        Some(json) => EngineConfig::from_json(&json),
        None => Ok(EngineConfig::default()),
    }
}

/// Serialize a result to a C string, or record the error and return NULL
fn respond<T: Serialize>(result: Result<T, ComputeError>) -> *mut c_char {
    match result.and_then(|value| Ok(serde_json::to_string(&value)?)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&format!("{}: {}", e.code(), e));
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Summarize one window and return the `NightSummary` as JSON.
///
/// # Safety
/// - `fixture_json`, `start`, and `end` must be valid null-terminated C strings.
///   `start` and `end` are RFC 3339 timestamps.
/// - `config_json` may be NULL to use the default configuration.
/// - Returns a newly allocated string that must be freed with `sleep_flux_free_string`.
/// - Returns NULL on error; call `sleep_flux_last_error` to get the error message.
///   A message starting with `NO_DATA` means there is nothing to show yet.
#[no_mangle]
pub unsafe extern "C" fn sleep_flux_summarize(
    fixture_json: *const c_char,
    config_json: *const c_char,
    start: *const c_char,
    end: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(fixture) = required_arg(fixture_json, "fixture JSON") else {
        return ptr::null_mut();
    };
    let Some(start) = required_arg(start, "start") else {
        return ptr::null_mut();
    };
    let Some(end) = required_arg(end, "end") else {
        return ptr::null_mut();
    };
    let config = cstr_to_string(config_json);

    respond((|| {
        let pipeline = SleepPipeline::new(load_config(config)?)?;
        let provider = FixtureProvider::from_json(&fixture)?;
        let window = TimeWindow::new(parse_instant(&start)?, parse_instant(&end)?)?;
        pipeline.summarize_blocking(&provider, window)
    })())
}

/// Run the full pipeline and return the `SleepReport` as JSON.
///
/// # Safety
/// - `fixture_json` must be a valid null-terminated C string.
/// - `config_json` may be NULL to use the default configuration.
/// - `now` may be NULL to use the current time; otherwise an RFC 3339 timestamp.
/// - Returns a newly allocated string that must be freed with `sleep_flux_free_string`.
/// - Returns NULL on error; call `sleep_flux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn sleep_flux_report(
    fixture_json: *const c_char,
    config_json: *const c_char,
    now: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(fixture) = required_arg(fixture_json, "fixture JSON") else {
        return ptr::null_mut();
    };
    let config = cstr_to_string(config_json);
    let now = cstr_to_string(now);

    respond((|| {
        let pipeline = SleepPipeline::new(load_config(config)?)?;
        let provider = FixtureProvider::from_json(&fixture)?;
        let now = match now {
            Some(value) => parse_instant(&value)?,
            None => Utc::now(),
        };
        pipeline.run_blocking(&provider, now)
    })())
}

/// Compute the trailing debt series and return the `DebtReport` as JSON.
///
/// # Safety
/// Same contract as `sleep_flux_report`.
#[no_mangle]
pub unsafe extern "C" fn sleep_flux_debt(
    fixture_json: *const c_char,
    config_json: *const c_char,
    now: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(fixture) = required_arg(fixture_json, "fixture JSON") else {
        return ptr::null_mut();
    };
    let config = cstr_to_string(config_json);
    let now = cstr_to_string(now);

    respond((|| {
        let pipeline = SleepPipeline::new(load_config(config)?)?;
        let provider = FixtureProvider::from_json(&fixture)?;
        let now = match now {
            Some(value) => parse_instant(&value)?,
            None => Utc::now(),
        };
        pipeline.debt_blocking(&provider, now)
    })())
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn sleep_flux_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message, prefixed with its error code.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Flux function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn sleep_flux_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Flux library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn sleep_flux_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_json() -> CString {
        CString::new(
            r#"{
                "stage_samples": [
                    {"start_time": "2024-01-14T22:00:00Z", "end_time": "2024-01-14T22:20:00Z", "stage": "in_bed"},
                    {"start_time": "2024-01-14T22:20:00Z", "end_time": "2024-01-15T06:20:00Z", "stage": "in_bed"},
                    {"start_time": "2024-01-14T22:20:00Z", "end_time": "2024-01-15T06:20:00Z", "stage": "core"}
                ],
                "heart_rate": [
                    {"timestamp": "2024-01-15T01:00:00Z", "bpm": 54.0}
                ]
            }"#,
        )
        .unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let value = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        sleep_flux_free_string(ptr);
        value
    }

    #[test]
    fn test_ffi_summarize() {
        let fixture = fixture_json();
        let start = CString::new("2024-01-14T12:00:00Z").unwrap();
        let end = CString::new("2024-01-15T12:00:00Z").unwrap();

        unsafe {
            let result =
                sleep_flux_summarize(fixture.as_ptr(), ptr::null(), start.as_ptr(), end.as_ptr());
            let summary: serde_json::Value = serde_json::from_str(&take_string(result)).unwrap();

            assert_eq!(summary["duration_secs"], 28800.0);
            assert_eq!(summary["heart_rate_avg"], 54.0);
            assert_eq!(summary["sleep_onset_latency_secs"], 1200.0);
        }
    }

    #[test]
    fn test_ffi_report() {
        let fixture = fixture_json();
        let config = CString::new(r#"{"target_sleep_hours": 8.0}"#).unwrap();
        let now = CString::new("2024-01-15T12:00:00Z").unwrap();

        unsafe {
            let result = sleep_flux_report(fixture.as_ptr(), config.as_ptr(), now.as_ptr());
            let report: serde_json::Value = serde_json::from_str(&take_string(result)).unwrap();

            assert_eq!(report["scored"]["score"], 100.0);
            assert_eq!(report["scored"]["debt"], 0.0);
            assert_eq!(report["debt"]["series"].as_array().unwrap().len(), 1);
        }
    }

    #[test]
    fn test_ffi_debt() {
        let fixture = fixture_json();
        let now = CString::new("2024-01-15T12:00:00Z").unwrap();

        unsafe {
            let result = sleep_flux_debt(fixture.as_ptr(), ptr::null(), now.as_ptr());
            let report: serde_json::Value = serde_json::from_str(&take_string(result)).unwrap();

            assert_eq!(report["series"][0]["day_index"], 13);
            assert_eq!(report["skipped"].as_array().unwrap().len(), 13);
        }
    }

    #[test]
    fn test_ffi_no_data_error() {
        let empty = CString::new("{}").unwrap();
        let now = CString::new("2024-01-15T12:00:00Z").unwrap();

        unsafe {
            let result = sleep_flux_report(empty.as_ptr(), ptr::null(), now.as_ptr());
            assert!(result.is_null());

            let error = CStr::from_ptr(sleep_flux_last_error()).to_str().unwrap();
            assert!(error.starts_with("NO_DATA"));
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let invalid = CString::new("not valid json").unwrap();

        unsafe {
            let result = sleep_flux_report(invalid.as_ptr(), ptr::null(), ptr::null());
            assert!(result.is_null());
            assert!(!sleep_flux_last_error().is_null());

            let result = sleep_flux_report(ptr::null(), ptr::null(), ptr::null());
            assert!(result.is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = CStr::from_ptr(sleep_flux_version()).to_str().unwrap();
            assert_eq!(version, env!("CARGO_PKG_VERSION"));
        }
    }
}
