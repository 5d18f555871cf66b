//! FFI bindings for geotrace-risk
//!
//! This module provides C-compatible functions for calling the analyzer from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `geotrace_free_string`.
//!
//! Successful analyses return a JSON privacy report (see `ReportEncoder`).

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::adapters::TraceFormat;
use crate::config::AnalysisConfig;
use crate::encoder::ReportEncoder;
use crate::error::AnalysisError;
use crate::pipeline::{analyze_points_json, analyze_strava_json, TraceAnalyzer};
use crate::types::AnalysisResult;

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

/// Read a required string argument, recording an error when it is unusable
unsafe fn required_arg(ptr: *const c_char, name: &str) -> Option<String> {
    let value = cstr_to_string(ptr);
    if value.is_none() {
        set_last_error(&format!("Invalid {} string pointer", name));
    }
    value
}

/// NULL means defaults; anything else must be a valid configuration JSON
unsafe fn config_arg(ptr: *const c_char) -> Result<AnalysisConfig, AnalysisError> {
    if ptr.is_null() {
        return Ok(AnalysisConfig::default());
    }
    match cstr_to_string(ptr) {
        Some(json) => AnalysisConfig::from_json(&json),
        None => Err(AnalysisError::ParseError(
            "config is not valid UTF-8".to_string(),
        )),
    }
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Encode a result as a report string, or record the error and return NULL
fn report_or_null(
    encoder: &ReportEncoder,
    result: Result<AnalysisResult, AnalysisError>,
) -> *mut c_char {
    match result.and_then(|r| encoder.encode_to_json(&r)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Analyze a JSON array of points and return a privacy report.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - `config_json` must be a valid null-terminated C string, or NULL for defaults.
/// - Returns a newly allocated string that must be freed with `geotrace_free_string`.
/// - Returns NULL on error; call `geotrace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn geotrace_analyze_points(
    json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = required_arg(json, "JSON") else {
        return ptr::null_mut();
    };

    let result = config_arg(config_json).and_then(|config| analyze_points_json(&json_str, &config));
    report_or_null(&ReportEncoder::new(), result)
}

/// Analyze a Strava-style activity export and return a privacy report.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - `config_json` must be a valid null-terminated C string, or NULL for defaults.
/// - Returns a newly allocated string that must be freed with `geotrace_free_string`.
/// - Returns NULL on error; call `geotrace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn geotrace_analyze_strava(
    json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = required_arg(json, "JSON") else {
        return ptr::null_mut();
    };

    let result = config_arg(config_json).and_then(|config| analyze_strava_json(&json_str, &config));
    report_or_null(&ReportEncoder::new(), result)
}

/// Return the default configuration as JSON.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `geotrace_free_string`.
#[no_mangle]
pub unsafe extern "C" fn geotrace_default_config() -> *mut c_char {
    clear_last_error();

    match AnalysisConfig::default().to_json_pretty() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Analyzer Handle API
// ============================================================================

/// Opaque handle to a TraceAnalyzer
pub struct TraceAnalyzerHandle {
    analyzer: TraceAnalyzer,
    encoder: ReportEncoder,
}

/// Create an analyzer from a configuration JSON (NULL for defaults).
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string, or NULL.
/// - Returns a pointer to a newly allocated analyzer.
/// - Must be freed with `geotrace_analyzer_free`.
/// - Returns NULL if the configuration is invalid.
#[no_mangle]
pub unsafe extern "C" fn geotrace_analyzer_new(
    config_json: *const c_char,
) -> *mut TraceAnalyzerHandle {
    clear_last_error();

    match config_arg(config_json).and_then(TraceAnalyzer::new) {
        Ok(analyzer) => Box::into_raw(Box::new(TraceAnalyzerHandle {
            analyzer,
            encoder: ReportEncoder::new(),
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an analyzer.
///
/// # Safety
/// - `analyzer` must be a valid pointer returned by `geotrace_analyzer_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn geotrace_analyzer_free(analyzer: *mut TraceAnalyzerHandle) {
    if !analyzer.is_null() {
        drop(Box::from_raw(analyzer));
    }
}

/// Analyze a payload with an existing analyzer.
///
/// `format` is one of `points`, `ndjson` or `strava`.
///
/// # Safety
/// - `analyzer` must be a valid pointer returned by `geotrace_analyzer_new`.
/// - `json` and `format` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `geotrace_free_string`.
/// - Returns NULL on error; call `geotrace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn geotrace_analyzer_analyze(
    analyzer: *const TraceAnalyzerHandle,
    json: *const c_char,
    format: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if analyzer.is_null() {
        set_last_error("Null analyzer pointer");
        return ptr::null_mut();
    }

    let handle = &*analyzer;

    let Some(json_str) = required_arg(json, "JSON") else {
        return ptr::null_mut();
    };
    let Some(format_str) = required_arg(format, "format") else {
        return ptr::null_mut();
    };

    let result = format_str
        .parse::<TraceFormat>()
        .and_then(|format| handle.analyzer.analyze_json(&json_str, format));
    report_or_null(&handle.encoder, result)
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by geotrace functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a geotrace function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn geotrace_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next geotrace function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn geotrace_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn geotrace_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
