//! C-ABI FFI bindings for the web service that hosts the redactor.
//!
//! A pipeline is created once per process with [`nopii_pipeline_new`] and
//! shared across requests. Each [`nopii_redact`] call returns either the
//! redacted PDF bytes or a JSON error `{"kind": ..., "message": ...}`.

use std::ffi::{c_char, CStr, CString};
use std::ptr;
use std::sync::Arc;

use crate::detector::LexiconModel;
use crate::error::{Error, ErrorReport};
use crate::options::RedactOptions;
use crate::pipeline::Pipeline;

/// Result structure returned by [`nopii_redact`].
#[repr(C)]
pub struct NopiiResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Redacted PDF bytes (null if failed). Must be freed with `nopii_free_result`.
    pub data: *mut u8,
    /// Length of `data` in bytes.
    pub len: usize,
    /// Error report as JSON (null if succeeded). Must be freed with `nopii_free_result`.
    pub error: *mut c_char,
}

impl NopiiResult {
    fn success(data: Vec<u8>) -> Self {
        let boxed = data.into_boxed_slice();
        let len = boxed.len();
        Self {
            success: true,
            data: Box::into_raw(boxed) as *mut u8,
            len,
            error: ptr::null_mut(),
        }
    }

    fn error(report: ErrorReport) -> Self {
        let json = serde_json::to_string(&report).unwrap_or_else(|_| report.message.clone());
        Self {
            success: false,
            data: ptr::null_mut(),
            len: 0,
            error: CString::new(json).unwrap_or_default().into_raw(),
        }
    }
}

/// Opaque pipeline handle.
pub struct NopiiPipeline {
    inner: Pipeline,
}

unsafe fn optional_str<'a>(ptr: *const c_char, what: &str) -> Result<Option<&'a str>, Error> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(Some)
        .map_err(|_| Error::InvalidConfig(format!("{} is not valid UTF-8", what)))
}

unsafe fn pipeline_new_internal(
    config_json: *const c_char,
    model_path: *const c_char,
) -> crate::Result<Pipeline> {
    let options = match optional_str(config_json, "config")? {
        Some(json) => RedactOptions::from_json_str(json)?,
        None => RedactOptions::default(),
    };
    let model = match optional_str(model_path, "model path")? {
        Some(path) => Arc::new(LexiconModel::from_file(path)?),
        None => LexiconModel::shared()?,
    };
    Pipeline::new(options, model)
}

/// Create a pipeline.
///
/// `config_json` may be null for default options; `model_path` may be null
/// for the builtin model. Returns null on failure and, when `error` is not
/// null, stores a JSON error report there (free it with `nopii_free_string`).
///
/// # Safety
///
/// `config_json` and `model_path` must be null or valid null-terminated strings.
/// `error` must be null or point to writable storage for one pointer.
#[no_mangle]
pub unsafe extern "C" fn nopii_pipeline_new(
    config_json: *const c_char,
    model_path: *const c_char,
    error: *mut *mut c_char,
) -> *mut NopiiPipeline {
    match pipeline_new_internal(config_json, model_path) {
        Ok(inner) => Box::into_raw(Box::new(NopiiPipeline { inner })),
        Err(e) => {
            if !error.is_null() {
                let json = serde_json::to_string(&e.report()).unwrap_or_else(|_| e.to_string());
                *error = CString::new(json).unwrap_or_default().into_raw();
            }
            ptr::null_mut()
        }
    }
}

/// Redact one PDF document.
///
/// # Safety
///
/// `pipeline` must come from `nopii_pipeline_new`. `data` must point to `len`
/// readable bytes. The returned result must be freed with `nopii_free_result`.
#[no_mangle]
pub unsafe extern "C" fn nopii_redact(
    pipeline: *const NopiiPipeline,
    data: *const u8,
    len: usize,
) -> NopiiResult {
    if pipeline.is_null() {
        return NopiiResult::error(Error::InvalidConfig("pipeline cannot be null".into()).report());
    }
    if data.is_null() {
        return NopiiResult::error(Error::UnknownFormat.report());
    }

    let input = std::slice::from_raw_parts(data, len);
    match (*pipeline).inner.redact(input) {
        Ok(output) => NopiiResult::success(output.pdf),
        Err(e) => {
            log::warn!("Redaction failed: {}", e.kind());
            NopiiResult::error(e.report())
        }
    }
}

/// Free a result returned by `nopii_redact`.
///
/// # Safety
///
/// The `result` must have been returned by `nopii_redact` and is freed only once.
#[no_mangle]
pub unsafe extern "C" fn nopii_free_result(result: NopiiResult) {
    if !result.data.is_null() {
        let slice = ptr::slice_from_raw_parts_mut(result.data, result.len);
        drop(Box::from_raw(slice));
    }
    if !result.error.is_null() {
        drop(CString::from_raw(result.error));
    }
}

/// Free a string allocated by nopii.
///
/// # Safety
///
/// The `ptr` must have been allocated by nopii and is freed only once.
#[no_mangle]
pub unsafe extern "C" fn nopii_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Destroy a pipeline.
///
/// # Safety
///
/// `pipeline` must be null or come from `nopii_pipeline_new`, and is freed only once.
#[no_mangle]
pub unsafe extern "C" fn nopii_pipeline_free(pipeline: *mut NopiiPipeline) {
    if !pipeline.is_null() {
        drop(Box::from_raw(pipeline));
    }
}

/// Get the version of the nopii library.
///
/// The returned string is statically allocated and should not be freed.
#[no_mangle]
pub extern "C" fn nopii_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_lifecycle_and_error_json() {
        unsafe {
            let pipeline = nopii_pipeline_new(ptr::null(), ptr::null(), ptr::null_mut());
            assert!(!pipeline.is_null());

            let input = b"definitely not a pdf";
            let result = nopii_redact(pipeline, input.as_ptr(), input.len());
            assert!(!result.success);
            assert!(result.data.is_null());
            let json = CStr::from_ptr(result.error).to_str().unwrap().to_string();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["kind"], "input");
            nopii_free_result(result);
            nopii_pipeline_free(pipeline);
        }
    }

    #[test]
    fn test_bad_config_reports_error() {
        unsafe {
            let config = CString::new("{\"redaction_margin\": -3}").unwrap();
            let mut error: *mut c_char = ptr::null_mut();
            let pipeline = nopii_pipeline_new(config.as_ptr(), ptr::null(), &mut error);
            assert!(pipeline.is_null());
            assert!(!error.is_null());
            let json = CStr::from_ptr(error).to_str().unwrap();
            assert!(json.contains("configuration"));
            nopii_free_string(error);
        }
    }

    #[test]
    fn test_version() {
        let version = unsafe { CStr::from_ptr(nopii_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }
}
