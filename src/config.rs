//! GDAL configuration options.
//!
//! Options can be set process-wide, per thread, or for the duration of a single
//! call through [`CallOptions::config`](crate::diagnostics::CallOptions).
//!
//! ```
//! use gdal_io::config::*;
//!
//! set_config_option("GDAL_CACHEMAX", "1024").unwrap();
//! assert_eq!(get_config_option("GDAL_CACHEMAX", "").unwrap(), "1024");
//! clear_config_option("GDAL_CACHEMAX").unwrap();
//! ```

use std::ffi::CString;
use std::ptr;

use crate::errors::Result;
use crate::utils::_string;

pub fn set_config_option(key: &str, value: &str) -> Result<()> {
    let c_key = CString::new(key)?;
    let c_val = CString::new(value)?;
    unsafe { gdal_sys::CPLSetConfigOption(c_key.as_ptr(), c_val.as_ptr()) };
    Ok(())
}

/// Returns `default` when `key` is unset.
pub fn get_config_option(key: &str, default: &str) -> Result<String> {
    let c_key = CString::new(key)?;
    let c_default = CString::new(default)?;
    let rv = unsafe { gdal_sys::CPLGetConfigOption(c_key.as_ptr(), c_default.as_ptr()) };
    Ok(_string(rv))
}

pub fn clear_config_option(key: &str) -> Result<()> {
    let c_key = CString::new(key)?;
    unsafe { gdal_sys::CPLSetConfigOption(c_key.as_ptr(), ptr::null()) };
    Ok(())
}

/// Set a configuration option visible to the calling thread only.
///
/// Thread-local options shadow the process-wide value of the same key.
pub fn set_thread_local_config_option(key: &str, value: &str) -> Result<()> {
    let c_key = CString::new(key)?;
    let c_val = CString::new(value)?;
    unsafe { gdal_sys::CPLSetThreadLocalConfigOption(c_key.as_ptr(), c_val.as_ptr()) };
    Ok(())
}

pub fn get_thread_local_config_option(key: &str, default: &str) -> Result<String> {
    let c_key = CString::new(key)?;
    let c_default = CString::new(default)?;
    let rv = unsafe { gdal_sys::CPLGetThreadLocalConfigOption(c_key.as_ptr(), c_default.as_ptr()) };
    Ok(_string(rv))
}

pub fn clear_thread_local_config_option(key: &str) -> Result<()> {
    let c_key = CString::new(key)?;
    unsafe { gdal_sys::CPLSetThreadLocalConfigOption(c_key.as_ptr(), ptr::null()) };
    Ok(())
}

/// Thread-local options applied for the lifetime of the value.
///
/// Previous thread-local values are put back on drop, in reverse order so that a
/// key listed twice ends up with its original value.
pub(crate) struct ScopedConfig {
    previous: Vec<(CString, Option<CString>)>,
}

impl ScopedConfig {
    pub(crate) fn apply(options: &[(&str, &str)]) -> Result<Self> {
        let mut scoped = ScopedConfig {
            previous: Vec::with_capacity(options.len()),
        };
        for (key, value) in options {
            let c_key = CString::new(*key)?;
            let c_val = CString::new(*value)?;
            let old = unsafe { gdal_sys::CPLGetThreadLocalConfigOption(c_key.as_ptr(), ptr::null()) };
            let old = if old.is_null() {
                None
            } else {
                Some(CString::new(_string(old))?)
            };
            unsafe { gdal_sys::CPLSetThreadLocalConfigOption(c_key.as_ptr(), c_val.as_ptr()) };
            // pushed after the set so that a failed key leaves nothing to undo
            scoped.previous.push((c_key, old));
        }
        Ok(scoped)
    }
}

impl Drop for ScopedConfig {
    fn drop(&mut self) {
        for (key, old) in self.previous.drain(..).rev() {
            let value = old.as_ref().map_or(ptr::null(), |v| v.as_ptr());
            unsafe { gdal_sys::CPLSetThreadLocalConfigOption(key.as_ptr(), value) };
        }
    }
}
