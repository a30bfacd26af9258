use std::ffi::{CStr, CString};
use std::path::Path;

use libc::c_char;

use crate::errors::{GdalError, Result};

pub fn _string(raw_ptr: *const c_char) -> String {
    if raw_ptr.is_null() {
        return String::new();
    }
    let c_str = unsafe { CStr::from_ptr(raw_ptr) };
    c_str.to_string_lossy().into_owned()
}

pub fn _string_array(raw_ptr: *mut *mut c_char) -> Vec<String> {
    let mut ret_val = Vec::new();
    if raw_ptr.is_null() {
        return ret_val;
    }
    let mut i = 0;
    loop {
        let next = unsafe { raw_ptr.add(i).read() };
        if next.is_null() {
            break;
        }
        ret_val.push(_string(next));
        i += 1;
    }
    ret_val
}

/// Builds an error from the thread's last CPL error, for calls made outside a capture scope.
pub fn _last_null_pointer_err(method_name: &'static str) -> GdalError {
    let last_err_msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() });
    unsafe { gdal_sys::CPLErrorReset() };
    GdalError::NullPointer {
        method_name,
        msg: last_err_msg,
    }
}

pub fn _path_to_c_string<P: AsRef<Path>>(path: P) -> Result<CString> {
    let path_str = path.as_ref().to_string_lossy();
    CString::new(path_str.as_ref()).map_err(Into::into)
}

/// Null-terminated array of C strings borrowed by a single GDAL call.
///
/// Unlike a `CslStringList`, an empty array is still a valid, non-null list.
pub(crate) struct CStringArray {
    _strings: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl CStringArray {
    pub(crate) fn new(values: &[&str]) -> Result<Self> {
        let strings = values
            .iter()
            .map(|s| CString::new(*s))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut ptrs: Vec<*const c_char> = strings.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(std::ptr::null());
        Ok(CStringArray {
            _strings: strings,
            ptrs,
        })
    }

    pub(crate) fn as_ptr(&self) -> *const *const c_char {
        self.ptrs.as_ptr()
    }
}

/// `NULL` for `None`, the array otherwise.
pub(crate) fn _opt_c_string_array(values: Option<&[&str]>) -> Result<Option<CStringArray>> {
    values.map(CStringArray::new).transpose()
}

pub(crate) fn _opt_array_ptr(array: &Option<CStringArray>) -> *const *const c_char {
    array.as_ref().map_or(std::ptr::null(), CStringArray::as_ptr)
}
