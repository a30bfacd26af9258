//! Owned GDAL string lists.

use std::ffi::CString;
use std::fmt::{Debug, Formatter};
use std::ptr;

use gdal_sys::{CSLAddString, CSLCount, CSLDestroy, CSLFetchNameValue, CSLSetNameValue};
use libc::c_char;

use crate::errors::{GdalError, Result};
use crate::utils::{_string, _string_array};

/// Wraps a `char **papszStrList`, the null-terminated array of strings GDAL uses to
/// pass `KEY=VALUE` options and command line switches.
pub struct CslStringList {
    list_ptr: *mut *mut c_char,
}

impl CslStringList {
    pub fn new() -> Self {
        Self {
            list_ptr: ptr::null_mut(),
        }
    }

    /// Assigns `value` to `name`, replacing a previous value.
    ///
    /// `name` must be alphanumeric (underscores allowed) and `value` must not contain
    /// line breaks.
    pub fn set_name_value(&mut self, name: &str, value: &str) -> Result<()> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(GdalError::BadArgument(format!(
                "Invalid characters in name: '{name}'"
            )));
        }
        if value.contains(['\n', '\r']) {
            return Err(GdalError::BadArgument(format!(
                "Invalid characters in value: '{value}'"
            )));
        }
        let psz_name = CString::new(name)?;
        let psz_value = CString::new(value)?;
        self.list_ptr =
            unsafe { CSLSetNameValue(self.list_ptr, psz_name.as_ptr(), psz_value.as_ptr()) };
        Ok(())
    }

    /// Appends a raw entry, such as a command line switch.
    pub fn add_string(&mut self, value: &str) -> Result<()> {
        let psz_value = CString::new(value)?;
        self.list_ptr = unsafe { CSLAddString(self.list_ptr, psz_value.as_ptr()) };
        Ok(())
    }

    pub fn fetch_name_value(&self, key: &str) -> Result<Option<String>> {
        let key = CString::new(key)?;
        let c_value = unsafe { CSLFetchNameValue(self.list_ptr, key.as_ptr()) };
        Ok((!c_value.is_null()).then(|| _string(c_value)))
    }

    pub fn len(&self) -> usize {
        (unsafe { CSLCount(self.list_ptr) }) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.list_ptr.is_null() || self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<String> {
        _string_array(self.list_ptr)
    }

    /// The list as passed to GDAL, `NULL` when empty.
    pub fn as_ptr(&self) -> *mut *mut c_char {
        self.list_ptr
    }

    /// Parses `KEY=VALUE` entries.
    pub fn from_name_values(entries: &[&str]) -> Result<Self> {
        let mut list = CslStringList::new();
        for entry in entries {
            match entry.split_once('=') {
                Some((name, value)) => list.set_name_value(name, value)?,
                None => {
                    return Err(GdalError::BadArgument(format!(
                        "expected KEY=VALUE, got '{entry}'"
                    )))
                }
            }
        }
        Ok(list)
    }

    /// Copies entries verbatim.
    pub fn from_strings(entries: &[&str]) -> Result<Self> {
        let mut list = CslStringList::new();
        for entry in entries {
            list.add_string(entry)?;
        }
        Ok(list)
    }
}

impl Drop for CslStringList {
    fn drop(&mut self) {
        unsafe { CSLDestroy(self.list_ptr) }
    }
}

impl Default for CslStringList {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for CslStringList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}
