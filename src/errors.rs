use std::ffi::NulError;
use std::fmt;

use gdal_sys::{CPLErr, OGRErr};
use libc::c_int;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GdalError>;

/// `CPLE_AppDefined`
pub const CPLE_APP_DEFINED: c_int = 1;
/// `CPLE_FileIO`
pub const CPLE_FILE_IO: c_int = 3;
/// `CPLE_OpenFailed`
pub const CPLE_OPEN_FAILED: c_int = 4;
/// `CPLE_IllegalArg`
pub const CPLE_ILLEGAL_ARG: c_int = 5;
/// `CPLE_NotSupported`
pub const CPLE_NOT_SUPPORTED: c_int = 6;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum GdalError {
    #[error("{msg}")]
    CplError {
        class: CplErrType,
        number: c_int,
        msg: String,
    },
    #[error("GDAL method '{method_name}' returned a NULL pointer. Error msg: '{msg}'")]
    NullPointer {
        method_name: &'static str,
        msg: String,
    },
    #[error("OGR method '{method_name}' returned error: '{err:?}'")]
    OgrError {
        err: OGRErr::Type,
        method_name: &'static str,
    },
    #[error("Bad argument: {0}")]
    BadArgument(String),
    #[error("FFI NUL error: {0}")]
    FfiNulError(#[from] NulError),
    #[error("Unable to unlink mem file: {file_name}")]
    UnlinkMemFile { file_name: String },
    #[error("'{method_name}' called on a closed dataset")]
    DatasetClosed { method_name: &'static str },
    #[error("close called more than once")]
    AlreadyClosed,
    #[error("file already closed")]
    FileClosed,
    #[error("resampling algorithm '{alg}' is not supported for {operation}")]
    UnsupportedResampling {
        alg: &'static str,
        operation: &'static str,
    },
    #[error("{}", unknown_failure_message(.method_name, .code))]
    UnknownFailure {
        method_name: &'static str,
        code: Option<c_int>,
    },
    #[error("handler already registered on prefix {0}")]
    DuplicatePrefix(String),
    #[error("{}", MultipleDisplay(.0))]
    Multiple(Vec<GdalError>),
}

fn unknown_failure_message(method_name: &str, code: &Option<c_int>) -> String {
    match code {
        Some(code) => format!("unknown cpl error {code} in {method_name}"),
        None => format!("unknown error in {method_name}"),
    }
}

struct MultipleDisplay<'a>(&'a [GdalError]);

impl fmt::Display for MultipleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl GdalError {
    /// Combines captured errors in emission order.
    ///
    /// Returns `None` for an empty list and the error itself for a single one.
    /// Nested combined errors are flattened.
    pub fn combine(errors: Vec<GdalError>) -> Option<GdalError> {
        let mut flat = Vec::with_capacity(errors.len());
        for err in errors {
            match err {
                GdalError::Multiple(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(GdalError::Multiple(flat)),
        }
    }

    /// Iterates the constituents of a combined error, or yields `self` once.
    pub fn errors(&self) -> impl Iterator<Item = &GdalError> {
        match self {
            GdalError::Multiple(errs) => errs.iter(),
            other => std::slice::from_ref(other).iter(),
        }
    }

    /// Returns the CPL error number of the first constituent that has one.
    pub fn cpl_error_number(&self) -> Option<c_int> {
        self.errors().find_map(|e| match e {
            GdalError::CplError { number, .. } => Some(*number),
            GdalError::UnknownFailure { code, .. } => *code,
            _ => None,
        })
    }

    /// Whether a file open failed because the file does not exist.
    ///
    /// A generic I/O failure reported during the same call takes precedence.
    pub fn is_not_found(&self) -> bool {
        if self.is_io_error() {
            return false;
        }
        self.errors().any(|e| {
            matches!(e, GdalError::CplError { number, msg, .. }
                if *number == CPLE_OPEN_FAILED
                    && (msg.ends_with("No such file or directory")
                        || msg.contains("does not exist in the file system")))
        })
    }

    /// Whether some constituent is a `CPLE_FileIO` error.
    pub fn is_io_error(&self) -> bool {
        self.errors()
            .any(|e| matches!(e, GdalError::CplError { number, .. } if *number == CPLE_FILE_IO))
    }
}

/// A wrapper for [`CPLErr::Type`] that reflects it as an enum
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(C)]
pub enum CplErrType {
    None = 0,
    Debug = 1,
    Warning = 2,
    Failure = 3,
    Fatal = 4,
}

impl From<CPLErr::Type> for CplErrType {
    fn from(error_type: CPLErr::Type) -> Self {
        if error_type > 4 {
            return Self::None;
        }

        unsafe { std::mem::transmute(error_type) }
    }
}

impl CplErrType {
    pub fn to_gdal(self) -> CPLErr::Type {
        self as CPLErr::Type
    }
}
