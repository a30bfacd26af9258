use std::ffi::c_uint;

use bitflags::bitflags;
use gdal_sys::GDALAccess;

use crate::diagnostics::CallOptions;

/// Open options for [`crate::Dataset`]
#[derive(Debug)]
pub struct DatasetOptions<'a> {
    pub open_flags: GdalOpenFlags,
    pub allowed_drivers: Option<&'a [&'a str]>,
    /// `KEY=VALUE` driver open options.
    pub open_options: Option<&'a [&'a str]>,
    /// Files next to the dataset; `Some(&[])` disables sidecar probing.
    pub sibling_files: Option<&'a [&'a str]>,
    pub call: CallOptions<'a>,
}

impl Default for DatasetOptions<'_> {
    fn default() -> Self {
        DatasetOptions {
            open_flags: GdalOpenFlags::default(),
            allowed_drivers: None,
            open_options: None,
            sibling_files: None,
            call: CallOptions::default(),
        }
    }
}

bitflags! {
    /// Extended open flags, the `nOpenFlags` argument of `GDALOpenEx`.
    ///
    /// `GDAL_OF_SHARED` is not part of this set since shared handles are not `Send`,
    /// use [`Dataset::open_shared`](crate::Dataset::open_shared) instead.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GdalOpenFlags: c_uint {
        /// Open in read-only mode.
        const GDAL_OF_READONLY = 0x00;
        /// Open in update mode.
        const GDAL_OF_UPDATE = 0x01;
        /// Allow raster drivers to be used.
        const GDAL_OF_RASTER = 0x02;
        /// Allow vector drivers to be used.
        const GDAL_OF_VECTOR = 0x04;
        /// Allow multidimensional raster drivers to be used.
        const GDAL_OF_MULTIDIM_RASTER = 0x10;
        /// Emit error message in case of failed open.
        const GDAL_OF_VERBOSE_ERROR = 0x40;
        /// Open as internal dataset, not registered in the list of open datasets.
        const GDAL_OF_INTERNAL = 0x80;
    }
}

/// `GDAL_OF_SHARED`
pub(crate) const GDAL_OF_SHARED: c_uint = 0x20;

impl Default for GdalOpenFlags {
    /// Read-only, with a diagnostic explaining why an open failed.
    fn default() -> GdalOpenFlags {
        GdalOpenFlags::GDAL_OF_READONLY | GdalOpenFlags::GDAL_OF_VERBOSE_ERROR
    }
}

impl From<GDALAccess::Type> for GdalOpenFlags {
    fn from(val: GDALAccess::Type) -> GdalOpenFlags {
        let access = if val == GDALAccess::GA_Update {
            GdalOpenFlags::GDAL_OF_UPDATE
        } else {
            GdalOpenFlags::GDAL_OF_READONLY
        };
        access | GdalOpenFlags::GDAL_OF_VERBOSE_ERROR
    }
}
