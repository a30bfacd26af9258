use std::ffi::CString;
use std::ptr;

use gdal_sys::{OGRErr, OGRSpatialReferenceH, OSRAxisMappingStrategy};
use libc::{c_char, c_int, c_void};

use crate::diagnostics::{CallOptions, CallScope};
use crate::errors::*;
use crate::utils::{_last_null_pointer_err, _string};

/// A OpenGIS Spatial Reference System definition.
///
/// Owned: released with `OSRRelease` on drop. Axes use the traditional GIS
/// order, longitude or easting first.
#[derive(Debug)]
pub struct SpatialRef(OGRSpatialReferenceH);

impl Drop for SpatialRef {
    fn drop(&mut self) {
        unsafe { gdal_sys::OSRRelease(self.0) };
        self.0 = ptr::null_mut();
    }
}

impl Clone for SpatialRef {
    fn clone(&self) -> SpatialRef {
        let n_obj = unsafe { gdal_sys::OSRClone(self.0) };
        SpatialRef(n_obj)
    }
}

impl PartialEq for SpatialRef {
    fn eq(&self, other: &SpatialRef) -> bool {
        unsafe { gdal_sys::OSRIsSame(self.0, other.0) == 1 }
    }
}

impl SpatialRef {
    fn empty() -> Result<SpatialRef> {
        let c_obj = unsafe { gdal_sys::OSRNewSpatialReference(ptr::null()) };
        if c_obj.is_null() {
            return Err(_last_null_pointer_err("OSRNewSpatialReference"));
        }
        unsafe {
            gdal_sys::OSRSetAxisMappingStrategy(
                c_obj,
                OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER,
            )
        };
        Ok(SpatialRef(c_obj))
    }

    fn import(
        self,
        method_name: &'static str,
        f: impl FnOnce(OGRSpatialReferenceH) -> OGRErr::Type,
    ) -> Result<SpatialRef> {
        let scope = CallScope::enter(&CallOptions::default())?;
        let rv = f(self.0);
        if rv != OGRErr::OGRERR_NONE {
            // prefer the native diagnostic when there is one
            scope.finish()?;
            return Err(GdalError::OgrError {
                err: rv,
                method_name,
            });
        }
        scope.finish()?;
        Ok(self)
    }

    pub fn from_epsg(epsg_code: u32) -> Result<SpatialRef> {
        Self::empty()?.import("OSRImportFromEPSG", |c_obj| unsafe {
            gdal_sys::OSRImportFromEPSG(c_obj, epsg_code as c_int)
        })
    }

    pub fn from_wkt(wkt: &str) -> Result<SpatialRef> {
        let c_str = CString::new(wkt)?;
        Self::empty()?.import("OSRImportFromWkt", |c_obj| {
            let mut c_ptr = c_str.as_ptr() as *mut c_char;
            unsafe { gdal_sys::OSRImportFromWkt(c_obj, &mut c_ptr) }
        })
    }

    pub fn to_wkt(&self) -> Result<String> {
        let mut c_wkt = ptr::null_mut();
        let rv = unsafe { gdal_sys::OSRExportToWkt(self.0, &mut c_wkt) };
        let res = if rv != OGRErr::OGRERR_NONE {
            Err(GdalError::OgrError {
                err: rv,
                method_name: "OSRExportToWkt",
            })
        } else {
            Ok(_string(c_wkt))
        };
        unsafe { gdal_sys::VSIFree(c_wkt as *mut c_void) };
        res
    }

    /// Returns a C pointer to the allocated [`gdal_sys::OGRSpatialReferenceH`] memory.
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn to_c_hsrs(&self) -> OGRSpatialReferenceH {
        self.0
    }

    /// The authority code, like `EPSG:4326`, if the definition has one.
    pub fn authority(&self) -> Option<String> {
        let c_name = unsafe { gdal_sys::OSRGetAuthorityName(self.0, ptr::null()) };
        let c_code = unsafe { gdal_sys::OSRGetAuthorityCode(self.0, ptr::null()) };
        if c_name.is_null() || c_code.is_null() {
            return None;
        }
        Some(format!("{}:{}", _string(c_name), _string(c_code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_epsg_to_wkt() {
        let srs = SpatialRef::from_epsg(4326).unwrap();
        let wkt = srs.to_wkt().unwrap();
        assert!(wkt.starts_with("GEOGCS[\"WGS 84\""), "{wkt}");
        assert_eq!(srs.authority().as_deref(), Some("EPSG:4326"));

        let reparsed = SpatialRef::from_wkt(&wkt).unwrap();
        assert_eq!(srs, reparsed);
        assert_eq!(srs.clone(), srs);
        assert_ne!(srs, SpatialRef::from_epsg(3857).unwrap());
    }

    #[test]
    fn invalid_definitions() {
        assert!(SpatialRef::from_epsg(0).is_err());
        assert!(SpatialRef::from_wkt("SOMETHING[\"not wkt\"]").is_err());
        assert!(SpatialRef::from_wkt("GEOGCS[\"x\"\0]").is_err());
    }
}
