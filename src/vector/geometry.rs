use std::ffi::CString;
use std::fmt::{self, Debug, Formatter};
use std::ptr;

use gdal_sys::{OGRErr, OGRGeometryH, OGRwkbGeometryType};
use libc::{c_char, c_int, c_void};

use crate::diagnostics::{CallOptions, CallScope};
use crate::errors::*;
use crate::utils::_string;

/// OGR Geometry, owned by the wrapper and destroyed on drop.
pub struct Geometry {
    c_geometry: OGRGeometryH,
}

impl Geometry {
    /// Takes ownership of `c_geometry`.
    ///
    /// # Safety
    /// `c_geometry` must be a valid geometry not owned by anything else.
    pub unsafe fn from_c_geometry(c_geometry: OGRGeometryH) -> Geometry {
        Geometry { c_geometry }
    }

    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_geometry(&self) -> OGRGeometryH {
        self.c_geometry
    }

    /// Create a geometry by parsing a
    /// [WKT](https://en.wikipedia.org/wiki/Well-known_text_representation_of_geometry) string.
    pub fn from_wkt(wkt: &str) -> Result<Geometry> {
        let c_wkt = CString::new(wkt)?;
        // OGR_G_CreateFromWkt advances the pointer it is given
        let mut c_wkt_ptr: *mut c_char = c_wkt.as_ptr() as *mut c_char;
        let mut c_geom: OGRGeometryH = ptr::null_mut();

        let scope = CallScope::enter(&CallOptions::default())?;
        let rv = unsafe { gdal_sys::OGR_G_CreateFromWkt(&mut c_wkt_ptr, ptr::null_mut(), &mut c_geom) };
        scope.finish()?;
        if rv != OGRErr::OGRERR_NONE {
            return Err(GdalError::OgrError {
                err: rv,
                method_name: "OGR_G_CreateFromWkt",
            });
        }
        Ok(unsafe { Geometry::from_c_geometry(c_geom) })
    }

    /// Serialize the geometry as WKT.
    pub fn wkt(&self) -> Result<String> {
        let mut c_wkt = ptr::null_mut();
        let rv = unsafe { gdal_sys::OGR_G_ExportToWkt(self.c_geometry, &mut c_wkt) };
        if rv != OGRErr::OGRERR_NONE {
            return Err(GdalError::OgrError {
                err: rv,
                method_name: "OGR_G_ExportToWkt",
            });
        }
        let wkt = _string(c_wkt);
        unsafe { gdal_sys::VSIFree(c_wkt as *mut c_void) };
        Ok(wkt)
    }

    pub fn geometry_type(&self) -> OGRwkbGeometryType::Type {
        unsafe { gdal_sys::OGR_G_GetGeometryType(self.c_geometry) }
    }

    /// Area of a surface or multi-surface, 0 for other geometries.
    pub fn area(&self) -> f64 {
        unsafe { gdal_sys::OGR_G_Area(self.c_geometry) }
    }

    /// Compute the buffer of the geometry, approximating quarter circles with
    /// `n_quad_segs` segments.
    pub fn buffer(&self, distance: f64, n_quad_segs: u32) -> Result<Geometry> {
        let scope = CallScope::enter(&CallOptions::default())?;
        let c_geom =
            unsafe { gdal_sys::OGR_G_Buffer(self.c_geometry, distance, n_quad_segs as c_int) };
        match scope.check_ptr(c_geom, "OGR_G_Buffer") {
            Ok(c_geom) => Ok(unsafe { Geometry::from_c_geometry(c_geom) }),
            Err((buffered, err)) => {
                if let Some(c_geom) = buffered {
                    unsafe { gdal_sys::OGR_G_DestroyGeometry(c_geom) };
                }
                Err(err)
            }
        }
    }
}

impl Drop for Geometry {
    fn drop(&mut self) {
        unsafe { gdal_sys::OGR_G_DestroyGeometry(self.c_geometry) };
    }
}

impl Clone for Geometry {
    fn clone(&self) -> Geometry {
        Geometry {
            c_geometry: unsafe { gdal_sys::OGR_G_Clone(self.c_geometry) },
        }
    }
}

impl Debug for Geometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.wkt() {
            Ok(wkt) => f.write_str(wkt.as_str()),
            Err(_) => Err(fmt::Error),
        }
    }
}
