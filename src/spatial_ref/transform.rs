use std::ptr::null_mut;

use gdal_sys::{CPLErr, OGRCoordinateTransformationH};
use libc::c_int;

use crate::diagnostics::{CallOptions, CallScope};
use crate::errors::*;
use crate::spatial_ref::SpatialRef;

#[derive(Debug)]
/// Defines a coordinate transformation from one [`SpatialRef`] to another.
pub struct CoordTransform {
    inner: OGRCoordinateTransformationH,
}

impl Drop for CoordTransform {
    fn drop(&mut self) {
        unsafe { gdal_sys::OCTDestroyCoordinateTransformation(self.inner) };
    }
}

impl CoordTransform {
    /// Constructs a new transformation from `source` to `target`.
    pub fn new(source: &SpatialRef, target: &SpatialRef) -> Result<CoordTransform> {
        let scope = CallScope::enter(&CallOptions::default())?;
        let c_obj = unsafe {
            gdal_sys::OCTNewCoordinateTransformation(source.to_c_hsrs(), target.to_c_hsrs())
        };
        match scope.check_ptr(c_obj, "OCTNewCoordinateTransformation") {
            Ok(inner) => Ok(CoordTransform { inner }),
            Err((created, err)) => {
                if let Some(c_obj) = created {
                    unsafe { gdal_sys::OCTDestroyCoordinateTransformation(c_obj) };
                }
                Err(err)
            }
        }
    }

    /// Transform coordinates in place.
    ///
    /// # Arguments
    /// * `x` - slice of x coordinates
    /// * `y` - slice of y coordinates (must match x in length)
    /// * `z` - slice of z coordinates, or an empty slice to ignore
    pub fn transform_coords(&self, x: &mut [f64], y: &mut [f64], z: &mut [f64]) -> Result<()> {
        let nb_coords = x.len();
        assert_eq!(
            nb_coords,
            y.len(),
            "transform coordinate slices have different lengths: {} != {}",
            nb_coords,
            y.len()
        );
        let z_ptr = if z.is_empty() {
            null_mut()
        } else {
            assert_eq!(
                nb_coords,
                z.len(),
                "transform coordinate slices have different lengths: {} != {}",
                nb_coords,
                z.len()
            );
            z.as_mut_ptr()
        };

        let scope = CallScope::enter(&CallOptions::default())?;
        let ok = unsafe {
            gdal_sys::OCTTransform(
                self.inner,
                nb_coords as c_int,
                x.as_mut_ptr(),
                y.as_mut_ptr(),
                z_ptr,
            )
        } == 1;
        let rv = if ok {
            CPLErr::CE_None
        } else {
            CPLErr::CE_Failure
        };
        scope.check(rv, "OCTTransform")
    }

    /// Returns a C pointer to the allocated [`gdal_sys::OGRCoordinateTransformationH`] memory.
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn to_c_hct(&self) -> OGRCoordinateTransformationH {
        self.inner
    }
}
