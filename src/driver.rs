use std::ffi::CString;
use std::path::Path;
use std::sync::Once;

use gdal_sys::GDALDriverH;
use libc::c_int;

use crate::cpl::CslStringList;
use crate::dataset::Dataset;
use crate::diagnostics::{CallOptions, CallScope};
use crate::errors::*;
use crate::raster::GdalType;
use crate::utils::{_path_to_c_string, _string};

static START: Once = Once::new();

pub fn _register_drivers() {
    START.call_once(|| unsafe { gdal_sys::GDALAllRegister() });
}

/// A GDAL format driver. Drivers live as long as the process.
#[derive(Debug, Clone, Copy)]
pub struct Driver {
    c_driver: GDALDriverH,
}

impl Driver {
    /// Fetch a driver by its short name, e.g. `"GTiff"` or `"MEM"`.
    pub fn get_by_name(name: &str) -> Result<Driver> {
        _register_drivers();
        let c_name = CString::new(name)?;
        let c_driver = unsafe { gdal_sys::GDALGetDriverByName(c_name.as_ptr()) };
        if c_driver.is_null() {
            return Err(GdalError::BadArgument(format!("unknown driver '{name}'")));
        }
        Ok(Driver { c_driver })
    }

    /// # Safety
    /// `c_driver` must be a valid driver handle.
    pub unsafe fn from_c_driver(c_driver: GDALDriverH) -> Driver {
        Driver { c_driver }
    }

    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_driver(&self) -> GDALDriverH {
        self.c_driver
    }

    pub fn short_name(&self) -> String {
        _string(unsafe { gdal_sys::GDALGetDriverShortName(self.c_driver) })
    }

    pub fn long_name(&self) -> String {
        _string(unsafe { gdal_sys::GDALGetDriverLongName(self.c_driver) })
    }

    /// Create a dataset of `u8` bands.
    pub fn create<P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
    ) -> Result<Dataset> {
        self.create_with_band_type::<u8, _>(filename, size_x, size_y, bands)
    }

    pub fn create_with_band_type<T: GdalType, P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
    ) -> Result<Dataset> {
        self.create_with_band_type_with_options::<T, _>(
            filename,
            size_x,
            size_y,
            bands,
            &[],
            &CallOptions::default(),
        )
    }

    /// Create a dataset, passing `KEY=VALUE` creation options to the driver.
    pub fn create_with_band_type_with_options<T: GdalType, P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
        options: &[&str],
        call: &CallOptions<'_>,
    ) -> Result<Dataset> {
        let options_c = CslStringList::from_name_values(options)?;
        let c_filename = _path_to_c_string(filename)?;

        let scope = CallScope::enter(call)?;
        let c_dataset = unsafe {
            gdal_sys::GDALCreate(
                self.c_driver,
                c_filename.as_ptr(),
                size_x as c_int,
                size_y as c_int,
                bands as c_int,
                T::gdal_type(),
                options_c.as_ptr(),
            )
        };
        match scope.check_ptr(c_dataset, "GDALCreate") {
            Ok(c_dataset) => Ok(unsafe { Dataset::from_c_dataset(c_dataset) }),
            Err((created, err)) => {
                if let Some(c_dataset) = created {
                    // closing releases the half-configured dataset
                    drop(unsafe { Dataset::from_c_dataset(c_dataset) });
                }
                Err(err)
            }
        }
    }

    /// Create a dataset without raster bands, for vector layers.
    pub fn create_vector_only<P: AsRef<Path>>(&self, filename: P) -> Result<Dataset> {
        self.create_with_band_type::<u8, _>(filename, 0, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_names() {
        let driver = Driver::get_by_name("GTiff").unwrap();
        assert_eq!(driver.short_name(), "GTiff");
        assert_eq!(driver.long_name(), "GeoTIFF");
    }

    #[test]
    fn test_unknown_driver() {
        assert!(matches!(
            Driver::get_by_name("NotADriver"),
            Err(GdalError::BadArgument(_))
        ));
    }

    #[test]
    fn test_create_with_bad_option() {
        let driver = Driver::get_by_name("MEM").unwrap();
        assert!(driver
            .create_with_band_type_with_options::<u8, _>(
                "",
                4,
                4,
                1,
                &["NOT AN OPTION"],
                &CallOptions::default()
            )
            .is_err());
    }
}
