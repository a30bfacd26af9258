use std::cell::Cell;
use std::ffi::CString;
use std::marker::PhantomData;
use std::ops::Deref;
use std::path::Path;
use std::ptr;

use gdal_sys::{GDALDatasetH, GDALRWFlag};
use libc::{c_double, c_int, c_uint};

use crate::cpl::CslStringList;
use crate::diagnostics::{CallOptions, CallScope};
use crate::driver::{_register_drivers, Driver};
use crate::errors::*;
use crate::options::{DatasetOptions, GDAL_OF_SHARED};
use crate::raster::io::{self, IoOptions, IoTarget};
use crate::raster::{
    GdalMaskFlags, GdalType, GdalTypeDescriptor, RasterBand, RawBuffer, ResampleAlg,
};
use crate::utils::{_opt_array_ptr, _opt_c_string_array, _path_to_c_string, _string};

pub type GeoTransform = [c_double; 6];

/// An open GDAL dataset.
///
/// The dataset owns its native handle. Bands, masks, overviews and layers fetched
/// from it borrow the dataset and check that it is still open before every call,
/// so closing the dataset early with [`Dataset::close`] turns them into errors
/// instead of dangling handles.
#[derive(Debug)]
pub struct Dataset {
    c_dataset: Cell<GDALDatasetH>,
}

// GDAL Docs state: The returned dataset should only be accessed by one thread at a time.
// See: https://gdal.org/api/raster_c_api.html#_CPPv48GDALOpenPKc10GDALAccess
unsafe impl Send for Dataset {}

/// Summary of a dataset's raster geometry, taken from its first band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetStructure {
    pub size: (usize, usize),
    pub block_size: (usize, usize),
    pub band_count: usize,
    pub data_type: Option<GdalTypeDescriptor>,
}

/// Options for [`Dataset::build_overviews`].
#[derive(Debug, Clone, Copy)]
pub struct OverviewOptions<'a> {
    /// Defaults to [`ResampleAlg::Average`].
    pub resampling: ResampleAlg,
    /// Decimation factors; computed when `None`.
    pub levels: Option<&'a [usize]>,
    /// Automatic levels stop once both dimensions are at most this size.
    /// Defaults to the largest block dimension of the first band.
    pub min_size: Option<usize>,
    /// 1-based band subset, all bands when `None`.
    pub bands: Option<&'a [usize]>,
    pub call: CallOptions<'a>,
}

impl Default for OverviewOptions<'_> {
    fn default() -> Self {
        OverviewOptions {
            resampling: ResampleAlg::Average,
            levels: None,
            min_size: None,
            bands: None,
            call: CallOptions::default(),
        }
    }
}

/// Decimation factors 2, 4, 8, ... until the raster fits in `min_size`.
fn auto_overview_levels(size: (usize, usize), min_size: usize) -> Vec<usize> {
    let mut levels = Vec::new();
    let (mut sx, mut sy) = size;
    let mut level = 1;
    while sx > min_size || sy > min_size {
        level *= 2;
        levels.push(level);
        sx /= 2;
        sy /= 2;
    }
    levels
}

impl Dataset {
    /// Wraps an owned handle; it is closed when the `Dataset` is.
    ///
    /// # Safety
    /// `c_dataset` must be a valid handle not owned by anything else.
    pub unsafe fn from_c_dataset(c_dataset: GDALDatasetH) -> Dataset {
        Dataset {
            c_dataset: Cell::new(c_dataset),
        }
    }

    /// Returns the wrapped C pointer, `NULL` once closed.
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_dataset(&self) -> GDALDatasetH {
        self.c_dataset.get()
    }

    /// The native handle, or an error once the dataset is closed.
    pub(crate) fn handle(&self, method_name: &'static str) -> Result<GDALDatasetH> {
        let c_dataset = self.c_dataset.get();
        if c_dataset.is_null() {
            return Err(GdalError::DatasetClosed { method_name });
        }
        Ok(c_dataset)
    }

    pub fn is_open(&self) -> bool {
        !self.c_dataset.get().is_null()
    }

    /// Open a dataset read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Dataset> {
        Self::open_ex(path, DatasetOptions::default())
    }

    /// Open a dataset with explicit flags, drivers and open options.
    pub fn open_ex<P: AsRef<Path>>(path: P, options: DatasetOptions) -> Result<Dataset> {
        let c_dataset = Self::_open(path.as_ref(), &options, 0)?;
        Ok(unsafe { Dataset::from_c_dataset(c_dataset) })
    }

    /// Open a dataset in shared mode.
    ///
    /// Opening the same path again from the same thread returns another reference
    /// to the same native dataset. Closing one reference leaves the others usable;
    /// the native dataset is released with the last one.
    pub fn open_shared<P: AsRef<Path>>(path: P, options: DatasetOptions) -> Result<SharedDataset> {
        let c_dataset = Self::_open(path.as_ref(), &options, GDAL_OF_SHARED)?;
        Ok(SharedDataset {
            inner: unsafe { Dataset::from_c_dataset(c_dataset) },
            _not_send: PhantomData,
        })
    }

    fn _open(path: &Path, options: &DatasetOptions, extra_flags: c_uint) -> Result<GDALDatasetH> {
        _register_drivers();
        let c_filename = _path_to_c_string(path)?;
        let c_drivers = _opt_c_string_array(options.allowed_drivers)?;
        let c_open_options = _opt_c_string_array(options.open_options)?;
        let c_siblings = _opt_c_string_array(options.sibling_files)?;
        let flags = options.open_flags.bits() | extra_flags;

        let scope = CallScope::enter(&options.call)?;
        let c_dataset = unsafe {
            gdal_sys::GDALOpenEx(
                c_filename.as_ptr(),
                flags,
                _opt_array_ptr(&c_drivers),
                _opt_array_ptr(&c_open_options),
                _opt_array_ptr(&c_siblings),
            )
        };
        scope
            .check_ptr(c_dataset, "GDALOpenEx")
            .map_err(|(opened, err)| {
                if let Some(c_dataset) = opened {
                    unsafe { gdal_sys::GDALClose(c_dataset) };
                }
                err
            })
    }

    /// Close the dataset, reporting errors raised while flushing it.
    ///
    /// A second call returns [`GdalError::AlreadyClosed`]. Bands and layers fetched
    /// before the close fail with [`GdalError::DatasetClosed`] from then on.
    pub fn close(&self) -> Result<()> {
        self.close_ex(&CallOptions::default())
    }

    pub fn close_ex(&self, call: &CallOptions<'_>) -> Result<()> {
        if !self.is_open() {
            return Err(GdalError::AlreadyClosed);
        }
        let scope = CallScope::enter(call)?;
        let c_dataset = self.c_dataset.replace(ptr::null_mut());
        close_handle(scope, c_dataset)
    }

    pub fn driver(&self) -> Result<Driver> {
        let c_dataset = self.handle("GDALGetDatasetDriver")?;
        let c_driver = unsafe { gdal_sys::GDALGetDatasetDriver(c_dataset) };
        Ok(unsafe { Driver::from_c_driver(c_driver) })
    }

    /// Raster size as (cols, rows).
    pub fn raster_size(&self) -> Result<(usize, usize)> {
        let c_dataset = self.handle("GDALGetRasterXSize")?;
        let size_x = unsafe { gdal_sys::GDALGetRasterXSize(c_dataset) } as usize;
        let size_y = unsafe { gdal_sys::GDALGetRasterYSize(c_dataset) } as usize;
        Ok((size_x, size_y))
    }

    pub fn raster_count(&self) -> Result<usize> {
        let c_dataset = self.handle("GDALGetRasterCount")?;
        Ok(unsafe { gdal_sys::GDALGetRasterCount(c_dataset) } as usize)
    }

    /// Fetch a band by its 1-based index.
    pub fn rasterband(&self, band_index: usize) -> Result<RasterBand<'_>> {
        let c_dataset = self.handle("GDALGetRasterBand")?;
        let count = self.raster_count()?;
        if band_index == 0 || band_index > count {
            return Err(GdalError::BadArgument(format!(
                "band index {band_index} out of range 1..={count}"
            )));
        }
        let c_band = unsafe { gdal_sys::GDALGetRasterBand(c_dataset, band_index as c_int) };
        if c_band.is_null() {
            return Err(GdalError::NullPointer {
                method_name: "GDALGetRasterBand",
                msg: String::new(),
            });
        }
        Ok(unsafe { RasterBand::from_c_rasterband(self, c_band) })
    }

    pub fn bands(&self) -> Result<Vec<RasterBand<'_>>> {
        (1..=self.raster_count()?)
            .map(|i| self.rasterband(i))
            .collect()
    }

    pub fn structure(&self) -> Result<DatasetStructure> {
        let size = self.raster_size()?;
        let band_count = self.raster_count()?;
        let (block_size, data_type) = if band_count > 0 {
            let band = self.rasterband(1)?;
            (band.block_size()?, Some(band.band_type()?))
        } else {
            ((0, 0), None)
        };
        Ok(DatasetStructure {
            size,
            block_size,
            band_count,
            data_type,
        })
    }

    pub fn geo_transform(&self) -> Result<GeoTransform> {
        let c_dataset = self.handle("GDALGetGeoTransform")?;
        let mut transformation = GeoTransform::default();
        let scope = CallScope::enter(&CallOptions::default())?;
        let rv = unsafe { gdal_sys::GDALGetGeoTransform(c_dataset, transformation.as_mut_ptr()) };
        scope.check(rv, "GDALGetGeoTransform")?;
        Ok(transformation)
    }

    pub fn set_geo_transform(&mut self, transformation: &GeoTransform) -> Result<()> {
        let c_dataset = self.handle("GDALSetGeoTransform")?;
        let mut transformation = *transformation;
        let scope = CallScope::enter(&CallOptions::default())?;
        let rv = unsafe { gdal_sys::GDALSetGeoTransform(c_dataset, transformation.as_mut_ptr()) };
        scope.check(rv, "GDALSetGeoTransform")
    }

    /// Projection as WKT, empty when unset.
    pub fn projection(&self) -> Result<String> {
        let c_dataset = self.handle("GDALGetProjectionRef")?;
        Ok(_string(unsafe { gdal_sys::GDALGetProjectionRef(c_dataset) }))
    }

    pub fn set_projection(&mut self, projection: &str) -> Result<()> {
        let c_dataset = self.handle("GDALSetProjection")?;
        let c_projection = CString::new(projection)?;
        let scope = CallScope::enter(&CallOptions::default())?;
        let rv = unsafe { gdal_sys::GDALSetProjection(c_dataset, c_projection.as_ptr()) };
        scope.check(rv, "GDALSetProjection")
    }

    /// Create a mask band shared by all bands.
    pub fn create_mask_band(&mut self, flags: GdalMaskFlags) -> Result<()> {
        let c_dataset = self.handle("GDALCreateDatasetMaskBand")?;
        let scope = CallScope::enter(&CallOptions::default())?;
        let rv = unsafe { gdal_sys::GDALCreateDatasetMaskBand(c_dataset, flags.bits()) };
        scope.check(rv, "GDALCreateDatasetMaskBand")
    }

    pub fn flush_cache(&mut self) -> Result<()> {
        let c_dataset = self.handle("GDALFlushCache")?;
        let scope = CallScope::enter(&CallOptions::default())?;
        #[cfg(any(major_ge_4, all(major_is_3, minor_ge_7)))]
        {
            let rv = unsafe { gdal_sys::GDALFlushCache(c_dataset) };
            scope.check(rv, "GDALFlushCache")
        }
        #[cfg(not(any(major_ge_4, all(major_is_3, minor_ge_7))))]
        {
            unsafe { gdal_sys::GDALFlushCache(c_dataset) };
            scope.finish()
        }
    }

    /// Read a window of several bands into `buffer`.
    ///
    /// `offset` is the window origin in the dataset, `buffer_size` the (cols, rows)
    /// of the buffer. The source window defaults to the buffer size; see
    /// [`IoOptions`] for band subsets, layout and resampling.
    ///
    /// # Panics
    /// If `buffer` is too small for the resolved layout.
    pub fn read<T: GdalType>(
        &self,
        offset: (isize, isize),
        buffer: &mut [T],
        buffer_size: (usize, usize),
        options: &IoOptions<'_>,
    ) -> Result<()> {
        let c_dataset = self.handle("GDALDatasetRasterIOEx")?;
        let bands = self.band_map(options.bands)?;
        io::transfer(
            GDALRWFlag::GF_Read,
            IoTarget::Dataset(c_dataset, &bands),
            offset,
            RawBuffer::from_slice_mut(buffer),
            buffer_size,
            options,
        )
    }

    /// Write `buffer` to a window of several bands.
    ///
    /// # Panics
    /// If `buffer` is too small for the resolved layout.
    pub fn write<T: GdalType>(
        &mut self,
        offset: (isize, isize),
        buffer: &[T],
        buffer_size: (usize, usize),
        options: &IoOptions<'_>,
    ) -> Result<()> {
        let c_dataset = self.handle("GDALDatasetRasterIOEx")?;
        let bands = self.band_map(options.bands)?;
        io::transfer(
            GDALRWFlag::GF_Write,
            IoTarget::Dataset(c_dataset, &bands),
            offset,
            RawBuffer::from_slice(buffer),
            buffer_size,
            options,
        )
    }

    fn band_map(&self, bands: Option<&[usize]>) -> Result<Vec<c_int>> {
        let count = self.raster_count()?;
        match bands {
            Some(bands) => bands
                .iter()
                .map(|&b| {
                    if b == 0 || b > count {
                        Err(GdalError::BadArgument(format!(
                            "band index {b} out of range 1..={count}"
                        )))
                    } else {
                        Ok(b as c_int)
                    }
                })
                .collect(),
            None if count == 0 => Err(GdalError::BadArgument(
                "cannot perform io on dataset with no bands".to_string(),
            )),
            None => Ok((1..=count as c_int).collect()),
        }
    }

    /// Build overviews, by default with automatically chosen levels and
    /// [`ResampleAlg::Average`].
    pub fn build_overviews(&mut self, options: &OverviewOptions<'_>) -> Result<()> {
        let c_dataset = self.handle("GDALBuildOverviews")?;
        let resampling = CString::new(options.resampling.overview_name()?)?;
        let structure = self.structure()?;
        if structure.band_count == 0 {
            return Err(GdalError::BadArgument(
                "cannot compute overviews on dataset with no raster bands".to_string(),
            ));
        }

        let mut levels: Vec<c_int> = match options.levels {
            Some(levels) => levels.iter().map(|&l| l as c_int).collect(),
            None => {
                let min_size = options
                    .min_size
                    .unwrap_or(structure.block_size.0.max(structure.block_size.1));
                auto_overview_levels(structure.size, min_size)
                    .into_iter()
                    .map(|l| l as c_int)
                    .collect()
            }
        };
        if levels.is_empty() {
            return Ok(());
        }
        if let Some(level) = levels.iter().find(|&&l| l < 2) {
            return Err(GdalError::BadArgument(format!(
                "cannot compute overview of level {level}"
            )));
        }
        let mut bands = match options.bands {
            Some(bands) => self.band_map(Some(bands))?,
            None => Vec::new(),
        };
        let bands_ptr = if bands.is_empty() {
            ptr::null_mut()
        } else {
            bands.as_mut_ptr()
        };

        let scope = CallScope::enter(&options.call)?;
        let rv = unsafe {
            gdal_sys::GDALBuildOverviews(
                c_dataset,
                resampling.as_ptr(),
                levels.len() as c_int,
                levels.as_mut_ptr(),
                bands.len() as c_int,
                bands_ptr,
                None,
                ptr::null_mut(),
            )
        };
        scope.check(rv, "GDALBuildOverviews")
    }

    /// Remove all overviews.
    pub fn clear_overviews(&mut self) -> Result<()> {
        let c_dataset = self.handle("GDALBuildOverviews")?;
        let scope = CallScope::enter(&CallOptions::default())?;
        let rv = unsafe {
            gdal_sys::GDALBuildOverviews(
                c_dataset,
                c"NONE".as_ptr(),
                0,
                ptr::null_mut(),
                0,
                ptr::null_mut(),
                None,
                ptr::null_mut(),
            )
        };
        scope.check(rv, "GDALBuildOverviews")
    }

    /// Convert the dataset with `gdal_translate` style switches, e.g. `["-of", "VRT"]`.
    pub fn translate<P: AsRef<Path>>(
        &self,
        destination: P,
        switches: &[&str],
        call: &CallOptions<'_>,
    ) -> Result<Dataset> {
        let c_dataset = self.handle("GDALTranslate")?;
        let c_destination = _path_to_c_string(destination)?;
        let args = CslStringList::from_strings(switches)?;

        let c_options = CallScope::enter(call)?
            .check_ptr(
                unsafe { gdal_sys::GDALTranslateOptionsNew(args.as_ptr(), ptr::null_mut()) },
                "GDALTranslateOptionsNew",
            )
            .map_err(|(parsed, err)| {
                if let Some(c_options) = parsed {
                    unsafe { gdal_sys::GDALTranslateOptionsFree(c_options) };
                }
                err
            })?;

        let scope = CallScope::enter(call)?;
        let mut usage_error: c_int = 0;
        let c_translated = unsafe {
            gdal_sys::GDALTranslate(
                c_destination.as_ptr(),
                c_dataset,
                c_options,
                &mut usage_error,
            )
        };
        unsafe { gdal_sys::GDALTranslateOptionsFree(c_options) };
        match scope.check_ptr(c_translated, "GDALTranslate") {
            Ok(c_translated) => Ok(unsafe { Dataset::from_c_dataset(c_translated) }),
            Err((translated, err)) => {
                if let Some(c_translated) = translated {
                    unsafe { gdal_sys::GDALClose(c_translated) };
                }
                Err(err)
            }
        }
    }
}

fn close_handle(scope: CallScope<'_>, c_dataset: GDALDatasetH) -> Result<()> {
    #[cfg(any(major_ge_4, all(major_is_3, minor_ge_7)))]
    {
        let rv = unsafe { gdal_sys::GDALClose(c_dataset) };
        scope.check(rv, "GDALClose")
    }
    #[cfg(not(any(major_ge_4, all(major_is_3, minor_ge_7))))]
    {
        unsafe { gdal_sys::GDALClose(c_dataset) };
        scope.finish()
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        if !self.is_open() {
            return;
        }
        let c_dataset = self.c_dataset.replace(ptr::null_mut());
        let result = CallScope::enter(&CallOptions::default())
            .and_then(|scope| close_handle(scope, c_dataset));
        if let Err(e) = result {
            log::warn!("error while closing dropped dataset: {e}");
        }
    }
}

/// A dataset opened with [`Dataset::open_shared`].
///
/// GDAL keeps one native dataset per path and thread for shared opens, so the
/// handle must stay on the thread that opened it. Only shared access to the inner
/// [`Dataset`] is given out, so the handle cannot be moved into a `Send` value:
///
/// ```compile_fail
/// use gdal_io::{Dataset, DatasetOptions};
///
/// # fn main() -> gdal_io::errors::Result<()> {
/// let mut shared = Dataset::open_shared("fixtures/a.tif", DatasetOptions::default())?;
/// let mut plain = Dataset::open("fixtures/b.tif")?;
/// std::mem::swap(&mut *shared, &mut plain);
/// # Ok(())
/// # }
/// ```
///
/// ```compile_fail
/// use gdal_io::{Dataset, DatasetOptions};
///
/// # fn main() -> gdal_io::errors::Result<()> {
/// let shared = Dataset::open_shared("fixtures/a.tif", DatasetOptions::default())?;
/// std::thread::spawn(move || drop(shared));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SharedDataset {
    inner: Dataset,
    _not_send: PhantomData<*mut ()>,
}

impl Deref for SharedDataset {
    type Target = Dataset;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mem_dataset, InMemoryFixture, SuppressGDALErrorLog};

    #[test]
    fn test_open_missing_is_not_found() {
        let _nolog = SuppressGDALErrorLog::new();
        let err = Dataset::open("/this/does/not/exist.tif").unwrap_err();
        assert!(err.is_not_found(), "{err:?}");
        assert!(!err.is_io_error());
    }

    #[test]
    fn test_double_close() {
        let ds = mem_dataset::<u8>((4, 4), 1);
        assert!(ds.is_open());
        ds.close().unwrap();
        assert!(!ds.is_open());
        assert_eq!(ds.close(), Err(GdalError::AlreadyClosed));
    }

    #[test]
    fn test_band_after_close() {
        let ds = mem_dataset::<u8>((4, 4), 2);
        let band = ds.rasterband(2).unwrap();
        ds.close().unwrap();
        let mut buf = [0_u8; 16];
        let err = band
            .read((0, 0), &mut buf, (4, 4), &IoOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            GdalError::DatasetClosed {
                method_name: "GDALRasterIOEx"
            }
        );
        assert!(band.size().is_err());
        assert!(ds.rasterband(1).is_err());
        assert!(ds.raster_size().is_err());
    }

    #[test]
    fn test_mask_and_overview_after_close() {
        let mut ds = mem_dataset::<u8>((64, 64), 1);
        ds.build_overviews(&OverviewOptions {
            levels: Some(&[2]),
            ..Default::default()
        })
        .unwrap();
        let band = ds.rasterband(1).unwrap();
        let mask = band.mask_band().unwrap();
        let overview = band.overview(0).unwrap();
        assert_eq!(overview.size().unwrap(), (32, 32));
        ds.close().unwrap();
        assert!(mask.size().is_err());
        assert!(overview.size().is_err());
    }

    #[test]
    fn test_rasterband_index() {
        let ds = mem_dataset::<u8>((4, 4), 1);
        assert!(ds.rasterband(0).is_err());
        assert!(ds.rasterband(2).is_err());
        assert_eq!(ds.bands().unwrap().len(), 1);
    }

    #[test]
    fn test_structure() {
        let ds = mem_dataset::<f32>((10, 5), 3);
        let st = ds.structure().unwrap();
        assert_eq!(st.size, (10, 5));
        assert_eq!(st.band_count, 3);
        assert_eq!(st.data_type, Some(f32::descriptor()));
    }

    #[test]
    fn test_geo_transform() {
        let mut ds = mem_dataset::<u8>((4, 4), 1);
        let gt = [10.0, 1.0, 0.0, 20.0, 0.0, -1.0];
        ds.set_geo_transform(&gt).unwrap();
        assert_eq!(ds.geo_transform().unwrap(), gt);
    }

    #[test]
    fn test_dataset_mask_band() {
        let mut ds = mem_dataset::<u8>((4, 4), 2);
        ds.create_mask_band(GdalMaskFlags::GMF_PER_DATASET).unwrap();
        for band in ds.bands().unwrap() {
            assert_eq!(band.mask_flags().unwrap(), GdalMaskFlags::GMF_PER_DATASET);
        }
    }

    #[test]
    fn test_auto_overview_levels() {
        assert_eq!(auto_overview_levels((1000, 500), 256), vec![2, 4]);
        assert_eq!(auto_overview_levels((256, 256), 256), Vec::<usize>::new());
        assert_eq!(auto_overview_levels((257, 10), 256), vec![2]);
    }

    #[test]
    fn test_build_overviews() {
        let fixture = InMemoryFixture::new("overviews.tif");
        let driver = Driver::get_by_name("GTiff").unwrap();
        let mut ds = driver
            .create_with_band_type_with_options::<u8, _>(
                fixture.path(),
                512,
                512,
                1,
                &["TILED=YES", "BLOCKXSIZE=128", "BLOCKYSIZE=128"],
                &CallOptions::default(),
            )
            .unwrap();
        ds.build_overviews(&OverviewOptions::default()).unwrap();
        let band = ds.rasterband(1).unwrap();
        assert_eq!(band.overview_count().unwrap(), 2);
        let sizes: Vec<_> = band
            .overviews()
            .unwrap()
            .iter()
            .map(|o| o.size().unwrap())
            .collect();
        assert_eq!(sizes, vec![(256, 256), (128, 128)]);
        drop(band);

        ds.clear_overviews().unwrap();
        assert_eq!(ds.rasterband(1).unwrap().overview_count().unwrap(), 0);
    }

    #[test]
    fn test_build_overviews_rejects() {
        let mut ds = mem_dataset::<u8>((64, 64), 1);
        let err = ds
            .build_overviews(&OverviewOptions {
                resampling: ResampleAlg::Max,
                levels: Some(&[2]),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, GdalError::UnsupportedResampling { .. }));

        let err = ds
            .build_overviews(&OverviewOptions {
                levels: Some(&[1, 2]),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(
            err,
            GdalError::BadArgument("cannot compute overview of level 1".to_string())
        );

        let mut empty = Driver::get_by_name("MEM")
            .unwrap()
            .create_vector_only("")
            .unwrap();
        assert!(empty.build_overviews(&OverviewOptions::default()).is_err());
    }

    #[test]
    fn test_open_shared() {
        let fixture = InMemoryFixture::new("shared.tif");
        {
            let driver = Driver::get_by_name("GTiff").unwrap();
            let mut ds = driver
                .create_with_band_type::<u8, _>(fixture.path(), 8, 8, 1)
                .unwrap();
            ds.write((0, 0), &[7_u8; 64], (8, 8), &IoOptions::default())
                .unwrap();
        }

        let first = Dataset::open_shared(fixture.path(), DatasetOptions::default()).unwrap();
        let second = Dataset::open_shared(fixture.path(), DatasetOptions::default()).unwrap();
        assert_eq!(unsafe { first.c_dataset() }, unsafe { second.c_dataset() });

        // a derived view reads through the shared handle
        let vrt = first
            .translate("", &["-of", "VRT"], &CallOptions::default())
            .unwrap();

        first.close().unwrap();
        let mut buf = [0_u8; 64];
        second
            .read((0, 0), &mut buf, (8, 8), &IoOptions::default())
            .unwrap();
        assert_eq!(buf, [7_u8; 64]);
        vrt.read((0, 0), &mut buf, (8, 8), &IoOptions::default())
            .unwrap();
        assert_eq!(buf, [7_u8; 64]);
        second.close().unwrap();
    }

    #[test]
    fn test_open_flags_and_drivers() {
        let fixture = InMemoryFixture::new("drivers.tif");
        Driver::get_by_name("GTiff")
            .unwrap()
            .create(fixture.path(), 4, 4, 1)
            .unwrap();

        let _nolog = SuppressGDALErrorLog::new();
        let res = Dataset::open_ex(
            fixture.path(),
            DatasetOptions {
                allowed_drivers: Some(&["PNG"]),
                ..Default::default()
            },
        );
        assert!(res.is_err());

        let ds = Dataset::open_ex(
            fixture.path(),
            DatasetOptions {
                allowed_drivers: Some(&["GTiff"]),
                sibling_files: Some(&[]),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ds.driver().unwrap().short_name(), "GTiff");
    }
}
