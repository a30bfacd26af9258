use bitflags::bitflags;
use gdal_sys::{GDALRWFlag, GDALRasterBandH};
use libc::c_int;

use crate::dataset::Dataset;
use crate::diagnostics::{CallOptions, CallScope};
use crate::errors::*;
use crate::raster::io::{self, IoOptions, IoTarget};
use crate::raster::{Buffer, GdalType, GdalTypeDescriptor, RawBuffer};
use crate::utils::_last_null_pointer_err;

bitflags! {
    /// Flags describing how a band's mask is derived.
    ///
    /// See <https://gdal.org/development/rfc/rfc15_nodatabitmask.html>.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GdalMaskFlags: c_int {
        /// Every pixel is valid.
        const GMF_ALL_VALID = 0x01;
        /// The mask is shared by all bands of the dataset.
        const GMF_PER_DATASET = 0x02;
        /// The mask is the alpha band.
        const GMF_ALPHA = 0x04;
        /// The mask is derived from the nodata value.
        const GMF_NODATA = 0x08;
    }
}

/// A band of a dataset, an overview of one, or a mask band.
///
/// The band borrows the dataset it belongs to. Every operation first checks that
/// the dataset is still open and fails with [`GdalError::DatasetClosed`] otherwise.
#[derive(Debug)]
pub struct RasterBand<'a> {
    c_rasterband: GDALRasterBandH,
    dataset: &'a Dataset,
}

impl<'a> RasterBand<'a> {
    /// Create a RasterBand from a wrapped C pointer
    ///
    /// # Safety
    /// `c_rasterband` must belong to `dataset`.
    pub unsafe fn from_c_rasterband(dataset: &'a Dataset, c_rasterband: GDALRasterBandH) -> Self {
        RasterBand {
            c_rasterband,
            dataset,
        }
    }

    /// Returns the wrapped C pointer
    ///
    /// # Safety
    /// This method returns a raw C pointer, dangling once the dataset is closed.
    pub unsafe fn c_rasterband(&self) -> GDALRasterBandH {
        self.c_rasterband
    }

    pub(crate) fn c_band(&self, method_name: &'static str) -> Result<GDALRasterBandH> {
        self.dataset.handle(method_name)?;
        Ok(self.c_rasterband)
    }

    /// Same dataset, another band handle.
    fn sibling(&self, c_rasterband: GDALRasterBandH, method_name: &'static str) -> Result<Self> {
        if c_rasterband.is_null() {
            return Err(_last_null_pointer_err(method_name));
        }
        Ok(RasterBand {
            c_rasterband,
            dataset: self.dataset,
        })
    }

    /// Dimensions of the band as (cols, rows). Overviews are smaller than the dataset.
    pub fn size(&self) -> Result<(usize, usize)> {
        let c_band = self.c_band("GDALGetRasterBandXSize")?;
        let size_x = unsafe { gdal_sys::GDALGetRasterBandXSize(c_band) } as usize;
        let size_y = unsafe { gdal_sys::GDALGetRasterBandYSize(c_band) } as usize;
        Ok((size_x, size_y))
    }

    /// Natural block size as (cols, rows).
    pub fn block_size(&self) -> Result<(usize, usize)> {
        let c_band = self.c_band("GDALGetBlockSize")?;
        let mut size_x = 0;
        let mut size_y = 0;
        unsafe { gdal_sys::GDALGetBlockSize(c_band, &mut size_x, &mut size_y) };
        Ok((size_x as usize, size_y as usize))
    }

    pub fn band_type(&self) -> Result<GdalTypeDescriptor> {
        let c_band = self.c_band("GDALGetRasterDataType")?;
        GdalTypeDescriptor::try_from(unsafe { gdal_sys::GDALGetRasterDataType(c_band) })
    }

    /// Read a window into `buffer`.
    ///
    /// `offset` is the window origin and `buffer_size` the (cols, rows) of the
    /// buffer. Samples are converted to `T`. With
    /// [`IoOptions::window_size`] different from `buffer_size` the window is
    /// resampled.
    ///
    /// # Panics
    /// If `buffer` is too small for `buffer_size` with the requested spacing.
    pub fn read<T: GdalType>(
        &self,
        offset: (isize, isize),
        buffer: &mut [T],
        buffer_size: (usize, usize),
        options: &IoOptions<'_>,
    ) -> Result<()> {
        let c_band = self.c_band("GDALRasterIOEx")?;
        io::transfer(
            GDALRWFlag::GF_Read,
            IoTarget::Band(c_band),
            offset,
            RawBuffer::from_slice_mut(buffer),
            buffer_size,
            options,
        )
    }

    /// Read a window into a new [`Buffer`].
    pub fn read_as<T: GdalType>(
        &self,
        offset: (isize, isize),
        buffer_size: (usize, usize),
        options: &IoOptions<'_>,
    ) -> Result<Buffer<T>> {
        let mut buffer = Buffer::zeroed(buffer_size);
        self.read(offset, &mut buffer.data, buffer_size, options)?;
        Ok(buffer)
    }

    /// Read the whole band at full resolution.
    pub fn read_band_as<T: GdalType>(&self) -> Result<Buffer<T>> {
        self.read_as((0, 0), self.size()?, &IoOptions::default())
    }

    /// Write `buffer` to a window.
    ///
    /// # Panics
    /// If `buffer` is too small for `buffer_size` with the requested spacing.
    pub fn write<T: GdalType>(
        &mut self,
        offset: (isize, isize),
        buffer: &[T],
        buffer_size: (usize, usize),
        options: &IoOptions<'_>,
    ) -> Result<()> {
        let c_band = self.c_band("GDALRasterIOEx")?;
        io::transfer(
            GDALRWFlag::GF_Write,
            IoTarget::Band(c_band),
            offset,
            RawBuffer::from_slice(buffer),
            buffer_size,
            options,
        )
    }

    pub fn no_data_value(&self) -> Result<Option<f64>> {
        let c_band = self.c_band("GDALGetRasterNoDataValue")?;
        let mut pb_success = 1;
        let no_data = unsafe { gdal_sys::GDALGetRasterNoDataValue(c_band, &mut pb_success) };
        Ok((pb_success == 1).then_some(no_data))
    }

    /// Set the nodata value, or remove it with `None`.
    pub fn set_no_data_value(&mut self, no_data: Option<f64>) -> Result<()> {
        let c_band = self.c_band("GDALSetRasterNoDataValue")?;
        let scope = CallScope::enter(&CallOptions::default())?;
        let rv = match no_data {
            Some(value) => unsafe { gdal_sys::GDALSetRasterNoDataValue(c_band, value) },
            None => unsafe { gdal_sys::GDALDeleteRasterNoDataValue(c_band) },
        };
        scope.check(rv, "GDALSetRasterNoDataValue")
    }

    /// Fill the band with a constant, `imaginary` applying to complex bands.
    pub fn fill(&mut self, real: f64, imaginary: Option<f64>) -> Result<()> {
        let c_band = self.c_band("GDALFillRaster")?;
        let scope = CallScope::enter(&CallOptions::default())?;
        let rv = unsafe { gdal_sys::GDALFillRaster(c_band, real, imaginary.unwrap_or(0.0)) };
        scope.check(rv, "GDALFillRaster")
    }

    pub fn mask_flags(&self) -> Result<GdalMaskFlags> {
        let c_band = self.c_band("GDALGetMaskFlags")?;
        let flags = unsafe { gdal_sys::GDALGetMaskFlags(c_band) };
        Ok(GdalMaskFlags::from_bits_retain(flags))
    }

    /// The mask band, tied to the same dataset.
    pub fn mask_band(&self) -> Result<RasterBand<'a>> {
        let c_band = self.c_band("GDALGetMaskBand")?;
        let c_mask = unsafe { gdal_sys::GDALGetMaskBand(c_band) };
        self.sibling(c_mask, "GDALGetMaskBand")
    }

    pub fn create_mask_band(&mut self, flags: GdalMaskFlags) -> Result<()> {
        let c_band = self.c_band("GDALCreateMaskBand")?;
        let scope = CallScope::enter(&CallOptions::default())?;
        let rv = unsafe { gdal_sys::GDALCreateMaskBand(c_band, flags.bits()) };
        scope.check(rv, "GDALCreateMaskBand")
    }

    pub fn overview_count(&self) -> Result<usize> {
        let c_band = self.c_band("GDALGetOverviewCount")?;
        Ok(unsafe { gdal_sys::GDALGetOverviewCount(c_band) } as usize)
    }

    /// Fetch an overview by its 0-based index, largest first.
    pub fn overview(&self, overview_index: usize) -> Result<RasterBand<'a>> {
        let count = self.overview_count()?;
        if overview_index >= count {
            return Err(GdalError::BadArgument(format!(
                "overview index {overview_index} out of range 0..{count}"
            )));
        }
        let c_band = self.c_band("GDALGetOverview")?;
        let c_overview = unsafe { gdal_sys::GDALGetOverview(c_band, overview_index as c_int) };
        self.sibling(c_overview, "GDALGetOverview")
    }

    pub fn overviews(&self) -> Result<Vec<RasterBand<'a>>> {
        (0..self.overview_count()?)
            .map(|i| self.overview(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mem_dataset;

    #[test]
    fn test_no_data_value() {
        let ds = mem_dataset::<f64>((3, 3), 1);
        let mut band = ds.rasterband(1).unwrap();
        assert_eq!(band.no_data_value().unwrap(), None);
        band.set_no_data_value(Some(-9999.0)).unwrap();
        assert_eq!(band.no_data_value().unwrap(), Some(-9999.0));
        band.set_no_data_value(None).unwrap();
        assert_eq!(band.no_data_value().unwrap(), None);
    }

    #[test]
    fn test_fill_and_read_band() {
        let ds = mem_dataset::<i16>((5, 2), 1);
        let mut band = ds.rasterband(1).unwrap();
        band.fill(-3.0, None).unwrap();
        let buf = band.read_band_as::<i16>().unwrap();
        assert_eq!(buf.size, (5, 2));
        assert_eq!(buf.data, vec![-3; 10]);
    }

    #[test]
    fn test_mask_band() {
        let ds = mem_dataset::<u8>((4, 4), 1);
        let mut band = ds.rasterband(1).unwrap();
        assert!(band.mask_flags().unwrap().contains(GdalMaskFlags::GMF_ALL_VALID));
        band.set_no_data_value(Some(0.0)).unwrap();
        assert_eq!(band.mask_flags().unwrap(), GdalMaskFlags::GMF_NODATA);

        let mask = band.mask_band().unwrap();
        let values = mask.read_band_as::<u8>().unwrap();
        assert!(values.data.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_band_type() {
        let ds = mem_dataset::<u32>((1, 1), 1);
        let band = ds.rasterband(1).unwrap();
        assert_eq!(band.band_type().unwrap(), u32::descriptor());
        assert_eq!(band.block_size().unwrap().0, 1);
        assert!(band.overview(0).is_err());
    }
}
