//! Windowed raster transfers shared by bands and datasets.

use std::mem;

use gdal_sys::{
    GDALDataType, GDALDatasetH, GDALRWFlag, GDALRasterBandH, GDALRasterIOExtraArg, GSpacing,
};
use libc::{c_int, c_void};

use crate::diagnostics::{CallOptions, CallScope};
use crate::errors::{GdalError, Result};
use crate::raster::resample::{aggregate, ResampleAlg};
use crate::raster::stride::{Interleave, Spacing, SpacingOverrides};
use crate::raster::RawBuffer;

/// Options for [`RasterBand::read`](crate::raster::RasterBand::read) and the other
/// windowed transfers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IoOptions<'a> {
    /// Size of the source window. Defaults to the buffer size; a different size
    /// resamples with [`IoOptions::resample`].
    pub window_size: Option<(usize, usize)>,
    /// 1-based bands of a dataset transfer, all bands when `None`. Ignored by band
    /// transfers.
    pub bands: Option<&'a [usize]>,
    pub interleave: Interleave,
    pub spacing: SpacingOverrides,
    pub resample: ResampleAlg,
    pub call: CallOptions<'a>,
}

pub(crate) enum IoTarget<'b> {
    Band(GDALRasterBandH),
    Dataset(GDALDatasetH, &'b [c_int]),
}

impl IoTarget<'_> {
    fn band_count(&self) -> usize {
        match self {
            IoTarget::Band(_) => 1,
            IoTarget::Dataset(_, bands) => bands.len(),
        }
    }

    fn method_name(&self) -> &'static str {
        match self {
            IoTarget::Band(_) => "GDALRasterIOEx",
            IoTarget::Dataset(..) => "GDALDatasetRasterIOEx",
        }
    }
}

fn extra_arg(resample: ResampleAlg) -> GDALRasterIOExtraArg {
    // equivalent of INIT_RASTERIO_EXTRA_ARG
    let mut extra: GDALRasterIOExtraArg = unsafe { mem::zeroed() };
    extra.nVersion = 1;
    if let Some(alg) = resample.to_gdal() {
        extra.eResampleAlg = alg;
    }
    extra
}

/// Moves one window between GDAL and `buffer`.
///
/// # Panics
/// If `buffer` cannot hold `buffer_size` with the resolved spacing.
pub(crate) fn transfer(
    rw: GDALRWFlag::Type,
    target: IoTarget<'_>,
    offset: (isize, isize),
    buffer: RawBuffer<'_>,
    buffer_size: (usize, usize),
    options: &IoOptions<'_>,
) -> Result<()> {
    let band_count = target.band_count();
    let spacing = Spacing::resolve(
        buffer_size,
        band_count,
        buffer.elem_size(),
        options.interleave,
        options.spacing,
    );
    spacing.check_capacity(buffer_size, band_count, buffer.elem_size(), buffer.len());
    let window_size = options.window_size.unwrap_or(buffer_size);

    if options.resample.is_aggregating() {
        if rw == GDALRWFlag::GF_Write {
            return Err(GdalError::UnsupportedResampling {
                alg: options.resample.name(),
                operation: "writes",
            });
        }
        return aggregating_read(
            &target,
            offset,
            window_size,
            &buffer,
            buffer_size,
            spacing,
            options,
        );
    }

    let mut extra = extra_arg(options.resample);
    let scope = CallScope::enter(&options.call)?;
    let rv = unsafe {
        match target {
            IoTarget::Band(c_band) => gdal_sys::GDALRasterIOEx(
                c_band,
                rw,
                offset.0 as c_int,
                offset.1 as c_int,
                window_size.0 as c_int,
                window_size.1 as c_int,
                buffer.as_ptr(),
                buffer_size.0 as c_int,
                buffer_size.1 as c_int,
                buffer.data_type(),
                spacing.pixel as GSpacing,
                spacing.line as GSpacing,
                &mut extra,
            ),
            IoTarget::Dataset(c_dataset, bands) => gdal_sys::GDALDatasetRasterIOEx(
                c_dataset,
                rw,
                offset.0 as c_int,
                offset.1 as c_int,
                window_size.0 as c_int,
                window_size.1 as c_int,
                buffer.as_ptr(),
                buffer_size.0 as c_int,
                buffer_size.1 as c_int,
                buffer.data_type(),
                bands.len() as c_int,
                bands.as_ptr() as *mut c_int,
                spacing.pixel as GSpacing,
                spacing.line as GSpacing,
                spacing.band as GSpacing,
                &mut extra,
            ),
        }
    };
    scope.check(rv, target.method_name())
}

/// Reads each band at full resolution and reduces it to `buffer_size` here.
fn aggregating_read(
    target: &IoTarget<'_>,
    offset: (isize, isize),
    window_size: (usize, usize),
    buffer: &RawBuffer<'_>,
    buffer_size: (usize, usize),
    spacing: Spacing,
    options: &IoOptions<'_>,
) -> Result<()> {
    let pixel_stride = c_int::try_from(spacing.pixel).map_err(|_| {
        GdalError::BadArgument(format!(
            "pixel spacing {} is too large for aggregating reads",
            spacing.pixel
        ))
    })?;
    let c_bands: Vec<GDALRasterBandH> = match *target {
        IoTarget::Band(c_band) => vec![c_band],
        IoTarget::Dataset(c_dataset, bands) => bands
            .iter()
            .map(|&b| unsafe { gdal_sys::GDALGetRasterBand(c_dataset, b) })
            .collect(),
    };
    log::trace!(
        "aggregating {}x{} window into {}x{} with {}",
        window_size.0,
        window_size.1,
        buffer_size.0,
        buffer_size.1,
        options.resample.name()
    );

    let scope = CallScope::enter(&options.call)?;
    let mut source = vec![0.0_f64; window_size.0 * window_size.1];
    let mut extra = extra_arg(ResampleAlg::NearestNeighbour);
    for (i, &c_band) in c_bands.iter().enumerate() {
        let rv = unsafe {
            gdal_sys::GDALRasterIOEx(
                c_band,
                GDALRWFlag::GF_Read,
                offset.0 as c_int,
                offset.1 as c_int,
                window_size.0 as c_int,
                window_size.1 as c_int,
                source.as_mut_ptr() as *mut c_void,
                window_size.0 as c_int,
                window_size.1 as c_int,
                GDALDataType::GDT_Float64,
                0,
                0,
                &mut extra,
            )
        };
        if rv >= gdal_sys::CPLErr::CE_Failure {
            return scope.check(rv, "GDALRasterIOEx");
        }

        let mut has_nodata: c_int = 0;
        let nodata = unsafe { gdal_sys::GDALGetRasterNoDataValue(c_band, &mut has_nodata) };
        let nodata = (has_nodata != 0).then_some(nodata);

        let reduced = aggregate(options.resample, &source, window_size, buffer_size, nodata);
        for (y, row) in reduced.chunks_exact(buffer_size.0.max(1)).enumerate() {
            let byte_offset = i as i64 * spacing.band + y as i64 * spacing.line;
            unsafe {
                gdal_sys::GDALCopyWords64(
                    row.as_ptr() as *const c_void,
                    GDALDataType::GDT_Float64,
                    mem::size_of::<f64>() as c_int,
                    buffer.offset_ptr(byte_offset as usize),
                    buffer.data_type(),
                    pixel_stride,
                    row.len() as _,
                )
            };
        }
    }
    scope.finish()
}
