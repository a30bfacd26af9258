//! GDAL Raster Data
//!
//! Windowed reads and writes go through [`RasterBand::read`] / [`RasterBand::write`]
//! for one band and [`Dataset::read`](crate::Dataset::read) /
//! [`Dataset::write`](crate::Dataset::write) for several. Both take an [`IoOptions`]
//! describing the source window, buffer layout and resampling.
//!
//! ```rust, no_run
//! use gdal_io::raster::{Interleave, IoOptions};
//! use gdal_io::Dataset;
//!
//! let ds = Dataset::open("fixtures/rgb.tif")?;
//! let mut rgb = vec![0_u8; 64 * 64 * 3];
//! ds.read(
//!     (0, 0),
//!     &mut rgb,
//!     (64, 64),
//!     &IoOptions {
//!         interleave: Interleave::Pixel,
//!         ..Default::default()
//!     },
//! )?;
//! # Ok::<(), gdal_io::errors::GdalError>(())
//! ```

mod buffer;
mod histogram;
pub(crate) mod io;
mod rasterband;
mod resample;
mod stride;
mod types;

pub use buffer::{Buffer, ByteBuffer};
pub(crate) use buffer::RawBuffer;
pub use histogram::{Bucket, Histogram, HistogramOptions};
pub use io::IoOptions;
pub use rasterband::{GdalMaskFlags, RasterBand};
pub use resample::ResampleAlg;
pub use stride::{Interleave, Spacing, SpacingOverrides};
pub use types::{Complex, GDALDataType, GdalType, GdalTypeDescriptor};
