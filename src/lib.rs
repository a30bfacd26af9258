#![crate_name = "gdal_io"]
#![crate_type = "lib"]

//! # GDAL I/O
//!
//! Typed raster I/O, handle lifetime and virtual file systems on top of
//! [GDAL](https://gdal.org).
//!
//! ## Overview
//!
//! * [`Dataset`] owns a GDAL dataset handle. [`RasterBand`](raster::RasterBand)s,
//!   masks, overviews and [`Layer`](vector::Layer)s borrow it and report
//!   [`GdalError::DatasetClosed`](errors::GdalError::DatasetClosed) once it is closed.
//! * [`Dataset::read`] / [`Dataset::write`] and their band counterparts move
//!   pixels between GDAL and typed Rust slices in any strided layout, with
//!   optional resampling. See [`raster`].
//! * Every native call captures the diagnostics GDAL emits while it runs and
//!   returns them as the call's error. See [`diagnostics`].
//! * [`vsi::register_handler`] serves a virtual file system prefix from any
//!   byte-range store implementing [`vsi::KeyReader`].
//!
//! ## Example
//!
//! ```no_run
//! use gdal_io::raster::IoOptions;
//! use gdal_io::Dataset;
//!
//! # fn main() -> gdal_io::errors::Result<()> {
//! let dataset = Dataset::open("fixtures/tinymarble.tif")?;
//! let (width, height) = dataset.raster_size()?;
//! let mut pixels = vec![0_u8; width * height * dataset.raster_count()?];
//! dataset.read((0, 0), &mut pixels, (width, height), &IoOptions::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Failures that cannot be returned to a caller, like a close error in `Drop` or a
//! backing store error inside a file system callback, are logged through the
//! [`log`](https://docs.rs/log) facade.

pub use gdal_sys;

pub mod config;
pub mod cpl;
mod dataset;
pub mod diagnostics;
mod driver;
pub mod errors;
mod options;
pub mod raster;
pub mod spatial_ref;
#[cfg(test)]
mod test_utils;
mod utils;
pub mod vector;
pub mod vsi;

pub use dataset::{Dataset, DatasetStructure, GeoTransform, OverviewOptions, SharedDataset};
pub use diagnostics::CallOptions;
pub use driver::Driver;
pub use options::{DatasetOptions, GdalOpenFlags};
