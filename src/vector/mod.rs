//! GDAL Vector Data
//!
//! Layers borrow their dataset like raster bands do; geometries are owned.
//!
//! ```no_run
//! use gdal_io::vector::{Geometry, OGRwkbGeometryType};
//! use gdal_io::Driver;
//!
//! # fn main() -> gdal_io::errors::Result<()> {
//! let mut dataset = Driver::get_by_name("Memory")?.create_vector_only("")?;
//! let mut layer = dataset.create_layer("points", None, OGRwkbGeometryType::wkbPoint)?;
//! layer.create_feature(&Geometry::from_wkt("POINT (1 2)")?)?;
//! assert_eq!(layer.feature_count(true)?, Some(1));
//! # Ok(())
//! # }
//! ```

mod geometry;
mod layer;

pub use geometry::Geometry;
pub use layer::Layer;
pub use gdal_sys::OGRwkbGeometryType;
