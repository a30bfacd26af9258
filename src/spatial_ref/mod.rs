//! Spatial reference systems and coordinate transformations.
//!
//! Both types own their native object and release it on drop.

mod srs;
mod transform;

pub use srs::SpatialRef;
pub use transform::CoordTransform;
