use std::ffi::CString;
use std::ptr;

use gdal_sys::{OGRErr, OGRLayerH, OGRwkbGeometryType};
use libc::c_int;

use crate::dataset::Dataset;
use crate::diagnostics::{CallOptions, CallScope};
use crate::errors::*;
use crate::spatial_ref::SpatialRef;
use crate::utils::_string;
use crate::vector::Geometry;

/// Layer in a vector dataset.
///
/// Like a raster band, a layer belongs to its dataset and fails with
/// [`GdalError::DatasetClosed`] once the dataset is closed.
#[derive(Debug)]
pub struct Layer<'a> {
    c_layer: OGRLayerH,
    dataset: &'a Dataset,
}

impl<'a> Layer<'a> {
    /// # Safety
    /// `c_layer` must belong to `dataset`.
    pub unsafe fn from_c_layer(dataset: &'a Dataset, c_layer: OGRLayerH) -> Self {
        Layer { c_layer, dataset }
    }

    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_layer(&self) -> OGRLayerH {
        self.c_layer
    }

    fn handle(&self, method_name: &'static str) -> Result<OGRLayerH> {
        self.dataset.handle(method_name)?;
        Ok(self.c_layer)
    }

    pub fn name(&self) -> Result<String> {
        let c_layer = self.handle("OGR_L_GetName")?;
        Ok(_string(unsafe { gdal_sys::OGR_L_GetName(c_layer) }))
    }

    /// Number of features, scanning the layer if the driver cannot answer
    /// cheaply and `force` is set. `None` when the count is unknown.
    pub fn feature_count(&self, force: bool) -> Result<Option<u64>> {
        let c_layer = self.handle("OGR_L_GetFeatureCount")?;
        let count = unsafe { gdal_sys::OGR_L_GetFeatureCount(c_layer, force as c_int) };
        Ok((count >= 0).then_some(count as u64))
    }

    /// Append a feature holding only `geometry`.
    pub fn create_feature(&mut self, geometry: &Geometry) -> Result<()> {
        let c_layer = self.handle("OGR_L_CreateFeature")?;
        let scope = CallScope::enter(&CallOptions::default())?;
        let rv = unsafe {
            let c_defn = gdal_sys::OGR_L_GetLayerDefn(c_layer);
            let c_feature = gdal_sys::OGR_F_Create(c_defn);
            let mut rv = gdal_sys::OGR_F_SetGeometry(c_feature, geometry.c_geometry());
            if rv == OGRErr::OGRERR_NONE {
                rv = gdal_sys::OGR_L_CreateFeature(c_layer, c_feature);
            }
            gdal_sys::OGR_F_Destroy(c_feature);
            rv
        };
        scope.finish()?;
        if rv != OGRErr::OGRERR_NONE {
            return Err(GdalError::OgrError {
                err: rv,
                method_name: "OGR_L_CreateFeature",
            });
        }
        Ok(())
    }
}

impl Dataset {
    pub fn layer_count(&self) -> Result<usize> {
        let c_dataset = self.handle("GDALDatasetGetLayerCount")?;
        Ok(unsafe { gdal_sys::GDALDatasetGetLayerCount(c_dataset) } as usize)
    }

    /// Fetch a layer by its 0-based index.
    pub fn layer(&self, idx: usize) -> Result<Layer<'_>> {
        let c_dataset = self.handle("GDALDatasetGetLayer")?;
        let c_layer = unsafe { gdal_sys::GDALDatasetGetLayer(c_dataset, idx as c_int) };
        if c_layer.is_null() {
            return Err(GdalError::BadArgument(format!("no layer at index {idx}")));
        }
        Ok(unsafe { Layer::from_c_layer(self, c_layer) })
    }

    /// Create a layer. Requires a dataset opened for update or newly created.
    pub fn create_layer(
        &mut self,
        name: &str,
        srs: Option<&SpatialRef>,
        geometry_type: OGRwkbGeometryType::Type,
    ) -> Result<Layer<'_>> {
        let c_dataset = self.handle("GDALDatasetCreateLayer")?;
        let c_name = CString::new(name)?;
        let c_srs = srs.map_or(ptr::null_mut(), |s| unsafe { s.to_c_hsrs() });

        let scope = CallScope::enter(&CallOptions::default())?;
        let c_layer = unsafe {
            gdal_sys::GDALDatasetCreateLayer(
                c_dataset,
                c_name.as_ptr(),
                c_srs,
                geometry_type,
                ptr::null_mut(),
            )
        };
        // the layer is owned by the dataset even when diagnostics were raised
        let c_layer = scope
            .check_ptr(c_layer, "GDALDatasetCreateLayer")
            .map_err(|(_, err)| err)?;
        Ok(unsafe { Layer::from_c_layer(self, c_layer) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Driver;

    #[test]
    fn test_create_layer_and_features() {
        let mut ds = Driver::get_by_name("Memory")
            .or_else(|_| Driver::get_by_name("MEM"))
            .unwrap()
            .create_vector_only("")
            .unwrap();
        let srs = SpatialRef::from_epsg(4326).unwrap();
        let mut layer = ds
            .create_layer("points", Some(&srs), OGRwkbGeometryType::wkbPoint)
            .unwrap();
        assert_eq!(layer.name().unwrap(), "points");
        layer
            .create_feature(&Geometry::from_wkt("POINT (1 2)").unwrap())
            .unwrap();
        layer
            .create_feature(&Geometry::from_wkt("POINT (3 4)").unwrap())
            .unwrap();
        assert_eq!(layer.feature_count(true).unwrap(), Some(2));
        drop(layer);

        assert_eq!(ds.layer_count().unwrap(), 1);
        let layer = ds.layer(0).unwrap();
        assert!(ds.layer(1).is_err());
        ds.close().unwrap();
        assert!(matches!(
            layer.name(),
            Err(GdalError::DatasetClosed { .. })
        ));
    }
}
