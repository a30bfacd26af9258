use std::ptr;

use gdal_sys::{GDALDataType, GUIntBig};
use libc::{c_double, c_int, c_void};

use crate::diagnostics::{CallOptions, CallScope};
use crate::errors::{GdalError, Result};
use crate::raster::RasterBand;

/// Options for [`RasterBand::histogram`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HistogramOptions<'a> {
    /// Allow GDAL to sample overviews or a subset of blocks.
    pub approximate: bool,
    /// Explicit `(bucket count, min, max)`. When `None`, the exact histogram uses
    /// the band's default histogram and the approximate one derives 256 buckets
    /// from the data type or an approximate min/max.
    pub intervals: Option<(usize, f64, f64)>,
    /// Count values outside `[min, max)` in the first and last buckets.
    pub include_out_of_range: bool,
    pub call: CallOptions<'a>,
}

/// Bucket counts over `[min, max)`, all buckets of equal width.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    min: f64,
    max: f64,
    counts: Vec<u64>,
}

/// One bucket of a [`Histogram`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

impl Histogram {
    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn bucket_size(&self) -> f64 {
        (self.max - self.min) / self.counts.len() as f64
    }

    pub fn bucket(&self, index: usize) -> Option<Bucket> {
        let count = *self.counts.get(index)?;
        let size = self.bucket_size();
        Some(Bucket {
            min: self.min + index as f64 * size,
            max: self.min + (index + 1) as f64 * size,
            count,
        })
    }

    pub fn buckets(&self) -> impl Iterator<Item = Bucket> + '_ {
        (0..self.len()).filter_map(|i| self.bucket(i))
    }
}

/// Widens `[min, max]` by half a bucket on each side so that `min` and `max`
/// fall in the middle of the first and last buckets.
fn half_bucket_interval(min: f64, max: f64, count: usize) -> (f64, f64) {
    let half = if count > 1 {
        (max - min) / (2.0 * (count - 1) as f64)
    } else {
        0.5
    };
    (min - half, max + half)
}

impl RasterBand<'_> {
    /// Compute a histogram of the band.
    pub fn histogram(&self, options: &HistogramOptions<'_>) -> Result<Histogram> {
        match options.intervals {
            Some((count, min, max)) => self.histogram_with(count, min, max, options),
            None if options.approximate => {
                let (count, min, max) = self.approximate_intervals(&options.call)?;
                self.histogram_with(
                    count,
                    min,
                    max,
                    &HistogramOptions {
                        include_out_of_range: true,
                        ..*options
                    },
                )
            }
            None => self.default_histogram(&options.call),
        }
    }

    fn histogram_with(
        &self,
        count: usize,
        min: f64,
        max: f64,
        options: &HistogramOptions<'_>,
    ) -> Result<Histogram> {
        if count == 0 {
            return Err(GdalError::BadArgument(
                "histogram needs at least one bucket".to_string(),
            ));
        }
        if max.partial_cmp(&min) != Some(std::cmp::Ordering::Greater) {
            return Err(GdalError::BadArgument(format!(
                "histogram max {max} must be greater than min {min}"
            )));
        }
        let c_band = self.c_band("GDALGetRasterHistogramEx")?;
        let mut counts: Vec<GUIntBig> = vec![0; count];

        let scope = CallScope::enter(&options.call)?;
        let rv = unsafe {
            gdal_sys::GDALGetRasterHistogramEx(
                c_band,
                min,
                max,
                count as c_int,
                counts.as_mut_ptr(),
                options.include_out_of_range as c_int,
                options.approximate as c_int,
                None,
                ptr::null_mut(),
            )
        };
        scope.check(rv, "GDALGetRasterHistogramEx")?;
        Ok(Histogram {
            min,
            max,
            counts: counts.into_iter().map(|c| c as u64).collect(),
        })
    }

    fn default_histogram(&self, call: &CallOptions<'_>) -> Result<Histogram> {
        let c_band = self.c_band("GDALGetDefaultHistogramEx")?;
        let mut min: c_double = 0.0;
        let mut max: c_double = 0.0;
        let mut count: c_int = 0;
        let mut c_counts: *mut GUIntBig = ptr::null_mut();

        let scope = CallScope::enter(call)?;
        let rv = unsafe {
            gdal_sys::GDALGetDefaultHistogramEx(
                c_band,
                &mut min,
                &mut max,
                &mut count,
                &mut c_counts,
                1,
                None,
                ptr::null_mut(),
            )
        };
        let checked = scope.check(rv, "GDALGetDefaultHistogramEx");
        let counts = if c_counts.is_null() || count <= 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(c_counts, count as usize) }
                .iter()
                .map(|&c| c as u64)
                .collect()
        };
        unsafe { gdal_sys::VSIFree(c_counts as *mut c_void) };
        checked?;
        Ok(Histogram { min, max, counts })
    }

    fn approximate_intervals(&self, call: &CallOptions<'_>) -> Result<(usize, f64, f64)> {
        let band_type = self.band_type()?.gdal_type();
        if band_type == GDALDataType::GDT_Byte {
            return Ok((256, -0.5, 255.5));
        }
        #[cfg(any(major_ge_4, all(major_is_3, minor_ge_7)))]
        if band_type == GDALDataType::GDT_Int8 {
            return Ok((256, -128.5, 127.5));
        }

        let c_band = self.c_band("GDALComputeRasterMinMax")?;
        let mut min_max = [0.0 as c_double; 2];
        let scope = CallScope::enter(call)?;
        // the return type differs across GDAL versions, failures arrive as diagnostics
        #[allow(clippy::let_unit_value)]
        let _ = unsafe { gdal_sys::GDALComputeRasterMinMax(c_band, 1, min_max.as_mut_ptr()) };
        scope.finish()?;
        let (min, max) = half_bucket_interval(min_max[0], min_max[1], 256);
        Ok((256, min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::IoOptions;
    use crate::test_utils::mem_dataset;

    #[test]
    fn test_bucket_geometry() {
        let h = Histogram {
            min: 0.0,
            max: 10.0,
            counts: vec![1, 2, 3, 4, 5],
        };
        assert_eq!(h.len(), 5);
        assert_eq!(h.bucket_size(), 2.0);
        assert_eq!(
            h.bucket(2),
            Some(Bucket {
                min: 4.0,
                max: 6.0,
                count: 3
            })
        );
        assert_eq!(h.bucket(5), None);
        assert_eq!(h.buckets().map(|b| b.count).sum::<u64>(), 15);
    }

    #[test]
    fn test_half_bucket_interval() {
        assert_eq!(half_bucket_interval(0.0, 255.0, 256), (-0.5, 255.5));
    }

    #[test]
    fn test_byte_histograms() {
        let ds = mem_dataset::<u8>((4, 4), 1);
        let mut band = ds.rasterband(1).unwrap();
        let data: Vec<u8> = (0..16).map(|v| (v % 4) as u8).collect();
        band.write((0, 0), &data, (4, 4), &IoOptions::default())
            .unwrap();

        let exact = band.histogram(&HistogramOptions::default()).unwrap();
        assert_eq!(exact.len(), 256);
        assert_eq!(exact.min(), -0.5);
        assert_eq!(&exact.counts()[..5], &[4, 4, 4, 4, 0]);

        let approx = band
            .histogram(&HistogramOptions {
                approximate: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(approx.len(), 256);
        assert_eq!(approx.max(), 255.5);

        let custom = band
            .histogram(&HistogramOptions {
                intervals: Some((2, 0.0, 2.0)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(custom.counts(), &[4, 4]);

        let clamped = band
            .histogram(&HistogramOptions {
                intervals: Some((2, 0.0, 2.0)),
                include_out_of_range: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(clamped.counts(), &[4, 12]);
    }

    #[test]
    fn test_one_pixel_per_byte_value() {
        let ds = mem_dataset::<u8>((16, 16), 1);
        let mut band = ds.rasterband(1).unwrap();
        let data: Vec<u8> = (0..=255).collect();
        band.write((0, 0), &data, (16, 16), &IoOptions::default())
            .unwrap();

        let h = band.histogram(&HistogramOptions::default()).unwrap();
        assert_eq!(h.len(), 256);
        assert_eq!(h.bucket_size(), 1.0);
        for (i, bucket) in h.buckets().enumerate() {
            assert_eq!(bucket.count, 1, "bucket {i}");
            assert_eq!(bucket.min, i as f64 - 0.5);
            assert_eq!(bucket.max, i as f64 + 0.5);
        }
        let buckets: Vec<Bucket> = h.buckets().collect();
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].max, pair[1].min);
        }
        assert_eq!(h.counts().iter().sum::<u64>(), 256);
    }

    #[test]
    fn test_float_approximate_histogram() {
        let ds = mem_dataset::<f32>((10, 1), 1);
        let mut band = ds.rasterband(1).unwrap();
        let data: Vec<f32> = (0..10).map(|v| v as f32 * 25.5).collect();
        band.write((0, 0), &data, (10, 1), &IoOptions::default())
            .unwrap();
        let h = band
            .histogram(&HistogramOptions {
                approximate: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(h.len(), 256);
        crate::assert_near!(h.min(), -0.45, epsilon = 1e-9);
        crate::assert_near!(h.max(), 229.95, epsilon = 1e-9);
        assert_eq!(h.counts().iter().sum::<u64>(), 10);
    }

    #[test]
    fn test_invalid_intervals() {
        let ds = mem_dataset::<u8>((2, 2), 1);
        let band = ds.rasterband(1).unwrap();
        for intervals in [(0, 0.0, 1.0), (4, 1.0, 1.0), (4, 2.0, 1.0)] {
            let res = band.histogram(&HistogramOptions {
                intervals: Some(intervals),
                ..Default::default()
            });
            assert!(matches!(res, Err(GdalError::BadArgument(_))));
        }
    }
}
