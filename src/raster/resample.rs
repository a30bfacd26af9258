use gdal_sys::GDALRIOResampleAlg;

use crate::errors::{GdalError, Result};

/// Resampling applied when the source window and the buffer differ in size.
///
/// The first eight algorithms are handled by GDAL during the transfer. `Min`, `Max`,
/// `Median`, `Q1`, `Q3` and `Sum` are not available to GDAL's raster I/O; reads using
/// them fetch the source window at full resolution and aggregate it here. They
/// cannot be used for writes or overview generation.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ResampleAlg {
    /// Nearest neighbour
    #[default]
    NearestNeighbour,
    /// Bilinear (2x2 kernel)
    Bilinear,
    /// Cubic convolution approximation (4x4 kernel)
    Cubic,
    /// Cubic B-spline approximation (4x4 kernel)
    CubicSpline,
    /// Lanczos windowed sinc interpolation (6x6 kernel)
    Lanczos,
    /// Average of all non-nodata contributing pixels
    Average,
    /// Value appearing most often among the contributing pixels
    Mode,
    /// Gauss blurring
    Gauss,
    /// Minimum of the contributing pixels
    Min,
    /// Maximum of the contributing pixels
    Max,
    /// Median of the contributing pixels
    Median,
    /// First quartile of the contributing pixels
    Q1,
    /// Third quartile of the contributing pixels
    Q3,
    /// Sum of the contributing pixels
    Sum,
}

impl ResampleAlg {
    pub fn name(&self) -> &'static str {
        match self {
            ResampleAlg::NearestNeighbour => "nearest",
            ResampleAlg::Bilinear => "bilinear",
            ResampleAlg::Cubic => "cubic",
            ResampleAlg::CubicSpline => "cubicspline",
            ResampleAlg::Lanczos => "lanczos",
            ResampleAlg::Average => "average",
            ResampleAlg::Mode => "mode",
            ResampleAlg::Gauss => "gauss",
            ResampleAlg::Min => "min",
            ResampleAlg::Max => "max",
            ResampleAlg::Median => "med",
            ResampleAlg::Q1 => "Q1",
            ResampleAlg::Q3 => "Q3",
            ResampleAlg::Sum => "sum",
        }
    }

    /// The algorithm as understood by `GDALRasterIOEx`, if GDAL implements it there.
    pub fn to_gdal(&self) -> Option<GDALRIOResampleAlg::Type> {
        Some(match self {
            ResampleAlg::NearestNeighbour => GDALRIOResampleAlg::GRIORA_NearestNeighbour,
            ResampleAlg::Bilinear => GDALRIOResampleAlg::GRIORA_Bilinear,
            ResampleAlg::Cubic => GDALRIOResampleAlg::GRIORA_Cubic,
            ResampleAlg::CubicSpline => GDALRIOResampleAlg::GRIORA_CubicSpline,
            ResampleAlg::Lanczos => GDALRIOResampleAlg::GRIORA_Lanczos,
            ResampleAlg::Average => GDALRIOResampleAlg::GRIORA_Average,
            ResampleAlg::Mode => GDALRIOResampleAlg::GRIORA_Mode,
            ResampleAlg::Gauss => GDALRIOResampleAlg::GRIORA_Gauss,
            _ => return None,
        })
    }

    /// Whether reads with this algorithm are aggregated on the Rust side.
    pub fn is_aggregating(&self) -> bool {
        self.to_gdal().is_none()
    }

    pub(crate) fn check_supported(&self, operation: &'static str) -> Result<()> {
        if self.is_aggregating() {
            return Err(GdalError::UnsupportedResampling {
                alg: self.name(),
                operation,
            });
        }
        Ok(())
    }

    /// Name passed to `GDALBuildOverviews`.
    pub(crate) fn overview_name(&self) -> Result<&'static str> {
        self.check_supported("overview generation")?;
        Ok(match self {
            ResampleAlg::NearestNeighbour => "NEAREST",
            ResampleAlg::Bilinear => "BILINEAR",
            ResampleAlg::Cubic => "CUBIC",
            ResampleAlg::CubicSpline => "CUBICSPLINE",
            ResampleAlg::Lanczos => "LANCZOS",
            ResampleAlg::Average => "AVERAGE",
            ResampleAlg::Mode => "MODE",
            _ => "GAUSS",
        })
    }

    fn reduce(&self, values: &mut [f64]) -> f64 {
        match self {
            ResampleAlg::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            ResampleAlg::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            ResampleAlg::Sum => values.iter().sum(),
            ResampleAlg::Median => quantile(values, 0.5),
            ResampleAlg::Q1 => quantile(values, 0.25),
            ResampleAlg::Q3 => quantile(values, 0.75),
            // callers only reduce with aggregating algorithms
            _ => values[0],
        }
    }
}

fn quantile(values: &mut [f64], q: f64) -> f64 {
    values.sort_unstable_by(f64::total_cmp);
    let idx = ((values.len() - 1) as f64 * q).round() as usize;
    values[idx]
}

/// Range of source indices covered by destination index `dst` along one axis.
fn footprint(dst: usize, dst_len: usize, src_len: usize) -> (usize, usize) {
    let start = dst * src_len / dst_len;
    let end = ((dst + 1) * src_len).div_ceil(dst_len);
    (start, end.max(start + 1).min(src_len))
}

/// Reduces a row-major `src_size` raster to `dst_size`.
///
/// Each destination pixel aggregates the source pixels it covers, skipping
/// `nodata` and NaN samples. Pixels without valid samples get `nodata`, or 0.
pub(crate) fn aggregate(
    alg: ResampleAlg,
    src: &[f64],
    src_size: (usize, usize),
    dst_size: (usize, usize),
    nodata: Option<f64>,
) -> Vec<f64> {
    let (src_w, src_h) = src_size;
    let (dst_w, dst_h) = dst_size;
    let mut out = Vec::with_capacity(dst_w * dst_h);
    if src_w == 0 || src_h == 0 {
        out.resize(dst_w * dst_h, nodata.unwrap_or(0.0));
        return out;
    }
    let mut scratch = Vec::new();
    for dy in 0..dst_h {
        let (y0, y1) = footprint(dy, dst_h, src_h);
        for dx in 0..dst_w {
            let (x0, x1) = footprint(dx, dst_w, src_w);
            scratch.clear();
            for y in y0..y1 {
                let row = &src[y * src_w..(y + 1) * src_w];
                scratch.extend(
                    row[x0..x1]
                        .iter()
                        .copied()
                        .filter(|v| !v.is_nan() && Some(*v) != nodata),
                );
            }
            let value = if scratch.is_empty() {
                nodata.unwrap_or(0.0)
            } else {
                alg.reduce(&mut scratch)
            };
            out.push(value);
        }
    }
    out
}
