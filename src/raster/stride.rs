//! Resolution of buffer spacing for raster I/O.
//!
//! GDAL describes the memory layout of an I/O buffer with three byte offsets:
//! between horizontally adjacent samples (pixel spacing), between rows (line
//! spacing) and between bands (band spacing). Callers may override any of them;
//! the others are derived so that the defaults describe a compact buffer.

/// Memory layout of a multi-band buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Interleave {
    /// All samples of band 1, then all samples of band 2, ...
    #[default]
    Band,
    /// All bands of pixel 1, then all bands of pixel 2, ...
    Pixel,
}

/// Explicit byte spacings. `None` keeps the value derived from the layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpacingOverrides {
    pub pixel: Option<i64>,
    pub line: Option<i64>,
    pub band: Option<i64>,
}

/// Fully resolved byte spacings passed to GDAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spacing {
    pub pixel: i64,
    pub line: i64,
    pub band: i64,
}

impl Spacing {
    /// Resolve spacings for a `buffer_size` (cols, rows) buffer holding `band_count`
    /// bands of `elem_size`-byte samples.
    ///
    /// Derived values follow the overridden ones: an explicit pixel spacing
    /// changes the default line spacing, which in turn changes the default band
    /// spacing of a band-sequential layout.
    pub fn resolve(
        buffer_size: (usize, usize),
        band_count: usize,
        elem_size: usize,
        interleave: Interleave,
        overrides: SpacingOverrides,
    ) -> Spacing {
        let (width, height) = (buffer_size.0 as i64, buffer_size.1 as i64);
        let elem = elem_size as i64;
        let band_count = band_count.max(1) as i64;

        // saturated values are rejected by `check_capacity`
        let default_pixel = match interleave {
            Interleave::Band => elem,
            Interleave::Pixel => elem.saturating_mul(band_count),
        };
        let pixel = overrides.pixel.unwrap_or(default_pixel);
        let line = overrides.line.unwrap_or(width.saturating_mul(pixel));
        let default_band = match interleave {
            Interleave::Band => line.saturating_mul(height),
            Interleave::Pixel => elem,
        };
        let band = overrides.band.unwrap_or(default_band);

        Spacing { pixel, line, band }
    }

    /// Number of bytes the geometry touches, starting at the buffer origin, or
    /// `None` if that does not fit in a `usize`.
    ///
    /// # Panics
    /// If any spacing is negative.
    pub fn required_bytes(
        &self,
        buffer_size: (usize, usize),
        band_count: usize,
        elem_size: usize,
    ) -> Option<usize> {
        assert!(
            self.pixel >= 0 && self.line >= 0 && self.band >= 0,
            "negative spacing {self:?} is not supported"
        );
        let (width, height) = buffer_size;
        if width == 0 || height == 0 || band_count == 0 {
            return Some(0);
        }
        let last_band = i64::try_from(band_count - 1).ok()?.checked_mul(self.band)?;
        let last_line = i64::try_from(height - 1).ok()?.checked_mul(self.line)?;
        let last_pixel = i64::try_from(width - 1).ok()?.checked_mul(self.pixel)?;
        let last = last_band.checked_add(last_line)?.checked_add(last_pixel)?;
        usize::try_from(last).ok()?.checked_add(elem_size)
    }

    /// Check that a buffer of `len` elements can hold the geometry.
    ///
    /// # Panics
    /// If the buffer is too small. This happens before GDAL is called and signals a
    /// caller bug, not a runtime condition.
    pub fn check_capacity(
        &self,
        buffer_size: (usize, usize),
        band_count: usize,
        elem_size: usize,
        len: usize,
    ) {
        let required = self.required_bytes(buffer_size, band_count, elem_size);
        let available = len.saturating_mul(elem_size);
        match required {
            Some(required) => assert!(
                required <= available,
                "buffer too small: {len} elements of {elem_size} bytes hold {available} bytes, \
                 {}x{} buffer with {band_count} band(s) and spacing {self:?} needs {required}",
                buffer_size.0,
                buffer_size.1,
            ),
            None => panic!(
                "buffer too small: {}x{} buffer with {band_count} band(s) and spacing \
                 {self:?} overflows the address space",
                buffer_size.0, buffer_size.1,
            ),
        }
    }
}
