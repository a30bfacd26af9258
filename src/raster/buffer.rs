use std::marker::PhantomData;

use libc::c_void;

use crate::raster::{GDALDataType, GdalType};

#[cfg(feature = "ndarray")]
use ndarray::Array2;

/// A 2-D array backed by its `size` (cols, rows) and a row-major `Vec<T>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer<T> {
    pub size: (usize, usize),
    pub data: Vec<T>,
}

impl<T: GdalType> Buffer<T> {
    /// Construct a new buffer from `size` (`(cols, rows)`) and `Vec<T>`.
    ///
    /// # Panic
    /// Will panic if `size.0 * size.1 != data.len()`.
    pub fn new(size: (usize, usize), data: Vec<T>) -> Self {
        assert_eq!(
            size.0 * size.1,
            data.len(),
            "size {:?} does not match length {}",
            size,
            data.len()
        );
        Buffer { size, data }
    }

    /// A zero-filled buffer.
    pub fn zeroed(size: (usize, usize)) -> Self {
        Buffer {
            size,
            data: vec![T::default(); size.0 * size.1],
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.size
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    #[cfg(feature = "ndarray")]
    /// Convert `self` into an [`ndarray::Array2`].
    pub fn to_array(self) -> crate::errors::Result<Array2<T>> {
        // Array2 shape is (rows, cols) and Buffer shape is (cols in x-axis, rows in y-axis)
        Array2::from_shape_vec((self.size.1, self.size.0), self.data)
            .map_err(|e| crate::errors::GdalError::BadArgument(e.to_string()))
    }
}

pub type ByteBuffer = Buffer<u8>;

#[cfg(feature = "ndarray")]
impl<T: GdalType> From<Array2<T>> for Buffer<T> {
    fn from(value: Array2<T>) -> Self {
        let (rows, cols) = value.dim();
        let data = value.as_standard_layout().iter().copied().collect();
        Buffer::new((cols, rows), data)
    }
}

/// Untyped view of a typed slice, in the form GDAL's I/O functions take it.
///
/// The view borrows the slice, so the storage cannot move while a native call
/// holds the pointer.
pub(crate) struct RawBuffer<'a> {
    ptr: *mut c_void,
    data_type: GDALDataType::Type,
    elem_size: usize,
    len: usize,
    _borrow: PhantomData<&'a mut [u8]>,
}

impl<'a> RawBuffer<'a> {
    pub(crate) fn from_slice_mut<T: GdalType>(data: &'a mut [T]) -> Self {
        RawBuffer {
            ptr: data.as_mut_ptr() as *mut c_void,
            data_type: T::gdal_type(),
            elem_size: std::mem::size_of::<T>(),
            len: data.len(),
            _borrow: PhantomData,
        }
    }

    /// View for `GF_Write` transfers, during which GDAL only reads the buffer.
    pub(crate) fn from_slice<T: GdalType>(data: &'a [T]) -> Self {
        RawBuffer {
            ptr: data.as_ptr() as *mut c_void,
            data_type: T::gdal_type(),
            elem_size: std::mem::size_of::<T>(),
            len: data.len(),
            _borrow: PhantomData,
        }
    }

    pub(crate) fn as_ptr(&self) -> *mut c_void {
        self.ptr
    }

    pub(crate) fn data_type(&self) -> GDALDataType::Type {
        self.data_type
    }

    pub(crate) fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// Length in elements.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Pointer to the element `byte_offset` bytes into the buffer.
    ///
    /// The caller must have validated the offset against the capacity.
    pub(crate) unsafe fn offset_ptr(&self, byte_offset: usize) -> *mut c_void {
        (self.ptr as *mut u8).add(byte_offset) as *mut c_void
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Complex;

    #[test]
    fn marshal_reports_type_and_width() {
        let mut data = vec![0_u16; 6];
        let raw = RawBuffer::from_slice_mut(&mut data);
        assert_eq!(raw.data_type(), GDALDataType::GDT_UInt16);
        assert_eq!(raw.elem_size(), 2);
        assert_eq!(raw.len(), 6);

        let data = [Complex::new(1.0_f32, 2.0)];
        let raw = RawBuffer::from_slice(&data);
        assert_eq!(raw.data_type(), GDALDataType::GDT_CFloat32);
        assert_eq!(raw.elem_size(), 8);
    }

    #[test]
    #[should_panic(expected = "does not match length")]
    fn buffer_size_mismatch() {
        Buffer::new((2, 2), vec![0_u8; 3]);
    }

    #[cfg(feature = "ndarray")]
    #[test]
    fn convert_from_array() {
        let a = Array2::from_shape_fn((10, 5), |(y, x)| y as i32 * 10 + x as i32);
        let b: Buffer<_> = a.clone().into();
        assert_eq!(b.size, (5, 10));
        assert_eq!(b.to_array().unwrap(), a);
    }
}
