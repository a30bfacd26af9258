use std::fmt::{Display, Formatter};

pub use gdal_sys::GDALDataType;
use gdal_sys::{
    GDALDataTypeIsComplex, GDALDataTypeIsFloating, GDALDataTypeIsInteger, GDALDataTypeIsSigned,
    GDALGetDataTypeName, GDALGetDataTypeSizeBytes,
};

use crate::errors::{GdalError, Result};
use crate::utils::_string;

mod sealed {
    pub trait Sealed {}
}

/// Element types that can cross the FFI boundary in a raster I/O call.
///
/// The set is closed; it is implemented for the primitive integer and float types
/// GDAL knows about, and for [`Complex`] pairs.
pub trait GdalType: Copy + Default + sealed::Sealed {
    fn gdal_type() -> GDALDataType::Type;

    fn descriptor() -> GdalTypeDescriptor {
        GdalTypeDescriptor(Self::gdal_type())
    }
}

macro_rules! impl_gdal_type {
    ($($(#[$attr:meta])* $t:ty => $gdt:ident),+ $(,)?) => {
        $(
            $(#[$attr])*
            impl sealed::Sealed for $t {}
            $(#[$attr])*
            impl GdalType for $t {
                fn gdal_type() -> GDALDataType::Type {
                    GDALDataType::$gdt
                }
            }
        )+
    };
}

/// A complex sample, laid out as GDAL expects: real part first.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    pub fn new(re: T, im: T) -> Self {
        Complex { re, im }
    }
}

impl_gdal_type! {
    u8 => GDT_Byte,
    #[cfg(any(major_ge_4, all(major_is_3, minor_ge_7)))]
    i8 => GDT_Int8,
    u16 => GDT_UInt16,
    i16 => GDT_Int16,
    u32 => GDT_UInt32,
    i32 => GDT_Int32,
    #[cfg(any(major_ge_4, all(major_is_3, minor_ge_5)))]
    u64 => GDT_UInt64,
    #[cfg(any(major_ge_4, all(major_is_3, minor_ge_5)))]
    i64 => GDT_Int64,
    f32 => GDT_Float32,
    f64 => GDT_Float64,
    Complex<i16> => GDT_CInt16,
    Complex<i32> => GDT_CInt32,
    Complex<f32> => GDT_CFloat32,
    Complex<f64> => GDT_CFloat64,
}

/// Runtime description of a GDAL data type.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct GdalTypeDescriptor(GDALDataType::Type);

impl GdalTypeDescriptor {
    pub fn gdal_type(&self) -> GDALDataType::Type {
        self.0
    }

    pub fn name(&self) -> String {
        _string(unsafe { GDALGetDataTypeName(self.gdal_type()) })
    }

    /// Size of one sample in bytes, both parts for complex types.
    pub fn bytes(&self) -> usize {
        (unsafe { GDALGetDataTypeSizeBytes(self.gdal_type()) }) as usize
    }

    pub fn bits(&self) -> usize {
        self.bytes() * 8
    }

    pub fn is_integer(&self) -> bool {
        (unsafe { GDALDataTypeIsInteger(self.gdal_type()) }) > 0
    }

    pub fn is_floating(&self) -> bool {
        (unsafe { GDALDataTypeIsFloating(self.gdal_type()) }) > 0
    }

    pub fn is_complex(&self) -> bool {
        (unsafe { GDALDataTypeIsComplex(self.gdal_type()) }) > 0
    }

    pub fn is_signed(&self) -> bool {
        (unsafe { GDALDataTypeIsSigned(self.gdal_type()) }) > 0
    }

    /// The GDAL data types that have a [`GdalType`] implementation.
    pub fn available_types() -> &'static [GdalTypeDescriptor] {
        use GDALDataType::*;
        &[
            GdalTypeDescriptor(GDT_Byte),
            #[cfg(any(major_ge_4, all(major_is_3, minor_ge_7)))]
            GdalTypeDescriptor(GDT_Int8),
            GdalTypeDescriptor(GDT_UInt16),
            GdalTypeDescriptor(GDT_Int16),
            GdalTypeDescriptor(GDT_UInt32),
            GdalTypeDescriptor(GDT_Int32),
            #[cfg(any(major_ge_4, all(major_is_3, minor_ge_5)))]
            GdalTypeDescriptor(GDT_UInt64),
            #[cfg(any(major_ge_4, all(major_is_3, minor_ge_5)))]
            GdalTypeDescriptor(GDT_Int64),
            GdalTypeDescriptor(GDT_Float32),
            GdalTypeDescriptor(GDT_Float64),
            GdalTypeDescriptor(GDT_CInt16),
            GdalTypeDescriptor(GDT_CInt32),
            GdalTypeDescriptor(GDT_CFloat32),
            GdalTypeDescriptor(GDT_CFloat64),
        ]
    }
}

impl Display for GdalTypeDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

impl TryFrom<GDALDataType::Type> for GdalTypeDescriptor {
    type Error = GdalError;

    fn try_from(value: GDALDataType::Type) -> Result<Self> {
        let wrapped = GdalTypeDescriptor(value);
        if !GdalTypeDescriptor::available_types().contains(&wrapped) {
            Err(GdalError::BadArgument(format!(
                "unsupported GDALDataType {value}"
            )))
        } else {
            Ok(wrapped)
        }
    }
}
