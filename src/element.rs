//! Pixel types and the sample [`Element`] trait.
//!
//! The remote store reports the pixel type of an image once, in its pixels metadata.
//! Each supported [`PixelType`] maps to exactly one Rust sample type implementing [`Element`],
//! and the cache layers are generic over that type.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A pixel type as reported by the remote store.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[rustfmt::skip]
pub enum PixelType {
    /// `bit` A single bit per pixel.
    #[display("bit")]
    Bit,
    /// `int8` Integer in `[-2^7, 2^7-1]`.
    #[display("int8")]
    Int8,
    /// `uint8` Integer in `[0, 2^8-1]`.
    #[display("uint8")]
    UInt8,
    /// `int16` Integer in `[-2^15, 2^15-1]`.
    #[display("int16")]
    Int16,
    /// `uint16` Integer in `[0, 2^16-1]`.
    #[display("uint16")]
    UInt16,
    /// `int32` Integer in `[-2^31, 2^31-1]`.
    #[display("int32")]
    Int32,
    /// `uint32` Integer in `[0, 2^32-1]`.
    #[display("uint32")]
    UInt32,
    /// `float` IEEE 754 single-precision floating point.
    #[display("float")]
    Float,
    /// `double` IEEE 754 double-precision floating point.
    #[display("double")]
    Double,
    /// `complex` Single-precision complex.
    #[display("complex")]
    Complex,
    /// `double-complex` Double-precision complex.
    #[serde(rename = "double-complex")]
    #[display("double-complex")]
    DoubleComplex,
}

impl PixelType {
    /// Returns the size in bytes of a sample, or [`None`] for pixel types without a sample type.
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        match self {
            Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float => Some(4),
            Self::Double => Some(8),
            Self::Bit | Self::Complex | Self::DoubleComplex => None,
        }
    }

    /// Returns true if the pixel type can be represented by an [`Element`].
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.size().is_some()
    }
}

/// An unsupported pixel type error.
#[derive(Copy, Clone, Debug, Error)]
#[error("unsupported pixel type {0}")]
pub struct UnsupportedPixelTypeError(pub PixelType);

/// A sample type of a cached image.
///
/// Samples are delivered by the remote store as `f64` and converted exactly with [`Element::from_f64`].
pub trait Element:
    Copy + Default + PartialEq + std::fmt::Debug + bytemuck::Pod + num::NumCast + Send + Sync + 'static
{
    /// The pixel type of this element.
    const PIXEL_TYPE: PixelType;

    /// Convert a remote sample to this element.
    ///
    /// Returns [`None`] if `value` is not representable (out of range or not finite for integers).
    #[must_use]
    fn from_f64(value: f64) -> Option<Self> {
        num::NumCast::from(value)
    }

    /// Convert this element to `f64`, as used by interpolation.
    #[must_use]
    fn as_f64(self) -> f64 {
        num::ToPrimitive::to_f64(&self).unwrap_or_default()
    }
}

macro_rules! impl_element {
    ($t:ty, $pixel_type:expr) => {
        impl Element for $t {
            const PIXEL_TYPE: PixelType = $pixel_type;
        }
    };
}

impl_element!(i8, PixelType::Int8);
impl_element!(u8, PixelType::UInt8);
impl_element!(i16, PixelType::Int16);
impl_element!(u16, PixelType::UInt16);
impl_element!(i32, PixelType::Int32);
impl_element!(u32, PixelType::UInt32);
impl_element!(f32, PixelType::Float);
impl_element!(f64, PixelType::Double);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_type_names() {
        assert_eq!(PixelType::UInt16.to_string(), "uint16");
        assert_eq!(
            serde_json::to_string(&PixelType::DoubleComplex).unwrap(),
            r#""double-complex""#
        );
        let pixel_type: PixelType = serde_json::from_str(r#""float""#).unwrap();
        assert_eq!(pixel_type, PixelType::Float);
        assert_eq!(pixel_type.size(), Some(4));
        assert!(!PixelType::Bit.is_supported());
    }

    #[test]
    fn element_conversion() {
        assert_eq!(u16::from_f64(65535.0), Some(u16::MAX));
        assert_eq!(u16::from_f64(65536.0), None);
        assert_eq!(u8::from_f64(-1.0), None);
        assert_eq!(i16::from_f64(-3.0), Some(-3));
        assert_eq!(u32::from_f64(f64::NAN), None);
        assert_eq!(f32::from_f64(0.5), Some(0.5));
        assert_eq!(<u16 as Element>::PIXEL_TYPE, PixelType::UInt16);
        assert!((7u8.as_f64() - 7.0).abs() < f64::EPSILON);
    }
}
