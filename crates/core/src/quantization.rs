//! Scalar quantization: f32 vectors to fixed-width integers and back.
//!
//! Each f32 vector is compressed independently: components are min-max
//! normalized into \[-1, 1\], scaled by `2^bits - 1`, and floored into the
//! narrowest signed integer width that `bits` fits (i8, i16, or i32).
//!
//! Decoding divides components by the same `2^bits - 1` scale without
//! undoing the per-vector normalization, so decoded vectors live in a shared
//! \[-1, 1\] space and distances between them stay comparable across the
//! corpus without carrying per-vector min/max alongside the data.

use crate::error::{Result, SearchError};

/// A vector as it exists in storage: raw floats or one of the fixed-width
/// integer encodings the codec produces.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorData {
    F32(Vec<f32>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
}

impl VectorData {
    /// Number of components.
    pub fn dim(&self) -> usize {
        match self {
            VectorData::F32(v) => v.len(),
            VectorData::I8(v) => v.len(),
            VectorData::I16(v) => v.len(),
            VectorData::I32(v) => v.len(),
        }
    }

    /// Encoding name, for error reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            VectorData::F32(_) => "f32",
            VectorData::I8(_) => "i8",
            VectorData::I16(_) => "i16",
            VectorData::I32(_) => "i32",
        }
    }
}

/// Min-max scalar quantizer for a fixed per-dimension bit precision.
///
/// `scale` is precomputed as `2^bits - 1` since both encode and decode
/// divide or multiply by it on every component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarCodec {
    bits: u32,
    scale: f32,
}

impl ScalarCodec {
    /// Build a codec for `bits` per dimension. Valid range is 1..=31; the
    /// scale factor `2^bits - 1` must fit a signed 32-bit component.
    pub fn new(bits: u32) -> Result<Self> {
        if !(1..=31).contains(&bits) {
            return Err(SearchError::InvalidParameter(format!(
                "bits per dimension must be in 1..=31, got {}",
                bits
            )));
        }
        Ok(Self {
            bits,
            scale: ((1u32 << bits) - 1) as f32,
        })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// The `2^bits - 1` factor shared by encode and decode.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Quantize a f32 vector into the narrowest signed width that fits
    /// `bits`: i8 up to 8 bits, i16 up to 16, i32 above.
    ///
    /// Constant vectors (range below epsilon) encode as all zeros. At bit
    /// widths that exactly fill the integer type (8, 16), a component at the
    /// vector's own min or max lands outside the signed range; the value
    /// saturates at the type bounds instead of wrapping.
    pub fn encode(&self, vector: &[f32]) -> VectorData {
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for &v in vector {
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
        let range = max - min;

        let scaled = |x: f32| -> f32 {
            if range < f32::EPSILON {
                0.0
            } else {
                (2.0 * ((x - min) / range) - 1.0) * self.scale
            }
        };

        if self.bits <= 8 {
            VectorData::I8(
                vector
                    .iter()
                    .map(|&x| scaled(x).floor().clamp(i8::MIN as f32, i8::MAX as f32) as i8)
                    .collect(),
            )
        } else if self.bits <= 16 {
            VectorData::I16(
                vector
                    .iter()
                    .map(|&x| scaled(x).floor().clamp(i16::MIN as f32, i16::MAX as f32) as i16)
                    .collect(),
            )
        } else {
            VectorData::I32(
                vector
                    .iter()
                    .map(|&x| scaled(x).floor().clamp(i32::MIN as f32, i32::MAX as f32) as i32)
                    .collect(),
            )
        }
    }

    /// Map integer components into the shared distance space (`x / scale`).
    /// Lossy.
    ///
    /// Raw f32 data is not decodable; hitting it means the caller picked a
    /// quantized strategy for a float dataset.
    pub fn decode(&self, data: &VectorData) -> Result<Vec<f32>> {
        match data {
            VectorData::F32(_) => Err(SearchError::VectorEncoding {
                expected: "i8/i16/i32",
                found: data.kind(),
            }),
            VectorData::I8(v) => Ok(v.iter().map(|&x| x as f32 / self.scale).collect()),
            VectorData::I16(v) => Ok(v.iter().map(|&x| x as f32 / self.scale).collect()),
            VectorData::I32(v) => Ok(v.iter().map(|&x| x as f32 / self.scale).collect()),
        }
    }
}
