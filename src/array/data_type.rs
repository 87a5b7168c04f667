//! Data types.
//!
//! See <https://zarr-specs.readthedocs.io/en/latest/v3/core/v3.0.html#data-types>.
//!
//! Elements are appended and retrieved as [`f64`] and converted to and from the data type of the array.
//! All data types are encoded little endian.

use half::f16;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A data type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[rustfmt::skip]
pub enum DataType {
    /// `bool` Boolean.
    Bool,
    /// `int8` Integer in `[-2^7, 2^7-1]`.
    Int8,
    /// `int16` Integer in `[-2^15, 2^15-1]`.
    Int16,
    /// `int32` Integer in `[-2^31, 2^31-1]`.
    Int32,
    /// `int64` Integer in `[-2^63, 2^63-1]`.
    Int64,
    /// `uint8` Integer in `[0, 2^8-1]`.
    UInt8,
    /// `uint16` Integer in `[0, 2^16-1]`.
    UInt16,
    /// `uint32` Integer in `[0, 2^32-1]`.
    UInt32,
    /// `uint64` Integer in `[0, 2^64-1]`.
    UInt64,
    /// `float16` IEEE 754 half-precision floating point: sign bit, 5 bits exponent, 10 bits mantissa.
    Float16,
    /// `float32` IEEE 754 single-precision floating point: sign bit, 8 bits exponent, 23 bits mantissa.
    Float32,
    /// `float64` IEEE 754 double-precision floating point: sign bit, 11 bits exponent, 52 bits mantissa.
    Float64,
}

/// An unsupported data type error.
#[derive(Debug, Error)]
#[error("unsupported data type {0}")]
pub struct UnsupportedDataTypeError(String);

/// A value which cannot be represented by a data type.
#[derive(Debug, Error)]
#[error("value {0} cannot be represented by data type {1}")]
pub struct UnrepresentableValueError(f64, DataType);

/// A fill value metadata incompatibility error.
#[derive(Debug, Error)]
#[error("incompatible fill value {1} for data type {0}")]
pub struct IncompatibleFillValueError(DataType, serde_json::Value);

macro_rules! encode_integer {
    ($value:expr, $data_type:expr, $out:expr, $t:ty) => {{
        let value: $t =
            num::cast($value).ok_or(UnrepresentableValueError($value, $data_type))?;
        $out.extend_from_slice(&value.to_le_bytes());
    }};
}

macro_rules! decode_elements {
    ($bytes:expr, $out:expr, $t:ty, $convert:expr) => {{
        for element in $bytes.chunks_exact(std::mem::size_of::<$t>()) {
            let mut element_bytes = [0u8; std::mem::size_of::<$t>()];
            element_bytes.copy_from_slice(element);
            $out.push($convert(<$t>::from_le_bytes(element_bytes)));
        }
    }};
}

impl DataType {
    /// Returns the name of the data type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Returns the size in bytes of an element of the data type.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Encode `values` as little endian bytes of this data type, appending them to `out`.
    ///
    /// Floating point values are truncated towards zero when encoded as an integer data type.
    /// Any non-zero value encodes to `true` for the `bool` data type.
    ///
    /// # Errors
    /// Returns [`UnrepresentableValueError`] if a value is out of range (or not finite) for an integer data type.
    pub fn encode_into(&self, values: &[f64], out: &mut Vec<u8>) -> Result<(), UnrepresentableValueError> {
        out.reserve(values.len() * self.size());
        for &value in values {
            match self {
                Self::Bool => out.push(u8::from(value != 0.0)),
                Self::Int8 => encode_integer!(value, *self, out, i8),
                Self::Int16 => encode_integer!(value, *self, out, i16),
                Self::Int32 => encode_integer!(value, *self, out, i32),
                Self::Int64 => encode_integer!(value, *self, out, i64),
                Self::UInt8 => encode_integer!(value, *self, out, u8),
                Self::UInt16 => encode_integer!(value, *self, out, u16),
                Self::UInt32 => encode_integer!(value, *self, out, u32),
                Self::UInt64 => encode_integer!(value, *self, out, u64),
                Self::Float16 => out.extend_from_slice(&f16::from_f64(value).to_le_bytes()),
                #[allow(clippy::cast_possible_truncation)]
                Self::Float32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
                Self::Float64 => out.extend_from_slice(&value.to_le_bytes()),
            }
        }
        Ok(())
    }

    /// Decode little endian `bytes` of this data type, appending the elements to `out`.
    ///
    /// Trailing bytes that do not form a whole element are ignored.
    #[allow(clippy::cast_precision_loss)]
    pub fn decode_into(&self, bytes: &[u8], out: &mut Vec<f64>) {
        out.reserve(bytes.len() / self.size());
        match self {
            Self::Bool => out.extend(bytes.iter().map(|&byte| f64::from(u8::from(byte != 0)))),
            Self::Int8 => decode_elements!(bytes, out, i8, f64::from),
            Self::Int16 => decode_elements!(bytes, out, i16, f64::from),
            Self::Int32 => decode_elements!(bytes, out, i32, f64::from),
            Self::Int64 => decode_elements!(bytes, out, i64, |v: i64| v as f64),
            Self::UInt8 => decode_elements!(bytes, out, u8, f64::from),
            Self::UInt16 => decode_elements!(bytes, out, u16, f64::from),
            Self::UInt32 => decode_elements!(bytes, out, u32, f64::from),
            Self::UInt64 => decode_elements!(bytes, out, u64, |v: u64| v as f64),
            Self::Float16 => decode_elements!(bytes, out, f16, f16::to_f64),
            Self::Float32 => decode_elements!(bytes, out, f32, f64::from),
            Self::Float64 => decode_elements!(bytes, out, f64, std::convert::identity),
        }
    }

    /// Create fill value metadata for `fill_value`.
    ///
    /// Non-finite floating point fill values are represented by the strings `"NaN"`, `"Infinity"`, and `"-Infinity"`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn fill_value_metadata(&self, fill_value: f64) -> serde_json::Value {
        match self {
            Self::Bool => serde_json::Value::Bool(fill_value != 0.0),
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 => {
                serde_json::Value::from(fill_value as i64)
            }
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64 => {
                serde_json::Value::from(fill_value as u64)
            }
            Self::Float16 | Self::Float32 | Self::Float64 => {
                if fill_value.is_nan() {
                    serde_json::Value::from("NaN")
                } else if fill_value.is_infinite() {
                    serde_json::Value::from(if fill_value > 0.0 { "Infinity" } else { "-Infinity" })
                } else {
                    serde_json::Value::from(fill_value)
                }
            }
        }
    }

    /// Parse fill value metadata.
    ///
    /// # Errors
    /// Returns [`IncompatibleFillValueError`] if `metadata` is not a valid fill value for the data type.
    pub fn fill_value_from_metadata(
        &self,
        metadata: &serde_json::Value,
    ) -> Result<f64, IncompatibleFillValueError> {
        let incompatible = || IncompatibleFillValueError(*self, metadata.clone());
        match (self, metadata) {
            (Self::Bool, serde_json::Value::Bool(value)) => Ok(f64::from(u8::from(*value))),
            (Self::Bool, _) => Err(incompatible()),
            (Self::Float16 | Self::Float32 | Self::Float64, serde_json::Value::String(value)) => {
                match value.as_str() {
                    "NaN" => Ok(f64::NAN),
                    "Infinity" => Ok(f64::INFINITY),
                    "-Infinity" => Ok(f64::NEG_INFINITY),
                    _ => Err(incompatible()),
                }
            }
            (Self::Float16 | Self::Float32 | Self::Float64, serde_json::Value::Number(number)) => {
                number.as_f64().ok_or_else(incompatible)
            }
            (_, serde_json::Value::Number(number)) if number.is_i64() || number.is_u64() => {
                number.as_f64().ok_or_else(incompatible)
            }
            _ => Err(incompatible()),
        }
    }
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl core::str::FromStr for DataType {
    type Err = UnsupportedDataTypeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "bool" => Ok(Self::Bool),
            "int8" => Ok(Self::Int8),
            "int16" => Ok(Self::Int16),
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "uint8" => Ok(Self::UInt8),
            "uint16" => Ok(Self::UInt16),
            "uint32" => Ok(Self::UInt32),
            "uint64" => Ok(Self::UInt64),
            "float16" => Ok(Self::Float16),
            "float32" => Ok(Self::Float32),
            "float64" => Ok(Self::Float64),
            _ => Err(UnsupportedDataTypeError(name.to_string())),
        }
    }
}
