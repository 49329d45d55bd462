use std::fmt;

use serde::{Deserialize, Serialize};

// DType — Element types of state values
//
// Every array carries a DType. The dtype of a state entry is fixed the first
// time the entry is created; later writes must agree with it.
//
// Values are stored as f64 regardless of dtype and coerced into the dtype's
// domain whenever an array is built:
//
//   F16 / BF16 — rounded through the `half` crate
//   F32        — rounded to single precision
//   F64        — unchanged
//   U8 / U32   — truncated toward zero, saturated to the type's range
//   I32 / I64  — truncated toward zero, saturated to the type's range
//   Bool       — nonzero becomes 1, zero stays 0

/// Enum of all supported element data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F16,
    BF16,
    F32,
    F64,
    U8,
    U32,
    I32,
    I64,
    Bool,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F16 | DType::BF16 => 2,
            DType::F32 | DType::U32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
            DType::U8 | DType::Bool => 1,
        }
    }

    /// Whether this dtype is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F16 | DType::BF16 | DType::F32 | DType::F64)
    }

    /// Whether this dtype is an integer type (signed or unsigned).
    pub fn is_int(&self) -> bool {
        matches!(self, DType::U8 | DType::U32 | DType::I32 | DType::I64)
    }

    /// Coerce an f64 into the value domain of this dtype.
    pub fn coerce(&self, v: f64) -> f64 {
        match self {
            DType::F16 => half::f16::from_f64(v).to_f64(),
            DType::BF16 => half::bf16::from_f64(v).to_f64(),
            DType::F32 => v as f32 as f64,
            DType::F64 => v,
            // `as` casts from float truncate toward zero and saturate.
            DType::U8 => v as u8 as f64,
            DType::U32 => v as u32 as f64,
            DType::I32 => v as i32 as f64,
            DType::I64 => v as i64 as f64,
            DType::Bool => {
                if v != 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::U8 => "u8",
            DType::U32 => "u32",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::Bool => "bool",
        };
        write!(f, "{}", s)
    }
}

// WithDType — Rust scalar types that map onto a DType
//
// Lets callers build arrays from typed slices without naming the dtype:
//
//   Array::from_slice(&[1i32, 2, 3], 3)?   // dtype I32

/// Trait implemented by Rust types that can be stored in an array.
pub trait WithDType: Copy + Send + Sync + 'static + num_traits::NumCast + fmt::Debug {
    /// The corresponding DType enum variant.
    const DTYPE: DType;

    /// Convert this value to f64.
    fn to_f64(self) -> f64 {
        num_traits::cast(self).unwrap_or(f64::NAN)
    }

    /// Create a value of this type from f64, saturating when out of range.
    fn from_f64(v: f64) -> Self;
}

macro_rules! with_dtype {
    ($ty:ty, $dtype:expr) => {
        impl WithDType for $ty {
            const DTYPE: DType = $dtype;
            fn from_f64(v: f64) -> Self {
                v as $ty
            }
        }
    };
}

with_dtype!(f32, DType::F32);
with_dtype!(f64, DType::F64);
with_dtype!(u8, DType::U8);
with_dtype!(u32, DType::U32);
with_dtype!(i32, DType::I32);
with_dtype!(i64, DType::I64);

impl WithDType for half::f16 {
    const DTYPE: DType = DType::F16;
    fn to_f64(self) -> f64 {
        half::f16::to_f64(self)
    }
    fn from_f64(v: f64) -> Self {
        half::f16::from_f64(v)
    }
}

impl WithDType for half::bf16 {
    const DTYPE: DType = DType::BF16;
    fn to_f64(self) -> f64 {
        half::bf16::to_f64(self)
    }
    fn from_f64(v: f64) -> Self {
        half::bf16::from_f64(v)
    }
}
