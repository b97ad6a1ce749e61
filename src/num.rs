use std::str::FromStr;

use bytemuck::Pod;
use derive_more::Display;
use half::{bf16, f16};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Element types as named by the array ecosystems this crate bridges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataType {
    #[display("bool")]
    Bool,
    #[display("uint8")]
    U8,
    #[display("int32")]
    I32,
    #[display("int64")]
    I64,
    #[display("float16")]
    F16,
    #[display("bfloat16")]
    BF16,
    #[display("float32")]
    F32,
    #[display("float64")]
    F64,
    #[display("complex64")]
    Complex64,
    #[display("complex128")]
    Complex128,
}

impl DataType {
    pub const ALL: [DataType; 10] = [
        DataType::Bool,
        DataType::U8,
        DataType::I32,
        DataType::I64,
        DataType::F16,
        DataType::BF16,
        DataType::F32,
        DataType::F64,
        DataType::Complex64,
        DataType::Complex128,
    ];

    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            DataType::Bool => 1,
            DataType::U8 => 1,
            DataType::I32 => 4,
            DataType::I64 => 8,
            DataType::F16 => 2,
            DataType::BF16 => 2,
            DataType::F32 => 4,
            DataType::F64 => 8,
            DataType::Complex64 => 8,
            DataType::Complex128 => 16,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(
            self,
            DataType::F16 | DataType::BF16 | DataType::F32 | DataType::F64
        )
    }

    pub const fn is_complex(self) -> bool {
        matches!(self, DataType::Complex64 | DataType::Complex128)
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .into_iter()
            .find(|r#type| r#type.to_string() == s)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown data type `{s}`")))
    }
}

pub trait Zero {
    fn zero() -> Self;
}

impl Zero for f32 {
    fn zero() -> Self {
        0.0
    }
}

impl Zero for f64 {
    fn zero() -> Self {
        0.0
    }
}

impl Zero for f16 {
    fn zero() -> Self {
        Self::ZERO
    }
}

impl Zero for bf16 {
    fn zero() -> Self {
        Self::ZERO
    }
}

impl Zero for u8 {
    fn zero() -> Self {
        0
    }
}

impl Zero for i32 {
    fn zero() -> Self {
        0
    }
}

impl Zero for i64 {
    fn zero() -> Self {
        0
    }
}

pub trait One {
    fn one() -> Self;
}

impl One for f32 {
    fn one() -> Self {
        1.0
    }
}

impl One for f64 {
    fn one() -> Self {
        1.0
    }
}

impl One for f16 {
    fn one() -> Self {
        Self::ONE
    }
}

impl One for bf16 {
    fn one() -> Self {
        Self::ONE
    }
}

impl One for u8 {
    fn one() -> Self {
        1
    }
}

impl One for i32 {
    fn one() -> Self {
        1
    }
}

impl One for i64 {
    fn one() -> Self {
        1
    }
}

pub trait Scalar:
    Sized + Pod + Zero + One + PartialOrd + Send + Sync + std::fmt::Debug + sealed::Sealed
{
    const DATA_TYPE: DataType;
}

/// Floating point scalars. Kernels accumulate in `f64` and convert back.
pub trait Float: Scalar {
    const INFINITY: Self;
    const NEG_INFINITY: Self;

    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl Scalar for f32 {
    const DATA_TYPE: DataType = DataType::F32;
}

impl Scalar for f64 {
    const DATA_TYPE: DataType = DataType::F64;
}

impl Scalar for f16 {
    const DATA_TYPE: DataType = DataType::F16;
}

impl Scalar for bf16 {
    const DATA_TYPE: DataType = DataType::BF16;
}

impl Scalar for u8 {
    const DATA_TYPE: DataType = DataType::U8;
}

impl Scalar for i32 {
    const DATA_TYPE: DataType = DataType::I32;
}

impl Scalar for i64 {
    const DATA_TYPE: DataType = DataType::I64;
}

impl Float for f32 {
    const INFINITY: Self = f32::INFINITY;
    const NEG_INFINITY: Self = f32::NEG_INFINITY;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Float for f64 {
    const INFINITY: Self = f64::INFINITY;
    const NEG_INFINITY: Self = f64::NEG_INFINITY;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}

impl Float for f16 {
    const INFINITY: Self = f16::INFINITY;
    const NEG_INFINITY: Self = f16::NEG_INFINITY;

    #[inline]
    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        f16::from_f64(value)
    }
}

impl Float for bf16 {
    const INFINITY: Self = bf16::INFINITY;
    const NEG_INFINITY: Self = bf16::NEG_INFINITY;

    #[inline]
    fn to_f64(self) -> f64 {
        bf16::to_f64(self)
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        bf16::from_f64(value)
    }
}

mod sealed {
    use half::{bf16, f16};

    pub trait Sealed {}

    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for f16 {}
    impl Sealed for bf16 {}
    impl Sealed for u8 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use half::f16;

    use super::{DataType, Float};

    #[test]
    fn test_data_type_names() -> Result<(), Box<dyn Error>> {
        for r#type in DataType::ALL {
            let parsed: DataType = r#type.to_string().parse()?;
            assert_eq!(parsed, r#type);
        }
        assert_eq!(DataType::BF16.to_string(), "bfloat16");
        assert!("bfloat32".parse::<DataType>().is_err());
        Ok(())
    }

    #[test]
    fn test_half_conversion() {
        let x = <f16 as Float>::from_f64(1.5);
        assert_eq!(Float::to_f64(x), 1.5);
        assert!(<f16 as Float>::NEG_INFINITY < <f16 as Float>::from_f64(-65504.0));
    }
}
