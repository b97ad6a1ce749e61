//! The conversion boundary between frontend tensor types and the common [`Array`].
//!
//! Every frontend function converts its inputs with [`to_common`], calls a core adapter, and
//! converts the result back with [`to_native`]. Frontend types usually get both directions from
//! `#[derive(Frontend)]`, which forwards to the one field marked `#[frontend]`.

use crate::{
    array::{Array, ArrayError, Layout},
    error::Result,
    num::{DataType, Scalar},
};

pub mod torch;

pub use weft_derive::Frontend;

/// Converts a frontend value into the common array representation.
pub trait IntoCommon<T: Scalar> {
    fn into_common(self) -> Result<Array<T>, ArrayError>;
}

/// Builds a frontend value back from a common array.
pub trait FromCommon<T: Scalar> {
    fn from_common(array: Array<T>) -> Self;
}

impl<T: Scalar> IntoCommon<T> for Array<T> {
    #[inline]
    fn into_common(self) -> Result<Array<T>, ArrayError> {
        Ok(self)
    }
}

impl<T: Scalar> IntoCommon<T> for &Array<T> {
    #[inline]
    fn into_common(self) -> Result<Array<T>, ArrayError> {
        Ok(self.clone())
    }
}

impl<T: Scalar> FromCommon<T> for Array<T> {
    #[inline]
    fn from_common(array: Array<T>) -> Self {
        array
    }
}

/// An untyped, engine-native buffer: raw little-endian bytes tagged with their element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeBuffer {
    pub r#type: DataType,
    pub layout: Layout,
    pub bytes: Vec<u8>,
}

impl<T: Scalar> IntoCommon<T> for NativeBuffer {
    fn into_common(self) -> Result<Array<T>, ArrayError> {
        Array::from_bytes(self.layout, self.r#type, &self.bytes)
    }
}

impl<T: Scalar> IntoCommon<T> for &NativeBuffer {
    fn into_common(self) -> Result<Array<T>, ArrayError> {
        Array::from_bytes(&self.layout, self.r#type, &self.bytes)
    }
}

impl<T: Scalar> FromCommon<T> for NativeBuffer {
    fn from_common(array: Array<T>) -> Self {
        Self {
            r#type: T::DATA_TYPE,
            layout: array.layout(),
            bytes: array.to_bytes(),
        }
    }
}

#[inline]
pub fn to_common<T: Scalar>(x: impl IntoCommon<T>) -> Result<Array<T>> {
    Ok(x.into_common()?)
}

#[inline]
pub fn to_native<T: Scalar, N: FromCommon<T>>(array: Array<T>) -> N {
    N::from_common(array)
}

/// Runs `f` on the common form of `input` and converts its output back.
pub fn adapt<T, U, I, O, F>(input: I, f: F) -> Result<O>
where
    T: Scalar,
    U: Scalar,
    I: IntoCommon<T>,
    O: FromCommon<U>,
    F: FnOnce(Array<T>) -> Result<Array<U>>,
{
    let array = to_common(input)?;
    let output = f(array)?;
    Ok(to_native(output))
}
