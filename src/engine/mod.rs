//! The narrow primitive interface every dense-array engine implements.
//!
//! Adapters in [`ops`](crate::ops) are written once against [`Engine`]. All windowed primitives
//! work channels-last (`[N, spatial.., C]`) in "valid" mode: padding is resolved by the
//! [`WindowNormalizer`](crate::window::WindowNormalizer) and applied through [`Engine::pad`]
//! before they are called.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    array::Array,
    capability::{DtypeTable, Version},
    error::Result,
    num::{DataType, Float, Scalar},
};

pub mod cpu;

pub use cpu::{Cpu, CpuBuilder};

/// How [`Engine::pad`] fills the border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PadMode<T> {
    /// Fill with a value.
    Constant(T),
    /// Repeat the edge element.
    Edge,
    /// Mirror around the edge element, excluding it. Requires `pad < extent`.
    Reflect,
    /// Wrap around periodically.
    Wrap,
}

impl<T: Scalar> Default for PadMode<T> {
    fn default() -> Self {
        Self::Constant(T::zero())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ReduceKind {
    #[default]
    Max,
    Sum,
}

/// A window reduction over every spatial axis of a channels-last array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReduceWindowSpec {
    pub window: Vec<usize>,
    pub strides: Vec<usize>,
    pub dilation: Vec<usize>,
    pub reduce: ReduceKind,
}

/// A grouped convolution over every spatial axis of a channels-last array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConvSpec {
    pub strides: Vec<usize>,
    pub dilation: Vec<usize>,
    pub groups: usize,
}

/// What an engine can do.
#[derive(Debug, Default, Clone)]
pub struct Capabilities {
    /// Version the dtype table is evaluated at.
    pub version: Version,
    /// Whether [`Engine::conv`] and [`Engine::reduce_window`] accept kernel dilation.
    pub native_dilation: bool,
    pub dtypes: DtypeTable,
}

pub trait Engine: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> &Capabilities;

    /// Pads every axis by `(before, after)`.
    fn pad<T: Scalar>(
        &self,
        x: &Array<T>,
        pads: &[(usize, usize)],
        mode: PadMode<T>,
    ) -> Result<Array<T>>;

    /// Reduces windows of `[N, spatial.., C]` in "valid" mode.
    fn reduce_window<T: Float>(&self, x: &Array<T>, spec: &ReduceWindowSpec) -> Result<Array<T>>;

    /// Convolves `[N, spatial.., C_in]` with filters `[k.., C_in / groups, C_out]` in "valid" mode.
    fn conv<T: Float>(&self, x: &Array<T>, filters: &Array<T>, spec: &ConvSpec)
    -> Result<Array<T>>;

    /// Multiplies `[.., K]` by `[K, N]`.
    fn matmul<T: Float>(&self, lhs: &Array<T>, rhs: &Array<T>) -> Result<Array<T>>;

    /// Stable indices that sort `x` along `axis`, with NaN last.
    fn argsort<T: Scalar>(&self, x: &Array<T>, axis: usize) -> Result<Array<i64>>;

    /// Whether `operation` supports `r#type` at this engine's version.
    fn supports(&self, r#type: DataType, operation: &str) -> bool {
        let capabilities = self.capabilities();
        capabilities
            .dtypes
            .supports(r#type, operation, capabilities.version)
    }
}
