use std::sync::Arc;

use casey::snake;
use derive_more::{Deref, Display};
use itertools::Itertools;

/// Row-major shape of a contiguous array.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Deref, Display)]
#[deref(forward)]
#[display("[{}]", _0.iter().format(", "))]
pub struct Layout(Arc<[usize]>);

impl Layout {
    #[inline]
    pub fn from_shape(shape: impl Into<Arc<[usize]>>) -> Self {
        Self(shape.into())
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.0
    }

    /// Number of elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.0.iter().product()
    }

    /// Row-major strides, in elements.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.0.len()];
        for axis in (0..self.0.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.0[axis + 1];
        }
        strides
    }

    #[inline]
    pub fn stride_of(&self, axis: usize) -> usize {
        self.0[axis + 1..].iter().product()
    }

    /// Linear offset of a multi-index. The index must be in bounds.
    #[inline]
    pub fn offset_of(&self, index: &[usize]) -> usize {
        index
            .iter()
            .zip_eq(self.0.iter())
            .fold(0, |offset, (&i, &n)| offset * n + i)
    }

    /// Multi-index of a linear offset.
    pub fn unravel(&self, mut offset: usize) -> Vec<usize> {
        let mut index = vec![0; self.0.len()];
        for (axis, &n) in self.0.iter().enumerate().rev() {
            index[axis] = offset % n.max(1);
            offset /= n.max(1);
        }
        index
    }

    /// Returns `true` if every coordinate is within the shape.
    #[inline]
    pub fn contains(&self, index: &[usize]) -> bool {
        index.len() == self.0.len() && index.iter().zip(self.0.iter()).all(|(&i, &n)| i < n)
    }

    /// Replaces the extent of one axis.
    pub fn with_axis(&self, axis: usize, extent: usize) -> Self {
        let mut shape = self.0.to_vec();
        shape[axis] = extent;
        Self::from_shape(shape)
    }
}

pub trait IntoLayout {
    fn into_layout(self) -> Layout;
}

impl IntoLayout for Layout {
    #[inline]
    fn into_layout(self) -> Layout {
        self
    }
}

impl IntoLayout for &Layout {
    #[inline]
    fn into_layout(self) -> Layout {
        self.clone()
    }
}

impl IntoLayout for usize {
    #[inline]
    fn into_layout(self) -> Layout {
        Layout::from_shape([self])
    }
}

impl<const N: usize> IntoLayout for [usize; N] {
    #[inline]
    fn into_layout(self) -> Layout {
        Layout::from_shape(self)
    }
}

impl IntoLayout for &[usize] {
    #[inline]
    fn into_layout(self) -> Layout {
        Layout::from_shape(self)
    }
}

impl IntoLayout for Vec<usize> {
    #[inline]
    fn into_layout(self) -> Layout {
        Layout::from_shape(self)
    }
}

macro_rules! impl_into_layout {
    (@usize $t:ident) => {
        usize
    };
    ($($t:ident),+) => {
        impl IntoLayout for ($(impl_into_layout!(@usize $t)),+) {
            #[inline]
            fn into_layout(self) -> Layout {
                let ($(snake!($t)),+) = self;
                Layout::from_shape([$(snake!($t)),+])
            }
        }
    };
}

impl_into_layout!(T0, T1);
impl_into_layout!(T0, T1, T2);
impl_into_layout!(T0, T1, T2, T3);
impl_into_layout!(T0, T1, T2, T3, T4);
impl_into_layout!(T0, T1, T2, T3, T4, T5);
