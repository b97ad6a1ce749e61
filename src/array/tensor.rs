use std::sync::Arc;

use itertools::Itertools;
use thiserror::Error;

use super::layout::{IntoLayout, Layout};
use crate::num::{DataType, One, Scalar, Zero};

#[derive(Debug, Error)]
pub enum ArrayError {
    #[error("array type error: data type {0} mismatches {1}")]
    Type(DataType, DataType),
    #[error("array creation error: layout {0}'s size not match data len {1}")]
    Create(Layout, usize),
    #[error("array reshape error: layout {0}'s size not match layout {1}'s")]
    Reshape(Layout, Layout),
    #[error("array cast error: byte len {0} is not a multiple of element size {1}")]
    Cast(usize, usize),
    #[error("array permute error: axes {1:?} is not a permutation of layout {0}")]
    Permute(Layout, Vec<usize>),
    #[error("array index error: index {1:?} is out of bounds of layout {0}")]
    Index(Layout, Vec<usize>),
    #[error("array axis error: axis {1} is out of range of layout {0}")]
    Axis(Layout, isize),
    #[error("array layout error: layout {0} mismatches layout {1}")]
    Mismatch(Layout, Layout),
}

/// The common array every adapter computes on: an immutable, contiguous, row-major buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Array<T> {
    layout: Layout,
    data: Arc<[T]>,
}

impl<T: Scalar> Array<T> {
    /// Create an array with the given layout and contents.
    pub fn create<L, C>(layout: L, contents: C) -> Result<Self, ArrayError>
    where
        L: IntoLayout,
        C: Into<Arc<[T]>>,
    {
        let layout = layout.into_layout();
        let data: Arc<[T]> = contents.into();
        if layout.size() != data.len() {
            return Err(ArrayError::Create(layout, data.len()));
        }
        Ok(Self { layout, data })
    }

    /// Create an array filled with `value`.
    #[inline]
    pub fn full(layout: impl IntoLayout, value: T) -> Self {
        let layout = layout.into_layout();
        let data = vec![value; layout.size()].into();
        Self { layout, data }
    }

    /// Create an array of zeros.
    #[inline]
    pub fn zeros(layout: impl IntoLayout) -> Self {
        Self::full(layout, T::zero())
    }

    /// Create an array of ones.
    #[inline]
    pub fn ones(layout: impl IntoLayout) -> Self {
        Self::full(layout, T::one())
    }

    /// Create an array by evaluating `f` at every multi-index, in row-major order.
    pub fn from_fn(layout: impl IntoLayout, mut f: impl FnMut(&[usize]) -> T) -> Self {
        let layout = layout.into_layout();
        let data = (0..layout.size())
            .map(|offset| f(&layout.unravel(offset)))
            .collect_vec()
            .into();
        Self { layout, data }
    }

    /// Reinterpret raw bytes of type `r#type` as an array. Fails if the type mismatches.
    pub fn from_bytes(
        layout: impl IntoLayout,
        r#type: DataType,
        bytes: &[u8],
    ) -> Result<Self, ArrayError> {
        if r#type != T::DATA_TYPE {
            return Err(ArrayError::Type(r#type, T::DATA_TYPE));
        }
        if bytes.len() % size_of::<T>() != 0 {
            return Err(ArrayError::Cast(bytes.len(), size_of::<T>()));
        }
        let data: Vec<T> = bytemuck::pod_collect_to_vec(bytes);
        Self::create(layout, data)
    }

    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice::<T, u8>(self.data()).to_vec()
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout.clone()
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.layout.len()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        T::DATA_TYPE
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn to_vec(&self) -> Vec<T> {
        self.data.to_vec()
    }

    /// Element at a multi-index, or `None` if out of bounds.
    #[inline]
    pub fn get(&self, index: &[usize]) -> Option<T> {
        self.layout
            .contains(index)
            .then(|| self.data[self.layout.offset_of(index)])
    }

    /// Resolves a possibly negative axis.
    pub fn normalize_axis(&self, axis: isize) -> Result<usize, ArrayError> {
        let rank = self.rank() as isize;
        let resolved = if axis < 0 { axis + rank } else { axis };
        match (0..rank).contains(&resolved) {
            true => Ok(resolved as usize),
            false => Err(ArrayError::Axis(self.layout(), axis)),
        }
    }

    /// Reshape the array, leaving the underlying data untouched.
    #[inline]
    pub fn reshape(&self, layout: impl IntoLayout) -> Result<Self, ArrayError> {
        let layout = layout.into_layout();
        if self.layout.size() != layout.size() {
            return Err(ArrayError::Reshape(self.layout(), layout));
        }
        let data = self.data.clone();
        Ok(Self { layout, data })
    }

    /// Reorder the axes so that output axis `i` is input axis `axes[i]`. Copies the data.
    pub fn permute(&self, axes: &[usize]) -> Result<Self, ArrayError> {
        let valid = axes.len() == self.rank()
            && axes.iter().all_unique()
            && axes.iter().all(|&axis| axis < self.rank());
        if !valid {
            return Err(ArrayError::Permute(self.layout(), axes.to_vec()));
        }
        if axes.iter().enumerate().all(|(i, &axis)| i == axis) {
            return Ok(self.clone());
        }

        let shape = axes.iter().map(|&axis| self.shape()[axis]).collect_vec();
        let strides = self.layout.strides();
        let strides = axes.iter().map(|&axis| strides[axis]).collect_vec();
        Ok(Self::from_fn(shape, |index| {
            let offset: usize = index.iter().zip(strides.iter()).map(|(i, s)| i * s).sum();
            self.data[offset]
        }))
    }

    /// Swap two axes. Copies the data.
    pub fn swap_axes(&self, a: usize, b: usize) -> Result<Self, ArrayError> {
        let mut axes = (0..self.rank()).collect_vec();
        if a >= axes.len() || b >= axes.len() {
            return Err(ArrayError::Permute(self.layout(), vec![a, b]));
        }
        axes.swap(a, b);
        self.permute(&axes)
    }

    #[inline]
    pub fn map<U: Scalar>(&self, f: impl Fn(T) -> U) -> Array<U> {
        let layout = self.layout();
        let data = self.data.iter().map(|&x| f(x)).collect_vec().into();
        Array { layout, data }
    }

    /// Like [`Array::map`], with the multi-index of every element.
    pub fn map_indexed<U: Scalar>(&self, f: impl Fn(&[usize], T) -> U) -> Array<U> {
        let layout = self.layout();
        let data = self
            .data
            .iter()
            .enumerate()
            .map(|(offset, &x)| f(&layout.unravel(offset), x))
            .collect_vec()
            .into();
        Array { layout, data }
    }

    /// Combine two arrays of the same layout elementwise.
    pub fn zip_with<U: Scalar, V: Scalar>(
        &self,
        rhs: &Array<U>,
        f: impl Fn(T, U) -> V,
    ) -> Result<Array<V>, ArrayError> {
        if self.layout != rhs.layout {
            return Err(ArrayError::Mismatch(self.layout(), rhs.layout()));
        }
        let layout = self.layout();
        let data = self
            .data
            .iter()
            .zip_eq(rhs.data.iter())
            .map(|(&x, &y)| f(x, y))
            .collect_vec()
            .into();
        Ok(Array { layout, data })
    }

    /// Gather elements of a rank-1 array.
    pub fn take(&self, indices: &Array<i64>) -> Result<Self, ArrayError> {
        if self.rank() != 1 {
            return Err(ArrayError::Axis(self.layout(), 1));
        }
        let data = indices
            .data()
            .iter()
            .map(|&index| {
                usize::try_from(index)
                    .ok()
                    .and_then(|index| self.data.get(index).copied())
                    .ok_or_else(|| ArrayError::Index(self.layout(), vec![index.max(0) as usize]))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::create(indices.layout(), data)
    }

    /// Gather along `axis` with an index array of the same layout.
    pub fn take_along_axis(&self, indices: &Array<i64>, axis: usize) -> Result<Self, ArrayError> {
        if indices.layout != self.layout {
            return Err(ArrayError::Mismatch(self.layout(), indices.layout()));
        }
        if axis >= self.rank() {
            return Err(ArrayError::Axis(self.layout(), axis as isize));
        }
        let extent = self.shape()[axis];
        let data = indices
            .data()
            .iter()
            .enumerate()
            .map(|(offset, &index)| {
                let mut position = self.layout.unravel(offset);
                match usize::try_from(index) {
                    Ok(index) if index < extent => {
                        position[axis] = index;
                        Ok(self.data[self.layout.offset_of(&position)])
                    }
                    _ => Err(ArrayError::Index(self.layout(), position)),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::create(self.layout(), data)
    }
}
