//! The common array abstraction every adapter converts into before calling an engine.
//!
//! An [`Array`] is an immutable, contiguous, row-major buffer of [`Scalar`](crate::num::Scalar)
//! elements described by a [`Layout`]. Frontend tensors and engine-native buffers are converted
//! to and from it at the [`frontend`](crate::frontend) boundary.

pub mod layout;
pub mod tensor;

pub use layout::{IntoLayout, Layout};
pub use tensor::{Array, ArrayError};
