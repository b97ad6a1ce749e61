//! `weft` lets code written against one numeric-array calling convention run against any dense
//! array engine that implements a narrow primitive interface.
//!
//! ## Key Components
//! 1. **Window Normalization**:
//!    - Resolves symbolic and explicit padding for windowed operations of any spatial rank.
//!    - Ceil-mode window counting, with rollback of windows that would read only padding.
//!
//! 2. **Engine Abstraction**:
//!    - The [`Engine`](engine::Engine) trait: padding, window reduction, convolution, matmul and
//!      sorting primitives.
//!    - A reference CPU engine, with optional `rayon` parallel kernels.
//!
//! 3. **Adapters**:
//!    - Pooling, forward and transposed convolution, vision, activation, statistics, layer and
//!      sorting operations written once over the engine primitives, restoring the caller's data
//!      format.
//!    - Per-engine dtype exclusion tables consulted before any work is dispatched.
//!
//! 4. **Conversion Boundary**:
//!    - Frontend tensors are converted to the common [`Array`](array::Array) and back, explicitly,
//!      at every call site.
//!
//! All operations are synchronous and pure apart from logging.

pub mod array;
pub mod capability;
pub mod engine;
pub mod error;
pub mod frontend;
pub mod num;
pub mod ops;
pub mod window;

pub use error::{Error, Result};
