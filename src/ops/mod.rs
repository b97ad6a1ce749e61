//! Backend-convention adapters written once against [`Engine`] primitives.
//!
//! Every adapter validates its arguments, checks the engine's dtype table, works in channels-last
//! layout internally, and hands the result back in the caller's [`DataFormat`].

use std::str::FromStr;

use derive_more::Display;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    array::Array,
    engine::Engine,
    error::{Error, Result, ensure, unsupported},
    num::{DataType, Scalar},
};

pub mod activation;
pub mod conv;
pub mod layers;
pub mod pooling;
pub mod sorting;
pub mod statistical;
pub mod vision;

pub use activation::{batch_norm, logit, prelu, relu6, thresholded_relu};
pub use conv::{
    ConvParams, conv_general_dilated, conv_general_transpose, conv1d, conv1d_transpose, conv2d,
    conv2d_transpose, conv3d, conv3d_transpose, depthwise_conv2d, dilate_input,
};
pub use layers::{dropout1d, embedding};
pub use pooling::{
    PoolParams, avg_pool, avg_pool1d, avg_pool2d, avg_pool3d, max_pool, max_pool1d, max_pool2d,
    max_pool3d,
};
pub use sorting::{lexsort, msort};
pub use statistical::{corrcoef, median, nanmean, nanmedian, unravel_index};
pub use vision::{
    InterpolateMode, interpolate, pad, pixel_shuffle, pixel_unshuffle, resolve_output_size,
    torch_pad_widths,
};

/// Where the channel axis sits in a batched array.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataFormat {
    /// `[N, spatial.., C]`, e.g. `NHWC`.
    #[default]
    #[display("channel_last")]
    ChannelsLast,
    /// `[N, C, spatial..]`, e.g. `NCHW`.
    #[display("channel_first")]
    ChannelsFirst,
}

impl FromStr for DataFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NWC" | "NHWC" | "NDHWC" | "channel_last" => Ok(Self::ChannelsLast),
            "NCW" | "NCHW" | "NCDHW" | "channel_first" => Ok(Self::ChannelsFirst),
            _ => Err(Error::InvalidArgument(format!("unknown data format `{s}`"))),
        }
    }
}

impl DataFormat {
    /// Axis of the channels in an array of `rank`.
    #[inline]
    pub fn channel_axis(self, rank: usize) -> usize {
        match self {
            DataFormat::ChannelsLast => rank.saturating_sub(1),
            DataFormat::ChannelsFirst => 1,
        }
    }

    /// Spatial extents of `shape`.
    pub fn spatial(self, shape: &[usize]) -> &[usize] {
        match (self, shape.len()) {
            (_, 0..=2) => &[],
            (DataFormat::ChannelsLast, rank) => &shape[1..rank - 1],
            (DataFormat::ChannelsFirst, _) => &shape[2..],
        }
    }

    /// Transposes an array in this format to `[N, spatial.., C]`.
    pub fn to_channels_last<T: Scalar>(self, x: &Array<T>) -> Result<Array<T>> {
        let rank = x.rank();
        match self {
            DataFormat::ChannelsLast => Ok(x.clone()),
            DataFormat::ChannelsFirst => {
                let axes: Vec<_> = [0].into_iter().chain(2..rank).chain([1]).collect();
                Ok(x.permute(&axes)?)
            }
        }
    }

    /// Transposes a `[N, spatial.., C]` array back to this format.
    pub fn from_channels_last<T: Scalar>(self, x: &Array<T>) -> Result<Array<T>> {
        let rank = x.rank();
        match self {
            DataFormat::ChannelsLast => Ok(x.clone()),
            DataFormat::ChannelsFirst => {
                let axes: Vec<_> = [0, rank - 1].into_iter().chain(1..rank - 1).collect();
                Ok(x.permute(&axes)?)
            }
        }
    }
}

/// Fails with [`Error::UnsupportedConfiguration`] if the engine's dtype table excludes `r#type`
/// from `operation`.
pub fn ensure_supported(engine: &impl Engine, r#type: DataType, operation: &str) -> Result<()> {
    if !engine.supports(r#type, operation) {
        unsupported!(
            "{operation} does not support {} on engine `{}` at version {}",
            r#type,
            engine.name(),
            engine.capabilities().version
        );
    }
    Ok(())
}

/// Checks that `x` is batched with `dims` spatial axes when `dims` is given, or with at least one.
pub(crate) fn spatial_dims<T: Scalar>(x: &Array<T>, dims: Option<usize>, name: &str) -> Result<usize> {
    match dims {
        Some(dims) => ensure!(
            x.rank() == dims + 2,
            "{name} expects a {}-D input, got {}",
            dims + 2,
            x.layout()
        ),
        None => ensure!(
            x.rank() >= 3,
            "{name} expects a batched input with spatial axes, got {}",
            x.layout()
        ),
    }
    Ok(x.rank() - 2)
}

/// Fails if any dilation exceeds 1 on an engine without native dilation.
pub(crate) fn ensure_dilation(engine: &impl Engine, dilation: &[usize], name: &str) -> Result<()> {
    if !engine.capabilities().native_dilation && dilation.iter().any(|&d| d > 1) {
        unsupported!(
            "{name} with dilation {dilation:?} on engine `{}` without native dilation",
            engine.name()
        );
    }
    Ok(())
}
