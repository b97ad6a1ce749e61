use itertools::Itertools;

use super::{DataFormat, ensure_dilation, ensure_supported, spatial_dims};
use crate::{
    array::Array,
    engine::{ConvSpec, Engine, PadMode},
    error::{Error, Result, ensure},
    num::Float,
    window::{
        PaddingSpec, ResolvedAxis, Spatial, WindowNormalizer, WindowSpec, output_extent,
        resolve_symbolic_padding, transpose_output_extent,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvParams {
    pub strides: Spatial,
    pub padding: PaddingSpec,
    /// Kernel dilation.
    pub dilation: Spatial,
    /// Input dilation: `d - 1` zeros are inserted between neighboring input elements.
    pub input_dilation: Spatial,
    pub groups: usize,
    pub data_format: DataFormat,
}

impl Default for ConvParams {
    fn default() -> Self {
        Self {
            strides: Spatial::default(),
            padding: PaddingSpec::default(),
            dilation: Spatial::default(),
            input_dilation: Spatial::default(),
            groups: 1,
            data_format: DataFormat::default(),
        }
    }
}

impl ConvParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strides(mut self, strides: impl Into<Spatial>) -> Self {
        self.strides = strides.into();
        self
    }

    pub fn with_padding(mut self, padding: impl Into<PaddingSpec>) -> Self {
        self.padding = padding.into();
        self
    }

    pub fn with_dilation(mut self, dilation: impl Into<Spatial>) -> Self {
        self.dilation = dilation.into();
        self
    }

    pub fn with_input_dilation(mut self, input_dilation: impl Into<Spatial>) -> Self {
        self.input_dilation = input_dilation.into();
        self
    }

    pub fn with_groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_data_format(mut self, data_format: DataFormat) -> Self {
        self.data_format = data_format;
        self
    }
}

/// Inserts `factor - 1` zeros between neighboring elements along `axis`.
///
/// The axis is swapped last and multiplied by the rows of an identity matrix taken with step
/// `factor`, then swapped back.
pub fn dilate_input<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    axis: usize,
    factor: usize,
) -> Result<Array<T>> {
    ensure!(factor >= 1, "input dilation must be >= 1, got {factor}");
    ensure!(
        axis < x.rank(),
        "axis {axis} out of range for {}",
        x.layout()
    );
    let extent = x.shape()[axis];
    if factor == 1 || extent <= 1 {
        return Ok(x.clone());
    }

    let dilated = extent + (extent - 1) * (factor - 1);
    let identity = Array::from_fn([extent, dilated], |index| {
        match index[1] == index[0] * factor {
            true => T::one(),
            false => T::zero(),
        }
    });

    let last = x.rank() - 1;
    let swapped = x.swap_axes(axis, last)?;
    let output = engine.matmul(&swapped, &identity)?;
    Ok(output.swap_axes(axis, last)?)
}

fn conv_nd<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    filters: &Array<T>,
    bias: Option<&Array<T>>,
    params: &ConvParams,
    dims: Option<usize>,
    name: &str,
) -> Result<Array<T>> {
    let dims = spatial_dims(x, dims, name)?;
    ensure_supported(engine, T::DATA_TYPE, name)?;
    ensure!(
        filters.rank() == dims + 2,
        "{name} expects filters [k.., C_in / groups, C_out] of rank {}, got {}",
        dims + 2,
        filters.layout()
    );

    let strides = params.strides.broadcast(dims, "strides")?;
    let dilation = params.dilation.broadcast(dims, "dilation")?;
    let input_dilation = params.input_dilation.broadcast(dims, "input dilation")?;
    ensure_dilation(engine, &dilation, name)?;

    let mut x = params.data_format.to_channels_last(x)?;
    for (axis, &factor) in input_dilation.iter().enumerate() {
        x = dilate_input(engine, &x, axis + 1, factor)?;
    }

    let windows = itertools::izip!(&filters.shape()[..dims], &strides, &dilation)
        .map(|(&kernel, &stride, &dilation)| WindowSpec::new(kernel, stride, dilation))
        .collect::<Result<Vec<_>>>()?;
    let resolved = WindowNormalizer::new().normalize(&x.shape()[1..=dims], &windows, &params.padding)?;

    let pads = [(0, 0)]
        .into_iter()
        .chain(resolved.iter().map(ResolvedAxis::pads))
        .chain([(0, 0)])
        .collect_vec();
    let padded = engine.pad(&x, &pads, PadMode::Constant(T::zero()))?;
    let spec = ConvSpec {
        strides,
        dilation,
        groups: params.groups,
    };
    let output = engine.conv(&padded, filters, &spec)?;
    let output = add_bias(output, bias, filters.shape()[dims + 1])?;
    params.data_format.from_channels_last(&output)
}

/// Adds a `[features]` bias along the last axis.
fn add_bias<T: Float>(
    output: Array<T>,
    bias: Option<&Array<T>>,
    features: usize,
) -> Result<Array<T>> {
    let Some(bias) = bias else {
        return Ok(output);
    };
    ensure!(
        bias.shape() == [features],
        "bias {} must be [{features}]",
        bias.layout()
    );
    let channel = output.rank() - 1;
    Ok(output.map_indexed(|index, value| {
        T::from_f64(value.to_f64() + bias.data()[index[channel]].to_f64())
    }))
}

/// Reverses the spatial axes of `[k.., C_in / groups, C_out]` filters.
fn flip_filters<T: Float>(filters: &Array<T>, dims: usize) -> Array<T> {
    let layout = filters.layout();
    let shape = filters.shape();
    Array::from_fn(&layout, |index| {
        let mut source = index.to_vec();
        for (axis, position) in source.iter_mut().take(dims).enumerate() {
            *position = shape[axis] - 1 - *position;
        }
        filters.data()[layout.offset_of(&source)]
    })
}

/// Output extent and leading forward padding of one transposed axis.
///
/// The output extent is `output_size` when given. Otherwise it comes from the padding:
/// symbolic modes use [`transpose_output_extent`], explicit pairs give
/// `(input - 1) * stride + effective_kernel - before - after`.
fn transpose_axis(
    input: usize,
    window: &WindowSpec,
    padding: &PaddingSpec,
    pair: Option<(usize, usize)>,
    output_size: Option<usize>,
) -> Result<(usize, usize)> {
    ensure!(input >= 1, "transposed convolution expects non-empty spatial axes");
    let (stride, kernel) = (window.stride, window.effective_kernel());
    let span = (input - 1)
        .checked_mul(stride)
        .and_then(|span| span.checked_add(kernel))
        .ok_or_else(|| Error::InvalidArgument("transposed extent overflows".into()))?;

    let (output, before, after) = match padding {
        PaddingSpec::Symbolic(mode) => {
            let output = match output_size {
                Some(output) => output,
                None => transpose_output_extent(input, stride, kernel, *mode)?,
            };
            let (before, after) = resolve_symbolic_padding(output, stride, kernel, *mode)?;
            (output, before, after)
        }
        _ => {
            let (before, after) = pair.unwrap_or_default();
            let output = match output_size {
                Some(output) => output,
                None => before
                    .checked_add(after)
                    .and_then(|pad| span.checked_sub(pad))
                    .ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "padding ({before}, {after}) exceeds the transposed extent {span}"
                        ))
                    })?,
            };
            (output, before, after)
        }
    };

    let windows = output_extent(output, kernel, before, after, stride)?;
    ensure!(
        windows == input,
        "output extent {output} gives {windows} windows, expected {input}"
    );
    ensure!(
        before < kernel,
        "leading padding {before} must be smaller than the effective kernel {kernel}"
    );
    Ok((output, before))
}

#[allow(clippy::too_many_arguments)]
fn conv_transpose_nd<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    filters: &Array<T>,
    bias: Option<&Array<T>>,
    output_size: Option<&Spatial>,
    params: &ConvParams,
    dims: Option<usize>,
    name: &str,
) -> Result<Array<T>> {
    let dims = spatial_dims(x, dims, name)?;
    ensure_supported(engine, T::DATA_TYPE, name)?;
    ensure!(
        filters.rank() == dims + 2,
        "{name} expects filters [k.., C_in / groups, C_out] of rank {}, got {}",
        dims + 2,
        filters.layout()
    );

    let strides = params.strides.broadcast(dims, "strides")?;
    let dilation = params.dilation.broadcast(dims, "dilation")?;
    let input_dilation = params.input_dilation.broadcast(dims, "input dilation")?;
    ensure!(
        input_dilation.iter().all(|&factor| factor == 1),
        "{name} takes no input dilation, got {input_dilation:?}"
    );
    ensure_dilation(engine, &dilation, name)?;

    let x = params.data_format.to_channels_last(x)?;
    let windows = itertools::izip!(&filters.shape()[..dims], &strides, &dilation)
        .map(|(&kernel, &stride, &dilation)| WindowSpec::new(kernel, stride, dilation))
        .collect::<Result<Vec<_>>>()?;
    let pairs = params.padding.explicit_pairs(dims)?;
    let outputs: Vec<Option<usize>> = match output_size {
        Some(size) => size.broadcast(dims, "output size")?.into_iter().map(Some).collect(),
        None => vec![None; dims],
    };

    // stride becomes input dilation, forward padding becomes `effective_kernel - 1 - pad`
    let mut dilated = x.clone();
    let mut pads = vec![(0, 0)];
    for (axis, window) in windows.iter().enumerate() {
        let input = x.shape()[axis + 1];
        let pair = pairs.as_ref().map(|pairs| pairs[axis]);
        let (output, before) = transpose_axis(input, window, &params.padding, pair, outputs[axis])?;
        let kernel = window.effective_kernel();
        let after = (output + before)
            .checked_sub((input - 1) * window.stride + 1)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "output extent {output} is too small for {input} windows"
                ))
            })?;
        log::trace!("{name} axis {axis}: output {output}, padding ({before}, {after})");
        pads.push((kernel - 1 - before, after));
        dilated = dilate_input(engine, &dilated, axis + 1, window.stride)?;
    }
    pads.push((0, 0));

    let padded = engine.pad(&dilated, &pads, PadMode::Constant(T::zero()))?;
    let spec = ConvSpec {
        strides: vec![1; dims],
        dilation,
        groups: params.groups,
    };
    let output = engine.conv(&padded, &flip_filters(filters, dims), &spec)?;
    let output = add_bias(output, bias, filters.shape()[dims + 1])?;
    params.data_format.from_channels_last(&output)
}

/// General dilated convolution over every spatial axis of a batched input.
///
/// Filters are `[k.., C_in / groups, C_out]` regardless of the data format; `bias` is `[C_out]`.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn conv_general_dilated<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    filters: &Array<T>,
    bias: Option<&Array<T>>,
    params: &ConvParams,
) -> Result<Array<T>> {
    conv_nd(engine, x, filters, bias, params, None, "conv_general_dilated")
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn conv1d<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    filters: &Array<T>,
    bias: Option<&Array<T>>,
    params: &ConvParams,
) -> Result<Array<T>> {
    conv_nd(engine, x, filters, bias, params, Some(1), "conv1d")
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn conv2d<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    filters: &Array<T>,
    bias: Option<&Array<T>>,
    params: &ConvParams,
) -> Result<Array<T>> {
    conv_nd(engine, x, filters, bias, params, Some(2), "conv2d")
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn conv3d<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    filters: &Array<T>,
    bias: Option<&Array<T>>,
    params: &ConvParams,
) -> Result<Array<T>> {
    conv_nd(engine, x, filters, bias, params, Some(3), "conv3d")
}

/// Transposed convolution over every spatial axis, the gradient of [`conv_general_dilated`].
///
/// Filters share the forward layout `[k.., C_in / groups, C_out]`. Each spatial output extent is
/// `output_size` when given, otherwise it is derived from the padding.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn conv_general_transpose<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    filters: &Array<T>,
    bias: Option<&Array<T>>,
    output_size: Option<&Spatial>,
    params: &ConvParams,
) -> Result<Array<T>> {
    conv_transpose_nd(engine, x, filters, bias, output_size, params, None, "conv_general_transpose")
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn conv1d_transpose<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    filters: &Array<T>,
    bias: Option<&Array<T>>,
    output_size: Option<&Spatial>,
    params: &ConvParams,
) -> Result<Array<T>> {
    conv_transpose_nd(engine, x, filters, bias, output_size, params, Some(1), "conv1d_transpose")
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn conv2d_transpose<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    filters: &Array<T>,
    bias: Option<&Array<T>>,
    output_size: Option<&Spatial>,
    params: &ConvParams,
) -> Result<Array<T>> {
    conv_transpose_nd(engine, x, filters, bias, output_size, params, Some(2), "conv2d_transpose")
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn conv3d_transpose<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    filters: &Array<T>,
    bias: Option<&Array<T>>,
    output_size: Option<&Spatial>,
    params: &ConvParams,
) -> Result<Array<T>> {
    conv_transpose_nd(engine, x, filters, bias, output_size, params, Some(3), "conv3d_transpose")
}

/// Convolves each input channel with its own filters.
///
/// Filters are `[kh, kw, C]` or `[kh, kw, C, multiplier]`; output channel `c * multiplier + m`
/// comes from input channel `c`. `params.groups` is ignored.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn depthwise_conv2d<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    filters: &Array<T>,
    bias: Option<&Array<T>>,
    params: &ConvParams,
) -> Result<Array<T>> {
    spatial_dims(x, Some(2), "depthwise_conv2d")?;
    let channels = x.shape()[params.data_format.channel_axis(x.rank())];
    let shape = filters.shape();
    let multiplier = match shape.len() {
        3 => 1,
        4 => shape[3],
        _ => {
            return Err(Error::InvalidArgument(format!(
                "depthwise_conv2d expects filters [kh, kw, C] or [kh, kw, C, M], got {}",
                filters.layout()
            )));
        }
    };
    ensure!(
        shape[2] == channels,
        "depthwise_conv2d filters {} do not match {channels} input channels",
        filters.layout()
    );
    let filters = filters.reshape([shape[0], shape[1], 1, channels * multiplier])?;
    let params = params.clone().with_groups(channels);
    conv_nd(engine, x, &filters, bias, &params, Some(2), "depthwise_conv2d")
}
