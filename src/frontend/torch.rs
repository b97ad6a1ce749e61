//! Torch-convention functions over a channels-first [`Tensor`].

use derive_more::Deref;

use super::{Frontend, to_common, to_native};
use crate::{
    array::Array,
    capability::{DtypeTable, Version},
    engine::{Engine, PadMode},
    error::{Error, Result, ensure, unsupported},
    num::{Float, Scalar},
    ops::{self, ConvParams, DataFormat, InterpolateMode, PoolParams},
    window::{PaddingSpec, Spatial},
};

/// The torch release the frontend exclusion table is written against.
pub const VERSION: Version = Version::new(1, 11, 0);

/// A torch-style tensor. Results of frontend functions never require gradients.
#[derive(Debug, Clone, PartialEq, Deref, Frontend)]
#[frontend(crate = "crate")]
pub struct Tensor<T: Scalar> {
    #[frontend]
    #[deref]
    array: Array<T>,
    requires_grad: bool,
}

impl<T: Scalar> Tensor<T> {
    pub fn new(array: Array<T>) -> Self {
        Self {
            array,
            requires_grad: false,
        }
    }

    pub fn with_requires_grad(mut self, requires_grad: bool) -> Self {
        self.requires_grad = requires_grad;
        self
    }

    #[inline]
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    #[inline]
    pub fn into_array(self) -> Array<T> {
        self.array
    }
}

impl<T: Scalar> From<Array<T>> for Tensor<T> {
    fn from(array: Array<T>) -> Self {
        Self::new(array)
    }
}

fn pool_params(
    kernel_size: Spatial,
    stride: Option<Spatial>,
    padding: Spatial,
    ceil_mode: bool,
) -> PoolParams {
    let params = PoolParams::new(kernel_size)
        .with_padding(PaddingSpec::Symmetric(padding))
        .with_ceil_mode(ceil_mode)
        .with_data_format(DataFormat::ChannelsFirst);
    match stride {
        Some(stride) => params.with_strides(stride),
        None => params,
    }
}

/// `[N, C, H, W]` max pooling; `stride` defaults to `kernel_size`.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn max_pool2d<T: Float>(
    engine: &impl Engine,
    input: Tensor<T>,
    kernel_size: impl Into<Spatial>,
    stride: Option<Spatial>,
    padding: impl Into<Spatial>,
    dilation: impl Into<Spatial>,
    ceil_mode: bool,
) -> Result<Tensor<T>> {
    let params = pool_params(kernel_size.into(), stride, padding.into(), ceil_mode)
        .with_dilation(dilation);
    let x: Array<T> = to_common(input)?;
    let y = ops::max_pool2d(engine, &x, &params)?;
    Ok(to_native(y))
}

/// `[N, C, H, W]` average pooling; `stride` defaults to `kernel_size`.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn avg_pool2d<T: Float>(
    engine: &impl Engine,
    input: Tensor<T>,
    kernel_size: impl Into<Spatial>,
    stride: Option<Spatial>,
    padding: impl Into<Spatial>,
    ceil_mode: bool,
    count_include_pad: bool,
) -> Result<Tensor<T>> {
    let params = pool_params(kernel_size.into(), stride, padding.into(), ceil_mode)
        .with_count_include_pad(count_include_pad);
    let x: Array<T> = to_common(input)?;
    let y = ops::avg_pool2d(engine, &x, &params)?;
    Ok(to_native(y))
}

/// `[N, C, H, W]` convolution with `[C_out, C_in / groups, kH, kW]` weights.
#[allow(clippy::too_many_arguments)]
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn conv2d<T: Float>(
    engine: &impl Engine,
    input: Tensor<T>,
    weight: Tensor<T>,
    bias: Option<Tensor<T>>,
    stride: impl Into<Spatial>,
    padding: impl Into<PaddingSpec>,
    dilation: impl Into<Spatial>,
    groups: usize,
) -> Result<Tensor<T>> {
    let x: Array<T> = to_common(input)?;
    let weight: Array<T> = to_common(weight)?;
    let bias: Option<Array<T>> = bias.map(to_common).transpose()?;
    ensure!(
        weight.rank() == 4,
        "conv2d expects weights [C_out, C_in / groups, kH, kW], got {}",
        weight.layout()
    );
    let filters = weight.permute(&[2, 3, 1, 0])?;

    let params = ConvParams::new()
        .with_strides(stride)
        .with_padding(padding)
        .with_dilation(dilation)
        .with_groups(groups)
        .with_data_format(DataFormat::ChannelsFirst);
    let y = ops::conv2d(engine, &x, &filters, bias.as_ref(), &params)?;
    Ok(to_native(y))
}

/// `[N, C, H, W]` transposed convolution with `[C_in, C_out / groups, kH, kW]` weights.
///
/// `output_padding` extends the trailing side of each output axis and must be smaller than the
/// stride or the dilation of that axis.
#[allow(clippy::too_many_arguments)]
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn conv_transpose2d<T: Float>(
    engine: &impl Engine,
    input: Tensor<T>,
    weight: Tensor<T>,
    bias: Option<Tensor<T>>,
    stride: impl Into<Spatial>,
    padding: impl Into<Spatial>,
    output_padding: impl Into<Spatial>,
    groups: usize,
    dilation: impl Into<Spatial>,
) -> Result<Tensor<T>> {
    let x: Array<T> = to_common(input)?;
    let weight: Array<T> = to_common(weight)?;
    let bias: Option<Array<T>> = bias.map(to_common).transpose()?;
    ensure!(
        x.rank() == 4 && weight.rank() == 4,
        "conv_transpose2d expects [N, C, H, W] input and [C_in, C_out / groups, kH, kW] weights, \
         got {} and {}",
        x.layout(),
        weight.layout()
    );
    let [c_in, c_out, kh, kw] = [0, 1, 2, 3].map(|axis| weight.shape()[axis]);
    ensure!(
        groups >= 1 && c_in % groups == 0,
        "conv_transpose2d expects {c_in} input channels divisible by {groups} groups"
    );
    let filters = weight
        .reshape([groups, c_in / groups, c_out, kh, kw])?
        .permute(&[3, 4, 1, 0, 2])?
        .reshape([kh, kw, c_in / groups, groups * c_out])?;

    let [stride, padding, output_padding, dilation]: [Spatial; 4] = [
        stride.into(),
        padding.into(),
        output_padding.into(),
        dilation.into(),
    ];
    let steps = stride.broadcast(2, "stride")?;
    let pads = padding.broadcast(2, "padding")?;
    let extra = output_padding.broadcast(2, "output padding")?;
    let dilations = dilation.broadcast(2, "dilation")?;
    ensure!(
        itertools::izip!(&extra, &steps, &dilations).all(|(&extra, &s, &d)| extra < s || extra < d),
        "output padding {extra:?} must be smaller than either stride {steps:?} or dilation \
         {dilations:?}"
    );
    let output_size = match extra.iter().any(|&extra| extra > 0) {
        true => {
            let sizes = itertools::izip!(&x.shape()[2..], [kh, kw], &steps, &pads, &extra, &dilations)
                .map(|(&n, k, &s, &p, &extra, &d)| {
                    let full = n.saturating_sub(1) * s + d * k.saturating_sub(1) + 1 + extra;
                    full.checked_sub(2 * p).ok_or_else(|| {
                        Error::InvalidArgument(format!("padding {p} exceeds the output extent {full}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Some(Spatial::from(sizes))
        }
        false => None,
    };

    let params = ConvParams::new()
        .with_strides(stride)
        .with_padding(padding)
        .with_dilation(dilation)
        .with_groups(groups)
        .with_data_format(DataFormat::ChannelsFirst);
    let bias = bias.as_ref();
    let y = ops::conv2d_transpose(engine, &x, &filters, bias, output_size.as_ref(), &params)?;
    Ok(to_native(y))
}

/// Pads with a flat `[last_before, last_after, ..]` list.
///
/// `mode` is one of `constant`, `reflect`, `replicate` or `circular`; `value` fills constant
/// padding.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn pad<T: Float>(
    engine: &impl Engine,
    input: Tensor<T>,
    pad: &[usize],
    mode: &str,
    value: f64,
) -> Result<Tensor<T>> {
    let mode = match mode {
        "constant" => PadMode::Constant(T::from_f64(value)),
        "reflect" => PadMode::Reflect,
        "replicate" => PadMode::Edge,
        "circular" => PadMode::Wrap,
        mode => unsupported!("padding mode `{mode}`"),
    };
    let x: Array<T> = to_common(input)?;
    let pads = ops::torch_pad_widths(pad, x.rank())?;
    let y = ops::pad(engine, &x, &pads, mode)?;
    Ok(to_native(y))
}

pub fn pixel_shuffle<T: Scalar>(input: Tensor<T>, upscale_factor: usize) -> Result<Tensor<T>> {
    let x: Array<T> = to_common(input)?;
    let y = ops::pixel_shuffle(&x, upscale_factor)?;
    Ok(to_native(y))
}

pub fn pixel_unshuffle<T: Scalar>(input: Tensor<T>, downscale_factor: usize) -> Result<Tensor<T>> {
    let x: Array<T> = to_common(input)?;
    let y = ops::pixel_unshuffle(&x, downscale_factor)?;
    Ok(to_native(y))
}

/// Resizes the spatial axes of `[N, C, ..]` to `size` or by `scale_factor`.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn interpolate<T: Float>(
    engine: &impl Engine,
    input: Tensor<T>,
    size: Option<Spatial>,
    scale_factor: Option<&[f64]>,
    mode: &str,
    align_corners: Option<bool>,
) -> Result<Tensor<T>> {
    DtypeTable::torch_frontend().ensure_supported(T::DATA_TYPE, "interpolate", VERSION)?;
    let mode: InterpolateMode = mode.parse()?;
    let x: Array<T> = to_common(input)?;
    let y = ops::interpolate(engine, &x, size.as_ref(), scale_factor, mode, align_corners)?;
    Ok(to_native(y))
}

pub fn upsample_nearest<T: Float>(
    engine: &impl Engine,
    input: Tensor<T>,
    size: Option<Spatial>,
    scale_factor: Option<&[f64]>,
) -> Result<Tensor<T>> {
    interpolate(engine, input, size, scale_factor, "nearest", None)
}

pub fn relu6<T: Float>(engine: &impl Engine, input: Tensor<T>) -> Result<Tensor<T>> {
    let x: Array<T> = to_common(input)?;
    let y = ops::relu6(engine, &x)?;
    Ok(to_native(y))
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use half::bf16;
    use itertools::Itertools;

    use super::{
        Tensor, avg_pool2d, conv_transpose2d, conv2d, interpolate, max_pool2d, pad, pixel_shuffle,
        pixel_unshuffle, relu6, upsample_nearest,
    };
    use crate::{array::Array, engine::CpuBuilder, error::Error as WeftError, window::Spatial};

    fn tensor(shape: [usize; 4], data: Vec<f32>) -> Result<Tensor<f32>, Box<dyn Error>> {
        Ok(Tensor::new(Array::create(shape, data)?))
    }

    fn range(n: usize) -> Vec<f32> {
        (1..=n).map(|x| x as f32).collect_vec()
    }

    #[test]
    fn test_pool2d() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();

        let x = tensor([1, 1, 3, 3], range(9))?.with_requires_grad(true);
        let y = max_pool2d(&cpu, x, 2usize, None, 0usize, 1usize, true)?;
        assert_eq!(y.shape(), &[1, 1, 2, 2]);
        assert_eq!(y.data(), &[5.0, 6.0, 8.0, 9.0]);
        assert!(!y.requires_grad());

        let x = tensor([1, 1, 2, 2], range(4))?;
        let y = avg_pool2d(&cpu, x.clone(), 2usize, Some(Spatial::Scalar(2)), 1usize, false, true)?;
        assert_eq!(y.data(), &[0.25, 0.5, 0.75, 1.0]);
        let y = avg_pool2d(&cpu, x, 2usize, Some(Spatial::Scalar(2)), 1usize, false, false)?;
        assert_eq!(y.data(), &[1.0, 2.0, 3.0, 4.0]);
        Ok(())
    }

    #[test]
    fn test_conv2d() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = tensor([1, 1, 3, 3], range(9))?;
        let weight = tensor([2, 1, 2, 2], vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0])?;
        let bias = Tensor::new(Array::create(2usize, vec![0.0f32, 10.0])?);
        let y = conv2d(&cpu, x, weight, Some(bias), 1usize, 0usize, 1usize, 1)?;
        assert_eq!(y.shape(), &[1, 2, 2, 2]);
        assert_eq!(
            y.data(),
            &[12.0, 16.0, 24.0, 28.0, 11.0, 12.0, 14.0, 15.0]
        );
        Ok(())
    }

    #[test]
    fn test_conv_transpose2d() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = tensor([1, 1, 1, 2], vec![1.0, 2.0])?;
        let weight = tensor([1, 1, 1, 3], vec![1.0, 2.0, 3.0])?;

        let run = |extra: [usize; 2]| {
            let stride = [1usize, 2];
            conv_transpose2d(&cpu, x.clone(), weight.clone(), None, stride, 0usize, extra, 1, 1usize)
        };
        let y = run([0, 0])?;
        assert_eq!(y.shape(), &[1, 1, 1, 5]);
        assert_eq!(y.data(), &[1.0, 2.0, 5.0, 4.0, 6.0]);
        let y = run([0, 1])?;
        assert_eq!(y.data(), &[1.0, 2.0, 5.0, 4.0, 6.0, 0.0]);
        let err = run([2, 0]).unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));

        // one input channel per group
        let x = tensor([1, 2, 1, 1], vec![1.0, 2.0])?;
        let weight = tensor([2, 1, 1, 1], vec![3.0, 5.0])?;
        let y = conv_transpose2d(&cpu, x, weight, None, 1usize, 0usize, 0usize, 2, 1usize)?;
        assert_eq!(y.shape(), &[1, 2, 1, 1]);
        assert_eq!(y.data(), &[3.0, 10.0]);
        Ok(())
    }

    #[test]
    fn test_max_pool2d_nan() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = tensor([1, 1, 2, 2], vec![1.0, f32::NAN, 3.0, 4.0])?;
        let y = max_pool2d(&cpu, x, 2usize, None, 0usize, 1usize, false)?;
        assert!(y.data()[0].is_nan());
        Ok(())
    }

    #[test]
    fn test_pad() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Tensor::new(Array::create([1, 1, 3], vec![1.0f32, 2.0, 3.0])?);
        let cases = [
            ("constant", vec![9.0, 1.0, 2.0, 3.0, 9.0, 9.0]),
            ("reflect", vec![2.0, 1.0, 2.0, 3.0, 2.0, 1.0]),
            ("replicate", vec![1.0, 1.0, 2.0, 3.0, 3.0, 3.0]),
            ("circular", vec![3.0, 1.0, 2.0, 3.0, 1.0, 2.0]),
        ];
        for (mode, expected) in cases {
            let y = pad(&cpu, x.clone(), &[1, 2], mode, 9.0)?;
            assert_eq!(y.shape(), &[1, 1, 6]);
            assert_eq!(y.data(), &expected[..], "{mode}");
        }
        let err = pad(&cpu, x, &[1, 1], "symmetric", 0.0).unwrap_err();
        assert!(matches!(err, WeftError::UnsupportedConfiguration(_)));
        Ok(())
    }

    #[test]
    fn test_pixel_shuffle() -> Result<(), Box<dyn Error>> {
        let x = tensor([1, 4, 1, 1], range(4))?;
        let y = pixel_shuffle(x.clone(), 2)?;
        assert_eq!(y.shape(), &[1, 1, 2, 2]);
        assert_eq!(y.data(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(pixel_unshuffle(y, 2)?, x);
        Ok(())
    }

    #[test]
    fn test_interpolate() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Tensor::new(Array::create([1, 1, 2], vec![1.0f32, 2.0])?);
        let y = upsample_nearest(&cpu, x.clone(), None, Some(&[2.0]))?;
        assert_eq!(y.data(), &[1.0, 1.0, 2.0, 2.0]);

        let y = interpolate(&cpu, x, Some(Spatial::Scalar(3)), None, "linear", Some(true))?;
        assert_eq!(y.data(), &[1.0, 1.5, 2.0]);

        let x = Tensor::new(Array::<bf16>::zeros([1, 1, 2]));
        let err = interpolate(&cpu, x, Some(Spatial::Scalar(4)), None, "nearest", None).unwrap_err();
        assert!(matches!(err, WeftError::UnsupportedConfiguration(_)));
        Ok(())
    }

    #[test]
    fn test_relu6() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = tensor([1, 1, 1, 3], vec![-2.0, 3.0, 8.0])?;
        assert_eq!(relu6(&cpu, x)?.data(), &[0.0, 3.0, 6.0]);
        Ok(())
    }
}
