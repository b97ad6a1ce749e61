use itertools::Itertools;

use super::{DataFormat, ensure_dilation, ensure_supported, spatial_dims};
use crate::{
    array::Array,
    engine::{Engine, PadMode, ReduceKind, ReduceWindowSpec},
    error::Result,
    num::Float,
    window::{PaddingSpec, ResolvedAxis, Spatial, WindowNormalizer, WindowSpec},
};

/// Arguments shared by max and average pooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolParams {
    pub kernel: Spatial,
    /// Defaults to the kernel size.
    pub strides: Option<Spatial>,
    pub padding: PaddingSpec,
    pub dilation: Spatial,
    pub ceil_mode: bool,
    pub data_format: DataFormat,
    /// Whether average pooling counts requested padding in its divisor.
    pub count_include_pad: bool,
}

impl PoolParams {
    pub fn new(kernel: impl Into<Spatial>) -> Self {
        Self {
            kernel: kernel.into(),
            strides: None,
            padding: PaddingSpec::default(),
            dilation: Spatial::default(),
            ceil_mode: false,
            data_format: DataFormat::default(),
            count_include_pad: false,
        }
    }

    pub fn with_strides(mut self, strides: impl Into<Spatial>) -> Self {
        self.strides = Some(strides.into());
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

    pub fn with_ceil_mode(mut self, ceil_mode: bool) -> Self {
        self.ceil_mode = ceil_mode;
        self
    }

    pub fn with_data_format(mut self, data_format: DataFormat) -> Self {
        self.data_format = data_format;
        self
    }

    pub fn with_count_include_pad(mut self, count_include_pad: bool) -> Self {
        self.count_include_pad = count_include_pad;
        self
    }

    fn windows(&self, dims: usize) -> Result<Vec<WindowSpec>> {
        let kernel = self.kernel.broadcast(dims, "kernel")?;
        let strides = match &self.strides {
            Some(strides) => strides.broadcast(dims, "strides")?,
            None => kernel.clone(),
        };
        let dilation = self.dilation.broadcast(dims, "dilation")?;
        itertools::izip!(kernel, strides, dilation)
            .map(|(kernel, stride, dilation)| WindowSpec::new(kernel, stride, dilation))
            .collect()
    }
}

/// Channels-last input, window specs and resolved padding of one pooling call.
struct Prepared<T> {
    x: Array<T>,
    windows: Vec<WindowSpec>,
    resolved: Vec<ResolvedAxis>,
}

fn prepare<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    params: &PoolParams,
    dims: Option<usize>,
    name: &str,
) -> Result<Prepared<T>> {
    let dims = spatial_dims(x, dims, name)?;
    ensure_supported(engine, T::DATA_TYPE, &format!("{name}{dims}d"))?;

    let windows = params.windows(dims)?;
    let dilation = windows.iter().map(|window| window.dilation).collect_vec();
    ensure_dilation(engine, &dilation, name)?;

    let x = params.data_format.to_channels_last(x)?;
    let extents = &x.shape()[1..=dims];
    let resolved = WindowNormalizer::new()
        .with_ceil_mode(params.ceil_mode)
        .with_padding_bound(true)
        .normalize(extents, &windows, &params.padding)?;

    Ok(Prepared {
        x,
        windows,
        resolved,
    })
}

/// `(0, 0)` for the batch and channel axes around the resolved spatial padding.
fn full_pads(resolved: &[ResolvedAxis]) -> Vec<(usize, usize)> {
    [(0, 0)]
        .into_iter()
        .chain(resolved.iter().map(ResolvedAxis::pads))
        .chain([(0, 0)])
        .collect()
}

fn reduce_spec(windows: &[WindowSpec], reduce: ReduceKind) -> ReduceWindowSpec {
    ReduceWindowSpec {
        window: windows.iter().map(|window| window.kernel).collect(),
        strides: windows.iter().map(|window| window.stride).collect(),
        dilation: windows.iter().map(|window| window.dilation).collect(),
        reduce,
    }
}

fn pool_max<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    params: &PoolParams,
    dims: Option<usize>,
) -> Result<Array<T>> {
    let Prepared {
        x,
        windows,
        resolved,
    } = prepare(engine, x, params, dims, "max_pool")?;

    let padded = engine.pad(&x, &full_pads(&resolved), PadMode::Constant(T::NEG_INFINITY))?;
    let output = engine.reduce_window(&padded, &reduce_spec(&windows, ReduceKind::Max))?;
    params.data_format.from_channels_last(&output)
}

/// Number of taps of each window along one axis that land on counted positions.
///
/// Real elements always count; requested padding counts with `count_include_pad`; the ceil-mode
/// extension never does.
fn axis_counts(
    extent: usize,
    window: &WindowSpec,
    axis: &ResolvedAxis,
    count_include_pad: bool,
) -> Vec<usize> {
    let (before, after) = axis.requested_pads();
    let (lo, hi) = match count_include_pad {
        true => (0, before + extent + after),
        false => (before, before + extent),
    };
    (0..axis.windows)
        .map(|index| {
            let start = index * window.stride;
            (0..window.kernel)
                .map(|tap| start + tap * window.dilation)
                .filter(|position| (lo..hi).contains(position))
                .count()
        })
        .collect()
}

fn pool_avg<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    params: &PoolParams,
    dims: Option<usize>,
) -> Result<Array<T>> {
    let Prepared {
        x,
        windows,
        resolved,
    } = prepare(engine, x, params, dims, "avg_pool")?;

    let padded = engine.pad(&x, &full_pads(&resolved), PadMode::Constant(T::zero()))?;
    let sums = engine.reduce_window(&padded, &reduce_spec(&windows, ReduceKind::Sum))?;

    let counts = itertools::izip!(&x.shape()[1..x.rank() - 1], &windows, &resolved)
        .map(|(&extent, window, axis)| axis_counts(extent, window, axis, params.count_include_pad))
        .collect_vec();
    let output = sums.map_indexed(|index, sum| {
        let count: usize = counts
            .iter()
            .zip(&index[1..index.len() - 1])
            .map(|(counts, &position)| counts[position])
            .product();
        match count {
            0 => T::zero(),
            count => T::from_f64(sum.to_f64() / count as f64),
        }
    });
    params.data_format.from_channels_last(&output)
}

/// Max pooling over every spatial axis of a batched input. Padding is filled with `-inf`.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn max_pool<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    params: &PoolParams,
) -> Result<Array<T>> {
    pool_max(engine, x, params, None)
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn max_pool1d<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    params: &PoolParams,
) -> Result<Array<T>> {
    pool_max(engine, x, params, Some(1))
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn max_pool2d<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    params: &PoolParams,
) -> Result<Array<T>> {
    pool_max(engine, x, params, Some(2))
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn max_pool3d<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    params: &PoolParams,
) -> Result<Array<T>> {
    pool_max(engine, x, params, Some(3))
}

/// Average pooling over every spatial axis of a batched input.
///
/// Each window is divided by the number of real elements it covers, plus the requested padding
/// it covers if `count_include_pad` is set. Windows covering nothing countable yield zero.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn avg_pool<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    params: &PoolParams,
) -> Result<Array<T>> {
    pool_avg(engine, x, params, None)
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn avg_pool1d<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    params: &PoolParams,
) -> Result<Array<T>> {
    pool_avg(engine, x, params, Some(1))
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn avg_pool2d<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    params: &PoolParams,
) -> Result<Array<T>> {
    pool_avg(engine, x, params, Some(2))
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn avg_pool3d<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    params: &PoolParams,
) -> Result<Array<T>> {
    pool_avg(engine, x, params, Some(3))
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use itertools::Itertools;

    use super::{PoolParams, avg_pool1d, avg_pool2d, max_pool, max_pool1d, max_pool2d};
    use crate::{
        array::Array,
        capability::{DtypeTable, Version},
        engine::CpuBuilder,
        error::Error as WeftError,
        ops::DataFormat,
        window::PaddingMode,
    };

    #[test]
    fn test_max_pool_ceil_mode() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Array::create([1, 5, 1], vec![1.0f32, 3.0, 2.0, 5.0, 4.0])?;

        let params = PoolParams::new(2).with_strides(2);
        let y = max_pool1d(&cpu, &x, &params)?;
        assert_eq!(y.data(), &[3.0, 5.0]);

        // the third window starts inside the input and is kept
        let y = max_pool1d(&cpu, &x, &params.clone().with_ceil_mode(true))?;
        assert_eq!(y.data(), &[3.0, 5.0, 4.0]);

        // the third window would start in the trailing padding and is dropped
        let params = PoolParams::new(3)
            .with_strides(3)
            .with_padding(1)
            .with_ceil_mode(true);
        let y = max_pool1d(&cpu, &x, &params)?;
        assert_eq!(y.data(), &[3.0, 5.0]);
        Ok(())
    }

    #[test]
    fn test_max_pool_same_nchw() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Array::create([1, 1, 3, 3], (1..=9).map(|x| x as f32).collect_vec())?;
        let params = PoolParams::new(2)
            .with_strides(1)
            .with_padding(PaddingMode::Same)
            .with_data_format(DataFormat::ChannelsFirst);
        let y = max_pool2d(&cpu, &x, &params)?;
        assert_eq!(y.shape(), &[1, 1, 3, 3]);
        assert_eq!(y.data(), &[5.0, 6.0, 6.0, 8.0, 9.0, 9.0, 8.0, 9.0, 9.0]);
        Ok(())
    }

    #[test]
    fn test_max_pool_negative_padding_fill() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Array::create([1, 2, 1], vec![-3.0f64, -4.0])?;
        let params = PoolParams::new(2).with_strides(1).with_padding(1);
        let y = max_pool(&cpu, &x, &params)?;
        assert_eq!(y.data(), &[-3.0, -3.0, -4.0]);
        Ok(())
    }

    #[test]
    fn test_avg_pool_divisor() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Array::create([1, 5, 1], vec![1.0f32, 2.0, 3.0, 4.0, 5.0])?;

        let params = PoolParams::new(2).with_strides(2).with_ceil_mode(true);
        let y = avg_pool1d(&cpu, &x, &params)?;
        // the last window covers one real element and one extension slot
        assert_eq!(y.data(), &[1.5, 3.5, 5.0]);

        let params = PoolParams::new(3).with_strides(2).with_padding(1);
        let y = avg_pool1d(&cpu, &x, &params)?;
        assert_eq!(y.data(), &[1.5, 3.0, 4.5]);

        let y = avg_pool1d(&cpu, &x, &params.with_count_include_pad(true))?;
        assert_eq!(y.data(), &[1.0, 3.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_avg_pool_ceil_include_pad() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Array::create([1, 6, 1], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])?;
        let params = PoolParams::new(3)
            .with_strides(2)
            .with_padding(1)
            .with_ceil_mode(true);

        // the last window holds 6, one requested pad and one extension slot
        let y = avg_pool1d(&cpu, &x, &params)?;
        assert_eq!(y.data(), &[1.5, 3.0, 5.0, 6.0]);
        let y = avg_pool1d(&cpu, &x, &params.with_count_include_pad(true))?;
        assert_eq!(y.data(), &[1.0, 3.0, 5.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_max_pool_nan() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Array::create([1, 4, 1], vec![1.0f32, f32::NAN, 3.0, 2.0])?;
        let y = max_pool1d(&cpu, &x, &PoolParams::new(2).with_strides(2))?;
        assert!(y.data()[0].is_nan());
        assert_eq!(y.data()[1], 3.0);
        Ok(())
    }

    #[test]
    fn test_avg_pool_2d_same() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Array::<f32>::ones([2, 5, 4, 3]);
        let params = PoolParams::new([3, 2])
            .with_strides(2)
            .with_padding(PaddingMode::Same);
        let y = avg_pool2d(&cpu, &x, &params)?;
        assert_eq!(y.shape(), &[2, 3, 2, 3]);
        assert!(y.data().iter().all(|&v| v == 1.0));
        Ok(())
    }

    #[test]
    fn test_pool_rejects() -> Result<(), Box<dyn Error>> {
        let x = Array::<f32>::zeros([1, 8, 8, 1]);

        let cpu = CpuBuilder::new().build();
        let err = max_pool2d(&cpu, &x, &PoolParams::new(3).with_padding(4)).unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));
        let err = max_pool2d(&cpu, &x, &PoolParams::new([2, 2, 2])).unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));
        let err = max_pool1d(&cpu, &x, &PoolParams::new(2)).unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));

        let cpu = CpuBuilder::new().without_native_dilation().build();
        let err = max_pool2d(&cpu, &x, &PoolParams::new(2).with_dilation(2)).unwrap_err();
        assert!(matches!(err, WeftError::UnsupportedConfiguration(_)));

        let cpu = CpuBuilder::new()
            .with_version(Version::new(2, 9, 1))
            .with_dtypes(DtypeTable::tensorflow())
            .build();
        let x = Array::<f64>::zeros([1, 8, 8, 1]);
        let err = avg_pool2d(&cpu, &x, &PoolParams::new(2)).unwrap_err();
        assert!(matches!(err, WeftError::UnsupportedConfiguration(_)));
        assert!(max_pool2d(&cpu, &x, &PoolParams::new(2)).is_ok());
        Ok(())
    }
}
