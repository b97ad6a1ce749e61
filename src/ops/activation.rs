use itertools::Itertools;

use super::{DataFormat, ensure_supported};
use crate::{
    array::Array,
    engine::Engine,
    error::{Result, ensure},
    num::Float,
};

/// `ln(x / (1 - x))`, with `x` first clamped to `[eps, 1 - eps]` when `eps` is given.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn logit<T: Float>(engine: &impl Engine, x: &Array<T>, eps: Option<f64>) -> Result<Array<T>> {
    ensure_supported(engine, T::DATA_TYPE, "logit")?;
    if let Some(eps) = eps {
        ensure!((0.0..=0.5).contains(&eps), "eps must be in [0, 0.5], got {eps}");
    }
    Ok(x.map(|x| {
        let x = x.to_f64();
        let x = match eps {
            Some(eps) => x.clamp(eps, 1.0 - eps),
            None => x,
        };
        T::from_f64((x / (1.0 - x)).ln())
    }))
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn relu6<T: Float>(engine: &impl Engine, x: &Array<T>) -> Result<Array<T>> {
    ensure_supported(engine, T::DATA_TYPE, "relu6")?;
    Ok(x.map(|x| T::from_f64(x.to_f64().clamp(0.0, 6.0))))
}

/// Keeps elements greater than `threshold` and zeroes the rest.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn thresholded_relu<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    threshold: f64,
) -> Result<Array<T>> {
    ensure_supported(engine, T::DATA_TYPE, "thresholded_relu")?;
    Ok(x.map(|x| match x.to_f64() > threshold {
        true => x,
        false => T::zero(),
    }))
}

/// Index into `slope` for an element of `x` at `index`, under right-aligned broadcasting.
fn broadcast_offset(slope: &[usize], index: &[usize]) -> usize {
    let skip = index.len() - slope.len();
    slope
        .iter()
        .zip(&index[skip..])
        .fold(0, |acc, (&extent, &i)| match extent {
            1 => acc,
            _ => acc * extent + i,
        })
}

/// `x` where positive, `slope * x` elsewhere.
///
/// `slope` broadcasts to `x` from the right; a rank-1 slope that does not, but matches exactly
/// one axis of `x`, applies along that axis.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn prelu<T: Float>(engine: &impl Engine, x: &Array<T>, slope: &Array<T>) -> Result<Array<T>> {
    ensure_supported(engine, T::DATA_TYPE, "prelu")?;
    let shape = x.shape();
    let broadcasts = slope.rank() <= x.rank()
        && slope
            .shape()
            .iter()
            .rev()
            .zip(shape.iter().rev())
            .all(|(&s, &x)| s == 1 || s == x);

    let apply = |x: T, s: T| match x.to_f64() > 0.0 {
        true => x,
        false => T::from_f64(x.to_f64() * s.to_f64()),
    };

    if broadcasts {
        let slope_shape = slope.shape();
        return Ok(x.map_indexed(|index, x| {
            apply(x, slope.data()[broadcast_offset(slope_shape, index)])
        }));
    }

    let axes = match slope.rank() {
        1 => shape
            .iter()
            .positions(|&extent| extent == slope.size())
            .collect_vec(),
        _ => vec![],
    };
    ensure!(
        axes.len() == 1,
        "slope {} is not broadcastable to {}",
        slope.layout(),
        x.layout()
    );
    let axis = axes[0];
    Ok(x.map_indexed(|index, x| apply(x, slope.data()[index[axis]])))
}

/// Normalizes `x` per channel: `(x - mean) / sqrt(variance + eps) * scale + offset`.
///
/// With `training`, mean and variance are computed from `x` over every axis but the channel axis
/// and the given statistics are ignored.
#[allow(clippy::too_many_arguments)]
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn batch_norm<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    mean: &Array<T>,
    variance: &Array<T>,
    scale: Option<&Array<T>>,
    offset: Option<&Array<T>>,
    training: bool,
    eps: f64,
    data_format: DataFormat,
) -> Result<Array<T>> {
    ensure_supported(engine, T::DATA_TYPE, "batch_norm")?;
    ensure!(
        x.rank() >= 2,
        "batch_norm expects a batched input, got {}",
        x.layout()
    );
    let axis = data_format.channel_axis(x.rank());
    let channels = x.shape()[axis];
    let statistics = [
        ("mean", Some(mean)),
        ("variance", Some(variance)),
        ("scale", scale),
        ("offset", offset),
    ];
    for (name, array) in statistics {
        if let Some(array) = array {
            ensure!(
                array.shape() == [channels],
                "{name} {} must be [{channels}]",
                array.layout()
            );
        }
    }

    let (mean, variance): (Vec<f64>, Vec<f64>) = match training {
        true => {
            let layout = x.layout();
            let count = (x.size() / channels.max(1)).max(1) as f64;
            let mut sum = vec![0.0; channels];
            let mut square = vec![0.0; channels];
            for (offset, &value) in x.data().iter().enumerate() {
                let c = layout.unravel(offset)[axis];
                let value = value.to_f64();
                sum[c] += value;
                square[c] += value * value;
            }
            let mean = sum.iter().map(|sum| sum / count).collect_vec();
            let variance = square
                .iter()
                .zip(&mean)
                .map(|(square, mean)| square / count - mean * mean)
                .collect();
            (mean, variance)
        }
        false => (
            mean.data().iter().map(|x| x.to_f64()).collect(),
            variance.data().iter().map(|x| x.to_f64()).collect(),
        ),
    };

    let get = |array: Option<&Array<T>>, c: usize, default: f64| {
        array.map_or(default, |array| array.data()[c].to_f64())
    };
    Ok(x.map_indexed(|index, x| {
        let c = index[axis];
        let inv = 1.0 / (variance[c] + eps).sqrt() * get(scale, c, 1.0);
        T::from_f64((x.to_f64() - mean[c]) * inv + get(offset, c, 0.0))
    }))
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use half::f16;

    use super::{batch_norm, logit, prelu, relu6, thresholded_relu};
    use crate::{
        array::Array,
        capability::{DtypeTable, Version},
        engine::CpuBuilder,
        error::Error as WeftError,
        ops::DataFormat,
    };

    #[test]
    fn test_elementwise() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Array::create(4usize, vec![-1.0f32, 0.5, 3.0, 7.0])?;

        assert_eq!(relu6(&cpu, &x)?.data(), &[0.0, 0.5, 3.0, 6.0]);
        assert_eq!(
            thresholded_relu(&cpu, &x, 0.5)?.data(),
            &[0.0, 0.0, 3.0, 7.0]
        );

        let p = Array::create(3usize, vec![0.5f64, 0.0, 1.0])?;
        let y = logit(&cpu, &p, Some(1e-6))?;
        assert_eq!(y.data()[0], 0.0);
        assert!(y.data()[1] < -13.0);
        assert!(y.data()[2] > 13.0);
        let y = logit(&cpu, &p, None)?;
        assert_eq!(y.data()[1], f64::NEG_INFINITY);
        Ok(())
    }

    #[test]
    fn test_prelu() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Array::create([2, 3], vec![-1.0f32, 2.0, -3.0, -4.0, 5.0, -6.0])?;

        let y = prelu(&cpu, &x, &Array::create(1usize, vec![0.5f32])?)?;
        assert_eq!(y.data(), &[-0.5, 2.0, -1.5, -2.0, 5.0, -3.0]);

        let y = prelu(&cpu, &x, &Array::create(3usize, vec![1.0f32, 0.0, 2.0])?)?;
        assert_eq!(y.data(), &[-1.0, 2.0, -6.0, -4.0, 5.0, -12.0]);

        // matches axis 0 only
        let y = prelu(&cpu, &x, &Array::create(2usize, vec![0.0f32, 1.0])?)?;
        assert_eq!(y.data(), &[0.0, 2.0, 0.0, -4.0, 5.0, -6.0]);

        assert!(prelu(&cpu, &x, &Array::create(4usize, vec![0.0f32; 4])?).is_err());
        Ok(())
    }

    #[test]
    fn test_batch_norm() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Array::create([2, 2, 1], vec![1.0f64, 10.0, 3.0, 30.0])?;
        let mean = Array::create(2usize, vec![2.0, 20.0])?;
        let variance = Array::create(2usize, vec![1.0, 100.0])?;
        let offset = Array::create(2usize, vec![0.0, 1.0])?;

        let y = batch_norm(
            &cpu,
            &x,
            &mean,
            &variance,
            None,
            Some(&offset),
            false,
            0.0,
            DataFormat::ChannelsFirst,
        )?;
        assert_eq!(y.data(), &[-1.0, 0.0, 1.0, 2.0]);

        let y = batch_norm(
            &cpu,
            &x,
            &mean,
            &variance,
            None,
            None,
            true,
            0.0,
            DataFormat::ChannelsFirst,
        )?;
        assert_eq!(y.data(), &[-1.0, -1.0, 1.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_torch_exclusions() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new()
            .with_version(Version::new(1, 11, 0))
            .with_dtypes(DtypeTable::torch())
            .build();
        let x = Array::<f16>::zeros(2usize);
        let err = relu6(&cpu, &x).unwrap_err();
        assert!(matches!(err, WeftError::UnsupportedConfiguration(_)));
        let err = logit(&cpu, &x, None).unwrap_err();
        assert!(matches!(err, WeftError::UnsupportedConfiguration(_)));
        assert!(relu6(&cpu, &Array::<f32>::zeros(2usize)).is_ok());
        Ok(())
    }
}
