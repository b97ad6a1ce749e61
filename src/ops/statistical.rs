use itertools::Itertools;

use super::ensure_supported;
use crate::{
    array::Array,
    engine::Engine,
    error::{Error, Result, ensure},
    num::Float,
};

/// `x` rearranged as `[outer, inner]` rows, one row per reduction lane, together with the shape
/// of the reduced output.
///
/// `axes` are the reduced axes, every axis when `None`; negative values count from the back.
fn lanes<T: Float>(
    x: &Array<T>,
    axes: Option<&[isize]>,
    keepdims: bool,
) -> Result<(Array<T>, Vec<usize>)> {
    let reduced = match axes {
        Some(axes) => axes
            .iter()
            .map(|&axis| x.normalize_axis(axis))
            .collect::<Result<Vec<_>, _>>()?,
        None => (0..x.rank()).collect(),
    };
    ensure!(
        reduced.iter().all_unique(),
        "repeated axis in {reduced:?}"
    );

    let kept = (0..x.rank()).filter(|axis| !reduced.contains(axis)).collect_vec();
    let order = kept.iter().chain(&reduced).copied().collect_vec();
    let outer: usize = kept.iter().map(|&axis| x.shape()[axis]).product();
    let inner: usize = reduced.iter().map(|&axis| x.shape()[axis]).product();
    let rows = x.permute(&order)?.reshape([outer, inner])?;

    let shape = match keepdims {
        true => (0..x.rank())
            .map(|axis| match reduced.contains(&axis) {
                true => 1,
                false => x.shape()[axis],
            })
            .collect(),
        false => kept.iter().map(|&axis| x.shape()[axis]).collect(),
    };
    Ok((rows, shape))
}

/// Mean of the two middle elements of a sorted lane, NaN when empty.
fn midpoint<T: Float>(sorted: &[T]) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        len => (sorted[(len - 1) / 2].to_f64() + sorted[len / 2].to_f64()) / 2.0,
    }
}

/// Sorts every lane and reduces it with `f`.
fn reduce_sorted<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    axes: Option<&[isize]>,
    keepdims: bool,
    f: impl Fn(&[T]) -> f64,
) -> Result<Array<T>> {
    let (rows, shape) = lanes(x, axes, keepdims)?;
    let [outer, inner] = [rows.shape()[0], rows.shape()[1]];
    ensure!(inner > 0, "cannot reduce an empty selection of {}", x.layout());

    let sorted = rows.take_along_axis(&engine.argsort(&rows, 1)?, 1)?;
    let output = Array::from_fn(outer, |index| {
        let lane = &sorted.data()[index[0] * inner..(index[0] + 1) * inner];
        T::from_f64(f(lane))
    });
    Ok(output.reshape(shape)?)
}

/// Median over `axes`, averaging the two middle elements of even-length lanes.
///
/// A lane holding NaN has a NaN median.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn median<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    axes: Option<&[isize]>,
    keepdims: bool,
) -> Result<Array<T>> {
    ensure_supported(engine, T::DATA_TYPE, "median")?;
    // NaN sorts last, so a lane with NaN ends in one
    reduce_sorted(engine, x, axes, keepdims, |lane| match lane.last() {
        Some(last) if last.to_f64().is_nan() => f64::NAN,
        _ => midpoint(lane),
    })
}

/// Median over `axes` ignoring NaN. An all-NaN lane gives NaN.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn nanmedian<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    axes: Option<&[isize]>,
    keepdims: bool,
) -> Result<Array<T>> {
    ensure_supported(engine, T::DATA_TYPE, "nanmedian")?;
    reduce_sorted(engine, x, axes, keepdims, |lane| {
        let count = lane.iter().take_while(|x| !x.to_f64().is_nan()).count();
        midpoint(&lane[..count])
    })
}

/// Mean over `axes` ignoring NaN. An all-NaN lane gives NaN.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn nanmean<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    axes: Option<&[isize]>,
    keepdims: bool,
) -> Result<Array<T>> {
    ensure_supported(engine, T::DATA_TYPE, "nanmean")?;
    let (rows, shape) = lanes(x, axes, keepdims)?;
    let inner = rows.shape()[1];
    let output = Array::from_fn(rows.shape()[0], |index| {
        let lane = &rows.data()[index[0] * inner..(index[0] + 1) * inner];
        let (sum, count) = lane
            .iter()
            .map(|x| x.to_f64())
            .filter(|x| !x.is_nan())
            .fold((0.0, 0usize), |(sum, count), x| (sum + x, count + 1));
        match count {
            0 => T::from_f64(f64::NAN),
            count => T::from_f64(sum / count as f64),
        }
    });
    Ok(output.reshape(shape)?)
}

/// `x` as `[variables, observations]`.
fn variables<T: Float>(x: &Array<T>, rowvar: bool) -> Result<Array<T>> {
    match (x.rank(), rowvar) {
        (1, _) => Ok(x.reshape([1, x.size()])?),
        (2, true) => Ok(x.clone()),
        (2, false) => Ok(x.swap_axes(0, 1)?),
        (rank, _) => Err(Error::InvalidArgument(format!(
            "corrcoef expects an array of rank 1 or 2, got rank {rank}"
        ))),
    }
}

/// Pearson correlation coefficients between the variables of `x` and, when given, `y`.
///
/// With `rowvar` each row is a variable and each column an observation, otherwise the reverse.
/// The result is `[V, V]` with `V` the total number of variables, clipped to `[-1, 1]`.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn corrcoef<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    y: Option<&Array<T>>,
    rowvar: bool,
) -> Result<Array<T>> {
    ensure_supported(engine, T::DATA_TYPE, "corrcoef")?;
    let x = variables(x, rowvar)?;
    let observations = x.shape()[1];
    let mut rows = x.data().iter().map(|x| x.to_f64()).collect_vec();
    if let Some(y) = y {
        let y = variables(y, rowvar)?;
        ensure!(
            y.shape()[1] == observations,
            "corrcoef expects {observations} observations in y, got {}",
            y.shape()[1]
        );
        rows.extend(y.data().iter().map(|y| y.to_f64()));
    }

    let count = rows.len() / observations.max(1);
    let centered = rows
        .chunks(observations.max(1))
        .flat_map(|row| {
            let mean = row.iter().sum::<f64>() / row.len() as f64;
            row.iter().map(move |x| x - mean)
        })
        .collect_vec();
    let row = |i: usize| &centered[i * observations..(i + 1) * observations];
    let covariance = |i: usize, j: usize| -> f64 {
        row(i).iter().zip(row(j)).map(|(a, b)| a * b).sum()
    };
    let variance = (0..count).map(|i| covariance(i, i)).collect_vec();

    Ok(Array::from_fn([count, count], |index| {
        let [i, j] = [index[0], index[1]];
        let coefficient = covariance(i, j) / (variance[i] * variance[j]).sqrt();
        T::from_f64(coefficient.clamp(-1.0, 1.0))
    }))
}

/// Converts flat indices into one coordinate array per axis of `shape`.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn unravel_index(indices: &Array<i64>, shape: &[usize]) -> Result<Vec<Array<i64>>> {
    let size = shape
        .iter()
        .try_fold(1usize, |size, &extent| size.checked_mul(extent))
        .ok_or_else(|| Error::InvalidArgument(format!("shape {shape:?} overflows")))?;
    if let Some(&index) = indices
        .data()
        .iter()
        .find(|&&index| !usize::try_from(index).is_ok_and(|index| index < size))
    {
        return Err(Error::InvalidArgument(format!(
            "index {index} is out of bounds for shape {shape:?}"
        )));
    }

    let strides = shape
        .iter()
        .rev()
        .scan(1usize, |stride, &extent| {
            let current = *stride;
            *stride *= extent;
            Some(current)
        })
        .collect_vec();
    Ok(shape
        .iter()
        .zip(strides.into_iter().rev())
        .map(|(&extent, stride)| indices.map(|index| (index as usize / stride % extent) as i64))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::{corrcoef, median, nanmean, nanmedian, unravel_index};
    use crate::{
        array::Array,
        capability::{DtypeTable, Version},
        engine::CpuBuilder,
        error::Error as WeftError,
    };

    #[test]
    fn test_median() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Array::create([2, 3], vec![3.0f32, 1.0, 2.0, 4.0, 6.0, 5.0])?;

        let y = median(&cpu, &x, None, false)?;
        assert_eq!(y.shape(), &[] as &[usize]);
        assert_eq!(y.data(), &[3.5]);

        let y = median(&cpu, &x, Some(&[1]), false)?;
        assert_eq!(y.data(), &[2.0, 5.0]);
        let y = median(&cpu, &x, Some(&[-2]), true)?;
        assert_eq!(y.shape(), &[1, 3]);
        assert_eq!(y.data(), &[3.5, 3.5, 3.5]);

        let x = Array::create(3usize, vec![1.0f64, f64::NAN, 0.0])?;
        assert!(median(&cpu, &x, None, false)?.data()[0].is_nan());
        assert_eq!(nanmedian(&cpu, &x, None, false)?.data(), &[0.5]);

        let err = median(&cpu, &x, Some(&[1]), false).unwrap_err();
        assert!(matches!(err, WeftError::Array(_)));
        let err = median(&cpu, &x, Some(&[0, -1]), false).unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));
        Ok(())
    }

    #[test]
    fn test_median_dtype() {
        let cpu = CpuBuilder::new()
            .with_version(Version::new(1, 11, 0))
            .with_dtypes(DtypeTable::torch())
            .build();
        let x = Array::<half::f16>::zeros(3usize);
        let err = median(&cpu, &x, None, false).unwrap_err();
        assert!(matches!(err, WeftError::UnsupportedConfiguration(_)));
    }

    #[test]
    fn test_nanmean() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Array::create([2, 2], vec![1.0f32, f32::NAN, f32::NAN, f32::NAN])?;
        let y = nanmean(&cpu, &x, Some(&[1]), true)?;
        assert_eq!(y.shape(), &[2, 1]);
        assert_eq!(y.data()[0], 1.0);
        assert!(y.data()[1].is_nan());

        let y = nanmean(&cpu, &x, Some(&[0]), false)?;
        assert_eq!(y.data()[0], 1.0);
        Ok(())
    }

    #[test]
    fn test_corrcoef() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Array::create([3, 3], vec![
            1.0f64, 2.0, 3.0, //
            2.0, 4.0, 6.0, //
            3.0, 2.0, 1.0,
        ])?;
        let y = corrcoef(&cpu, &x, None, true)?;
        assert_eq!(y.shape(), &[3, 3]);
        assert_eq!(y.data(), &[1.0, 1.0, -1.0, 1.0, 1.0, -1.0, -1.0, -1.0, 1.0]);

        // columns as variables
        let y = corrcoef(&cpu, &x.swap_axes(0, 1)?, None, false)?;
        assert_eq!(y.data(), &[1.0, 1.0, -1.0, 1.0, 1.0, -1.0, -1.0, -1.0, 1.0]);

        let a = Array::create(4usize, vec![1.0f64, 2.0, 3.0, 4.0])?;
        let b = Array::create(4usize, vec![1.0f64, 3.0, 2.0, 4.0])?;
        let y = corrcoef(&cpu, &a, Some(&b), true)?;
        assert_eq!(y.shape(), &[2, 2]);
        assert!((y.data()[1] - 0.8).abs() < 1e-12);

        let b = Array::create(3usize, vec![1.0f64, 3.0, 2.0])?;
        assert!(corrcoef(&cpu, &a, Some(&b), true).is_err());
        Ok(())
    }

    #[test]
    fn test_unravel_index() -> Result<(), Box<dyn Error>> {
        let indices = Array::create(3usize, vec![22i64, 41, 37])?;
        let coordinates = unravel_index(&indices, &[7, 6])?;
        assert_eq!(coordinates.len(), 2);
        assert_eq!(coordinates[0].data(), &[3, 6, 6]);
        assert_eq!(coordinates[1].data(), &[4, 5, 1]);

        let indices = Array::create([2, 1], vec![0i64, 23])?;
        let coordinates = unravel_index(&indices, &[2, 3, 4])?;
        assert_eq!(coordinates[2].shape(), &[2, 1]);
        assert_eq!(coordinates[0].data(), &[0, 1]);
        assert_eq!(coordinates[1].data(), &[0, 2]);
        assert_eq!(coordinates[2].data(), &[0, 3]);

        for index in [-1i64, 42] {
            let indices = Array::create(1usize, vec![index])?;
            let err = unravel_index(&indices, &[7, 6]).unwrap_err();
            assert!(matches!(err, WeftError::InvalidArgument(_)));
        }
        Ok(())
    }
}
