use itertools::Itertools;

use super::generate;
use crate::{
    array::{Array, Layout},
    engine::{ReduceKind, ReduceWindowSpec},
    error::{Result, ensure},
    num::Float,
};

/// Output spatial extents of a "valid" window sweep, checking every per-axis argument.
pub(crate) fn valid_extents(
    spatial: &[usize],
    window: &[usize],
    strides: &[usize],
    dilation: &[usize],
) -> Result<Vec<usize>> {
    let dims = spatial.len();
    ensure!(
        window.len() == dims && strides.len() == dims && dilation.len() == dims,
        "expected {dims} window sizes, strides and dilations, got {}, {} and {}",
        window.len(),
        strides.len(),
        dilation.len()
    );
    itertools::izip!(spatial, window, strides, dilation)
        .map(|(&extent, &window, &stride, &dilation)| {
            ensure!(
                window >= 1 && stride >= 1 && dilation >= 1,
                "window {window}, stride {stride} and dilation {dilation} must be >= 1"
            );
            let effective = (window - 1) * dilation + 1;
            ensure!(
                effective <= extent,
                "window {effective} exceeds input extent {extent}"
            );
            Ok((extent - effective) / stride + 1)
        })
        .collect()
}

pub fn reduce_window<T: Float>(x: &Array<T>, spec: &ReduceWindowSpec) -> Result<Array<T>> {
    ensure!(
        x.rank() >= 3,
        "window reduction expects [N, spatial.., C], got {}",
        x.layout()
    );
    let shape = x.shape();
    let (batch, spatial, channels) = (shape[0], &shape[1..shape.len() - 1], shape[shape.len() - 1]);
    let output = valid_extents(spatial, &spec.window, &spec.strides, &spec.dilation)?;

    let layout = Layout::from_shape([vec![batch], output, vec![channels]].concat());
    let taps = Layout::from_shape(spec.window.clone());
    let input = x.layout();

    let data = generate(layout.size(), |offset| {
        let index = layout.unravel(offset);
        let (n, position, c) = (index[0], &index[1..index.len() - 1], index[index.len() - 1]);
        let mut source = vec![0; index.len()];
        source[0] = n;
        source[index.len() - 1] = c;

        let init = match spec.reduce {
            ReduceKind::Max => f64::NEG_INFINITY,
            ReduceKind::Sum => 0.0,
        };
        let value = (0..taps.size()).fold(init, |acc, tap| {
            let tap = taps.unravel(tap);
            for (axis, (&p, &t)) in position.iter().zip_eq(&tap).enumerate() {
                source[axis + 1] = p * spec.strides[axis] + t * spec.dilation[axis];
            }
            let value = x.data()[input.offset_of(&source)].to_f64();
            match spec.reduce {
                // NaN wins and stays
                ReduceKind::Max if value.is_nan() || value > acc => value,
                ReduceKind::Max => acc,
                ReduceKind::Sum => acc + value,
            }
        });
        T::from_f64(value)
    });
    Ok(Array::create(layout, data)?)
}
