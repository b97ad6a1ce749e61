use itertools::Itertools;

use super::{generate, window::valid_extents};
use crate::{
    array::{Array, Layout},
    engine::ConvSpec,
    error::{Result, ensure},
    num::Float,
};

pub fn conv<T: Float>(x: &Array<T>, filters: &Array<T>, spec: &ConvSpec) -> Result<Array<T>> {
    ensure!(
        x.rank() >= 3,
        "convolution expects input [N, spatial.., C], got {}",
        x.layout()
    );
    ensure!(
        filters.rank() == x.rank(),
        "filters {} must have the rank of input {}",
        filters.layout(),
        x.layout()
    );
    let rank = x.rank();
    let shape = x.shape();
    let (batch, spatial, channels) = (shape[0], &shape[1..rank - 1], shape[rank - 1]);
    let kernel = &filters.shape()[..rank - 2];
    let (group_channels, features) = (filters.shape()[rank - 2], filters.shape()[rank - 1]);

    let groups = spec.groups;
    ensure!(groups >= 1, "groups must be >= 1, got {groups}");
    ensure!(
        channels % groups == 0 && features % groups == 0,
        "input channels {channels} and output channels {features} must be divisible by groups {groups}"
    );
    ensure!(
        group_channels * groups == channels,
        "filters {} expect {} input channels, got {channels}",
        filters.layout(),
        group_channels * groups
    );
    let output = valid_extents(spatial, kernel, &spec.strides, &spec.dilation)?;

    let layout = Layout::from_shape([vec![batch], output, vec![features]].concat());
    let taps = Layout::from_shape(kernel.to_vec());
    let input = x.layout();
    let weights = filters.layout();
    let group_features = features / groups;

    let data = generate(layout.size(), |offset| {
        let index = layout.unravel(offset);
        let (n, position, f) = (index[0], &index[1..rank - 1], index[rank - 1]);
        let group = f / group_features;

        let mut source = vec![0; rank];
        let mut weight = vec![0; rank];
        source[0] = n;
        weight[rank - 1] = f;

        let mut sum = 0.0;
        for tap in 0..taps.size() {
            let tap = taps.unravel(tap);
            for (axis, (&p, &t)) in position.iter().zip_eq(&tap).enumerate() {
                source[axis + 1] = p * spec.strides[axis] + t * spec.dilation[axis];
                weight[axis] = t;
            }
            for c in 0..group_channels {
                source[rank - 1] = group * group_channels + c;
                weight[rank - 2] = c;
                let lhs = x.data()[input.offset_of(&source)].to_f64();
                let rhs = filters.data()[weights.offset_of(&weight)].to_f64();
                sum += lhs * rhs;
            }
        }
        T::from_f64(sum)
    });
    Ok(Array::create(layout, data)?)
}
