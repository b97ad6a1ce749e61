use super::generate;
use crate::{
    array::{Array, Layout},
    engine::PadMode,
    error::{Result, ensure},
    num::Scalar,
};

/// Source coordinate of `index` on an axis of `extent`, or `None` for a constant fill.
fn source<T>(index: isize, extent: usize, mode: &PadMode<T>) -> Option<usize> {
    let last = extent as isize - 1;
    if (0..=last).contains(&index) {
        return Some(index as usize);
    }
    match mode {
        PadMode::Constant(_) => None,
        PadMode::Edge => Some(index.clamp(0, last) as usize),
        PadMode::Reflect if index < 0 => Some(-index as usize),
        PadMode::Reflect => Some((2 * last - index) as usize),
        PadMode::Wrap => Some(index.rem_euclid(extent as isize) as usize),
    }
}

pub fn pad<T: Scalar>(x: &Array<T>, pads: &[(usize, usize)], mode: PadMode<T>) -> Result<Array<T>> {
    ensure!(
        pads.len() == x.rank(),
        "got {} paddings for array of rank {}",
        pads.len(),
        x.rank()
    );
    for (axis, (&extent, &(before, after))) in x.shape().iter().zip(pads).enumerate() {
        let padded = before > 0 || after > 0;
        match mode {
            PadMode::Reflect => ensure!(
                before < extent && after < extent,
                "reflect padding ({before}, {after}) must be less than extent {extent} on axis {axis}"
            ),
            PadMode::Edge | PadMode::Wrap => ensure!(
                !padded || extent > 0,
                "cannot pad empty axis {axis} from its contents"
            ),
            PadMode::Constant(_) => {}
        }
    }
    if pads.iter().all(|&(before, after)| before == 0 && after == 0) {
        return Ok(x.clone());
    }

    let shape: Vec<_> = x
        .shape()
        .iter()
        .zip(pads)
        .map(|(&extent, &(before, after))| extent + before + after)
        .collect();
    let layout = Layout::from_shape(shape);
    let input = x.layout();

    let fill = match mode {
        PadMode::Constant(value) => value,
        _ => T::zero(),
    };
    let data = generate(layout.size(), |offset| {
        let index = layout.unravel(offset);
        let position: Option<Vec<usize>> = index
            .iter()
            .zip(x.shape())
            .zip(pads)
            .map(|((&i, &extent), &(before, _))| source(i as isize - before as isize, extent, &mode))
            .collect();
        match position {
            Some(position) => x.data()[input.offset_of(&position)],
            None => fill,
        }
    });
    Ok(Array::create(layout, data)?)
}
