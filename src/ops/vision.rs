use std::str::FromStr;

use derive_more::Display;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::ensure_supported;
use crate::{
    array::Array,
    engine::{Engine, PadMode},
    error::{Error, Result, ensure, unsupported},
    num::{Float, Scalar},
    window::Spatial,
};

/// Pads every axis of `x` by `(before, after)`.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn pad<T: Scalar>(
    engine: &impl Engine,
    x: &Array<T>,
    pads: &[(usize, usize)],
    mode: PadMode<T>,
) -> Result<Array<T>> {
    ensure!(
        pads.len() == x.rank(),
        "pad expects {} (before, after) pairs for {}, got {}",
        x.rank(),
        x.layout(),
        pads.len()
    );
    engine.pad(x, pads, mode)
}

/// Converts a flat `[last_before, last_after, second_last_before, ..]` padding list into one
/// `(before, after)` pair per axis of an array of `rank`. Leading axes are not padded.
pub fn torch_pad_widths(flat: &[usize], rank: usize) -> Result<Vec<(usize, usize)>> {
    ensure!(
        flat.len() % 2 == 0,
        "padding length must be divisible by 2, got {}",
        flat.len()
    );
    ensure!(
        flat.len() / 2 <= rank,
        "padding length {} is too large for rank {rank}",
        flat.len()
    );
    let mut pads = vec![(0, 0); rank - flat.len() / 2];
    pads.extend(flat.chunks_exact(2).rev().map(|pair| (pair[0], pair[1])));
    Ok(pads)
}

/// Rearranges `[B, C * r * r, H, W]` into `[B, C, H * r, W * r]`.
pub fn pixel_shuffle<T: Scalar>(x: &Array<T>, upscale_factor: usize) -> Result<Array<T>> {
    ensure!(
        x.rank() == 4,
        "pixel_shuffle expects a 4-D input, got {}",
        x.layout()
    );
    let r = upscale_factor;
    ensure!(r >= 1, "upscale factor must be >= 1, got {r}");
    let [b, c, h, w] = [x.shape()[0], x.shape()[1], x.shape()[2], x.shape()[3]];
    ensure!(
        c % (r * r) == 0,
        "pixel_shuffle expects channels {c} divisible by {}",
        r * r
    );
    let oc = c / (r * r);
    let y = x.reshape([b, oc, r, r, h, w])?.permute(&[0, 1, 4, 2, 5, 3])?;
    Ok(y.reshape([b, oc, h * r, w * r])?)
}

/// Rearranges `[B, C, H * r, W * r]` into `[B, C * r * r, H, W]`.
pub fn pixel_unshuffle<T: Scalar>(x: &Array<T>, downscale_factor: usize) -> Result<Array<T>> {
    ensure!(
        x.rank() == 4,
        "pixel_unshuffle expects a 4-D input, got {}",
        x.layout()
    );
    let r = downscale_factor;
    ensure!(r >= 1, "downscale factor must be >= 1, got {r}");
    let [b, c, h, w] = [x.shape()[0], x.shape()[1], x.shape()[2], x.shape()[3]];
    ensure!(
        h % r == 0 && w % r == 0,
        "pixel_unshuffle expects height {h} and width {w} divisible by {r}"
    );
    let (oh, ow) = (h / r, w / r);
    let y = x.reshape([b, c, oh, r, ow, r])?.permute(&[0, 1, 3, 5, 2, 4])?;
    Ok(y.reshape([b, c * r * r, oh, ow])?)
}

/// Output spatial extents from exactly one of an explicit size or a scale factor.
pub fn resolve_output_size(
    spatial: &[usize],
    size: Option<&Spatial>,
    scale_factor: Option<&[f64]>,
) -> Result<Vec<usize>> {
    let dims = spatial.len();
    match (size, scale_factor) {
        (Some(_), Some(_)) => unsupported!("only one of size or scale factor should be defined"),
        (None, None) => Err(Error::InvalidArgument(
            "either size or scale factor should be defined".into(),
        )),
        (Some(size), None) => size.broadcast(dims, "size"),
        (None, Some(scale)) => {
            let scale = match scale.len() {
                1 => vec![scale[0]; dims],
                len if len == dims => scale.to_vec(),
                len => {
                    return Err(Error::InvalidArgument(format!(
                        "scale factor expects 1 or {dims} values, got {len}"
                    )));
                }
            };
            spatial
                .iter()
                .zip(scale)
                .map(|(&extent, scale)| {
                    ensure!(
                        scale.is_finite() && scale > 0.0,
                        "scale factor must be positive, got {scale}"
                    );
                    Ok((extent as f64 * scale).floor() as usize)
                })
                .collect()
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InterpolateMode {
    #[default]
    #[display("nearest")]
    Nearest,
    #[display("linear")]
    Linear,
    #[display("bilinear")]
    Bilinear,
    #[display("trilinear")]
    Trilinear,
}

impl FromStr for InterpolateMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nearest" => Ok(Self::Nearest),
            "linear" => Ok(Self::Linear),
            "bilinear" => Ok(Self::Bilinear),
            "trilinear" => Ok(Self::Trilinear),
            "bicubic" | "area" | "nearest-exact" => unsupported!("interpolation mode `{s}`"),
            _ => Err(Error::InvalidArgument(format!(
                "unknown interpolation mode `{s}`"
            ))),
        }
    }
}

impl InterpolateMode {
    /// Input rank the mode requires, if it is tied to one.
    fn rank(self) -> Option<usize> {
        match self {
            InterpolateMode::Nearest => None,
            InterpolateMode::Linear => Some(3),
            InterpolateMode::Bilinear => Some(4),
            InterpolateMode::Trilinear => Some(5),
        }
    }
}

/// Resamples one axis of `x` to `output` elements.
fn resample_axis<T: Float>(
    x: &Array<T>,
    axis: usize,
    output: usize,
    mode: InterpolateMode,
    align_corners: bool,
) -> Result<Array<T>> {
    let input = x.shape()[axis];
    if input == output {
        return Ok(x.clone());
    }
    ensure!(input > 0, "cannot resample empty axis {axis} of {}", x.layout());

    let layout = x.layout().with_axis(axis, output);
    let source = x.layout();
    let ratio = input as f64 / output.max(1) as f64;
    let last = input - 1;
    let fetch = |index: &[usize], position: usize| {
        let mut index = index.to_vec();
        index[axis] = position;
        x.data()[source.offset_of(&index)].to_f64()
    };

    let y = Array::from_fn(layout, |index| {
        let dst = index[axis] as f64;
        match mode {
            InterpolateMode::Nearest => {
                let position = ((dst * ratio).floor() as usize).min(last);
                T::from_f64(fetch(index, position))
            }
            _ => {
                let src = match align_corners {
                    true if output > 1 => dst * last as f64 / (output - 1) as f64,
                    true => 0.0,
                    false => ((dst + 0.5) * ratio - 0.5).max(0.0),
                };
                let lo = (src.floor() as usize).min(last);
                let hi = (lo + 1).min(last);
                let weight = src - lo as f64;
                let value = (1.0 - weight) * fetch(index, lo) + weight * fetch(index, hi);
                T::from_f64(value)
            }
        }
    });
    Ok(y)
}

/// Resizes the spatial axes of a channels-first `[N, C, spatial..]` input.
///
/// `align_corners` is only meaningful for the linear modes, where it defaults to `false`.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn interpolate<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    size: Option<&Spatial>,
    scale_factor: Option<&[f64]>,
    mode: InterpolateMode,
    align_corners: Option<bool>,
) -> Result<Array<T>> {
    ensure_supported(engine, T::DATA_TYPE, "interpolate")?;
    ensure!(
        (3..=5).contains(&x.rank()),
        "interpolate supports 3-D, 4-D and 5-D inputs, got {}",
        x.layout()
    );
    if let Some(rank) = mode.rank() {
        ensure!(
            x.rank() == rank,
            "{mode} interpolation expects a {rank}-D input, got {}",
            x.layout()
        );
    }
    ensure!(
        mode != InterpolateMode::Nearest || align_corners.is_none(),
        "align_corners can only be set with the linear interpolation modes"
    );
    let align_corners = align_corners.unwrap_or(false);

    let output = resolve_output_size(&x.shape()[2..], size, scale_factor)?;
    log::trace!("interpolate {} to {output:?} with {mode}", x.layout());
    output
        .into_iter()
        .enumerate()
        .try_fold(x.clone(), |y, (axis, extent)| {
            resample_axis(&y, axis + 2, extent, mode, align_corners)
        })
}
