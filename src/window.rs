//! Padding and window-count normalization for windowed operations.
//!
//! Every pooling and convolution adapter, whatever its spatial rank, resolves its per-axis
//! padding here before handing an explicitly padded input to an engine primitive that runs in
//! "valid" mode. Axes are always resolved independently.

use std::str::FromStr;

use derive_more::Display;
use itertools::Itertools;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ensure};

/// Symbolic padding modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PaddingMode {
    /// No padding.
    #[display("valid")]
    Valid,
    /// Pad so that the output extent is `ceil(input / stride)`.
    #[display("same")]
    Same,
}

impl FromStr for PaddingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "valid" => Ok(Self::Valid),
            "same" => Ok(Self::Same),
            _ => Err(Error::InvalidArgument(format!(
                "padding mode `{s}` must be one of `valid` or `same`"
            ))),
        }
    }
}

/// Kernel size, stride and dilation of one spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindowSpec {
    pub kernel: usize,
    pub stride: usize,
    pub dilation: usize,
}

impl WindowSpec {
    pub fn new(kernel: usize, stride: usize, dilation: usize) -> Result<Self> {
        ensure!(kernel >= 1, "kernel size must be >= 1, got {kernel}");
        ensure!(stride >= 1, "stride must be >= 1, got {stride}");
        ensure!(dilation >= 1, "dilation must be >= 1, got {dilation}");
        ensure!(
            (kernel - 1)
                .checked_mul(dilation)
                .and_then(|span| span.checked_add(1))
                .is_some(),
            "dilated kernel {kernel} x {dilation} overflows"
        );
        Ok(Self {
            kernel,
            stride,
            dilation,
        })
    }

    /// The span the kernel covers once dilation inserts gaps between taps.
    #[inline]
    pub fn effective_kernel(&self) -> usize {
        self.kernel + (self.kernel - 1) * (self.dilation - 1)
    }
}

/// A per-axis integer argument: one value for every axis, or one value per axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Spatial {
    Scalar(usize),
    Axes(Vec<usize>),
}

impl Spatial {
    /// Expands to exactly `dims` values. `name` labels the argument in errors.
    pub fn broadcast(&self, dims: usize, name: &str) -> Result<Vec<usize>> {
        match self {
            Spatial::Scalar(value) => Ok(vec![*value; dims]),
            Spatial::Axes(values) if values.len() == 1 => Ok(vec![values[0]; dims]),
            Spatial::Axes(values) if values.len() == dims => Ok(values.clone()),
            Spatial::Axes(values) => Err(Error::InvalidArgument(format!(
                "{name} expects 1 or {dims} values, got {}",
                values.len()
            ))),
        }
    }
}

impl Default for Spatial {
    fn default() -> Self {
        Self::Scalar(1)
    }
}

impl From<usize> for Spatial {
    #[inline]
    fn from(value: usize) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<usize>> for Spatial {
    #[inline]
    fn from(value: Vec<usize>) -> Self {
        Self::Axes(value)
    }
}

impl From<&[usize]> for Spatial {
    #[inline]
    fn from(value: &[usize]) -> Self {
        Self::Axes(value.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Spatial {
    #[inline]
    fn from(value: [usize; N]) -> Self {
        Self::Axes(value.to_vec())
    }
}

/// How an adapter's caller asked for padding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaddingSpec {
    Symbolic(PaddingMode),
    /// Equal padding on both sides of each axis.
    Symmetric(Spatial),
    /// `(before, after)` pairs: one for every axis, or one per axis.
    Explicit(Vec<(usize, usize)>),
}

impl Default for PaddingSpec {
    fn default() -> Self {
        Self::Symbolic(PaddingMode::Valid)
    }
}

impl From<PaddingMode> for PaddingSpec {
    #[inline]
    fn from(value: PaddingMode) -> Self {
        Self::Symbolic(value)
    }
}

impl From<Spatial> for PaddingSpec {
    #[inline]
    fn from(value: Spatial) -> Self {
        Self::Symmetric(value)
    }
}

impl From<usize> for PaddingSpec {
    #[inline]
    fn from(value: usize) -> Self {
        Self::Symmetric(Spatial::Scalar(value))
    }
}

impl From<Vec<(usize, usize)>> for PaddingSpec {
    #[inline]
    fn from(value: Vec<(usize, usize)>) -> Self {
        Self::Explicit(value)
    }
}

impl<const N: usize> From<[(usize, usize); N]> for PaddingSpec {
    #[inline]
    fn from(value: [(usize, usize); N]) -> Self {
        Self::Explicit(value.to_vec())
    }
}

impl FromStr for PaddingSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse().map(Self::Symbolic)
    }
}

impl PaddingSpec {
    /// Per-axis `(before, after)` pairs for `dims` axes, or `None` for symbolic padding, which
    /// depends on the extents.
    pub fn explicit_pairs(&self, dims: usize) -> Result<Option<Vec<(usize, usize)>>> {
        match self {
            PaddingSpec::Symbolic(_) => Ok(None),
            PaddingSpec::Symmetric(spatial) => Ok(Some(
                spatial
                    .broadcast(dims, "padding")?
                    .into_iter()
                    .map(|pad| (pad, pad))
                    .collect(),
            )),
            PaddingSpec::Explicit(pairs) if pairs.len() == 1 => Ok(Some(vec![pairs[0]; dims])),
            PaddingSpec::Explicit(pairs) => {
                ensure!(
                    pairs.len() == dims,
                    "padding expects 1 or {dims} pairs, got {}",
                    pairs.len()
                );
                Ok(Some(pairs.clone()))
            }
        }
    }
}

/// The normalized padding of one axis.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedAxis {
    pub pad_before: usize,
    /// Trailing padding, including [`ResolvedAxis::extension`].
    pub pad_after: usize,
    /// Number of windows along the axis, i.e. its output extent.
    pub windows: usize,
    /// Trailing padding added by ceil mode.
    pub extension: usize,
}

impl ResolvedAxis {
    #[inline]
    pub fn pads(&self) -> (usize, usize) {
        (self.pad_before, self.pad_after)
    }

    /// Padding the caller asked for, without the ceil-mode extension.
    #[inline]
    pub fn requested_pads(&self) -> (usize, usize) {
        (self.pad_before, self.pad_after - self.extension)
    }
}

/// Resolves a symbolic padding mode to `(before, after)` for one axis.
///
/// `same` pads by `max(0, (ceil(input / stride) - 1) * stride + effective_kernel - input)` in
/// total, with the smaller half in front.
pub fn resolve_symbolic_padding(
    input_extent: usize,
    stride: usize,
    effective_kernel: usize,
    mode: PaddingMode,
) -> Result<(usize, usize)> {
    ensure!(input_extent >= 1, "input extent must be >= 1, got {input_extent}");
    ensure!(stride >= 1, "stride must be >= 1, got {stride}");
    ensure!(
        effective_kernel >= 1,
        "effective kernel must be >= 1, got {effective_kernel}"
    );

    match mode {
        PaddingMode::Valid => Ok((0, 0)),
        PaddingMode::Same => {
            let output_extent = input_extent.div_ceil(stride);
            let span = (output_extent - 1)
                .checked_mul(stride)
                .and_then(|span| span.checked_add(effective_kernel))
                .ok_or_else(|| Error::InvalidArgument("same padding overflows".into()))?;
            let total = span.saturating_sub(input_extent);
            Ok((total / 2, total - total / 2))
        }
    }
}

/// Extent produced by a transposed sweep of `input_extent` windows, the inverse of symbolic
/// padding: `valid` gives `input * stride + max(effective_kernel - stride, 0)`, `same` gives
/// `input * stride`.
pub fn transpose_output_extent(
    input_extent: usize,
    stride: usize,
    effective_kernel: usize,
    mode: PaddingMode,
) -> Result<usize> {
    ensure!(stride >= 1, "stride must be >= 1, got {stride}");
    ensure!(
        effective_kernel >= 1,
        "effective kernel must be >= 1, got {effective_kernel}"
    );
    let extent = input_extent.checked_mul(stride).and_then(|extent| match mode {
        PaddingMode::Valid => extent.checked_add(effective_kernel.saturating_sub(stride)),
        PaddingMode::Same => Some(extent),
    });
    extent.ok_or_else(|| Error::InvalidArgument("transposed extent overflows".into()))
}

/// Number of windows along one axis under floor semantics.
pub fn output_extent(
    input_extent: usize,
    effective_kernel: usize,
    pad_before: usize,
    pad_after: usize,
    stride: usize,
) -> Result<usize> {
    let padded = padded_extent(input_extent, effective_kernel, pad_before, pad_after, stride)?;
    Ok((padded - effective_kernel) / stride + 1)
}

/// Extends trailing padding so the window count follows ceiling division.
///
/// Returns `(pad_before, pad_after, window_count)`. If the extra window would start at or after
/// `input_extent + pad_before`, it reads nothing but padding and is dropped: the padding is
/// returned unchanged together with the floor window count.
pub fn apply_ceil_mode(
    input_extent: usize,
    effective_kernel: usize,
    pad_before: usize,
    pad_after: usize,
    stride: usize,
) -> Result<(usize, usize, usize)> {
    let padded = padded_extent(input_extent, effective_kernel, pad_before, pad_after, stride)?;
    let span = padded - effective_kernel;
    let n_floor = span / stride + 1;
    let n_ceil = span.div_ceil(stride) + 1;
    if n_ceil == n_floor {
        return Ok((pad_before, pad_after, n_floor));
    }

    let last_start = (n_ceil - 1) * stride;
    if last_start >= input_extent + pad_before {
        log::debug!(
            "ceil mode: dropping window at {last_start}, past input {input_extent} + {pad_before}"
        );
        return Ok((pad_before, pad_after, n_floor));
    }

    let extension = last_start + effective_kernel - padded;
    log::debug!("ceil mode: extending trailing padding {pad_after} by {extension}");
    Ok((pad_before, pad_after + extension, n_ceil))
}

/// Checks that explicit padding does not exceed the kernel on either side of any axis.
pub fn validate_padding_fits_kernel(
    kernel_sizes: &[usize],
    paddings: &[(usize, usize)],
) -> Result<()> {
    ensure!(
        kernel_sizes.len() == paddings.len(),
        "got {} kernel sizes but {} paddings",
        kernel_sizes.len(),
        paddings.len()
    );
    for (axis, (&kernel, &(before, after))) in kernel_sizes.iter().zip(paddings).enumerate() {
        ensure!(
            before <= kernel && after <= kernel,
            "padding ({before}, {after}) exceeds kernel size {kernel} on axis {axis}"
        );
    }
    Ok(())
}

fn padded_extent(
    input_extent: usize,
    effective_kernel: usize,
    pad_before: usize,
    pad_after: usize,
    stride: usize,
) -> Result<usize> {
    ensure!(stride >= 1, "stride must be >= 1, got {stride}");
    ensure!(
        effective_kernel >= 1,
        "effective kernel must be >= 1, got {effective_kernel}"
    );
    let padded = input_extent
        .checked_add(pad_before)
        .and_then(|extent| extent.checked_add(pad_after))
        .ok_or_else(|| Error::InvalidArgument("padded extent overflows".into()))?;
    ensure!(
        padded >= effective_kernel,
        "window ({effective_kernel}) exceeds padded input ({padded})"
    );
    Ok(padded)
}

/// Resolves the padding of every spatial axis of a windowed operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowNormalizer {
    ceil_mode: bool,
    padding_bound: bool,
}

impl WindowNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count windows with ceiling division.
    pub fn with_ceil_mode(mut self, ceil_mode: bool) -> Self {
        self.ceil_mode = ceil_mode;
        self
    }

    /// Reject explicit padding wider than the kernel.
    pub fn with_padding_bound(mut self, padding_bound: bool) -> Self {
        self.padding_bound = padding_bound;
        self
    }

    /// Resolves `padding` for input `extents` and per-axis `windows`.
    pub fn normalize(
        &self,
        extents: &[usize],
        windows: &[WindowSpec],
        padding: &PaddingSpec,
    ) -> Result<Vec<ResolvedAxis>> {
        let dims = extents.len();
        ensure!(
            windows.len() == dims,
            "got {dims} spatial extents but {} window specs",
            windows.len()
        );

        let pads = match padding {
            PaddingSpec::Symbolic(mode) => extents
                .iter()
                .zip_eq(windows)
                .map(|(&extent, window)| {
                    resolve_symbolic_padding(extent, window.stride, window.effective_kernel(), *mode)
                })
                .collect::<Result<Vec<_>>>()?,
            _ => padding.explicit_pairs(dims)?.unwrap_or_default(),
        };

        if self.padding_bound && !matches!(padding, PaddingSpec::Symbolic(_)) {
            let kernels = windows.iter().map(|window| window.kernel).collect_vec();
            validate_padding_fits_kernel(&kernels, &pads)?;
        }

        let resolved = itertools::izip!(extents, windows, pads)
            .map(|(&extent, window, (before, after))| -> Result<ResolvedAxis> {
                let kernel = window.effective_kernel();
                let stride = window.stride;
                if self.ceil_mode {
                    let (pad_before, pad_after, windows) =
                        apply_ceil_mode(extent, kernel, before, after, stride)?;
                    return Ok(ResolvedAxis {
                        pad_before,
                        pad_after,
                        windows,
                        extension: pad_after - after,
                    });
                }
                Ok(ResolvedAxis {
                    pad_before: before,
                    pad_after: after,
                    windows: output_extent(extent, kernel, before, after, stride)?,
                    extension: 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        log::trace!("resolved windows {resolved:?} for extents {extents:?}");
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::{
        PaddingMode, PaddingSpec, ResolvedAxis, Spatial, WindowNormalizer, WindowSpec,
        apply_ceil_mode, output_extent, resolve_symbolic_padding, transpose_output_extent,
        validate_padding_fits_kernel,
    };
    use crate::error::Error as WeftError;

    #[test]
    fn test_effective_kernel() -> Result<(), Box<dyn Error>> {
        assert_eq!(WindowSpec::new(3, 1, 2)?.effective_kernel(), 5);
        assert_eq!(WindowSpec::new(3, 1, 1)?.effective_kernel(), 3);
        assert_eq!(WindowSpec::new(1, 1, 4)?.effective_kernel(), 1);
        assert!(WindowSpec::new(0, 1, 1).is_err());
        assert!(WindowSpec::new(2, 0, 1).is_err());
        assert!(WindowSpec::new(2, 1, 0).is_err());
        Ok(())
    }

    #[test]
    fn test_valid_padding() -> Result<(), Box<dyn Error>> {
        fastrand::seed(42);
        for _ in 0..256 {
            let input = fastrand::usize(1..64);
            let stride = fastrand::usize(1..8);
            let kernel = fastrand::usize(1..8);
            let pads = resolve_symbolic_padding(input, stride, kernel, PaddingMode::Valid)?;
            assert_eq!(pads, (0, 0));
        }
        Ok(())
    }

    #[test]
    fn test_same_padding() -> Result<(), Box<dyn Error>> {
        assert_eq!(
            resolve_symbolic_padding(10, 2, 3, PaddingMode::Same)?,
            (0, 1)
        );
        assert_eq!(
            resolve_symbolic_padding(5, 1, 5, PaddingMode::Same)?,
            (2, 2)
        );
        assert_eq!(
            resolve_symbolic_padding(6, 3, 1, PaddingMode::Same)?,
            (0, 0)
        );

        fastrand::seed(42);
        for _ in 0..1024 {
            let input = fastrand::usize(1..64);
            let stride = fastrand::usize(1..8);
            let kernel = fastrand::usize(1..16);
            let (before, after) = resolve_symbolic_padding(input, stride, kernel, PaddingMode::Same)?;
            assert!(before <= after && after - before <= 1);
            let windows = output_extent(input, kernel, before, after, stride)?;
            assert_eq!(windows, input.div_ceil(stride));
        }
        Ok(())
    }

    #[test]
    fn test_symbolic_padding_domain() {
        let err = resolve_symbolic_padding(0, 1, 1, PaddingMode::Same).unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));
        let err = resolve_symbolic_padding(4, 0, 1, PaddingMode::Valid).unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));
    }

    #[test]
    fn test_same_padding_overflow() -> Result<(), Box<dyn Error>> {
        let err = resolve_symbolic_padding(2, 1, usize::MAX, PaddingMode::Same).unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));
        let err = resolve_symbolic_padding(usize::MAX, usize::MAX / 2, 4, PaddingMode::Same)
            .unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));

        let windows = [WindowSpec::new(usize::MAX, 1, 1)?];
        let same = PaddingSpec::Symbolic(PaddingMode::Same);
        let err = WindowNormalizer::new()
            .normalize(&[2], &windows, &same)
            .unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));
        Ok(())
    }

    #[test]
    fn test_transpose_output_extent() -> Result<(), Box<dyn Error>> {
        assert_eq!(transpose_output_extent(3, 2, 3, PaddingMode::Valid)?, 7);
        assert_eq!(transpose_output_extent(3, 4, 3, PaddingMode::Valid)?, 12);
        assert_eq!(transpose_output_extent(3, 2, 3, PaddingMode::Same)?, 6);
        let err = transpose_output_extent(usize::MAX, 2, 1, PaddingMode::Same).unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));

        // a forward sweep over the transposed extent recovers the window count
        fastrand::seed(7);
        for _ in 0..256 {
            let input = fastrand::usize(1..32);
            let stride = fastrand::usize(1..6);
            let kernel = fastrand::usize(1..8);
            for mode in [PaddingMode::Valid, PaddingMode::Same] {
                let extent = transpose_output_extent(input, stride, kernel, mode)?;
                let (before, after) = resolve_symbolic_padding(extent, stride, kernel, mode)?;
                assert_eq!(output_extent(extent, kernel, before, after, stride)?, input);
            }
        }
        Ok(())
    }

    #[test]
    fn test_ceil_mode() -> Result<(), Box<dyn Error>> {
        // the extra window starts at 4, inside the input
        assert_eq!(apply_ceil_mode(5, 2, 0, 0, 2)?, (0, 1, 3));
        // windows already tile the input
        assert_eq!(apply_ceil_mode(4, 2, 0, 0, 2)?, (0, 0, 2));
        // the extra window would start at 6 = 5 + 1, reading only padding
        assert_eq!(apply_ceil_mode(5, 3, 1, 1, 3)?, (1, 1, 2));
        assert_eq!(apply_ceil_mode(4, 2, 0, 2, 3)?, (0, 2, 2));
        // matches the reference pooling output of 4 for a 6-wide input
        assert_eq!(apply_ceil_mode(6, 3, 1, 1, 2)?, (1, 2, 4));

        let err = apply_ceil_mode(2, 5, 0, 0, 1).unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));
        Ok(())
    }

    #[test]
    fn test_ceil_mode_idempotent() -> Result<(), Box<dyn Error>> {
        fastrand::seed(7);
        for _ in 0..1024 {
            let input = fastrand::usize(1..48);
            let kernel = fastrand::usize(1..=input.min(8));
            let stride = fastrand::usize(1..6);
            let before = fastrand::usize(0..=kernel);
            let after = fastrand::usize(0..kernel);

            let once = apply_ceil_mode(input, kernel, before, after, stride)?;
            assert_eq!(once, apply_ceil_mode(input, kernel, before, after, stride)?);

            let (before, after, windows) = once;
            let twice = apply_ceil_mode(input, kernel, before, after, stride)?;
            assert_eq!(twice, once);

            // no window starts in the trailing padding
            assert!((windows - 1) * stride < input + before);
        }
        Ok(())
    }

    #[test]
    fn test_padding_fits_kernel() {
        assert!(validate_padding_fits_kernel(&[3, 3], &[(1, 1), (3, 0)]).is_ok());

        let err = validate_padding_fits_kernel(&[3], &[(4, 0)]).unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));
        let err = validate_padding_fits_kernel(&[3], &[(0, 4)]).unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));
        let err = validate_padding_fits_kernel(&[3, 3], &[(0, 0)]).unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));
    }

    #[test]
    fn test_spatial_broadcast() -> Result<(), Box<dyn Error>> {
        assert_eq!(Spatial::from(2).broadcast(3, "stride")?, vec![2, 2, 2]);
        assert_eq!(Spatial::from([4]).broadcast(2, "stride")?, vec![4, 4]);
        assert_eq!(Spatial::from([1, 2]).broadcast(2, "stride")?, vec![1, 2]);
        let err = Spatial::from([1, 2]).broadcast(3, "stride").unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));
        Ok(())
    }

    #[test]
    fn test_normalize() -> Result<(), Box<dyn Error>> {
        let windows = [WindowSpec::new(3, 2, 1)?, WindowSpec::new(2, 2, 2)?];

        let resolved = WindowNormalizer::new().normalize(
            &[10, 7],
            &windows,
            &PaddingSpec::Symbolic(PaddingMode::Same),
        )?;
        assert_eq!(resolved[0].pads(), (0, 1));
        assert_eq!(resolved[0].windows, 5);
        // effective kernel 3 on an input of 7: total padding 2
        assert_eq!(resolved[1].pads(), (1, 1));
        assert_eq!(resolved[1].windows, 4);

        let resolved = WindowNormalizer::new()
            .with_ceil_mode(true)
            .normalize(&[6, 4], &windows, &PaddingSpec::from(0))?;
        assert_eq!(
            resolved[0],
            ResolvedAxis {
                pad_before: 0,
                pad_after: 1,
                windows: 3,
                extension: 1,
            }
        );
        assert_eq!(resolved[0].requested_pads(), (0, 0));
        assert_eq!(resolved[1].pads(), (0, 1));
        assert_eq!(resolved[1].windows, 2);

        let resolved =
            WindowNormalizer::new().normalize(&[5, 5], &windows, &PaddingSpec::from([(1, 2)]))?;
        assert_eq!(resolved[0].pads(), (1, 2));
        assert_eq!(resolved[1].pads(), (1, 2));
        Ok(())
    }

    #[test]
    fn test_normalize_rejects() -> Result<(), Box<dyn Error>> {
        let windows = [WindowSpec::new(3, 1, 1)?];
        let bounded = WindowNormalizer::new().with_padding_bound(true);

        let err = bounded
            .normalize(&[8], &windows, &PaddingSpec::from([(4, 0)]))
            .unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));
        // unbounded normalization accepts wide explicit padding
        assert!(
            WindowNormalizer::new()
                .normalize(&[8], &windows, &PaddingSpec::from([(4, 0)]))
                .is_ok()
        );

        let err = bounded
            .normalize(&[8, 8], &windows, &PaddingSpec::from(0))
            .unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));

        let err = bounded
            .normalize(&[8], &windows, &PaddingSpec::from(vec![(0, 0), (1, 1)]))
            .unwrap_err();
        assert!(matches!(err, WeftError::InvalidArgument(_)));
        Ok(())
    }

    #[test]
    fn test_parse_padding() -> Result<(), Box<dyn Error>> {
        assert_eq!("SAME".parse::<PaddingMode>()?, PaddingMode::Same);
        assert_eq!(
            "valid".parse::<PaddingSpec>()?,
            PaddingSpec::Symbolic(PaddingMode::Valid)
        );
        assert!("full".parse::<PaddingMode>().is_err());
        Ok(())
    }
}
