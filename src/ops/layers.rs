use super::{DataFormat, ensure_supported};
use crate::{
    array::Array,
    engine::Engine,
    error::{Error, Result, ensure},
    num::Float,
};

/// Looks up rows of `[V, D]` `weights`; the output is `indices.shape + [D]`.
///
/// With `max_norm`, rows whose L2 norm exceeds it are scaled down to norm `max_norm`.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn embedding<T: Float>(
    engine: &impl Engine,
    weights: &Array<T>,
    indices: &Array<i64>,
    max_norm: Option<f64>,
) -> Result<Array<T>> {
    ensure_supported(engine, T::DATA_TYPE, "embedding")?;
    ensure!(
        weights.rank() == 2,
        "embedding expects weights [V, D], got {}",
        weights.layout()
    );
    let [vocabulary, features] = [weights.shape()[0], weights.shape()[1]];
    if let Some(&index) = indices
        .data()
        .iter()
        .find(|&&index| !usize::try_from(index).is_ok_and(|index| index < vocabulary))
    {
        return Err(Error::InvalidArgument(format!(
            "index {index} is out of range for {vocabulary} embeddings"
        )));
    }

    let scales: Vec<Option<(f64, f64)>> = match max_norm {
        Some(max_norm) => {
            ensure!(max_norm > 0.0, "max norm must be positive, got {max_norm}");
            weights
                .data()
                .chunks(features.max(1))
                .map(|row| {
                    let norm = row.iter().map(|x| x.to_f64().powi(2)).sum::<f64>().sqrt();
                    match norm > max_norm {
                        true => Some((max_norm, norm)),
                        false => None,
                    }
                })
                .collect()
        }
        None => vec![None; vocabulary],
    };

    let mut layout = indices.shape().to_vec();
    layout.push(features);
    let lookup = indices.layout();
    Ok(Array::from_fn(layout, |index| {
        let (position, feature) = index.split_at(index.len() - 1);
        let row = indices.data()[lookup.offset_of(position)] as usize;
        let value = weights.data()[row * features + feature[0]];
        match scales[row] {
            Some((max_norm, norm)) => T::from_f64(value.to_f64() * max_norm / norm),
            None => value,
        }
    }))
}

/// Zeroes whole channels of a `[N, W, C]`, `[N, C, W]` (or unbatched) input with probability
/// `prob` and scales the kept ones by `1 / (1 - prob)`.
///
/// The mask is drawn from a generator seeded with `seed`. Outside `training` the input passes
/// through unchanged.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn dropout1d<T: Float>(
    engine: &impl Engine,
    x: &Array<T>,
    prob: f64,
    training: bool,
    data_format: DataFormat,
    seed: u64,
) -> Result<Array<T>> {
    ensure_supported(engine, T::DATA_TYPE, "dropout1d")?;
    ensure!(
        (0.0..1.0).contains(&prob),
        "dropout probability must be in [0, 1), got {prob}"
    );
    ensure!(
        matches!(x.rank(), 2 | 3),
        "dropout1d expects a 2-D or 3-D input, got {}",
        x.layout()
    );
    if !training || prob == 0.0 {
        return Ok(x.clone());
    }

    let width = match data_format {
        DataFormat::ChannelsLast => x.rank() - 2,
        DataFormat::ChannelsFirst => x.rank() - 1,
    };
    let mut rng = fastrand::Rng::with_seed(seed);
    let keep = 1.0 / (1.0 - prob);
    let mask = Array::from_fn(x.layout().with_axis(width, 1), |_| {
        match rng.f64() < prob {
            true => 0.0,
            false => keep,
        }
    });
    log::trace!("dropout1d mask {} over {}", mask.layout(), x.layout());

    let channels = mask.layout();
    let scale = Array::from_fn(x.layout(), |index| {
        let mut index = index.to_vec();
        index[width] = 0;
        mask.data()[channels.offset_of(&index)]
    });
    Ok(x.zip_with(&scale, |x, scale| T::from_f64(x.to_f64() * scale))?)
}
