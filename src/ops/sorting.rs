use super::ensure_supported;
use crate::{
    array::Array,
    engine::Engine,
    error::{Result, ensure},
    num::Scalar,
};

/// Sorts `x` along its first axis. NaN sorts last.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn msort<T: Scalar>(engine: &impl Engine, x: &Array<T>) -> Result<Array<T>> {
    ensure_supported(engine, T::DATA_TYPE, "msort")?;
    ensure!(x.rank() >= 1, "msort expects an array of rank >= 1");
    let indices = engine.argsort(x, 0)?;
    Ok(x.take_along_axis(&indices, 0)?)
}

/// Indirect stable sort by several keys, the last key being the primary one.
///
/// `keys` is either one rank-1 key or `[K, N]`, one key per row.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
pub fn lexsort<T: Scalar>(engine: &impl Engine, keys: &Array<T>) -> Result<Array<i64>> {
    ensure_supported(engine, T::DATA_TYPE, "lexsort")?;
    match keys.rank() {
        1 => engine.argsort(keys, 0),
        2 => {
            let [count, len] = [keys.shape()[0], keys.shape()[1]];
            ensure!(count > 0, "lexsort needs at least one key");
            let key = |row: usize| Array::create(len, keys.data()[row * len..(row + 1) * len].to_vec());

            let mut order = engine.argsort(&key(0)?, 0)?;
            for row in 1..count {
                let permuted = key(row)?.take(&order)?;
                let indices = engine.argsort(&permuted, 0)?;
                order = order.take(&indices)?;
            }
            Ok(order)
        }
        rank => Err(crate::Error::InvalidArgument(format!(
            "lexsort expects keys of rank 1 or 2, got {rank}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::{lexsort, msort};
    use crate::{array::Array, engine::CpuBuilder};

    #[test]
    fn test_msort() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        let x = Array::create([3, 2], vec![3.0f32, f32::NAN, 1.0, 2.0, 2.0, 0.0])?;
        let y = msort(&cpu, &x)?;
        assert_eq!(y.get(&[0, 0]), Some(1.0));
        assert_eq!(y.get(&[1, 0]), Some(2.0));
        assert_eq!(y.get(&[2, 0]), Some(3.0));
        assert_eq!(y.get(&[0, 1]), Some(0.0));
        assert_eq!(y.get(&[1, 1]), Some(2.0));
        assert!(y.get(&[2, 1]).is_some_and(f32::is_nan));
        Ok(())
    }

    #[test]
    fn test_lexsort() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().build();
        // surnames are the primary key, first names break ties
        let first = [4i64, 2, 3, 1, 2];
        let last = [1i64, 2, 1, 2, 1];
        let keys = Array::create([2, 5], [first, last].concat())?;
        let order = lexsort(&cpu, &keys)?;
        assert_eq!(order.data(), &[4, 2, 0, 3, 1]);

        let key = Array::create(3usize, vec![2i32, 0, 1])?;
        assert_eq!(lexsort(&cpu, &key)?.data(), &[1, 2, 0]);

        assert!(lexsort(&cpu, &Array::<i32>::zeros([0, 3])).is_err());
        assert!(lexsort(&cpu, &Array::<i32>::zeros([1, 1, 1])).is_err());
        Ok(())
    }
}
