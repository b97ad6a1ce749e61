use super::generate;
use crate::{
    array::Array,
    error::{Result, ensure},
    num::Float,
};

pub fn matmul<T: Float>(lhs: &Array<T>, rhs: &Array<T>) -> Result<Array<T>> {
    ensure!(lhs.rank() >= 1, "matmul lhs must have rank >= 1");
    ensure!(
        rhs.rank() == 2,
        "matmul rhs must be [K, N], got {}",
        rhs.layout()
    );
    let k = lhs.shape()[lhs.rank() - 1];
    let (inner, n) = (rhs.shape()[0], rhs.shape()[1]);
    ensure!(
        k == inner,
        "matmul contraction mismatch: {} x {}",
        lhs.layout(),
        rhs.layout()
    );

    let rows = lhs.size() / k.max(1);
    let mut shape = lhs.shape().to_vec();
    if let Some(last) = shape.last_mut() {
        *last = n;
    }

    let (a, b) = (lhs.data(), rhs.data());
    let data = generate(rows * n, |offset| {
        let (i, j) = (offset / n, offset % n);
        let sum: f64 = (0..k)
            .map(|z| a[i * k + z].to_f64() * b[z * n + j].to_f64())
            .sum();
        T::from_f64(sum)
    });
    Ok(Array::create(shape, data)?)
}
