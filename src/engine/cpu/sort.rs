use std::cmp::Ordering;

use itertools::Itertools;

use super::generate;
use crate::{
    array::{Array, ArrayError},
    error::Result,
    num::Scalar,
};

/// Total order that puts unordered values (NaN) after everything else.
#[inline]
pub fn compare_nan_last<T: PartialOrd>(a: &T, b: &T) -> Ordering {
    #[allow(clippy::eq_op)]
    let (a_nan, b_nan) = (a != a, b != b);
    match (a_nan, b_nan) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
    }
}

pub fn argsort<T: Scalar>(x: &Array<T>, axis: usize) -> Result<Array<i64>> {
    if axis >= x.rank() {
        return Err(ArrayError::Axis(x.layout(), axis as isize).into());
    }
    let shape = x.shape();
    let extent = shape[axis];
    let inner: usize = shape[axis + 1..].iter().product();
    let outer: usize = shape[..axis].iter().product();

    let data = x.data();
    let lanes = generate(outer * inner, |lane| {
        let (o, i) = (lane / inner, lane % inner);
        let base = o * extent * inner + i;
        (0..extent)
            .sorted_by(|&p, &q| compare_nan_last(&data[base + p * inner], &data[base + q * inner]))
            .collect_vec()
    });

    let mut output = vec![0i64; x.size()];
    for (lane, order) in lanes.into_iter().enumerate() {
        let (o, i) = (lane / inner, lane % inner);
        let base = o * extent * inner + i;
        for (j, index) in order.into_iter().enumerate() {
            output[base + j * inner] = index as i64;
        }
    }
    Ok(Array::create(x.layout(), output)?)
}
