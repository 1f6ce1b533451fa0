use crate::error::Error;
use ndarray::{ArrayBase, Dimension, RawData};

/// Checks that `array` has exactly the `expected` shape.
///
/// Kernels call this for every argument before touching any element, so no
/// index inside the loop nests can be out of range afterwards.
pub fn ensure_shape<S, D>(
    name: &'static str,
    array: &ArrayBase<S, D>,
    expected: &[usize],
) -> Result<(), Error>
where
    S: RawData,
    D: Dimension,
{
    if array.shape() == expected {
        Ok(())
    } else {
        Err(Error::Shape {
            array: name,
            expected: expected.to_vec(),
            found: array.shape().to_vec(),
        })
    }
}

/// Checks the length of a flat buffer.
pub fn ensure_len<T>(name: &'static str, buffer: &[T], expected: usize) -> Result<(), Error> {
    if buffer.len() == expected {
        Ok(())
    } else {
        Err(Error::Shape {
            array: name,
            expected: vec![expected],
            found: vec![buffer.len()],
        })
    }
}

/// Converts a flat row-major offset into a multi-dimensional index.
#[must_use]
pub fn unravel(mut offset: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for (dim, extent) in shape.iter().enumerate().rev() {
        if *extent == 0 {
            continue;
        }
        index[dim] = offset % extent;
        offset /= extent;
    }
    index
}
