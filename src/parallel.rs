//! Data-parallel loops of the `parallel` schedules.
//!
//! With the `parallel` feature the iterations are distributed over the rayon
//! thread pool, otherwise they run sequentially in index order.

use crate::Error;
use ndarray::{ArrayViewMut, ArrayViewMut1, Axis, RemoveAxis, Zip};

/// Sizes the thread pool of the `parallel` schedules from `NUM_THREADS`.
///
/// Returns the requested thread count, or `None` if the variable is unset and
/// the pool keeps one thread per core. Must be called before the first
/// parallel schedule runs.
pub fn init_thread_pool() -> Result<Option<usize>, Error> {
    let Some(num_threads) = std::env::var("NUM_THREADS").ok() else {
        return Ok(None);
    };
    let num_threads: usize = num_threads
        .trim()
        .parse()
        .map_err(|err| Error::ThreadPool(format!("NUM_THREADS={num_threads:?}: {err}")))?;
    #[cfg(feature = "parallel")]
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .map_err(|err| Error::ThreadPool(err.to_string()))?;
    log::debug!("using {num_threads} worker threads");
    Ok(Some(num_threads))
}

/// Sets every element of `out` to `f(index)`.
pub fn fill_indexed<T, F>(out: ArrayViewMut1<'_, T>, f: F)
where
    T: Send + Sync,
    F: Fn(usize) -> T + Send + Sync,
{
    let zip = Zip::indexed(out);
    #[cfg(feature = "parallel")]
    zip.par_for_each(|i, value| *value = f(i));
    #[cfg(not(feature = "parallel"))]
    zip.for_each(|i, value| *value = f(i));
}

/// Calls `f(index, lane)` for every subview along `axis`.
///
/// The subviews are disjoint, so each call may mutate its lane freely.
pub fn for_each_lane<T, D, F>(mut array: ArrayViewMut<'_, T, D>, axis: Axis, f: F)
where
    T: Send + Sync,
    D: RemoveAxis,
    F: Fn(usize, ArrayViewMut<'_, T, D::Smaller>) + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        array
            .axis_iter_mut(axis)
            .into_par_iter()
            .enumerate()
            .for_each(|(i, lane)| f(i, lane));
    }
    #[cfg(not(feature = "parallel"))]
    array
        .axis_iter_mut(axis)
        .enumerate()
        .for_each(|(i, lane)| f(i, lane));
}

/// Collects `f(i)` for `i` in `0..len`, in index order.
pub fn map_range<T, F>(len: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..len).into_par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    (0..len).map(f).collect()
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array2, Axis};

    #[test]
    fn fill_indexed_visits_every_index() {
        let mut out = Array1::<usize>::zeros(100);
        super::fill_indexed(out.view_mut(), |i| i * 2);
        assert!(out.iter().enumerate().all(|(i, v)| *v == i * 2));
    }

    #[test]
    fn lanes_are_indexed_by_position() {
        let mut a = Array2::<f64>::zeros((4, 3));
        super::for_each_lane(a.view_mut(), Axis(0), |i, mut row| row.fill(i as f64));
        assert_eq!(a.column(2).to_vec(), vec![0.0, 1.0, 2.0, 3.0]);
        super::for_each_lane(a.view_mut(), Axis(1), |j, mut col| col += j as f64);
        assert_eq!(a.row(3).to_vec(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn map_range_keeps_order() {
        assert_eq!(super::map_range(5, |i| i * i), vec![0, 1, 4, 9, 16]);
    }
}
