//! Covariance of the columns of a data matrix.
//!
//! ```text
//! mean[j]   = sum_i data[i][j] / n
//! data      = data - mean
//! cov[i][j] = sum_k data[k][i] data[k][j] / (n - 1)
//! ```
//!
//! `n` is the number of rows (observations).
use ndarray::{Array1, Array2, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "covariance";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub rows: usize,
    pub cols: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self {
            rows: 100,
            cols: 80,
        }
    }
}

/// Column means, accumulated over rows in ascending order.
pub(crate) fn column_means<T: Real>(
    float_n: T,
    data: ArrayView2<'_, T>,
    mut mean: ArrayViewMut1<'_, T>,
) {
    let (rows, cols) = data.dim();
    for j in 0..cols {
        mean[j] = T::zero();
        for i in 0..rows {
            mean[j] += data[[i, j]];
        }
        mean[j] /= float_n;
    }
}

/// Column means with rows outermost.
pub(crate) fn column_means_by_row<T: Real>(
    float_n: T,
    data: ArrayView2<'_, T>,
    mut mean: ArrayViewMut1<'_, T>,
) {
    mean.fill(T::zero());
    for row in data.rows() {
        for (m, value) in mean.iter_mut().zip(row) {
            *m += *value;
        }
    }
    mean.map_inplace(|m| *m /= float_n);
}

fn center<T: Real>(mean: &ArrayViewMut1<'_, T>, data: &mut ArrayViewMut2<'_, T>) {
    let (rows, cols) = data.dim();
    for i in 0..rows {
        for j in 0..cols {
            data[[i, j]] -= mean[j];
        }
    }
}

#[inline]
fn entry<T: Real>(float_n: T, data: &ArrayViewMut2<'_, T>, i: usize, j: usize) -> T {
    let mut acc = T::zero();
    for k in 0..data.nrows() {
        acc += data[[k, i]] * data[[k, j]];
    }
    acc / (float_n - T::one())
}

pub fn reference<T: Real>(
    float_n: T,
    mut data: ArrayViewMut2<'_, T>,
    mut cov: ArrayViewMut2<'_, T>,
    mut mean: ArrayViewMut1<'_, T>,
) {
    let cols = data.ncols();
    column_means(float_n, data.view(), mean.view_mut());
    center(&mean, &mut data);
    for i in 0..cols {
        for j in i..cols {
            cov[[i, j]] = entry(float_n, &data, i, j);
            cov[[j, i]] = cov[[i, j]];
        }
    }
}

/// Means with rows outermost and the covariance nest visited column by column.
fn interchanged<T: Real>(
    float_n: T,
    mut data: ArrayViewMut2<'_, T>,
    mut cov: ArrayViewMut2<'_, T>,
    mut mean: ArrayViewMut1<'_, T>,
) {
    let cols = data.ncols();
    column_means_by_row(float_n, data.view(), mean.view_mut());
    center(&mean, &mut data);
    for j in 0..cols {
        for i in j..cols {
            cov[[i, j]] = entry(float_n, &data, j, i);
            cov[[j, i]] = cov[[i, j]];
        }
    }
}

/// The upper triangle first, mirrored in a second pass.
fn distributed<T: Real>(
    float_n: T,
    mut data: ArrayViewMut2<'_, T>,
    mut cov: ArrayViewMut2<'_, T>,
    mut mean: ArrayViewMut1<'_, T>,
) {
    let cols = data.ncols();
    column_means(float_n, data.view(), mean.view_mut());
    center(&mean, &mut data);
    for i in 0..cols {
        for j in i..cols {
            cov[[i, j]] = entry(float_n, &data, i, j);
        }
    }
    for i in 0..cols {
        for j in (i + 1)..cols {
            cov[[j, i]] = cov[[i, j]];
        }
    }
}

fn tiled<T: Real>(
    tile: usize,
    float_n: T,
    mut data: ArrayViewMut2<'_, T>,
    mut cov: ArrayViewMut2<'_, T>,
    mut mean: ArrayViewMut1<'_, T>,
) {
    let cols = data.ncols();
    column_means(float_n, data.view(), mean.view_mut());
    center(&mean, &mut data);
    for ti in tiles(0..cols, tile) {
        for tj in tiles(ti.start..cols, tile) {
            for i in ti.clone() {
                for j in tj.start.max(i)..tj.end {
                    cov[[i, j]] = entry(float_n, &data, i, j);
                    cov[[j, i]] = cov[[i, j]];
                }
            }
        }
    }
}

fn parallel<T: Real>(
    float_n: T,
    mut data: ArrayViewMut2<'_, T>,
    mut cov: ArrayViewMut2<'_, T>,
    mut mean: ArrayViewMut1<'_, T>,
) {
    let (rows, cols) = data.dim();
    {
        let data = data.view();
        parallel::fill_indexed(mean.view_mut(), |j| {
            let mut acc = T::zero();
            for i in 0..rows {
                acc += data[[i, j]];
            }
            acc / float_n
        });
    }
    let means = mean.view();
    parallel::for_each_lane(data.view_mut(), Axis(0), |_, mut row| {
        row.zip_mut_with(&means, |value, m| *value -= *m);
    });
    let data = data.view();
    parallel::for_each_lane(cov.view_mut(), Axis(0), |i, mut row| {
        for j in i..cols {
            let mut acc = T::zero();
            for k in 0..rows {
                acc += data[[k, i]] * data[[k, j]];
            }
            row[j] = acc / (float_n - T::one());
        }
    });
    for i in 0..cols {
        for j in (i + 1)..cols {
            cov[[j, i]] = cov[[i, j]];
        }
    }
}

pub fn run<T: Real>(
    schedule: Schedule,
    float_n: T,
    data: ArrayViewMut2<'_, T>,
    cov: ArrayViewMut2<'_, T>,
    mean: ArrayViewMut1<'_, T>,
) -> Result<(), Error> {
    let cols = data.ncols();
    ensure_shape("cov", &cov, &[cols, cols])?;
    ensure_shape("mean", &mean, &[cols])?;
    match schedule {
        Schedule::Reference => reference(float_n, data, cov, mean),
        Schedule::Interchanged => interchanged(float_n, data, cov, mean),
        Schedule::Distributed => distributed(float_n, data, cov, mean),
        Schedule::Tiled(tile) => tiled(tile, float_n, data, cov, mean),
        Schedule::Parallel => parallel(float_n, data, cov, mean),
        other @ Schedule::Fused => return Err(crate::unsupported(NAME, other)),
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub float_n: T,
    pub data: Array2<T>,
    pub cov: Array2<T>,
    pub mean: Array1<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Covariance<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Covariance<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Covariance<T> {
    type State = State<T>;

    fn name(&self) -> &'static str {
        NAME
    }

    fn schedules(&self) -> Vec<Schedule> {
        vec![
            Schedule::Reference,
            Schedule::Interchanged,
            Schedule::Distributed,
            Schedule::Tiled(DEFAULT_TILE),
            Schedule::Parallel,
        ]
    }

    fn tolerance(&self) -> Tolerance {
        T::default_tolerance()
    }

    fn init(&self, init: &mut Init) -> State<T> {
        let Dims { rows, cols } = self.dims;
        State {
            float_n: cast(rows as f64),
            data: init.array2((rows, cols)),
            cov: init.array2((cols, cols)),
            mean: init.array1(cols),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            state.float_n,
            state.data.view_mut(),
            state.cov.view_mut(),
            state.mean.view_mut(),
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![
            Output::float("data", &state.data),
            Output::float("cov", &state.cov),
            Output::float("mean", &state.mean),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Covariance, Dims};
    use crate::testing::check_schedules;
    use ndarray::{array, Array1, Array2};
    use polyverify::{Error, Schedule};

    #[test]
    fn two_perfectly_correlated_columns() -> Result<(), Error> {
        let mut data = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let mut cov = Array2::<f64>::zeros((2, 2));
        let mut mean = Array1::<f64>::zeros(2);
        run(
            Schedule::Reference,
            3.0,
            data.view_mut(),
            cov.view_mut(),
            mean.view_mut(),
        )?;
        approx::assert_abs_diff_eq!(mean, array![2.0, 4.0]);
        approx::assert_abs_diff_eq!(cov, array![[1.0, 2.0], [2.0, 4.0]], epsilon = 1e-12);
        approx::assert_abs_diff_eq!(data.column(0), array![-1.0, 0.0, 1.0]);
        Ok(())
    }

    #[test]
    fn covariance_is_symmetric() -> Result<(), Error> {
        let mut init = polyverify::Init::new(1);
        let mut data = init.array2::<f64>((12, 7));
        let mut cov = init.array2::<f64>((7, 7));
        let mut mean = Array1::<f64>::zeros(7);
        run(
            Schedule::Parallel,
            12.0,
            data.view_mut(),
            cov.view_mut(),
            mean.view_mut(),
        )?;
        approx::assert_abs_diff_eq!(cov, cov.t());
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(&Covariance::<f64>::new(Dims { rows: 23, cols: 19 }), 10)?;
        check_schedules(&Covariance::<f32>::default(), 3)?;
        Ok(())
    }
}
