//! Pearson correlation of the columns of a data matrix.
//!
//! Columns whose standard deviation is at most `0.1` are treated as having a
//! deviation of `1.0`, and the diagonal of `corr` is exactly one.
use crate::covariance::{column_means, column_means_by_row};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "correlation";

pub const EPS: f64 = 0.1;

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

pub struct Outputs<'a, T> {
    pub corr: ArrayViewMut2<'a, T>,
    pub mean: ArrayViewMut1<'a, T>,
    pub stddev: ArrayViewMut1<'a, T>,
}

#[inline]
fn clamp<T: Real>(stddev: T) -> T {
    if stddev <= cast(EPS) {
        T::one()
    } else {
        stddev
    }
}

fn deviations<T: Real>(
    float_n: T,
    data: ArrayView2<'_, T>,
    mean: ArrayView1<'_, T>,
    mut stddev: ArrayViewMut1<'_, T>,
) {
    let (rows, cols) = data.dim();
    for j in 0..cols {
        stddev[j] = T::zero();
        for i in 0..rows {
            let d = data[[i, j]] - mean[j];
            stddev[j] += d * d;
        }
        stddev[j] /= float_n;
        stddev[j] = clamp(stddev[j].sqrt());
    }
}

fn deviations_by_row<T: Real>(
    float_n: T,
    data: ArrayView2<'_, T>,
    mean: ArrayView1<'_, T>,
    mut stddev: ArrayViewMut1<'_, T>,
) {
    stddev.fill(T::zero());
    for row in data.rows() {
        for ((s, value), m) in stddev.iter_mut().zip(row).zip(mean) {
            let d = *value - *m;
            *s += d * d;
        }
    }
    stddev.map_inplace(|s| *s = clamp((*s / float_n).sqrt()));
}

fn normalize<T: Real>(
    float_n: T,
    mean: ArrayView1<'_, T>,
    stddev: ArrayView1<'_, T>,
    mut data: ArrayViewMut2<'_, T>,
) {
    let (rows, cols) = data.dim();
    for i in 0..rows {
        for j in 0..cols {
            data[[i, j]] -= mean[j];
            data[[i, j]] /= float_n.sqrt() * stddev[j];
        }
    }
}

#[inline]
fn entry<T: Real>(data: &ArrayViewMut2<'_, T>, i: usize, j: usize) -> T {
    let mut acc = T::zero();
    for k in 0..data.nrows() {
        acc += data[[k, i]] * data[[k, j]];
    }
    acc
}

/// Sets the diagonal of the last column, which the triangular nest never visits.
fn last_diagonal<T: Real>(corr: &mut ArrayViewMut2<'_, T>) {
    let cols = corr.nrows();
    if cols > 0 {
        corr[[cols - 1, cols - 1]] = T::one();
    }
}

pub fn reference<T: Real>(float_n: T, mut data: ArrayViewMut2<'_, T>, out: Outputs<'_, T>) {
    let Outputs {
        mut corr,
        mut mean,
        mut stddev,
    } = out;
    let cols = data.ncols();
    column_means(float_n, data.view(), mean.view_mut());
    deviations(float_n, data.view(), mean.view(), stddev.view_mut());
    normalize(float_n, mean.view(), stddev.view(), data.view_mut());
    for i in 0..cols.saturating_sub(1) {
        corr[[i, i]] = T::one();
        for j in (i + 1)..cols {
            corr[[i, j]] = entry(&data, i, j);
            corr[[j, i]] = corr[[i, j]];
        }
    }
    last_diagonal(&mut corr);
}

/// Statistics accumulated row by row and the correlation nest visited by column.
fn interchanged<T: Real>(float_n: T, mut data: ArrayViewMut2<'_, T>, out: Outputs<'_, T>) {
    let Outputs {
        mut corr,
        mut mean,
        mut stddev,
    } = out;
    let cols = data.ncols();
    column_means_by_row(float_n, data.view(), mean.view_mut());
    deviations_by_row(float_n, data.view(), mean.view(), stddev.view_mut());
    normalize(float_n, mean.view(), stddev.view(), data.view_mut());
    for j in 0..cols {
        corr[[j, j]] = T::one();
        for i in (j + 1)..cols {
            corr[[i, j]] = entry(&data, j, i);
            corr[[j, i]] = corr[[i, j]];
        }
    }
}

fn distributed<T: Real>(float_n: T, mut data: ArrayViewMut2<'_, T>, out: Outputs<'_, T>) {
    let Outputs {
        mut corr,
        mut mean,
        mut stddev,
    } = out;
    let cols = data.ncols();
    column_means(float_n, data.view(), mean.view_mut());
    deviations(float_n, data.view(), mean.view(), stddev.view_mut());
    normalize(float_n, mean.view(), stddev.view(), data.view_mut());
    for i in 0..cols {
        corr[[i, i]] = T::one();
    }
    for i in 0..cols {
        for j in (i + 1)..cols {
            corr[[i, j]] = entry(&data, i, j);
        }
    }
    for i in 0..cols {
        for j in (i + 1)..cols {
            corr[[j, i]] = corr[[i, j]];
        }
    }
}

fn tiled<T: Real>(tile: usize, float_n: T, mut data: ArrayViewMut2<'_, T>, out: Outputs<'_, T>) {
    let Outputs {
        mut corr,
        mut mean,
        mut stddev,
    } = out;
    let cols = data.ncols();
    column_means(float_n, data.view(), mean.view_mut());
    deviations(float_n, data.view(), mean.view(), stddev.view_mut());
    normalize(float_n, mean.view(), stddev.view(), data.view_mut());
    for ti in tiles(0..cols, tile) {
        for tj in tiles(ti.start..cols, tile) {
            for i in ti.clone() {
                for j in tj.start.max(i + 1)..tj.end {
                    corr[[i, j]] = entry(&data, i, j);
                    corr[[j, i]] = corr[[i, j]];
                }
            }
        }
        for i in ti {
            corr[[i, i]] = T::one();
        }
    }
}

fn parallel<T: Real>(float_n: T, mut data: ArrayViewMut2<'_, T>, out: Outputs<'_, T>) {
    let Outputs {
        mut corr,
        mut mean,
        mut stddev,
    } = out;
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
        let mean = mean.view();
        parallel::fill_indexed(stddev.view_mut(), |j| {
            let mut acc = T::zero();
            for i in 0..rows {
                let d = data[[i, j]] - mean[j];
                acc += d * d;
            }
            clamp((acc / float_n).sqrt())
        });
    }
    let (mean, stddev) = (mean.view(), stddev.view());
    parallel::for_each_lane(data.view_mut(), Axis(0), |_, mut row| {
        for j in 0..cols {
            row[j] -= mean[j];
            row[j] /= float_n.sqrt() * stddev[j];
        }
    });
    let data = data.view();
    parallel::for_each_lane(corr.view_mut(), Axis(0), |i, mut row| {
        row[i] = T::one();
        for j in (i + 1)..cols {
            let mut acc = T::zero();
            for k in 0..rows {
                acc += data[[k, i]] * data[[k, j]];
            }
            row[j] = acc;
        }
    });
    for i in 0..cols {
        for j in (i + 1)..cols {
            corr[[j, i]] = corr[[i, j]];
        }
    }
}

pub fn run<T: Real>(
    schedule: Schedule,
    float_n: T,
    data: ArrayViewMut2<'_, T>,
    out: Outputs<'_, T>,
) -> Result<(), Error> {
    let cols = data.ncols();
    ensure_shape("corr", &out.corr, &[cols, cols])?;
    ensure_shape("mean", &out.mean, &[cols])?;
    ensure_shape("stddev", &out.stddev, &[cols])?;
    match schedule {
        Schedule::Reference => reference(float_n, data, out),
        Schedule::Interchanged => interchanged(float_n, data, out),
        Schedule::Distributed => distributed(float_n, data, out),
        Schedule::Tiled(tile) => tiled(tile, float_n, data, out),
        Schedule::Parallel => parallel(float_n, data, out),
        other @ Schedule::Fused => return Err(crate::unsupported(NAME, other)),
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub float_n: T,
    pub data: Array2<T>,
    pub corr: Array2<T>,
    pub mean: Array1<T>,
    pub stddev: Array1<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Correlation<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Correlation<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Correlation<T> {
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
            corr: init.array2((cols, cols)),
            mean: init.array1(cols),
            stddev: init.array1(cols),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            state.float_n,
            state.data.view_mut(),
            Outputs {
                corr: state.corr.view_mut(),
                mean: state.mean.view_mut(),
                stddev: state.stddev.view_mut(),
            },
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![
            Output::float("data", &state.data),
            Output::float("corr", &state.corr),
            Output::float("mean", &state.mean),
            Output::float("stddev", &state.stddev),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Correlation, Dims, Outputs};
    use crate::testing::check_schedules;
    use ndarray::{array, Array1, Array2};
    use polyverify::{Error, Init, Schedule};

    fn correlate(
        schedule: Schedule,
        data: &mut Array2<f64>,
    ) -> Result<(Array2<f64>, Array1<f64>), Error> {
        let cols = data.ncols();
        let mut corr = Array2::zeros((cols, cols));
        let mut mean = Array1::zeros(cols);
        let mut stddev = Array1::zeros(cols);
        run(
            schedule,
            data.nrows() as f64,
            data.view_mut(),
            Outputs {
                corr: corr.view_mut(),
                mean: mean.view_mut(),
                stddev: stddev.view_mut(),
            },
        )?;
        Ok((corr, stddev))
    }

    #[test]
    fn anti_correlated_columns() -> Result<(), Error> {
        let mut data = array![[1.0, -2.0], [2.0, -4.0], [3.0, -6.0]];
        let (corr, _) = correlate(Schedule::Reference, &mut data)?;
        approx::assert_abs_diff_eq!(corr, array![[1.0, -1.0], [-1.0, 1.0]], epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn near_constant_columns_are_clamped() -> Result<(), Error> {
        let mut data = array![[1.0, 5.0], [1.01, 8.0], [0.99, 2.0]];
        let (corr, stddev) = correlate(Schedule::Parallel, &mut data)?;
        assert_eq!(stddev[0], 1.0);
        assert!(stddev[1] > 1.0);
        assert!(corr.iter().all(|value| value.is_finite()));
        assert_eq!(corr.diag().to_vec(), vec![1.0, 1.0]);
        Ok(())
    }

    #[test]
    fn coefficients_are_bounded() -> Result<(), Error> {
        let mut data = Init::new(5).array2::<f64>((40, 9));
        let (corr, _) = correlate(Schedule::Tiled(4), &mut data)?;
        assert!(corr.iter().all(|value| value.abs() <= 1.0 + 1e-12));
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(&Correlation::<f64>::new(Dims { rows: 27, cols: 13 }), 10)?;
        check_schedules(&Correlation::<f32>::default(), 3)?;
        Ok(())
    }
}
