//! Matrix transpose and vector multiplication.
//!
//! ```text
//! tmp[i] = sum_j A[i][j] * x[j]
//! y[j]   = sum_i A[i][j] * tmp[i]
//! ```
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1};
use polyverify::{
    parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "atax";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub m: usize,
    pub n: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self { m: 116, n: 124 }
    }
}

/// Original loop order: the `y` update is fused into the row loop and
/// consumes `tmp[i]` right after it is complete.
pub fn reference<T: Real>(
    a: ArrayView2<'_, T>,
    x: ArrayView1<'_, T>,
    mut y: ArrayViewMut1<'_, T>,
    mut tmp: ArrayViewMut1<'_, T>,
) {
    let (m, n) = a.dim();
    y.fill(T::zero());
    for i in 0..m {
        tmp[i] = T::zero();
        for j in 0..n {
            tmp[i] += a[[i, j]] * x[j];
        }
        for j in 0..n {
            y[j] += a[[i, j]] * tmp[i];
        }
    }
}

/// Computes `tmp` and `y` in two separate passes.
fn distributed<T: Real>(
    a: ArrayView2<'_, T>,
    x: ArrayView1<'_, T>,
    mut y: ArrayViewMut1<'_, T>,
    mut tmp: ArrayViewMut1<'_, T>,
) {
    let (m, n) = a.dim();
    for i in 0..m {
        tmp[i] = T::zero();
        for j in 0..n {
            tmp[i] += a[[i, j]] * x[j];
        }
    }
    for j in 0..n {
        y[j] = T::zero();
        for i in 0..m {
            y[j] += a[[i, j]] * tmp[i];
        }
    }
}

/// Both passes with the `i` and `j` loops swapped.
fn interchanged<T: Real>(
    a: ArrayView2<'_, T>,
    x: ArrayView1<'_, T>,
    mut y: ArrayViewMut1<'_, T>,
    mut tmp: ArrayViewMut1<'_, T>,
) {
    let (m, n) = a.dim();
    tmp.fill(T::zero());
    for j in 0..n {
        for i in 0..m {
            tmp[i] += a[[i, j]] * x[j];
        }
    }
    y.fill(T::zero());
    for i in 0..m {
        for j in 0..n {
            y[j] += a[[i, j]] * tmp[i];
        }
    }
}

fn tiled<T: Real>(
    tile: usize,
    a: ArrayView2<'_, T>,
    x: ArrayView1<'_, T>,
    mut y: ArrayViewMut1<'_, T>,
    mut tmp: ArrayViewMut1<'_, T>,
) {
    let (m, n) = a.dim();
    tmp.fill(T::zero());
    for ti in tiles(0..m, tile) {
        for tj in tiles(0..n, tile) {
            for i in ti.clone() {
                for j in tj.clone() {
                    tmp[i] += a[[i, j]] * x[j];
                }
            }
        }
    }
    // tmp is complete before any of it is read
    y.fill(T::zero());
    for tj in tiles(0..n, tile) {
        for ti in tiles(0..m, tile) {
            for j in tj.clone() {
                for i in ti.clone() {
                    y[j] += a[[i, j]] * tmp[i];
                }
            }
        }
    }
}

fn parallel<T: Real>(
    a: ArrayView2<'_, T>,
    x: ArrayView1<'_, T>,
    y: ArrayViewMut1<'_, T>,
    mut tmp: ArrayViewMut1<'_, T>,
) {
    parallel::fill_indexed(tmp.view_mut(), |i| a.row(i).dot(&x));
    let tmp = tmp.view();
    parallel::fill_indexed(y, |j| a.column(j).dot(&tmp));
}

pub fn run<T: Real>(
    schedule: Schedule,
    a: ArrayView2<'_, T>,
    x: ArrayView1<'_, T>,
    y: ArrayViewMut1<'_, T>,
    tmp: ArrayViewMut1<'_, T>,
) -> Result<(), Error> {
    let (m, n) = a.dim();
    ensure_shape("x", &x, &[n])?;
    ensure_shape("y", &y, &[n])?;
    ensure_shape("tmp", &tmp, &[m])?;
    match schedule {
        Schedule::Reference => reference(a, x, y, tmp),
        Schedule::Distributed => distributed(a, x, y, tmp),
        Schedule::Interchanged => interchanged(a, x, y, tmp),
        Schedule::Tiled(tile) => tiled(tile, a, x, y, tmp),
        Schedule::Parallel => parallel(a, x, y, tmp),
        other @ Schedule::Fused => return Err(crate::unsupported(NAME, other)),
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub a: Array2<T>,
    pub x: Array1<T>,
    pub y: Array1<T>,
    pub tmp: Array1<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Atax<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Atax<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Atax<T> {
    type State = State<T>;

    fn name(&self) -> &'static str {
        NAME
    }

    fn schedules(&self) -> Vec<Schedule> {
        vec![
            Schedule::Reference,
            Schedule::Distributed,
            Schedule::Interchanged,
            Schedule::Tiled(DEFAULT_TILE),
            Schedule::Parallel,
        ]
    }

    fn tolerance(&self) -> Tolerance {
        T::default_tolerance()
    }

    fn init(&self, init: &mut Init) -> State<T> {
        let Dims { m, n } = self.dims;
        State {
            a: init.array2((m, n)),
            x: init.array1(n),
            y: init.array1(n),
            tmp: init.array1(m),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            state.a.view(),
            state.x.view(),
            state.y.view_mut(),
            state.tmp.view_mut(),
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![Output::float("y", &state.y), Output::float("tmp", &state.tmp)]
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Atax, Dims};
    use crate::testing::check_schedules;
    use ndarray::{array, Array1};
    use polyverify::{Error, Schedule};

    #[test]
    fn small_known_values() -> Result<(), Error> {
        let a = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let x = array![1.0, -1.0];
        let mut y = Array1::from_elem(2, 99.0);
        let mut tmp = Array1::from_elem(3, 99.0);
        run(
            Schedule::Reference,
            a.view(),
            x.view(),
            y.view_mut(),
            tmp.view_mut(),
        )?;
        // tmp = [-1, -1, -1], y = A^T tmp
        approx::assert_abs_diff_eq!(tmp, array![-1.0, -1.0, -1.0]);
        approx::assert_abs_diff_eq!(y, array![-9.0, -12.0]);
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(&Atax::<f64>::new(Dims { m: 37, n: 21 }), 12)?;
        check_schedules(&Atax::<f32>::default(), 6)?;
        Ok(())
    }

    #[test]
    fn shape_mismatch() {
        let a = ndarray::Array2::<f64>::zeros((0, 0));
        let x = Array1::<f64>::zeros(3);
        let mut y = Array1::<f64>::zeros(0);
        let mut tmp = Array1::<f64>::zeros(0);
        let result = run(
            Schedule::Reference,
            a.view(),
            x.view(),
            y.view_mut(),
            tmp.view_mut(),
        );
        assert!(matches!(result, Err(Error::Shape { array: "x", .. })));
    }

    #[test]
    fn fused_is_not_offered() {
        let a = ndarray::Array2::<f64>::zeros((2, 2));
        let x = Array1::<f64>::zeros(2);
        let mut y = Array1::<f64>::zeros(2);
        let mut tmp = Array1::<f64>::zeros(2);
        let result = run(
            Schedule::Fused,
            a.view(),
            x.view(),
            y.view_mut(),
            tmp.view_mut(),
        );
        assert!(matches!(
            result,
            Err(Error::UnsupportedSchedule {
                kernel: "atax",
                ..
            })
        ));
    }
}
