//! Matrix vector product and transpose.
//!
//! ```text
//! x1 += A y1
//! x2 += A^T y2
//! ```
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1};
use polyverify::{
    parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "mvt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub n: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self { n: 120 }
    }
}

pub fn reference<T: Real>(
    a: ArrayView2<'_, T>,
    y1: ArrayView1<'_, T>,
    y2: ArrayView1<'_, T>,
    mut x1: ArrayViewMut1<'_, T>,
    mut x2: ArrayViewMut1<'_, T>,
) {
    let n = y1.len();
    for i in 0..n {
        for j in 0..n {
            x1[i] += a[[i, j]] * y1[j];
        }
    }
    for i in 0..n {
        for j in 0..n {
            x2[i] += a[[j, i]] * y2[j];
        }
    }
}

fn fused<T: Real>(
    a: ArrayView2<'_, T>,
    y1: ArrayView1<'_, T>,
    y2: ArrayView1<'_, T>,
    mut x1: ArrayViewMut1<'_, T>,
    mut x2: ArrayViewMut1<'_, T>,
) {
    let n = y1.len();
    for i in 0..n {
        for j in 0..n {
            x1[i] += a[[i, j]] * y1[j];
            x2[i] += a[[j, i]] * y2[j];
        }
    }
}

/// Second nest walks `A` row by row.
fn interchanged<T: Real>(
    a: ArrayView2<'_, T>,
    y1: ArrayView1<'_, T>,
    y2: ArrayView1<'_, T>,
    mut x1: ArrayViewMut1<'_, T>,
    mut x2: ArrayViewMut1<'_, T>,
) {
    let n = y1.len();
    for i in 0..n {
        for j in 0..n {
            x1[i] += a[[i, j]] * y1[j];
        }
    }
    for j in 0..n {
        for i in 0..n {
            x2[i] += a[[j, i]] * y2[j];
        }
    }
}

fn tiled<T: Real>(
    tile: usize,
    a: ArrayView2<'_, T>,
    y1: ArrayView1<'_, T>,
    y2: ArrayView1<'_, T>,
    mut x1: ArrayViewMut1<'_, T>,
    mut x2: ArrayViewMut1<'_, T>,
) {
    let n = y1.len();
    for ti in tiles(0..n, tile) {
        for tj in tiles(0..n, tile) {
            for i in ti.clone() {
                for j in tj.clone() {
                    x1[i] += a[[i, j]] * y1[j];
                    x2[i] += a[[j, i]] * y2[j];
                }
            }
        }
    }
}

fn parallel<T: Real>(
    a: ArrayView2<'_, T>,
    y1: ArrayView1<'_, T>,
    y2: ArrayView1<'_, T>,
    mut x1: ArrayViewMut1<'_, T>,
    mut x2: ArrayViewMut1<'_, T>,
) {
    let ay1 = parallel::map_range(y1.len(), |i| a.row(i).dot(&y1));
    let aty2 = parallel::map_range(y2.len(), |i| a.column(i).dot(&y2));
    x1.iter_mut().zip(ay1).for_each(|(x, v)| *x += v);
    x2.iter_mut().zip(aty2).for_each(|(x, v)| *x += v);
}

pub fn run<T: Real>(
    schedule: Schedule,
    a: ArrayView2<'_, T>,
    y1: ArrayView1<'_, T>,
    y2: ArrayView1<'_, T>,
    x1: ArrayViewMut1<'_, T>,
    x2: ArrayViewMut1<'_, T>,
) -> Result<(), Error> {
    let n = y1.len();
    ensure_shape("A", &a, &[n, n])?;
    ensure_shape("y2", &y2, &[n])?;
    ensure_shape("x1", &x1, &[n])?;
    ensure_shape("x2", &x2, &[n])?;
    match schedule {
        Schedule::Reference => reference(a, y1, y2, x1, x2),
        Schedule::Fused => fused(a, y1, y2, x1, x2),
        Schedule::Interchanged => interchanged(a, y1, y2, x1, x2),
        Schedule::Tiled(tile) => tiled(tile, a, y1, y2, x1, x2),
        Schedule::Parallel => parallel(a, y1, y2, x1, x2),
        other @ Schedule::Distributed => return Err(crate::unsupported(NAME, other)),
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub a: Array2<T>,
    pub y1: Array1<T>,
    pub y2: Array1<T>,
    pub x1: Array1<T>,
    pub x2: Array1<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Mvt<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Mvt<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Mvt<T> {
    type State = State<T>;

    fn name(&self) -> &'static str {
        NAME
    }

    fn schedules(&self) -> Vec<Schedule> {
        vec![
            Schedule::Reference,
            Schedule::Fused,
            Schedule::Interchanged,
            Schedule::Tiled(DEFAULT_TILE),
            Schedule::Parallel,
        ]
    }

    fn tolerance(&self) -> Tolerance {
        T::default_tolerance()
    }

    fn init(&self, init: &mut Init) -> State<T> {
        let n = self.dims.n;
        State {
            a: init.array2((n, n)),
            y1: init.array1(n),
            y2: init.array1(n),
            x1: init.array1(n),
            x2: init.array1(n),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            state.a.view(),
            state.y1.view(),
            state.y2.view(),
            state.x1.view_mut(),
            state.x2.view_mut(),
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![Output::float("x1", &state.x1), Output::float("x2", &state.x2)]
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Dims, Mvt};
    use crate::testing::check_schedules;
    use ndarray::array;
    use polyverify::{Error, Schedule};

    #[test]
    fn accumulates_into_inputs() -> Result<(), Error> {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let y = array![1.0, 1.0];
        let mut x1 = array![10.0, 20.0];
        let mut x2 = array![10.0, 20.0];
        run(
            Schedule::Reference,
            a.view(),
            y.view(),
            y.view(),
            x1.view_mut(),
            x2.view_mut(),
        )?;
        approx::assert_abs_diff_eq!(x1, array![13.0, 27.0]);
        approx::assert_abs_diff_eq!(x2, array![14.0, 26.0]);
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(&Mvt::<f64>::new(Dims { n: 33 }), 10)?;
        check_schedules(&Mvt::<f32>::default(), 3)?;
        Ok(())
    }
}
