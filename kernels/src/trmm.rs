//! Triangular matrix multiplication with a unit lower triangular `A`.
//!
//! ```text
//! B = alpha * A^T B
//! ```
//!
//! Row `i` of `B` reads only rows `k > i`, which are still unmodified while
//! rows are visited in ascending order.
use ndarray::{Array2, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "trmm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub m: usize,
    pub n: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self { m: 60, n: 80 }
    }
}

pub fn reference<T: Real>(alpha: T, a: ArrayView2<'_, T>, mut b: ArrayViewMut2<'_, T>) {
    let (m, n) = b.dim();
    for i in 0..m {
        for j in 0..n {
            for k in (i + 1)..m {
                let bkj = b[[k, j]];
                b[[i, j]] += a[[k, i]] * bkj;
            }
            b[[i, j]] = alpha * b[[i, j]];
        }
    }
}

/// `k` outermost, with the scaling in a trailing pass.
fn interchanged<T: Real>(alpha: T, a: ArrayView2<'_, T>, mut b: ArrayViewMut2<'_, T>) {
    let (m, n) = b.dim();
    for k in 0..m {
        for i in 0..k {
            for j in 0..n {
                let bkj = b[[k, j]];
                b[[i, j]] += a[[k, i]] * bkj;
            }
        }
    }
    b.map_inplace(|value| *value = alpha * *value);
}

fn distributed<T: Real>(alpha: T, a: ArrayView2<'_, T>, mut b: ArrayViewMut2<'_, T>) {
    let (m, n) = b.dim();
    for i in 0..m {
        for j in 0..n {
            for k in (i + 1)..m {
                let bkj = b[[k, j]];
                b[[i, j]] += a[[k, i]] * bkj;
            }
        }
    }
    for i in 0..m {
        for j in 0..n {
            b[[i, j]] = alpha * b[[i, j]];
        }
    }
}

fn tiled<T: Real>(tile: usize, alpha: T, a: ArrayView2<'_, T>, mut b: ArrayViewMut2<'_, T>) {
    let (m, n) = b.dim();
    for tj in tiles(0..n, tile) {
        for i in 0..m {
            for j in tj.clone() {
                for k in (i + 1)..m {
                    let bkj = b[[k, j]];
                    b[[i, j]] += a[[k, i]] * bkj;
                }
                b[[i, j]] = alpha * b[[i, j]];
            }
        }
    }
}

fn column<T: Real>(alpha: T, a: ArrayView2<'_, T>, mut b: ArrayViewMut1<'_, T>) {
    let m = b.len();
    for i in 0..m {
        for k in (i + 1)..m {
            let bk = b[k];
            b[i] += a[[k, i]] * bk;
        }
        b[i] = alpha * b[i];
    }
}

fn parallel<T: Real>(alpha: T, a: ArrayView2<'_, T>, b: ArrayViewMut2<'_, T>) {
    parallel::for_each_lane(b, Axis(1), |_, col| column(alpha, a, col));
}

pub fn run<T: Real>(
    schedule: Schedule,
    alpha: T,
    a: ArrayView2<'_, T>,
    b: ArrayViewMut2<'_, T>,
) -> Result<(), Error> {
    let m = b.nrows();
    ensure_shape("A", &a, &[m, m])?;
    match schedule {
        Schedule::Reference => reference(alpha, a, b),
        Schedule::Interchanged => interchanged(alpha, a, b),
        Schedule::Distributed => distributed(alpha, a, b),
        Schedule::Tiled(tile) => tiled(tile, alpha, a, b),
        Schedule::Parallel => parallel(alpha, a, b),
        other @ Schedule::Fused => return Err(crate::unsupported(NAME, other)),
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub alpha: T,
    pub a: Array2<T>,
    pub b: Array2<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Trmm<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Trmm<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Trmm<T> {
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
        let Dims { m, n } = self.dims;
        State {
            alpha: cast(1.5),
            a: init.array2((m, m)),
            b: init.array2((m, n)),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(schedule, state.alpha, state.a.view(), state.b.view_mut())
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![Output::float("B", &state.b)]
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Dims, Trmm};
    use crate::testing::check_schedules;
    use ndarray::{array, Array2};
    use polyverify::{Error, Schedule};

    #[test]
    fn diagonal_is_implicitly_one() -> Result<(), Error> {
        // diagonal and upper triangle are never read
        let a = array![[9.0, 9.0], [2.0, 9.0]];
        let mut b = Array2::<f64>::eye(2);
        run(Schedule::Reference, 2.0, a.view(), b.view_mut())?;
        approx::assert_abs_diff_eq!(b, array![[2.0, 4.0], [0.0, 2.0]]);
        Ok(())
    }

    #[test]
    fn rows_read_unmodified_later_rows() -> Result<(), Error> {
        let a = array![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 3.0, 0.0]];
        for schedule in [
            Schedule::Reference,
            Schedule::Interchanged,
            Schedule::Distributed,
            Schedule::Tiled(1),
            Schedule::Parallel,
        ] {
            let mut b = array![[1.0], [2.0], [3.0]];
            run(schedule, 1.0, a.view(), b.view_mut())?;
            approx::assert_abs_diff_eq!(b, array![[9.0], [11.0], [3.0]]);
        }
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(&Trmm::<f64>::new(Dims { m: 21, n: 17 }), 10)?;
        check_schedules(&Trmm::<f32>::default(), 3)?;
        Ok(())
    }
}
