//! Five-point Jacobi stencil alternating between `A` and `B`.
use ndarray::{Array2, ArrayBase, ArrayViewMut2, Axis, Data, Ix2};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "jacobi-2d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub n: usize,
    pub tsteps: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self { n: 90, tsteps: 40 }
    }
}

#[inline]
fn point<T, S>(src: &ArrayBase<S, Ix2>, i: usize, j: usize) -> T
where
    T: Real,
    S: Data<Elem = T>,
{
    cast::<T>(0.2)
        * (src[[i, j]] + src[[i, j - 1]] + src[[i, 1 + j]] + src[[1 + i, j]] + src[[i - 1, j]])
}

pub fn reference<T: Real>(
    tsteps: usize,
    mut a: ArrayViewMut2<'_, T>,
    mut b: ArrayViewMut2<'_, T>,
) {
    let n = a.nrows();
    for _ in 0..tsteps {
        for i in 1..n.saturating_sub(1) {
            for j in 1..n - 1 {
                b[[i, j]] = point(&a, i, j);
            }
        }
        for i in 1..n.saturating_sub(1) {
            for j in 1..n - 1 {
                a[[i, j]] = point(&b, i, j);
            }
        }
    }
}

fn interchanged<T: Real>(
    tsteps: usize,
    mut a: ArrayViewMut2<'_, T>,
    mut b: ArrayViewMut2<'_, T>,
) {
    let n = a.nrows();
    for _ in 0..tsteps {
        for j in 1..n.saturating_sub(1) {
            for i in 1..n - 1 {
                b[[i, j]] = point(&a, i, j);
            }
        }
        for j in 1..n.saturating_sub(1) {
            for i in 1..n - 1 {
                a[[i, j]] = point(&b, i, j);
            }
        }
    }
}

fn sweep_tiled<T: Real>(tile: usize, src: &ArrayViewMut2<'_, T>, dst: &mut ArrayViewMut2<'_, T>) {
    let n = src.nrows();
    for ti in tiles(1..n - 1, tile) {
        for tj in tiles(1..n - 1, tile) {
            for i in ti.clone() {
                for j in tj.clone() {
                    dst[[i, j]] = point(src, i, j);
                }
            }
        }
    }
}

fn tiled<T: Real>(
    tile: usize,
    tsteps: usize,
    mut a: ArrayViewMut2<'_, T>,
    mut b: ArrayViewMut2<'_, T>,
) {
    if a.nrows() < 3 {
        return;
    }
    for _ in 0..tsteps {
        sweep_tiled(tile, &a, &mut b);
        sweep_tiled(tile, &b, &mut a);
    }
}

fn sweep_parallel<T: Real>(src: &ArrayViewMut2<'_, T>, dst: &mut ArrayViewMut2<'_, T>) {
    let n = src.nrows();
    let src = src.view();
    parallel::for_each_lane(dst.view_mut(), Axis(0), |i, mut row| {
        if i == 0 || i == n - 1 {
            return;
        }
        for j in 1..n - 1 {
            row[j] = point(&src, i, j);
        }
    });
}

fn parallel<T: Real>(tsteps: usize, mut a: ArrayViewMut2<'_, T>, mut b: ArrayViewMut2<'_, T>) {
    if a.nrows() < 3 {
        return;
    }
    for _ in 0..tsteps {
        sweep_parallel(&a, &mut b);
        sweep_parallel(&b, &mut a);
    }
}

pub fn run<T: Real>(
    schedule: Schedule,
    tsteps: usize,
    a: ArrayViewMut2<'_, T>,
    b: ArrayViewMut2<'_, T>,
) -> Result<(), Error> {
    let n = a.nrows();
    ensure_shape("A", &a, &[n, n])?;
    ensure_shape("B", &b, &[n, n])?;
    match schedule {
        Schedule::Reference => reference(tsteps, a, b),
        Schedule::Interchanged => interchanged(tsteps, a, b),
        Schedule::Tiled(tile) => tiled(tile, tsteps, a, b),
        Schedule::Parallel => parallel(tsteps, a, b),
        other @ (Schedule::Fused | Schedule::Distributed) => {
            return Err(crate::unsupported(NAME, other))
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub a: Array2<T>,
    pub b: Array2<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Jacobi2d<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Jacobi2d<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Jacobi2d<T> {
    type State = State<T>;

    fn name(&self) -> &'static str {
        NAME
    }

    fn schedules(&self) -> Vec<Schedule> {
        vec![
            Schedule::Reference,
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
            b: init.array2((n, n)),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            self.dims.tsteps,
            state.a.view_mut(),
            state.b.view_mut(),
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![Output::float("A", &state.a), Output::float("B", &state.b)]
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Dims, Jacobi2d};
    use crate::testing::check_schedules;
    use ndarray::Array2;
    use polyverify::{Error, Schedule};

    #[test]
    fn impulse_spreads_to_neighbors() -> Result<(), Error> {
        let mut a = Array2::<f64>::zeros((5, 5));
        a[[2, 2]] = 5.0;
        let mut b = Array2::<f64>::zeros((5, 5));
        run(Schedule::Reference, 1, a.view_mut(), b.view_mut())?;
        approx::assert_abs_diff_eq!(b[[2, 2]], 1.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(b[[1, 2]], 1.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(b[[1, 1]], 0.0);
        assert!(b.row(0).iter().all(|&value| value == 0.0));
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(&Jacobi2d::<f64>::new(Dims { n: 21, tsteps: 6 }), 10)?;
        check_schedules(&Jacobi2d::<f32>::default(), 2)?;
        Ok(())
    }
}
