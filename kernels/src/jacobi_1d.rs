//! Three-point Jacobi stencil alternating between `A` and `B`.
use ndarray::{s, Array1, ArrayView1, ArrayViewMut1};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "jacobi-1d";

pub const WEIGHT: f64 = 0.33333;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub n: usize,
    pub tsteps: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self { n: 120, tsteps: 40 }
    }
}

#[inline]
fn point<T: Real>(src: &ArrayView1<'_, T>, i: usize) -> T {
    cast::<T>(WEIGHT) * (src[i - 1] + src[i] + src[i + 1])
}

pub fn reference<T: Real>(
    tsteps: usize,
    mut a: ArrayViewMut1<'_, T>,
    mut b: ArrayViewMut1<'_, T>,
) {
    let n = a.len();
    for _ in 0..tsteps {
        for i in 1..n.saturating_sub(1) {
            b[i] = point(&a.view(), i);
        }
        for i in 1..n.saturating_sub(1) {
            a[i] = point(&b.view(), i);
        }
    }
}

/// Both sweeps in one loop, with `A` trailing `B` by one point.
fn fused<T: Real>(tsteps: usize, mut a: ArrayViewMut1<'_, T>, mut b: ArrayViewMut1<'_, T>) {
    let n = a.len();
    if n < 3 {
        return;
    }
    for _ in 0..tsteps {
        b[1] = point(&a.view(), 1);
        for i in 2..n - 1 {
            b[i] = point(&a.view(), i);
            a[i - 1] = point(&b.view(), i - 1);
        }
        a[n - 2] = point(&b.view(), n - 2);
    }
}

fn tiled<T: Real>(
    tile: usize,
    tsteps: usize,
    mut a: ArrayViewMut1<'_, T>,
    mut b: ArrayViewMut1<'_, T>,
) {
    let n = a.len();
    if n < 3 {
        return;
    }
    for _ in 0..tsteps {
        for ti in tiles(1..n - 1, tile) {
            for i in ti {
                b[i] = point(&a.view(), i);
            }
        }
        for ti in tiles(1..n - 1, tile) {
            for i in ti {
                a[i] = point(&b.view(), i);
            }
        }
    }
}

fn parallel<T: Real>(tsteps: usize, mut a: ArrayViewMut1<'_, T>, mut b: ArrayViewMut1<'_, T>) {
    let n = a.len();
    if n < 3 {
        return;
    }
    for _ in 0..tsteps {
        let src = a.view();
        parallel::fill_indexed(b.slice_mut(s![1..n - 1]), |i| point(&src, i + 1));
        let src = b.view();
        parallel::fill_indexed(a.slice_mut(s![1..n - 1]), |i| point(&src, i + 1));
    }
}

pub fn run<T: Real>(
    schedule: Schedule,
    tsteps: usize,
    a: ArrayViewMut1<'_, T>,
    b: ArrayViewMut1<'_, T>,
) -> Result<(), Error> {
    ensure_shape("B", &b, &[a.len()])?;
    match schedule {
        Schedule::Reference => reference(tsteps, a, b),
        Schedule::Fused => fused(tsteps, a, b),
        Schedule::Tiled(tile) => tiled(tile, tsteps, a, b),
        Schedule::Parallel => parallel(tsteps, a, b),
        other @ (Schedule::Interchanged | Schedule::Distributed) => {
            return Err(crate::unsupported(NAME, other))
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub a: Array1<T>,
    pub b: Array1<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Jacobi1d<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Jacobi1d<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Jacobi1d<T> {
    type State = State<T>;

    fn name(&self) -> &'static str {
        NAME
    }

    fn schedules(&self) -> Vec<Schedule> {
        vec![
            Schedule::Reference,
            Schedule::Fused,
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
            a: init.array1(n),
            b: init.array1(n),
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
    use super::{run, Dims, Jacobi1d};
    use crate::testing::check_schedules;
    use ndarray::array;
    use polyverify::{Error, Schedule};

    #[test]
    fn single_step() -> Result<(), Error> {
        let mut a = array![3.0, 6.0, 9.0, 12.0];
        let mut b = array![0.0, 0.0, 0.0, 0.0];
        run(Schedule::Reference, 1, a.view_mut(), b.view_mut())?;
        approx::assert_abs_diff_eq!(b, array![0.0, 5.99994, 8.99991, 0.0], epsilon = 1e-12);
        assert_eq!(a[0], 3.0);
        assert_eq!(a[3], 12.0);
        Ok(())
    }

    #[test]
    fn fused_is_bit_identical() -> Result<(), Error> {
        let mut init = polyverify::Init::new(8);
        let a = init.array1::<f64>(33);
        let b = init.array1::<f64>(33);
        let (mut want_a, mut want_b) = (a.clone(), b.clone());
        run(Schedule::Reference, 7, want_a.view_mut(), want_b.view_mut())?;
        let (mut have_a, mut have_b) = (a, b);
        run(Schedule::Fused, 7, have_a.view_mut(), have_b.view_mut())?;
        assert_eq!(have_a, want_a);
        assert_eq!(have_b, want_b);
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(&Jacobi1d::<f64>::new(Dims { n: 31, tsteps: 9 }), 10)?;
        check_schedules(&Jacobi1d::<f32>::default(), 3)?;
        Ok(())
    }
}
