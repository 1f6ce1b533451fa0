//! Seven-point heat equation on a cube, alternating between `A` and `B`.
use ndarray::{Array3, ArrayBase, ArrayViewMut3, Axis, Data, Ix3};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "heat-3d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub n: usize,
    pub tsteps: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self { n: 20, tsteps: 40 }
    }
}

#[inline]
fn point<T, S>(src: &ArrayBase<S, Ix3>, i: usize, j: usize, k: usize) -> T
where
    T: Real,
    S: Data<Elem = T>,
{
    let c: T = cast(0.125);
    let two: T = cast(2.0);
    let center = src[[i, j, k]];
    c * (src[[i + 1, j, k]] - two * center + src[[i - 1, j, k]])
        + c * (src[[i, j + 1, k]] - two * center + src[[i, j - 1, k]])
        + c * (src[[i, j, k + 1]] - two * center + src[[i, j, k - 1]])
        + center
}

fn sweep<T: Real>(src: &ArrayViewMut3<'_, T>, dst: &mut ArrayViewMut3<'_, T>) {
    let n = src.dim().0;
    for i in 1..n - 1 {
        for j in 1..n - 1 {
            for k in 1..n - 1 {
                dst[[i, j, k]] = point(src, i, j, k);
            }
        }
    }
}

pub fn reference<T: Real>(
    tsteps: usize,
    mut a: ArrayViewMut3<'_, T>,
    mut b: ArrayViewMut3<'_, T>,
) {
    if a.dim().0 < 3 {
        return;
    }
    for _ in 0..tsteps {
        sweep(&a, &mut b);
        sweep(&b, &mut a);
    }
}

fn sweep_interchanged<T: Real>(src: &ArrayViewMut3<'_, T>, dst: &mut ArrayViewMut3<'_, T>) {
    let n = src.dim().0;
    for k in 1..n - 1 {
        for j in 1..n - 1 {
            for i in 1..n - 1 {
                dst[[i, j, k]] = point(src, i, j, k);
            }
        }
    }
}

fn interchanged<T: Real>(
    tsteps: usize,
    mut a: ArrayViewMut3<'_, T>,
    mut b: ArrayViewMut3<'_, T>,
) {
    if a.dim().0 < 3 {
        return;
    }
    for _ in 0..tsteps {
        sweep_interchanged(&a, &mut b);
        sweep_interchanged(&b, &mut a);
    }
}

fn sweep_tiled<T: Real>(tile: usize, src: &ArrayViewMut3<'_, T>, dst: &mut ArrayViewMut3<'_, T>) {
    let n = src.dim().0;
    for ti in tiles(1..n - 1, tile) {
        for tj in tiles(1..n - 1, tile) {
            for i in ti.clone() {
                for j in tj.clone() {
                    for k in 1..n - 1 {
                        dst[[i, j, k]] = point(src, i, j, k);
                    }
                }
            }
        }
    }
}

fn tiled<T: Real>(
    tile: usize,
    tsteps: usize,
    mut a: ArrayViewMut3<'_, T>,
    mut b: ArrayViewMut3<'_, T>,
) {
    if a.dim().0 < 3 {
        return;
    }
    for _ in 0..tsteps {
        sweep_tiled(tile, &a, &mut b);
        sweep_tiled(tile, &b, &mut a);
    }
}

fn sweep_parallel<T: Real>(src: &ArrayViewMut3<'_, T>, dst: &mut ArrayViewMut3<'_, T>) {
    let n = src.dim().0;
    let src = src.view();
    parallel::for_each_lane(dst.view_mut(), Axis(0), |i, mut plane| {
        if i == 0 || i == n - 1 {
            return;
        }
        for j in 1..n - 1 {
            for k in 1..n - 1 {
                plane[[j, k]] = point(&src, i, j, k);
            }
        }
    });
}

fn parallel<T: Real>(tsteps: usize, mut a: ArrayViewMut3<'_, T>, mut b: ArrayViewMut3<'_, T>) {
    if a.dim().0 < 3 {
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
    a: ArrayViewMut3<'_, T>,
    b: ArrayViewMut3<'_, T>,
) -> Result<(), Error> {
    let n = a.dim().0;
    ensure_shape("A", &a, &[n, n, n])?;
    ensure_shape("B", &b, &[n, n, n])?;
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
    pub a: Array3<T>,
    pub b: Array3<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Heat3d<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Heat3d<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Heat3d<T> {
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
            a: init.array3((n, n, n)),
            b: init.array3((n, n, n)),
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
