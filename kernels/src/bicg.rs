//! BiCG sub kernel of the BiCGStab linear solver.
//!
//! ```text
//! s[j] = sum_i r[i] * A[i][j]
//! q[i] = sum_j A[i][j] * p[j]
//! ```
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1};
use polyverify::{
    parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "bicg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub rows: usize,
    pub cols: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self {
            rows: 124,
            cols: 116,
        }
    }
}

pub fn reference<T: Real>(
    a: ArrayView2<'_, T>,
    p: ArrayView1<'_, T>,
    r: ArrayView1<'_, T>,
    mut s: ArrayViewMut1<'_, T>,
    mut q: ArrayViewMut1<'_, T>,
) {
    let (rows, cols) = a.dim();
    s.fill(T::zero());
    for i in 0..rows {
        q[i] = T::zero();
        for j in 0..cols {
            s[j] += r[i] * a[[i, j]];
            q[i] += a[[i, j]] * p[j];
        }
    }
}

/// Column loop outermost. `q` is zeroed up front since its rows are now
/// accumulated across the whole nest.
fn interchanged<T: Real>(
    a: ArrayView2<'_, T>,
    p: ArrayView1<'_, T>,
    r: ArrayView1<'_, T>,
    mut s: ArrayViewMut1<'_, T>,
    mut q: ArrayViewMut1<'_, T>,
) {
    let (rows, cols) = a.dim();
    s.fill(T::zero());
    q.fill(T::zero());
    for j in 0..cols {
        for i in 0..rows {
            s[j] += r[i] * a[[i, j]];
            q[i] += a[[i, j]] * p[j];
        }
    }
}

fn distributed<T: Real>(
    a: ArrayView2<'_, T>,
    p: ArrayView1<'_, T>,
    r: ArrayView1<'_, T>,
    mut s: ArrayViewMut1<'_, T>,
    mut q: ArrayViewMut1<'_, T>,
) {
    let (rows, cols) = a.dim();
    for j in 0..cols {
        s[j] = T::zero();
        for i in 0..rows {
            s[j] += r[i] * a[[i, j]];
        }
    }
    for i in 0..rows {
        q[i] = T::zero();
        for j in 0..cols {
            q[i] += a[[i, j]] * p[j];
        }
    }
}

fn tiled<T: Real>(
    tile: usize,
    a: ArrayView2<'_, T>,
    p: ArrayView1<'_, T>,
    r: ArrayView1<'_, T>,
    mut s: ArrayViewMut1<'_, T>,
    mut q: ArrayViewMut1<'_, T>,
) {
    let (rows, cols) = a.dim();
    s.fill(T::zero());
    q.fill(T::zero());
    for ti in tiles(0..rows, tile) {
        for tj in tiles(0..cols, tile) {
            for i in ti.clone() {
                for j in tj.clone() {
                    s[j] += r[i] * a[[i, j]];
                    q[i] += a[[i, j]] * p[j];
                }
            }
        }
    }
}

fn parallel<T: Real>(
    a: ArrayView2<'_, T>,
    p: ArrayView1<'_, T>,
    r: ArrayView1<'_, T>,
    s: ArrayViewMut1<'_, T>,
    q: ArrayViewMut1<'_, T>,
) {
    parallel::fill_indexed(s, |j| r.dot(&a.column(j)));
    parallel::fill_indexed(q, |i| a.row(i).dot(&p));
}

pub fn run<T: Real>(
    schedule: Schedule,
    a: ArrayView2<'_, T>,
    p: ArrayView1<'_, T>,
    r: ArrayView1<'_, T>,
    s: ArrayViewMut1<'_, T>,
    q: ArrayViewMut1<'_, T>,
) -> Result<(), Error> {
    let (rows, cols) = a.dim();
    ensure_shape("p", &p, &[cols])?;
    ensure_shape("r", &r, &[rows])?;
    ensure_shape("s", &s, &[cols])?;
    ensure_shape("q", &q, &[rows])?;
    match schedule {
        Schedule::Reference => reference(a, p, r, s, q),
        Schedule::Interchanged => interchanged(a, p, r, s, q),
        Schedule::Distributed => distributed(a, p, r, s, q),
        Schedule::Tiled(tile) => tiled(tile, a, p, r, s, q),
        Schedule::Parallel => parallel(a, p, r, s, q),
        other @ Schedule::Fused => return Err(crate::unsupported(NAME, other)),
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub a: Array2<T>,
    pub p: Array1<T>,
    pub r: Array1<T>,
    pub s: Array1<T>,
    pub q: Array1<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Bicg<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Bicg<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Bicg<T> {
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
            a: init.array2((rows, cols)),
            p: init.array1(cols),
            r: init.array1(rows),
            s: init.array1(cols),
            q: init.array1(rows),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            state.a.view(),
            state.p.view(),
            state.r.view(),
            state.s.view_mut(),
            state.q.view_mut(),
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![Output::float("s", &state.s), Output::float("q", &state.q)]
    }
}
