//! Symmetric matrix multiplication with only the lower triangle of `A` stored.
//!
//! ```text
//! C = alpha * A B + beta * C
//! ```
//!
//! Every column `j` of `C` depends only on column `j` of `B`, so column
//! traversals may be reordered freely.
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "symm";

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

/// Updates entry `(i, j)` and the entries above it in column `j`.
#[inline]
fn update<T: Real>(
    alpha: T,
    beta: T,
    a: &ArrayView2<'_, T>,
    b: &ArrayView2<'_, T>,
    c: &mut ArrayViewMut2<'_, T>,
    i: usize,
    j: usize,
) {
    let mut temp2 = T::zero();
    for k in 0..i {
        c[[k, j]] += alpha * b[[i, j]] * a[[i, k]];
        temp2 += b[[k, j]] * a[[i, k]];
    }
    c[[i, j]] = beta * c[[i, j]] + alpha * b[[i, j]] * a[[i, i]] + alpha * temp2;
}

pub fn reference<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    mut c: ArrayViewMut2<'_, T>,
) {
    let (m, n) = c.dim();
    for i in 0..m {
        for j in 0..n {
            update(alpha, beta, &a, &b, &mut c, i, j);
        }
    }
}

fn interchanged<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    mut c: ArrayViewMut2<'_, T>,
) {
    let (m, n) = c.dim();
    for j in 0..n {
        for i in 0..m {
            update(alpha, beta, &a, &b, &mut c, i, j);
        }
    }
}

/// The scatter into `C[k][j]` and the `temp2` reduction in separate loops.
fn distributed<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    mut c: ArrayViewMut2<'_, T>,
) {
    let (m, n) = c.dim();
    for i in 0..m {
        for j in 0..n {
            let tmp = b[[i, j]];
            for k in 0..i {
                c[[k, j]] += alpha * tmp * a[[i, k]];
            }
            let mut temp2 = T::zero();
            for k in 0..i {
                temp2 += b[[k, j]] * a[[i, k]];
            }
            c[[i, j]] = beta * c[[i, j]] + alpha * b[[i, j]] * a[[i, i]] + alpha * temp2;
        }
    }
}

fn tiled<T: Real>(
    tile: usize,
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    mut c: ArrayViewMut2<'_, T>,
) {
    let (m, n) = c.dim();
    for tj in tiles(0..n, tile) {
        for i in 0..m {
            for j in tj.clone() {
                update(alpha, beta, &a, &b, &mut c, i, j);
            }
        }
    }
}

fn column<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView1<'_, T>,
    mut c: ArrayViewMut1<'_, T>,
) {
    for i in 0..c.len() {
        let mut temp2 = T::zero();
        for k in 0..i {
            c[k] += alpha * b[i] * a[[i, k]];
            temp2 += b[k] * a[[i, k]];
        }
        c[i] = beta * c[i] + alpha * b[i] * a[[i, i]] + alpha * temp2;
    }
}

fn parallel<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    c: ArrayViewMut2<'_, T>,
) {
    parallel::for_each_lane(c, Axis(1), |j, col| column(alpha, beta, a, b.column(j), col));
}

pub fn run<T: Real>(
    schedule: Schedule,
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    c: ArrayViewMut2<'_, T>,
) -> Result<(), Error> {
    let (m, n) = c.dim();
    ensure_shape("A", &a, &[m, m])?;
    ensure_shape("B", &b, &[m, n])?;
    match schedule {
        Schedule::Reference => reference(alpha, beta, a, b, c),
        Schedule::Interchanged => interchanged(alpha, beta, a, b, c),
        Schedule::Distributed => distributed(alpha, beta, a, b, c),
        Schedule::Tiled(tile) => tiled(tile, alpha, beta, a, b, c),
        Schedule::Parallel => parallel(alpha, beta, a, b, c),
        other @ Schedule::Fused => return Err(crate::unsupported(NAME, other)),
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub alpha: T,
    pub beta: T,
    pub a: Array2<T>,
    pub b: Array2<T>,
    pub c: Array2<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Symm<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Symm<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Symm<T> {
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
            beta: cast(1.2),
            a: init.array2((m, m)),
            b: init.array2((m, n)),
            c: init.array2((m, n)),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            state.alpha,
            state.beta,
            state.a.view(),
            state.b.view(),
            state.c.view_mut(),
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![Output::float("C", &state.c)]
    }
}
