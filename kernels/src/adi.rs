//! Alternating direction implicit solver.
//!
//! Every time step runs a column sweep that solves a tridiagonal system per
//! column of `v`, followed by a row sweep that solves one per row of `u`.
//! `p` and `q` hold the forward elimination coefficients of the current line.
//! Lines within a sweep are independent, so they may be distributed into
//! separate elimination and substitution passes or solved in parallel.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};
use polyverify::{
    cast, parallel, shape::ensure_shape, Error, Init, Kernel, Output, Real, Schedule, Tolerance,
};
use std::marker::PhantomData;

pub const NAME: &str = "adi";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub n: usize,
    pub tsteps: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self { n: 60, tsteps: 40 }
    }
}

/// Tridiagonal coefficients of both sweeps.
#[derive(Debug, Clone, Copy)]
pub struct Coefficients<T> {
    pub a: T,
    pub b: T,
    pub c: T,
    pub d: T,
    pub e: T,
    pub f: T,
}

impl<T: Real> Coefficients<T> {
    /// Coefficients for `DX = DY = 1/n`, `DT = 1/tsteps`, `B1 = 2` and `B2 = 1`.
    #[must_use]
    pub fn new(n: usize, tsteps: usize) -> Self {
        let one = T::one();
        let two: T = cast(2.0);
        let dx = one / cast(n as f64);
        let dy = one / cast(n as f64);
        let dt = one / cast(tsteps as f64);
        let (b1, b2) = (two, one);
        let mul1 = b1 * dt / (dx * dx);
        let mul2 = b2 * dt / (dy * dy);
        let a = -mul1 / two;
        let d = -mul2 / two;
        Self {
            a,
            b: one + mul1,
            c: a,
            d,
            e: one + mul2,
            f: d,
        }
    }
}

/// Forward elimination along column `i` of `u`, writing the coefficients of
/// the column of `v`.
fn column_forward<T: Real>(
    k: &Coefficients<T>,
    u: &ArrayView2<'_, T>,
    i: usize,
    mut p: ArrayViewMut1<'_, T>,
    mut q: ArrayViewMut1<'_, T>,
    mut v: ArrayViewMut1<'_, T>,
) {
    let n = v.len();
    let two: T = cast(2.0);
    v[0] = T::one();
    p[0] = T::zero();
    q[0] = v[0];
    for j in 1..n - 1 {
        let denom = k.a * p[j - 1] + k.b;
        p[j] = -k.c / denom;
        q[j] = (-k.d * u[[j, i - 1]] + (T::one() + two * k.d) * u[[j, i]]
            - k.f * u[[j, i + 1]]
            - k.a * q[j - 1])
            / denom;
    }
}

/// Forward elimination along row `i` of `v`, writing the coefficients of the
/// row of `u`.
fn row_forward<T: Real>(
    k: &Coefficients<T>,
    v: &ArrayView2<'_, T>,
    i: usize,
    mut p: ArrayViewMut1<'_, T>,
    mut q: ArrayViewMut1<'_, T>,
    mut u: ArrayViewMut1<'_, T>,
) {
    let n = u.len();
    let two: T = cast(2.0);
    u[0] = T::one();
    p[0] = T::zero();
    q[0] = u[0];
    for j in 1..n - 1 {
        let denom = k.d * p[j - 1] + k.e;
        p[j] = -k.f / denom;
        q[j] = (-k.a * v[[i - 1, j]] + (T::one() + two * k.a) * v[[i, j]]
            - k.c * v[[i + 1, j]]
            - k.d * q[j - 1])
            / denom;
    }
}

fn back_substitute<T: Real>(
    p: ArrayView1<'_, T>,
    q: ArrayView1<'_, T>,
    mut x: ArrayViewMut1<'_, T>,
) {
    let n = x.len();
    x[n - 1] = T::one();
    for j in (1..n - 1).rev() {
        x[j] = p[j] * x[j + 1] + q[j];
    }
}

pub struct Grids<'a, T> {
    pub u: ArrayViewMut2<'a, T>,
    pub v: ArrayViewMut2<'a, T>,
    pub p: ArrayViewMut2<'a, T>,
    pub q: ArrayViewMut2<'a, T>,
}

pub fn reference<T: Real>(tsteps: usize, grids: Grids<'_, T>) {
    let Grids {
        mut u,
        mut v,
        mut p,
        mut q,
    } = grids;
    let n = u.nrows();
    if n < 3 {
        return;
    }
    let k = Coefficients::<T>::new(n, tsteps);
    for _ in 0..tsteps {
        for i in 1..n - 1 {
            column_forward(&k, &u.view(), i, p.row_mut(i), q.row_mut(i), v.column_mut(i));
            back_substitute(p.row(i), q.row(i), v.column_mut(i));
        }
        for i in 1..n - 1 {
            row_forward(&k, &v.view(), i, p.row_mut(i), q.row_mut(i), u.row_mut(i));
            back_substitute(p.row(i), q.row(i), u.row_mut(i));
        }
    }
}

/// Elimination of every line before any substitution.
fn distributed<T: Real>(tsteps: usize, grids: Grids<'_, T>) {
    let Grids {
        mut u,
        mut v,
        mut p,
        mut q,
    } = grids;
    let n = u.nrows();
    if n < 3 {
        return;
    }
    let k = Coefficients::<T>::new(n, tsteps);
    for _ in 0..tsteps {
        for i in 1..n - 1 {
            column_forward(&k, &u.view(), i, p.row_mut(i), q.row_mut(i), v.column_mut(i));
        }
        for i in 1..n - 1 {
            back_substitute(p.row(i), q.row(i), v.column_mut(i));
        }
        for i in 1..n - 1 {
            row_forward(&k, &v.view(), i, p.row_mut(i), q.row_mut(i), u.row_mut(i));
        }
        for i in 1..n - 1 {
            back_substitute(p.row(i), q.row(i), u.row_mut(i));
        }
    }
}

type Line<T> = (Array1<T>, Array1<T>, Array1<T>);

fn parallel<T: Real>(tsteps: usize, grids: Grids<'_, T>) {
    let Grids {
        mut u,
        mut v,
        mut p,
        mut q,
    } = grids;
    let n = u.nrows();
    if n < 3 {
        return;
    }
    let k = Coefficients::<T>::new(n, tsteps);
    for _ in 0..tsteps {
        let columns: Vec<Line<T>> = {
            let (u, v, p, q) = (u.view(), v.view(), p.view(), q.view());
            parallel::map_range(n - 2, |r| {
                let i = r + 1;
                let (mut pi, mut qi, mut vi) =
                    (p.row(i).to_owned(), q.row(i).to_owned(), v.column(i).to_owned());
                column_forward(&k, &u, i, pi.view_mut(), qi.view_mut(), vi.view_mut());
                back_substitute(pi.view(), qi.view(), vi.view_mut());
                (pi, qi, vi)
            })
        };
        for (r, (pi, qi, vi)) in columns.into_iter().enumerate() {
            p.row_mut(r + 1).assign(&pi);
            q.row_mut(r + 1).assign(&qi);
            v.column_mut(r + 1).assign(&vi);
        }
        let rows: Vec<Line<T>> = {
            let (u, v, p, q) = (u.view(), v.view(), p.view(), q.view());
            parallel::map_range(n - 2, |r| {
                let i = r + 1;
                let (mut pi, mut qi, mut ui) =
                    (p.row(i).to_owned(), q.row(i).to_owned(), u.row(i).to_owned());
                row_forward(&k, &v, i, pi.view_mut(), qi.view_mut(), ui.view_mut());
                back_substitute(pi.view(), qi.view(), ui.view_mut());
                (pi, qi, ui)
            })
        };
        for (r, (pi, qi, ui)) in rows.into_iter().enumerate() {
            p.row_mut(r + 1).assign(&pi);
            q.row_mut(r + 1).assign(&qi);
            u.row_mut(r + 1).assign(&ui);
        }
    }
}

pub fn run<T: Real>(schedule: Schedule, tsteps: usize, grids: Grids<'_, T>) -> Result<(), Error> {
    let n = grids.u.nrows();
    for (name, grid) in [
        ("u", &grids.u),
        ("v", &grids.v),
        ("p", &grids.p),
        ("q", &grids.q),
    ] {
        ensure_shape(name, grid, &[n, n])?;
    }
    match schedule {
        Schedule::Reference => reference(tsteps, grids),
        Schedule::Distributed => distributed(tsteps, grids),
        Schedule::Parallel => parallel(tsteps, grids),
        other @ (Schedule::Interchanged | Schedule::Fused | Schedule::Tiled(_)) => {
            return Err(crate::unsupported(NAME, other))
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub u: Array2<T>,
    pub v: Array2<T>,
    pub p: Array2<T>,
    pub q: Array2<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Adi<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Adi<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Adi<T> {
    type State = State<T>;

    fn name(&self) -> &'static str {
        NAME
    }

    fn schedules(&self) -> Vec<Schedule> {
        vec![
            Schedule::Reference,
            Schedule::Distributed,
            Schedule::Parallel,
        ]
    }

    fn tolerance(&self) -> Tolerance {
        T::default_tolerance()
    }

    fn init(&self, init: &mut Init) -> State<T> {
        let n = self.dims.n;
        State {
            u: init.array2((n, n)),
            v: init.array2((n, n)),
            p: init.array2((n, n)),
            q: init.array2((n, n)),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            self.dims.tsteps,
            Grids {
                u: state.u.view_mut(),
                v: state.v.view_mut(),
                p: state.p.view_mut(),
                q: state.q.view_mut(),
            },
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![
            Output::float("u", &state.u),
            Output::float("v", &state.v),
            Output::float("p", &state.p),
            Output::float("q", &state.q),
        ]
    }
}
