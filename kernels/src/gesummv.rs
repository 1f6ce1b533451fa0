//! Scalar, vector and matrix multiplication.
//!
//! ```text
//! tmp = A x
//! y   = alpha * tmp + beta * B x
//! ```
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Zip};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "gesummv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub n: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self { n: 250 }
    }
}

pub fn reference<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    x: ArrayView1<'_, T>,
    mut tmp: ArrayViewMut1<'_, T>,
    mut y: ArrayViewMut1<'_, T>,
) {
    let n = x.len();
    for i in 0..n {
        tmp[i] = T::zero();
        y[i] = T::zero();
        for j in 0..n {
            tmp[i] += a[[i, j]] * x[j];
            y[i] += b[[i, j]] * x[j];
        }
        y[i] = alpha * tmp[i] + beta * y[i];
    }
}

fn distributed<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    x: ArrayView1<'_, T>,
    mut tmp: ArrayViewMut1<'_, T>,
    mut y: ArrayViewMut1<'_, T>,
) {
    let n = x.len();
    for i in 0..n {
        tmp[i] = T::zero();
        for j in 0..n {
            tmp[i] += a[[i, j]] * x[j];
        }
    }
    for i in 0..n {
        y[i] = T::zero();
        for j in 0..n {
            y[i] += b[[i, j]] * x[j];
        }
    }
    Zip::from(&mut y)
        .and(&tmp)
        .for_each(|y, &tmp| *y = alpha * tmp + beta * *y);
}

fn interchanged<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    x: ArrayView1<'_, T>,
    mut tmp: ArrayViewMut1<'_, T>,
    mut y: ArrayViewMut1<'_, T>,
) {
    let n = x.len();
    tmp.fill(T::zero());
    y.fill(T::zero());
    for j in 0..n {
        for i in 0..n {
            tmp[i] += a[[i, j]] * x[j];
            y[i] += b[[i, j]] * x[j];
        }
    }
    for i in 0..n {
        y[i] = alpha * tmp[i] + beta * y[i];
    }
}

fn tiled<T: Real>(
    tile: usize,
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    x: ArrayView1<'_, T>,
    mut tmp: ArrayViewMut1<'_, T>,
    mut y: ArrayViewMut1<'_, T>,
) {
    let n = x.len();
    for ti in tiles(0..n, tile) {
        for i in ti.clone() {
            tmp[i] = T::zero();
            y[i] = T::zero();
        }
        for tj in tiles(0..n, tile) {
            for i in ti.clone() {
                for j in tj.clone() {
                    tmp[i] += a[[i, j]] * x[j];
                    y[i] += b[[i, j]] * x[j];
                }
            }
        }
        for i in ti {
            y[i] = alpha * tmp[i] + beta * y[i];
        }
    }
}

fn parallel<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    x: ArrayView1<'_, T>,
    mut tmp: ArrayViewMut1<'_, T>,
    y: ArrayViewMut1<'_, T>,
) {
    parallel::fill_indexed(tmp.view_mut(), |i| a.row(i).dot(&x));
    let tmp = tmp.view();
    parallel::fill_indexed(y, |i| alpha * tmp[i] + beta * b.row(i).dot(&x));
}

pub fn run<T: Real>(
    schedule: Schedule,
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    x: ArrayView1<'_, T>,
    tmp: ArrayViewMut1<'_, T>,
    y: ArrayViewMut1<'_, T>,
) -> Result<(), Error> {
    let n = x.len();
    ensure_shape("A", &a, &[n, n])?;
    ensure_shape("B", &b, &[n, n])?;
    ensure_shape("tmp", &tmp, &[n])?;
    ensure_shape("y", &y, &[n])?;
    match schedule {
        Schedule::Reference => reference(alpha, beta, a, b, x, tmp, y),
        Schedule::Distributed => distributed(alpha, beta, a, b, x, tmp, y),
        Schedule::Interchanged => interchanged(alpha, beta, a, b, x, tmp, y),
        Schedule::Tiled(tile) => tiled(tile, alpha, beta, a, b, x, tmp, y),
        Schedule::Parallel => parallel(alpha, beta, a, b, x, tmp, y),
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
    pub x: Array1<T>,
    pub tmp: Array1<T>,
    pub y: Array1<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Gesummv<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Gesummv<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Gesummv<T> {
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
        let n = self.dims.n;
        State {
            alpha: cast(1.5),
            beta: cast(1.2),
            a: init.array2((n, n)),
            b: init.array2((n, n)),
            x: init.array1(n),
            tmp: init.array1(n),
            y: init.array1(n),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            state.alpha,
            state.beta,
            state.a.view(),
            state.b.view(),
            state.x.view(),
            state.tmp.view_mut(),
            state.y.view_mut(),
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![Output::float("tmp", &state.tmp), Output::float("y", &state.y)]
    }
}
