//! Two chained matrix multiplications.
//!
//! ```text
//! tmp = alpha * A B
//! D   = tmp C + beta * D
//! ```
use crate::gemm::product;
use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use polyverify::{
    cast, shape::ensure_shape, Error, Init, Kernel, Output, Real, Schedule, Tolerance,
    DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "2mm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub ni: usize,
    pub nj: usize,
    pub nk: usize,
    pub nl: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self {
            ni: 40,
            nj: 50,
            nk: 70,
            nl: 80,
        }
    }
}

/// Computes one row of `tmp` and then the matching row of `D`.
fn fused<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    c: ArrayView2<'_, T>,
    mut tmp: ArrayViewMut2<'_, T>,
    mut d: ArrayViewMut2<'_, T>,
) {
    let (ni, nk) = a.dim();
    let (nj, nl) = c.dim();
    for i in 0..ni {
        for j in 0..nj {
            tmp[[i, j]] = T::zero();
            for k in 0..nk {
                tmp[[i, j]] += alpha * a[[i, k]] * b[[k, j]];
            }
        }
        for l in 0..nl {
            d[[i, l]] *= beta;
            for j in 0..nj {
                d[[i, l]] += tmp[[i, j]] * c[[j, l]];
            }
        }
    }
}

pub fn run<T: Real>(
    schedule: Schedule,
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    c: ArrayView2<'_, T>,
    mut tmp: ArrayViewMut2<'_, T>,
    d: ArrayViewMut2<'_, T>,
) -> Result<(), Error> {
    let (ni, nk) = a.dim();
    let (nj, nl) = c.dim();
    ensure_shape("B", &b, &[nk, nj])?;
    ensure_shape("tmp", &tmp, &[ni, nj])?;
    ensure_shape("D", &d, &[ni, nl])?;
    match schedule {
        Schedule::Fused => fused(alpha, beta, a, b, c, tmp, d),
        other @ Schedule::Distributed => return Err(crate::unsupported(NAME, other)),
        _ => {
            tmp.fill(T::zero());
            product(NAME, schedule, alpha, T::one(), a, b, tmp.view_mut())?;
            product(NAME, schedule, T::one(), beta, tmp.view(), c, d)?;
        }
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
    pub tmp: Array2<T>,
    pub d: Array2<T>,
}

#[derive(Debug, Clone, Default)]
pub struct TwoMm<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> TwoMm<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for TwoMm<T> {
    type State = State<T>;

    fn name(&self) -> &'static str {
        NAME
    }

    fn schedules(&self) -> Vec<Schedule> {
        vec![
            Schedule::Reference,
            Schedule::Interchanged,
            Schedule::Fused,
            Schedule::Tiled(DEFAULT_TILE),
            Schedule::Parallel,
        ]
    }

    fn tolerance(&self) -> Tolerance {
        T::default_tolerance()
    }

    fn init(&self, init: &mut Init) -> State<T> {
        let Dims { ni, nj, nk, nl } = self.dims;
        State {
            alpha: cast(1.5),
            beta: cast(1.2),
            a: init.array2((ni, nk)),
            b: init.array2((nk, nj)),
            c: init.array2((nj, nl)),
            tmp: init.array2((ni, nj)),
            d: init.array2((ni, nl)),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            state.alpha,
            state.beta,
            state.a.view(),
            state.b.view(),
            state.c.view(),
            state.tmp.view_mut(),
            state.d.view_mut(),
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![Output::float("tmp", &state.tmp), Output::float("D", &state.d)]
    }
}
