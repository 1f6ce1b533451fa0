//! Symmetric rank-2k update of the lower triangle.
//!
//! ```text
//! C = alpha * (A B^T + B A^T) + beta * C    (j <= i)
//! ```
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "syr2k";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub n: usize,
    pub m: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self { n: 80, m: 60 }
    }
}

#[inline]
fn term<T: Real>(
    alpha: T,
    a: &ArrayView2<'_, T>,
    b: &ArrayView2<'_, T>,
    i: usize,
    j: usize,
    k: usize,
) -> T {
    a[[j, k]] * alpha * b[[i, k]] + b[[j, k]] * alpha * a[[i, k]]
}

pub fn reference<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    mut c: ArrayViewMut2<'_, T>,
) {
    let (n, m) = a.dim();
    for i in 0..n {
        for j in 0..=i {
            c[[i, j]] *= beta;
        }
        for k in 0..m {
            for j in 0..=i {
                c[[i, j]] += term(alpha, &a, &b, i, j, k);
            }
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
    let (n, m) = a.dim();
    for i in 0..n {
        for j in 0..=i {
            c[[i, j]] *= beta;
            for k in 0..m {
                c[[i, j]] += term(alpha, &a, &b, i, j, k);
            }
        }
    }
}

/// Square `i, j` tiles, each scaled and then accumulated over `k` tiles.
fn tiled<T: Real>(
    tile: usize,
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    mut c: ArrayViewMut2<'_, T>,
) {
    let (n, m) = a.dim();
    for ti in tiles(0..n, tile) {
        for tj in tiles(0..ti.end, tile) {
            for i in ti.clone() {
                for j in tj.start..tj.end.min(i + 1) {
                    c[[i, j]] *= beta;
                }
            }
            for tk in tiles(0..m, tile) {
                for i in ti.clone() {
                    for j in tj.start..tj.end.min(i + 1) {
                        for k in tk.clone() {
                            c[[i, j]] += term(alpha, &a, &b, i, j, k);
                        }
                    }
                }
            }
        }
    }
}

fn parallel<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    c: ArrayViewMut2<'_, T>,
) {
    let m = a.ncols();
    parallel::for_each_lane(c, Axis(0), |i, mut row| {
        for j in 0..=i {
            let mut acc = beta * row[j];
            for k in 0..m {
                acc += term(alpha, &a, &b, i, j, k);
            }
            row[j] = acc;
        }
    });
}

pub fn run<T: Real>(
    schedule: Schedule,
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    c: ArrayViewMut2<'_, T>,
) -> Result<(), Error> {
    let (n, m) = a.dim();
    ensure_shape("B", &b, &[n, m])?;
    ensure_shape("C", &c, &[n, n])?;
    match schedule {
        Schedule::Reference => reference(alpha, beta, a, b, c),
        Schedule::Interchanged => interchanged(alpha, beta, a, b, c),
        Schedule::Tiled(tile) => tiled(tile, alpha, beta, a, b, c),
        Schedule::Parallel => parallel(alpha, beta, a, b, c),
        other @ (Schedule::Fused | Schedule::Distributed) => {
            return Err(crate::unsupported(NAME, other))
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
}

#[derive(Debug, Clone, Default)]
pub struct Syr2k<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Syr2k<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Syr2k<T> {
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
        let Dims { n, m } = self.dims;
        State {
            alpha: cast(1.5),
            beta: cast(1.2),
            a: init.array2((n, m)),
            b: init.array2((n, m)),
            c: init.array2((n, n)),
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

#[cfg(test)]
mod tests {
    use super::{run, Dims, Syr2k};
    use crate::testing::check_schedules;
    use ndarray::{array, Array2};
    use polyverify::{Error, Schedule};

    #[test]
    fn equals_twice_syrk_for_equal_inputs() -> Result<(), Error> {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let mut c = Array2::<f64>::zeros((2, 2));
        run(Schedule::Reference, 1.0, 0.0, a.view(), a.view(), c.view_mut())?;
        approx::assert_abs_diff_eq!(c, array![[10.0, 0.0], [22.0, 50.0]]);
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(&Syr2k::<f64>::new(Dims { n: 31, m: 18 }), 10)?;
        check_schedules(&Syr2k::<f32>::default(), 3)?;
        Ok(())
    }
}
