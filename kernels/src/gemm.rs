//! General matrix multiplication.
//!
//! ```text
//! C = alpha * A B + beta * C
//! ```
//!
//! The scheduled loop nests are shared with [`crate::two_mm`] and
//! [`crate::three_mm`], which chain several products.
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "gemm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub ni: usize,
    pub nj: usize,
    pub nk: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self {
            ni: 60,
            nj: 70,
            nk: 80,
        }
    }
}

/// Row-wise `i, k, j` order.
pub fn reference<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    mut c: ArrayViewMut2<'_, T>,
) {
    let (ni, nk) = a.dim();
    let nj = b.ncols();
    for i in 0..ni {
        for j in 0..nj {
            c[[i, j]] *= beta;
        }
        for k in 0..nk {
            for j in 0..nj {
                c[[i, j]] += alpha * a[[i, k]] * b[[k, j]];
            }
        }
    }
}

/// Inner product `j, i, k` order.
fn interchanged<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    mut c: ArrayViewMut2<'_, T>,
) {
    let (ni, nk) = a.dim();
    let nj = b.ncols();
    for j in 0..nj {
        for i in 0..ni {
            c[[i, j]] *= beta;
            for k in 0..nk {
                c[[i, j]] += alpha * a[[i, k]] * b[[k, j]];
            }
        }
    }
}

/// `C` is scaled once in a separate pass, then the product is accumulated
/// tile by tile.
fn tiled<T: Real>(
    tile: usize,
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    mut c: ArrayViewMut2<'_, T>,
) {
    let (ni, nk) = a.dim();
    let nj = b.ncols();
    c.map_inplace(|v| *v *= beta);
    for ti in tiles(0..ni, tile) {
        for tj in tiles(0..nj, tile) {
            for tk in tiles(0..nk, tile) {
                for i in ti.clone() {
                    for k in tk.clone() {
                        for j in tj.clone() {
                            c[[i, j]] += alpha * a[[i, k]] * b[[k, j]];
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
    parallel::for_each_lane(c, Axis(0), |i, mut row| {
        row.map_inplace(|v| *v *= beta);
        for (k, b_row) in b.outer_iter().enumerate() {
            let a_ik = alpha * a[[i, k]];
            row.zip_mut_with(&b_row, |c, &b| *c += a_ik * b);
        }
    });
}

/// Checks the shapes of one product and runs it under `schedule`.
pub(crate) fn product<T: Real>(
    kernel: &'static str,
    schedule: Schedule,
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    c: ArrayViewMut2<'_, T>,
) -> Result<(), Error> {
    let (ni, nk) = a.dim();
    let nj = c.ncols();
    ensure_shape("B", &b, &[nk, nj])?;
    ensure_shape("C", &c, &[ni, nj])?;
    match schedule {
        Schedule::Reference => reference(alpha, beta, a, b, c),
        Schedule::Interchanged => interchanged(alpha, beta, a, b, c),
        Schedule::Tiled(tile) => tiled(tile, alpha, beta, a, b, c),
        Schedule::Parallel => parallel(alpha, beta, a, b, c),
        other @ (Schedule::Fused | Schedule::Distributed) => {
            return Err(crate::unsupported(kernel, other))
        }
    }
    Ok(())
}

pub fn run<T: Real>(
    schedule: Schedule,
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    b: ArrayView2<'_, T>,
    c: ArrayViewMut2<'_, T>,
) -> Result<(), Error> {
    product(NAME, schedule, alpha, beta, a, b, c)
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
pub struct Gemm<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Gemm<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Gemm<T> {
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
        let Dims { ni, nj, nk } = self.dims;
        State {
            alpha: cast(1.5),
            beta: cast(1.2),
            a: init.array2((ni, nk)),
            b: init.array2((nk, nj)),
            c: init.array2((ni, nj)),
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
    use super::{run, Dims, Gemm};
    use crate::testing::check_schedules;
    use ndarray::{array, Array2};
    use polyverify::{compare_arrays, Error, Init, Schedule, Tolerance};

    #[test]
    fn small_known_values() -> Result<(), Error> {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let b = array![[5.0, 6.0], [7.0, 8.0]];
        let mut c = Array2::<f64>::ones((2, 2));
        run(Schedule::Reference, 2.0, 10.0, a.view(), b.view(), c.view_mut())?;
        approx::assert_abs_diff_eq!(c, array![[48.0, 54.0], [96.0, 110.0]]);
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(
            &Gemm::<f64>::new(Dims {
                ni: 17,
                nj: 23,
                nk: 35,
            }),
            10,
        )?;
        check_schedules(&Gemm::<f32>::default(), 3)?;
        Ok(())
    }

    /// Tiled variant that scales `C` by beta inside the first `k` tile, once
    /// per `k` instead of once per element.
    fn beta_scaled_per_k(
        tile: usize,
        alpha: f64,
        beta: f64,
        a: &Array2<f64>,
        b: &Array2<f64>,
        c: &mut Array2<f64>,
    ) {
        let (ni, nk) = a.dim();
        let nj = b.ncols();
        for ii in (0..ni).step_by(tile) {
            for jj in (0..nj).step_by(tile) {
                for kk in (0..nk).step_by(tile) {
                    for i in ii..(ii + tile).min(ni) {
                        for k in kk..(kk + tile).min(nk) {
                            if kk == 0 {
                                for j in jj..(jj + tile).min(nj) {
                                    c[[i, j]] *= beta;
                                }
                            }
                            for j in jj..(jj + tile).min(nj) {
                                c[[i, j]] += alpha * a[[i, k]] * b[[k, j]];
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn repeated_beta_scaling_is_detected() -> Result<(), Error> {
        let mut init = Init::new(3);
        let a = init.array2::<f64>((12, 12));
        let b = init.array2::<f64>((12, 12));
        let c = init.array2::<f64>((12, 12));

        let mut want = c.clone();
        run(Schedule::Reference, 1.5, 1.2, a.view(), b.view(), want.view_mut())?;
        let mut have = c;
        beta_scaled_per_k(4, 1.5, 1.2, &a, &b, &mut have);

        let cmp = compare_arrays(
            have.as_slice().unwrap_or_default(),
            want.as_slice().unwrap_or_default(),
            &Tolerance::default(),
        );
        assert!(!cmp.is_equivalent());
        assert_eq!(cmp.first.map(|d| d.offset), Some(0));
        Ok(())
    }
}
