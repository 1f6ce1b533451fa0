//! Symmetric rank-k update of the lower triangle.
//!
//! ```text
//! C = alpha * A A^T + beta * C    (j <= i)
//! ```
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "syrk";

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

pub fn reference<T: Real>(alpha: T, beta: T, a: ArrayView2<'_, T>, mut c: ArrayViewMut2<'_, T>) {
    let (n, m) = a.dim();
    for i in 0..n {
        for j in 0..=i {
            c[[i, j]] *= beta;
        }
        for k in 0..m {
            for j in 0..=i {
                c[[i, j]] += alpha * a[[i, k]] * a[[j, k]];
            }
        }
    }
}

fn interchanged<T: Real>(
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    mut c: ArrayViewMut2<'_, T>,
) {
    let (n, m) = a.dim();
    for i in 0..n {
        for j in 0..=i {
            c[[i, j]] *= beta;
            for k in 0..m {
                c[[i, j]] += alpha * a[[i, k]] * a[[j, k]];
            }
        }
    }
}

fn tiled<T: Real>(
    tile: usize,
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    mut c: ArrayViewMut2<'_, T>,
) {
    let (n, m) = a.dim();
    for i in 0..n {
        for j in 0..=i {
            c[[i, j]] *= beta;
        }
    }
    for ti in tiles(0..n, tile) {
        for tk in tiles(0..m, tile) {
            // tiles above the diagonal are empty
            for tj in tiles(0..ti.end, tile) {
                for i in ti.clone() {
                    for k in tk.clone() {
                        for j in tj.start..tj.end.min(i + 1) {
                            c[[i, j]] += alpha * a[[i, k]] * a[[j, k]];
                        }
                    }
                }
            }
        }
    }
}

fn parallel<T: Real>(alpha: T, beta: T, a: ArrayView2<'_, T>, c: ArrayViewMut2<'_, T>) {
    parallel::for_each_lane(c, Axis(0), |i, mut row| {
        for j in 0..=i {
            let dot = a.row(i).dot(&a.row(j));
            row[j] = beta * row[j] + alpha * dot;
        }
    });
}

pub fn run<T: Real>(
    schedule: Schedule,
    alpha: T,
    beta: T,
    a: ArrayView2<'_, T>,
    c: ArrayViewMut2<'_, T>,
) -> Result<(), Error> {
    let n = a.nrows();
    ensure_shape("C", &c, &[n, n])?;
    match schedule {
        Schedule::Reference => reference(alpha, beta, a, c),
        Schedule::Interchanged => interchanged(alpha, beta, a, c),
        Schedule::Tiled(tile) => tiled(tile, alpha, beta, a, c),
        Schedule::Parallel => parallel(alpha, beta, a, c),
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
    pub c: Array2<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Syrk<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Syrk<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Syrk<T> {
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
            alpha: cast(1.2),
            beta: cast(0.8),
            a: init.array2((n, m)),
            c: init.array2((n, n)),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            state.alpha,
            state.beta,
            state.a.view(),
            state.c.view_mut(),
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![Output::float("C", &state.c)]
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Dims, Syrk};
    use crate::testing::check_schedules;
    use ndarray::{array, Array2};
    use polyverify::{compare_arrays, Error, Init, Schedule, Tolerance};

    #[test]
    fn upper_triangle_is_untouched() -> Result<(), Error> {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let mut c = Array2::<f64>::from_elem((2, 2), 10.0);
        run(Schedule::Reference, 1.0, 0.5, a.view(), c.view_mut())?;
        approx::assert_abs_diff_eq!(c, array![[10.0, 10.0], [16.0, 30.0]]);
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(&Syrk::<f64>::new(Dims { n: 29, m: 17 }), 10)?;
        check_schedules(&Syrk::<f32>::default(), 3)?;
        Ok(())
    }

    /// Loop nest with the beta scaling fused into the `k` loop.
    fn beta_fused_into_k(alpha: f64, beta: f64, a: &Array2<f64>, c: &mut Array2<f64>) {
        let (n, m) = a.dim();
        for i in 0..n {
            for k in 0..m {
                for j in 0..=i {
                    c[[i, j]] *= beta;
                    c[[i, j]] += alpha * a[[i, k]] * a[[j, k]];
                }
            }
        }
    }

    #[test]
    fn beta_fused_into_k_is_detected() -> Result<(), Error> {
        let mut init = Init::new(11);
        let a = init.array2::<f64>((8, 6));
        let c = init.array2::<f64>((8, 8));
        let mut want = c.clone();
        run(Schedule::Reference, 1.2, 0.8, a.view(), want.view_mut())?;
        let mut have = c;
        beta_fused_into_k(1.2, 0.8, &a, &mut have);
        let cmp = compare_arrays(
            have.as_slice().unwrap_or_default(),
            want.as_slice().unwrap_or_default(),
            &Tolerance::default(),
        );
        assert!(!cmp.is_equivalent());
        // only the lower triangle can differ
        assert!(cmp.divergent <= 8 * 9 / 2);
        Ok(())
    }
}
