//! Multi-resolution analysis kernel.
//!
//! ```text
//! A[r][q][:] = A[r][q][:] C4
//! ```
//!
//! Each `(r, q)` slice is multiplied through the scratch vector `sum`, which
//! is left holding the last slice.
use ndarray::{s, Array1, Array2, Array3, ArrayView2, ArrayViewMut1, ArrayViewMut3, Axis};
use polyverify::{
    parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule, Tolerance,
    DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "doitgen";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub nr: usize,
    pub nq: usize,
    pub np: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self {
            nr: 25,
            nq: 20,
            np: 30,
        }
    }
}

pub fn reference<T: Real>(
    mut a: ArrayViewMut3<'_, T>,
    c4: ArrayView2<'_, T>,
    mut sum: ArrayViewMut1<'_, T>,
) {
    let (nr, nq, np) = a.dim();
    for r in 0..nr {
        for q in 0..nq {
            for p in 0..np {
                sum[p] = T::zero();
                for s in 0..np {
                    sum[p] += a[[r, q, s]] * c4[[s, p]];
                }
            }
            for p in 0..np {
                a[[r, q, p]] = sum[p];
            }
        }
    }
}

/// `s` outside `p`, so `C4` is streamed row by row.
fn interchanged<T: Real>(
    mut a: ArrayViewMut3<'_, T>,
    c4: ArrayView2<'_, T>,
    mut sum: ArrayViewMut1<'_, T>,
) {
    let (nr, nq, np) = a.dim();
    for r in 0..nr {
        for q in 0..nq {
            sum.fill(T::zero());
            for s in 0..np {
                let value = a[[r, q, s]];
                for p in 0..np {
                    sum[p] += value * c4[[s, p]];
                }
            }
            for p in 0..np {
                a[[r, q, p]] = sum[p];
            }
        }
    }
}

fn tiled<T: Real>(
    tile: usize,
    mut a: ArrayViewMut3<'_, T>,
    c4: ArrayView2<'_, T>,
    mut sum: ArrayViewMut1<'_, T>,
) {
    let (nr, nq, np) = a.dim();
    for r in 0..nr {
        for q in 0..nq {
            for tp in tiles(0..np, tile) {
                for p in tp.clone() {
                    sum[p] = T::zero();
                }
                for ts in tiles(0..np, tile) {
                    for p in tp.clone() {
                        for s in ts.clone() {
                            sum[p] += a[[r, q, s]] * c4[[s, p]];
                        }
                    }
                }
            }
            for p in 0..np {
                a[[r, q, p]] = sum[p];
            }
        }
    }
}

/// Slices along `r` in parallel, each with its own scratch vector.
fn parallel<T: Real>(
    mut a: ArrayViewMut3<'_, T>,
    c4: ArrayView2<'_, T>,
    mut sum: ArrayViewMut1<'_, T>,
) {
    let (nr, nq, np) = a.dim();
    parallel::for_each_lane(a.view_mut(), Axis(0), |_, mut plane| {
        let mut scratch = Array1::<T>::zeros(np);
        for mut row in plane.axis_iter_mut(Axis(0)) {
            for p in 0..np {
                scratch[p] = T::zero();
                for s in 0..np {
                    scratch[p] += row[s] * c4[[s, p]];
                }
            }
            row.assign(&scratch);
        }
    });
    if nr > 0 && nq > 0 {
        sum.assign(&a.slice(s![nr - 1, nq - 1, ..]));
    }
}

pub fn run<T: Real>(
    schedule: Schedule,
    a: ArrayViewMut3<'_, T>,
    c4: ArrayView2<'_, T>,
    sum: ArrayViewMut1<'_, T>,
) -> Result<(), Error> {
    let np = a.dim().2;
    ensure_shape("C4", &c4, &[np, np])?;
    ensure_shape("sum", &sum, &[np])?;
    match schedule {
        Schedule::Reference => reference(a, c4, sum),
        Schedule::Interchanged => interchanged(a, c4, sum),
        Schedule::Tiled(tile) => tiled(tile, a, c4, sum),
        Schedule::Parallel => parallel(a, c4, sum),
        other @ (Schedule::Fused | Schedule::Distributed) => {
            return Err(crate::unsupported(NAME, other))
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub a: Array3<T>,
    pub c4: Array2<T>,
    pub sum: Array1<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Doitgen<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Doitgen<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Doitgen<T> {
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
        let Dims { nr, nq, np } = self.dims;
        State {
            a: init.array3((nr, nq, np)),
            c4: init.array2((np, np)),
            sum: init.array1(np),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            state.a.view_mut(),
            state.c4.view(),
            state.sum.view_mut(),
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![Output::float("A", &state.a), Output::float("sum", &state.sum)]
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Dims, Doitgen};
    use crate::testing::check_schedules;
    use ndarray::{array, Array1, Array2, Array3};
    use polyverify::{compare_arrays, Error, Init, Schedule, Tolerance};

    #[test]
    fn identity_leaves_slices_unchanged() -> Result<(), Error> {
        let mut init = Init::new(3);
        let a = init.array3::<f64>((3, 2, 4));
        let mut have = a.clone();
        let mut sum = Array1::<f64>::from_elem(4, 9.0);
        run(
            Schedule::Reference,
            have.view_mut(),
            Array2::eye(4).view(),
            sum.view_mut(),
        )?;
        approx::assert_abs_diff_eq!(have, a);
        approx::assert_abs_diff_eq!(sum, a.slice(ndarray::s![2, 1, ..]));
        Ok(())
    }

    #[test]
    fn swaps_columns() -> Result<(), Error> {
        let mut a = Array3::<f64>::zeros((1, 1, 2));
        a[[0, 0, 0]] = 1.0;
        a[[0, 0, 1]] = 2.0;
        let mut sum = Array1::<f64>::zeros(2);
        let swap = array![[0.0, 1.0], [1.0, 0.0]];
        run(Schedule::Parallel, a.view_mut(), swap.view(), sum.view_mut())?;
        assert_eq!(a.as_slice(), Some(&[2.0, 1.0][..]));
        assert_eq!(sum.to_vec(), vec![2.0, 1.0]);
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(&Doitgen::<f64>::new(Dims { nr: 5, nq: 4, np: 19 }), 10)?;
        check_schedules(&Doitgen::<f32>::default(), 3)?;
        Ok(())
    }

    /// `p` hoisted above `r` and `q`, summing every slice into one vector.
    fn p_hoisted(a: &mut Array3<f64>, c4: &Array2<f64>, sum: &mut Array1<f64>) {
        let (nr, nq, np) = a.dim();
        for p in 0..np {
            sum[p] = 0.0;
            for s in 0..np {
                for r in 0..nr {
                    for q in 0..nq {
                        sum[p] += a[[r, q, s]] * c4[[s, p]];
                    }
                }
            }
            for r in 0..nr {
                for q in 0..nq {
                    a[[r, q, p]] = sum[p];
                }
            }
        }
    }

    #[test]
    fn hoisting_p_is_detected() -> Result<(), Error> {
        let mut init = Init::new(7);
        let a = init.array3::<f64>((3, 2, 5));
        let c4 = init.array2::<f64>((5, 5));
        let mut want = a.clone();
        let mut want_sum = Array1::zeros(5);
        run(
            Schedule::Reference,
            want.view_mut(),
            c4.view(),
            want_sum.view_mut(),
        )?;
        let mut have = a;
        let mut have_sum = Array1::zeros(5);
        p_hoisted(&mut have, &c4, &mut have_sum);
        let cmp = compare_arrays(
            have_sum.as_slice().unwrap_or_default(),
            want_sum.as_slice().unwrap_or_default(),
            &Tolerance::default(),
        );
        assert!(!cmp.is_equivalent());
        Ok(())
    }
}
