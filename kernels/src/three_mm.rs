//! Three matrix multiplications.
//!
//! ```text
//! E = A B
//! F = C D
//! G = E F
//! ```
use crate::gemm::product;
use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use polyverify::{
    shape::ensure_shape, Error, Init, Kernel, Output, Real, Schedule, Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "3mm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub ni: usize,
    pub nj: usize,
    pub nk: usize,
    pub nl: usize,
    pub nm: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self {
            ni: 40,
            nj: 50,
            nk: 60,
            nl: 70,
            nm: 80,
        }
    }
}

pub struct Inputs<'a, T> {
    pub a: ArrayView2<'a, T>,
    pub b: ArrayView2<'a, T>,
    pub c: ArrayView2<'a, T>,
    pub d: ArrayView2<'a, T>,
}

pub struct Outputs<'a, T> {
    pub e: ArrayViewMut2<'a, T>,
    pub f: ArrayViewMut2<'a, T>,
    pub g: ArrayViewMut2<'a, T>,
}

/// `F` first, then one row of `E` followed by the matching row of `G`.
fn fused<T: Real>(inputs: &Inputs<'_, T>, outputs: &mut Outputs<'_, T>) {
    let Inputs { a, b, c, d } = inputs;
    let Outputs { e, f, g } = outputs;
    let (ni, nk) = a.dim();
    let (nj, nm) = c.dim();
    let nl = d.ncols();
    for j in 0..nj {
        for l in 0..nl {
            f[[j, l]] = T::zero();
            for m in 0..nm {
                f[[j, l]] += c[[j, m]] * d[[m, l]];
            }
        }
    }
    for i in 0..ni {
        for j in 0..nj {
            e[[i, j]] = T::zero();
            for k in 0..nk {
                e[[i, j]] += a[[i, k]] * b[[k, j]];
            }
        }
        for l in 0..nl {
            g[[i, l]] = T::zero();
            for j in 0..nj {
                g[[i, l]] += e[[i, j]] * f[[j, l]];
            }
        }
    }
}

pub fn run<T: Real>(
    schedule: Schedule,
    inputs: Inputs<'_, T>,
    mut outputs: Outputs<'_, T>,
) -> Result<(), Error> {
    let (ni, nk) = inputs.a.dim();
    let (nj, nm) = inputs.c.dim();
    let nl = inputs.d.ncols();
    ensure_shape("B", &inputs.b, &[nk, nj])?;
    ensure_shape("D", &inputs.d, &[nm, nl])?;
    ensure_shape("E", &outputs.e, &[ni, nj])?;
    ensure_shape("F", &outputs.f, &[nj, nl])?;
    ensure_shape("G", &outputs.g, &[ni, nl])?;
    match schedule {
        Schedule::Fused => fused(&inputs, &mut outputs),
        other @ Schedule::Distributed => return Err(crate::unsupported(NAME, other)),
        _ => {
            let Inputs { a, b, c, d } = inputs;
            let Outputs {
                mut e,
                mut f,
                mut g,
            } = outputs;
            let one = T::one();
            e.fill(T::zero());
            product(NAME, schedule, one, one, a, b, e.view_mut())?;
            f.fill(T::zero());
            product(NAME, schedule, one, one, c, d, f.view_mut())?;
            g.fill(T::zero());
            product(NAME, schedule, one, one, e.view(), f.view(), g.view_mut())?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub a: Array2<T>,
    pub b: Array2<T>,
    pub c: Array2<T>,
    pub d: Array2<T>,
    pub e: Array2<T>,
    pub f: Array2<T>,
    pub g: Array2<T>,
}

#[derive(Debug, Clone, Default)]
pub struct ThreeMm<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> ThreeMm<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for ThreeMm<T> {
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
        let Dims { ni, nj, nk, nl, nm } = self.dims;
        State {
            a: init.array2((ni, nk)),
            b: init.array2((nk, nj)),
            c: init.array2((nj, nm)),
            d: init.array2((nm, nl)),
            e: init.array2((ni, nj)),
            f: init.array2((nj, nl)),
            g: init.array2((ni, nl)),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            Inputs {
                a: state.a.view(),
                b: state.b.view(),
                c: state.c.view(),
                d: state.d.view(),
            },
            Outputs {
                e: state.e.view_mut(),
                f: state.f.view_mut(),
                g: state.g.view_mut(),
            },
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![
            Output::float("E", &state.e),
            Output::float("F", &state.f),
            Output::float("G", &state.g),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Dims, Inputs, Outputs, ThreeMm};
    use crate::testing::check_schedules;
    use ndarray::{array, Array2};
    use polyverify::{Error, Schedule};

    #[test]
    fn outputs_are_zeroed_by_the_kernel() -> Result<(), Error> {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let eye = Array2::<f64>::eye(2);
        let mut e = Array2::from_elem((2, 2), 7.0);
        let mut f = Array2::from_elem((2, 2), 7.0);
        let mut g = Array2::from_elem((2, 2), 7.0);
        for schedule in [Schedule::Reference, Schedule::Fused] {
            run(
                schedule,
                Inputs {
                    a: a.view(),
                    b: eye.view(),
                    c: a.view(),
                    d: a.view(),
                },
                Outputs {
                    e: e.view_mut(),
                    f: f.view_mut(),
                    g: g.view_mut(),
                },
            )?;
            approx::assert_abs_diff_eq!(e, a);
            approx::assert_abs_diff_eq!(f, a.dot(&a));
            approx::assert_abs_diff_eq!(g, a.dot(&a).dot(&a));
        }
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(
            &ThreeMm::<f64>::new(Dims {
                ni: 8,
                nj: 11,
                nk: 13,
                nl: 9,
                nm: 15,
            }),
            8,
        )?;
        check_schedules(&ThreeMm::<f32>::default(), 2)?;
        Ok(())
    }
}
