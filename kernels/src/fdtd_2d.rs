//! Two-dimensional finite-difference time-domain kernel.
//!
//! ```text
//! ey[0][:] = fict[t]
//! ey -= 0.5 (hz - hz[i-1])
//! ex -= 0.5 (hz - hz[:, j-1])
//! hz -= 0.7 (ex[:, j+1] - ex + ey[i+1] - ey)
//! ```
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut2, Axis};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "fdtd-2d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub nx: usize,
    pub ny: usize,
    pub tmax: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self {
            nx: 60,
            ny: 80,
            tmax: 40,
        }
    }
}

pub struct Fields<'a, T> {
    pub ex: ArrayViewMut2<'a, T>,
    pub ey: ArrayViewMut2<'a, T>,
    pub hz: ArrayViewMut2<'a, T>,
}

#[inline]
fn ey_point<T: Real>(f: &Fields<'_, T>, i: usize, j: usize) -> T {
    f.ey[[i, j]] - cast::<T>(0.5) * (f.hz[[i, j]] - f.hz[[i - 1, j]])
}

#[inline]
fn ex_point<T: Real>(f: &Fields<'_, T>, i: usize, j: usize) -> T {
    f.ex[[i, j]] - cast::<T>(0.5) * (f.hz[[i, j]] - f.hz[[i, j - 1]])
}

#[inline]
fn hz_point<T: Real>(f: &Fields<'_, T>, i: usize, j: usize) -> T {
    f.hz[[i, j]]
        - cast::<T>(0.7)
            * (f.ex[[i, j + 1]] - f.ex[[i, j]] + f.ey[[i + 1, j]] - f.ey[[i, j]])
}

pub fn reference<T: Real>(fict: ArrayView1<'_, T>, mut f: Fields<'_, T>) {
    let (nx, ny) = f.ex.dim();
    for &source in fict {
        for j in 0..ny {
            f.ey[[0, j]] = source;
        }
        for i in 1..nx {
            for j in 0..ny {
                f.ey[[i, j]] = ey_point(&f, i, j);
            }
        }
        for i in 0..nx {
            for j in 1..ny {
                f.ex[[i, j]] = ex_point(&f, i, j);
            }
        }
        for i in 0..nx.saturating_sub(1) {
            for j in 0..ny.saturating_sub(1) {
                f.hz[[i, j]] = hz_point(&f, i, j);
            }
        }
    }
}

/// Columns outermost in every nest.
fn interchanged<T: Real>(fict: ArrayView1<'_, T>, mut f: Fields<'_, T>) {
    let (nx, ny) = f.ex.dim();
    for &source in fict {
        for j in 0..ny {
            f.ey[[0, j]] = source;
        }
        for j in 0..ny {
            for i in 1..nx {
                f.ey[[i, j]] = ey_point(&f, i, j);
            }
        }
        for j in 1..ny {
            for i in 0..nx {
                f.ex[[i, j]] = ex_point(&f, i, j);
            }
        }
        for j in 0..ny.saturating_sub(1) {
            for i in 0..nx.saturating_sub(1) {
                f.hz[[i, j]] = hz_point(&f, i, j);
            }
        }
    }
}

/// The `ey` and `ex` updates only read `hz`, so they share one nest.
fn fused<T: Real>(fict: ArrayView1<'_, T>, mut f: Fields<'_, T>) {
    let (nx, ny) = f.ex.dim();
    for &source in fict {
        for i in 0..nx {
            for j in 0..ny {
                if i == 0 {
                    f.ey[[0, j]] = source;
                } else {
                    f.ey[[i, j]] = ey_point(&f, i, j);
                }
                if j > 0 {
                    f.ex[[i, j]] = ex_point(&f, i, j);
                }
            }
        }
        for i in 0..nx.saturating_sub(1) {
            for j in 0..ny.saturating_sub(1) {
                f.hz[[i, j]] = hz_point(&f, i, j);
            }
        }
    }
}

fn tiled<T: Real>(tile: usize, fict: ArrayView1<'_, T>, mut f: Fields<'_, T>) {
    let (nx, ny) = f.ex.dim();
    for &source in fict {
        for j in 0..ny {
            f.ey[[0, j]] = source;
        }
        for ti in tiles(1..nx, tile) {
            for tj in tiles(0..ny, tile) {
                for i in ti.clone() {
                    for j in tj.clone() {
                        f.ey[[i, j]] = ey_point(&f, i, j);
                    }
                }
            }
        }
        for ti in tiles(0..nx, tile) {
            for tj in tiles(1..ny, tile) {
                for i in ti.clone() {
                    for j in tj.clone() {
                        f.ex[[i, j]] = ex_point(&f, i, j);
                    }
                }
            }
        }
        for ti in tiles(0..nx.saturating_sub(1), tile) {
            for tj in tiles(0..ny.saturating_sub(1), tile) {
                for i in ti.clone() {
                    for j in tj.clone() {
                        f.hz[[i, j]] = hz_point(&f, i, j);
                    }
                }
            }
        }
    }
}

fn parallel<T: Real>(fict: ArrayView1<'_, T>, f: Fields<'_, T>) {
    let Fields {
        mut ex,
        mut ey,
        mut hz,
    } = f;
    let (nx, ny) = ex.dim();
    let half: T = cast(0.5);
    let coeff: T = cast(0.7);
    for &source in fict {
        {
            let hz = hz.view();
            parallel::for_each_lane(ey.view_mut(), Axis(0), |i, mut row| {
                for j in 0..ny {
                    row[j] = if i == 0 {
                        source
                    } else {
                        row[j] - half * (hz[[i, j]] - hz[[i - 1, j]])
                    };
                }
            });
            parallel::for_each_lane(ex.view_mut(), Axis(0), |i, mut row| {
                for j in 1..ny {
                    row[j] = row[j] - half * (hz[[i, j]] - hz[[i, j - 1]]);
                }
            });
        }
        let (ex, ey) = (ex.view(), ey.view());
        parallel::for_each_lane(hz.view_mut(), Axis(0), |i, mut row| {
            if i + 1 >= nx {
                return;
            }
            for j in 0..ny.saturating_sub(1) {
                row[j] = row[j]
                    - coeff * (ex[[i, j + 1]] - ex[[i, j]] + ey[[i + 1, j]] - ey[[i, j]]);
            }
        });
    }
}

pub fn run<T: Real>(
    schedule: Schedule,
    fict: ArrayView1<'_, T>,
    fields: Fields<'_, T>,
) -> Result<(), Error> {
    let (nx, ny) = fields.ex.dim();
    ensure_shape("ey", &fields.ey, &[nx, ny])?;
    ensure_shape("hz", &fields.hz, &[nx, ny])?;
    match schedule {
        Schedule::Reference => reference(fict, fields),
        Schedule::Interchanged => interchanged(fict, fields),
        Schedule::Fused => fused(fict, fields),
        Schedule::Tiled(tile) => tiled(tile, fict, fields),
        Schedule::Parallel => parallel(fict, fields),
        other @ Schedule::Distributed => return Err(crate::unsupported(NAME, other)),
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub fict: Array1<T>,
    pub ex: Array2<T>,
    pub ey: Array2<T>,
    pub hz: Array2<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Fdtd2d<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Fdtd2d<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Fdtd2d<T> {
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
        let Dims { nx, ny, tmax } = self.dims;
        State {
            fict: init.array1(tmax),
            ex: init.array2((nx, ny)),
            ey: init.array2((nx, ny)),
            hz: init.array2((nx, ny)),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            state.fict.view(),
            Fields {
                ex: state.ex.view_mut(),
                ey: state.ey.view_mut(),
                hz: state.hz.view_mut(),
            },
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![
            Output::float("ex", &state.ex),
            Output::float("ey", &state.ey),
            Output::float("hz", &state.hz),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Dims, Fdtd2d, Fields};
    use crate::testing::check_schedules;
    use ndarray::{array, Array2};
    use polyverify::{Error, Schedule};

    #[test]
    fn source_drives_first_row() -> Result<(), Error> {
        let mut ex = Array2::<f64>::zeros((3, 4));
        let mut ey = Array2::<f64>::zeros((3, 4));
        let mut hz = Array2::<f64>::zeros((3, 4));
        run(
            Schedule::Reference,
            array![2.0].view(),
            Fields {
                ex: ex.view_mut(),
                ey: ey.view_mut(),
                hz: hz.view_mut(),
            },
        )?;
        assert!(ey.row(0).iter().all(|&value| value == 2.0));
        assert!(ex.iter().all(|&value| value == 0.0));
        // hz[0][j] -= 0.7 * (ey[1][j] - ey[0][j])
        approx::assert_abs_diff_eq!(hz[[0, 1]], 1.4, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(hz[[1, 1]], 0.0);
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(
            &Fdtd2d::<f64>::new(Dims {
                nx: 13,
                ny: 17,
                tmax: 6,
            }),
            10,
        )?;
        check_schedules(&Fdtd2d::<f32>::default(), 2)?;
        Ok(())
    }
}
