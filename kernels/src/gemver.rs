//! Vector multiplication and matrix addition.
//!
//! ```text
//! A  = A + u1 v1^T + u2 v2^T
//! x  = x + beta * A^T y + z
//! w  = w + alpha * A x
//! ```
//!
//! The rank update must finish before `x` is reduced over the columns of `A`,
//! and `x` must be complete before `w` reads it.
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, ArrayViewMut2, Axis};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "gemver";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub n: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self { n: 120 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Vectors<'a, T> {
    pub u1: ArrayView1<'a, T>,
    pub v1: ArrayView1<'a, T>,
    pub u2: ArrayView1<'a, T>,
    pub v2: ArrayView1<'a, T>,
    pub y: ArrayView1<'a, T>,
    pub z: ArrayView1<'a, T>,
}

pub fn reference<T: Real>(
    alpha: T,
    beta: T,
    v: &Vectors<'_, T>,
    mut a: ArrayViewMut2<'_, T>,
    mut x: ArrayViewMut1<'_, T>,
    mut w: ArrayViewMut1<'_, T>,
) {
    let n = v.y.len();
    for i in 0..n {
        for j in 0..n {
            a[[i, j]] = a[[i, j]] + v.u1[i] * v.v1[j] + v.u2[i] * v.v2[j];
        }
    }
    for i in 0..n {
        for j in 0..n {
            x[i] = x[i] + beta * a[[j, i]] * v.y[j];
        }
    }
    for i in 0..n {
        x[i] = x[i] + v.z[i];
    }
    for i in 0..n {
        for j in 0..n {
            w[i] = w[i] + alpha * a[[i, j]] * x[j];
        }
    }
}

/// Column-major rank update and row-major traversal of the transposed product.
fn interchanged<T: Real>(
    alpha: T,
    beta: T,
    v: &Vectors<'_, T>,
    mut a: ArrayViewMut2<'_, T>,
    mut x: ArrayViewMut1<'_, T>,
    mut w: ArrayViewMut1<'_, T>,
) {
    let n = v.y.len();
    for j in 0..n {
        for i in 0..n {
            a[[i, j]] = a[[i, j]] + v.u1[i] * v.v1[j] + v.u2[i] * v.v2[j];
        }
    }
    for j in 0..n {
        for i in 0..n {
            x[i] = x[i] + beta * a[[j, i]] * v.y[j];
        }
    }
    for i in 0..n {
        x[i] = x[i] + v.z[i];
    }
    for i in 0..n {
        for j in 0..n {
            w[i] = w[i] + alpha * a[[i, j]] * x[j];
        }
    }
}

/// Adds `z` right after each `x[i]` is reduced.
fn fused<T: Real>(
    alpha: T,
    beta: T,
    v: &Vectors<'_, T>,
    mut a: ArrayViewMut2<'_, T>,
    mut x: ArrayViewMut1<'_, T>,
    mut w: ArrayViewMut1<'_, T>,
) {
    let n = v.y.len();
    for i in 0..n {
        for j in 0..n {
            a[[i, j]] = a[[i, j]] + v.u1[i] * v.v1[j] + v.u2[i] * v.v2[j];
        }
    }
    for i in 0..n {
        for j in 0..n {
            x[i] = x[i] + beta * a[[j, i]] * v.y[j];
        }
        x[i] = x[i] + v.z[i];
    }
    for i in 0..n {
        for j in 0..n {
            w[i] = w[i] + alpha * a[[i, j]] * x[j];
        }
    }
}

fn tiled<T: Real>(
    tile: usize,
    alpha: T,
    beta: T,
    v: &Vectors<'_, T>,
    mut a: ArrayViewMut2<'_, T>,
    mut x: ArrayViewMut1<'_, T>,
    mut w: ArrayViewMut1<'_, T>,
) {
    let n = v.y.len();
    for ti in tiles(0..n, tile) {
        for tj in tiles(0..n, tile) {
            for i in ti.clone() {
                for j in tj.clone() {
                    a[[i, j]] = a[[i, j]] + v.u1[i] * v.v1[j] + v.u2[i] * v.v2[j];
                }
            }
        }
    }
    for ti in tiles(0..n, tile) {
        for tj in tiles(0..n, tile) {
            for i in ti.clone() {
                for j in tj.clone() {
                    x[i] = x[i] + beta * a[[j, i]] * v.y[j];
                }
            }
        }
    }
    for i in 0..n {
        x[i] = x[i] + v.z[i];
    }
    for ti in tiles(0..n, tile) {
        for tj in tiles(0..n, tile) {
            for i in ti.clone() {
                for j in tj.clone() {
                    w[i] = w[i] + alpha * a[[i, j]] * x[j];
                }
            }
        }
    }
}

fn parallel<T: Real>(
    alpha: T,
    beta: T,
    v: &Vectors<'_, T>,
    mut a: ArrayViewMut2<'_, T>,
    mut x: ArrayViewMut1<'_, T>,
    mut w: ArrayViewMut1<'_, T>,
) {
    let Vectors {
        u1,
        v1,
        u2,
        v2,
        y,
        z,
    } = *v;
    parallel::for_each_lane(a.view_mut(), Axis(0), |i, mut row| {
        for (j, value) in row.iter_mut().enumerate() {
            *value = *value + u1[i] * v1[j] + u2[i] * v2[j];
        }
    });
    let a = a.view();
    let x_old = x.to_owned();
    parallel::fill_indexed(x.view_mut(), |i| {
        x_old[i] + beta * a.column(i).dot(&y) + z[i]
    });
    let x = x.view();
    let w_old = w.to_owned();
    parallel::fill_indexed(w.view_mut(), |i| w_old[i] + alpha * a.row(i).dot(&x));
}

pub fn run<T: Real>(
    schedule: Schedule,
    alpha: T,
    beta: T,
    v: &Vectors<'_, T>,
    a: ArrayViewMut2<'_, T>,
    x: ArrayViewMut1<'_, T>,
    w: ArrayViewMut1<'_, T>,
) -> Result<(), Error> {
    let n = v.y.len();
    for (name, vector) in [
        ("u1", &v.u1),
        ("v1", &v.v1),
        ("u2", &v.u2),
        ("v2", &v.v2),
        ("z", &v.z),
    ] {
        ensure_shape(name, vector, &[n])?;
    }
    ensure_shape("A", &a, &[n, n])?;
    ensure_shape("x", &x, &[n])?;
    ensure_shape("w", &w, &[n])?;
    match schedule {
        Schedule::Reference => reference(alpha, beta, v, a, x, w),
        Schedule::Interchanged => interchanged(alpha, beta, v, a, x, w),
        Schedule::Fused => fused(alpha, beta, v, a, x, w),
        Schedule::Tiled(tile) => tiled(tile, alpha, beta, v, a, x, w),
        Schedule::Parallel => parallel(alpha, beta, v, a, x, w),
        other @ Schedule::Distributed => return Err(crate::unsupported(NAME, other)),
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub alpha: T,
    pub beta: T,
    pub u1: Array1<T>,
    pub v1: Array1<T>,
    pub u2: Array1<T>,
    pub v2: Array1<T>,
    pub y: Array1<T>,
    pub z: Array1<T>,
    pub a: Array2<T>,
    pub x: Array1<T>,
    pub w: Array1<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Gemver<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Gemver<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Gemver<T> {
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
        let n = self.dims.n;
        State {
            alpha: cast(1.5),
            beta: cast(1.2),
            u1: init.array1(n),
            v1: init.array1(n),
            u2: init.array1(n),
            v2: init.array1(n),
            y: init.array1(n),
            z: init.array1(n),
            a: init.array2((n, n)),
            x: init.array1(n),
            w: init.array1(n),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        let vectors = Vectors {
            u1: state.u1.view(),
            v1: state.v1.view(),
            u2: state.u2.view(),
            v2: state.v2.view(),
            y: state.y.view(),
            z: state.z.view(),
        };
        run(
            schedule,
            state.alpha,
            state.beta,
            &vectors,
            state.a.view_mut(),
            state.x.view_mut(),
            state.w.view_mut(),
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![
            Output::float("A", &state.a),
            Output::float("x", &state.x),
            Output::float("w", &state.w),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Dims, Gemver, Vectors};
    use crate::testing::check_schedules;
    use ndarray::{array, Array1, Array2};
    use polyverify::{Error, Schedule};

    #[test]
    fn rank_one_update() -> Result<(), Error> {
        let ones = Array1::<f64>::ones(2);
        let zeros = Array1::<f64>::zeros(2);
        let vectors = Vectors {
            u1: ones.view(),
            v1: ones.view(),
            u2: zeros.view(),
            v2: zeros.view(),
            y: ones.view(),
            z: ones.view(),
        };
        let mut a = Array2::<f64>::zeros((2, 2));
        let mut x = Array1::<f64>::zeros(2);
        let mut w = Array1::<f64>::zeros(2);
        run(
            Schedule::Reference,
            1.0,
            1.0,
            &vectors,
            a.view_mut(),
            x.view_mut(),
            w.view_mut(),
        )?;
        approx::assert_abs_diff_eq!(a, Array2::ones((2, 2)));
        // x = A^T 1 + 1 = 3, w = A x = 6
        approx::assert_abs_diff_eq!(x, array![3.0, 3.0]);
        approx::assert_abs_diff_eq!(w, array![6.0, 6.0]);
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(&Gemver::<f64>::new(Dims { n: 37 }), 10)?;
        check_schedules(&Gemver::<f32>::default(), 3)?;
        Ok(())
    }
}
