//! In-place 9-point Gauss-Seidel sweeps.
//!
//! Every update reads the already updated north-west, north, north-east and
//! west neighbors, so only orders that respect these dependences are offered.
//! Points on the same anti-diagonal `2i + j` are independent of each other,
//! which makes the wavefront order parallel without changing any value.
use ndarray::{Array2, ArrayBase, ArrayViewMut2, Data, Ix2};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "seidel-2d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub n: usize,
    pub tsteps: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self { n: 120, tsteps: 40 }
    }
}

#[inline]
fn point<T, S>(a: &ArrayBase<S, Ix2>, i: usize, j: usize) -> T
where
    T: Real,
    S: Data<Elem = T>,
{
    (a[[i - 1, j - 1]]
        + a[[i - 1, j]]
        + a[[i - 1, j + 1]]
        + a[[i, j - 1]]
        + a[[i, j]]
        + a[[i, j + 1]]
        + a[[i + 1, j - 1]]
        + a[[i + 1, j]]
        + a[[i + 1, j + 1]])
        / cast(9.0)
}

pub fn reference<T: Real>(tsteps: usize, mut a: ArrayViewMut2<'_, T>) {
    let n = a.nrows();
    for _ in 0..tsteps {
        for i in 1..n.saturating_sub(1) {
            for j in 1..n - 1 {
                a[[i, j]] = point(&a, i, j);
            }
        }
    }
}

/// Rows strip-mined, each row swept tile by tile from west to east.
fn tiled<T: Real>(tile: usize, tsteps: usize, mut a: ArrayViewMut2<'_, T>) {
    let n = a.nrows();
    if n < 3 {
        return;
    }
    for _ in 0..tsteps {
        for ti in tiles(1..n - 1, tile) {
            for i in ti {
                for tj in tiles(1..n - 1, tile) {
                    for j in tj {
                        a[[i, j]] = point(&a, i, j);
                    }
                }
            }
        }
    }
}

/// Anti-diagonal wavefronts, each computed in parallel and then written back.
fn wavefront<T: Real>(tsteps: usize, mut a: ArrayViewMut2<'_, T>) {
    let n = a.nrows();
    if n < 3 {
        return;
    }
    let last = n - 2;
    for _ in 0..tsteps {
        for w in 3..=3 * last {
            let rows: Vec<usize> = (1..=last)
                .filter(|&i| w > 2 * i && w - 2 * i <= last)
                .collect();
            let view = a.view();
            let values =
                parallel::map_range(rows.len(), |r| point(&view, rows[r], w - 2 * rows[r]));
            for (&i, value) in rows.iter().zip(values) {
                a[[i, w - 2 * i]] = value;
            }
        }
    }
}

pub fn run<T: Real>(
    schedule: Schedule,
    tsteps: usize,
    a: ArrayViewMut2<'_, T>,
) -> Result<(), Error> {
    let n = a.nrows();
    ensure_shape("A", &a, &[n, n])?;
    match schedule {
        Schedule::Reference => reference(tsteps, a),
        Schedule::Tiled(tile) => tiled(tile, tsteps, a),
        Schedule::Parallel => wavefront(tsteps, a),
        other @ (Schedule::Interchanged | Schedule::Distributed | Schedule::Fused) => {
            return Err(crate::unsupported(NAME, other))
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub a: Array2<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Seidel2d<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Seidel2d<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Seidel2d<T> {
    type State = State<T>;

    fn name(&self) -> &'static str {
        NAME
    }

    fn schedules(&self) -> Vec<Schedule> {
        vec![
            Schedule::Reference,
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
            a: init.array2((n, n)),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(schedule, self.dims.tsteps, state.a.view_mut())
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![Output::float("A", &state.a)]
    }
}
