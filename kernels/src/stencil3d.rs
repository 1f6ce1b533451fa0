//! MachSuite 3-D stencil: a 7-point integer stencil over a box.
//!
//! ```text
//! sol = C0 * orig[i][j][k] + C1 * (sum of the six face neighbors)
//! ```
//!
//! Boundary points are copied from `orig` unchanged. Arrays are indexed
//! `[height][col][row]`.
use ndarray::{Array1, Array3, ArrayView1, ArrayView3, ArrayViewMut3, Axis};
use polyverify::{
    parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Schedule, DEFAULT_TILE,
};

pub const NAME: &str = "stencil3d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub height: usize,
    pub cols: usize,
    pub rows: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self {
            height: 16,
            cols: 32,
            rows: 32,
        }
    }
}

#[inline]
fn point(c: &ArrayView1<'_, i64>, orig: &ArrayView3<'_, i64>, [i, j, k]: [usize; 3]) -> i64 {
    let sum0 = orig[[i, j, k]];
    let sum1 = orig[[i + 1, j, k]]
        .wrapping_add(orig[[i - 1, j, k]])
        .wrapping_add(orig[[i, j + 1, k]])
        .wrapping_add(orig[[i, j - 1, k]])
        .wrapping_add(orig[[i, j, k + 1]])
        .wrapping_add(orig[[i, j, k - 1]]);
    sum0.wrapping_mul(c[0]).wrapping_add(sum1.wrapping_mul(c[1]))
}

#[inline]
fn is_boundary(dim: (usize, usize, usize), i: usize, j: usize, k: usize) -> bool {
    let (height, cols, rows) = dim;
    i == 0 || i + 1 == height || j == 0 || j + 1 == cols || k == 0 || k + 1 == rows
}

fn copy_boundary(orig: &ArrayView3<'_, i64>, sol: &mut ArrayViewMut3<'_, i64>) {
    let (height, cols, rows) = orig.dim();
    if height == 0 || cols == 0 || rows == 0 {
        return;
    }
    for j in 0..cols {
        for k in 0..rows {
            sol[[0, j, k]] = orig[[0, j, k]];
            sol[[height - 1, j, k]] = orig[[height - 1, j, k]];
        }
    }
    for i in 1..height.saturating_sub(1) {
        for k in 0..rows {
            sol[[i, 0, k]] = orig[[i, 0, k]];
            sol[[i, cols - 1, k]] = orig[[i, cols - 1, k]];
        }
    }
    for i in 1..height.saturating_sub(1) {
        for j in 1..cols.saturating_sub(1) {
            sol[[i, j, 0]] = orig[[i, j, 0]];
            sol[[i, j, rows - 1]] = orig[[i, j, rows - 1]];
        }
    }
}

pub fn reference(
    c: ArrayView1<'_, i64>,
    orig: ArrayView3<'_, i64>,
    mut sol: ArrayViewMut3<'_, i64>,
) {
    let (height, cols, rows) = orig.dim();
    copy_boundary(&orig, &mut sol);
    for i in 1..height.saturating_sub(1) {
        for j in 1..cols.saturating_sub(1) {
            for k in 1..rows.saturating_sub(1) {
                sol[[i, j, k]] = point(&c, &orig, [i, j, k]);
            }
        }
    }
}

/// Rows outermost, heights innermost.
fn interchanged(
    c: ArrayView1<'_, i64>,
    orig: ArrayView3<'_, i64>,
    mut sol: ArrayViewMut3<'_, i64>,
) {
    let (height, cols, rows) = orig.dim();
    copy_boundary(&orig, &mut sol);
    for k in 1..rows.saturating_sub(1) {
        for j in 1..cols.saturating_sub(1) {
            for i in 1..height.saturating_sub(1) {
                sol[[i, j, k]] = point(&c, &orig, [i, j, k]);
            }
        }
    }
}

/// Boundary copy folded into the sweep over the whole box.
fn fused(
    c: ArrayView1<'_, i64>,
    orig: ArrayView3<'_, i64>,
    mut sol: ArrayViewMut3<'_, i64>,
) {
    let dim = orig.dim();
    let (height, cols, rows) = dim;
    for i in 0..height {
        for j in 0..cols {
            for k in 0..rows {
                sol[[i, j, k]] = if is_boundary(dim, i, j, k) {
                    orig[[i, j, k]]
                } else {
                    point(&c, &orig, [i, j, k])
                };
            }
        }
    }
}

fn tiled(
    tile: usize,
    c: ArrayView1<'_, i64>,
    orig: ArrayView3<'_, i64>,
    mut sol: ArrayViewMut3<'_, i64>,
) {
    let (height, cols, rows) = orig.dim();
    copy_boundary(&orig, &mut sol);
    for tj in tiles(1..cols.saturating_sub(1), tile) {
        for tk in tiles(1..rows.saturating_sub(1), tile) {
            for i in 1..height.saturating_sub(1) {
                for j in tj.clone() {
                    for k in tk.clone() {
                        sol[[i, j, k]] = point(&c, &orig, [i, j, k]);
                    }
                }
            }
        }
    }
}

fn parallel(c: ArrayView1<'_, i64>, orig: ArrayView3<'_, i64>, sol: ArrayViewMut3<'_, i64>) {
    let dim = orig.dim();
    let (_, cols, rows) = dim;
    parallel::for_each_lane(sol, Axis(0), |i, mut plane| {
        for j in 0..cols {
            for k in 0..rows {
                plane[[j, k]] = if is_boundary(dim, i, j, k) {
                    orig[[i, j, k]]
                } else {
                    point(&c, &orig, [i, j, k])
                };
            }
        }
    });
}

pub fn run(
    schedule: Schedule,
    c: ArrayView1<'_, i64>,
    orig: ArrayView3<'_, i64>,
    sol: ArrayViewMut3<'_, i64>,
) -> Result<(), Error> {
    let (height, cols, rows) = orig.dim();
    ensure_shape("C", &c, &[2])?;
    ensure_shape("sol", &sol, &[height, cols, rows])?;
    match schedule {
        Schedule::Reference => reference(c, orig, sol),
        Schedule::Interchanged => interchanged(c, orig, sol),
        Schedule::Fused => fused(c, orig, sol),
        Schedule::Tiled(tile) => tiled(tile, c, orig, sol),
        Schedule::Parallel => parallel(c, orig, sol),
        other @ Schedule::Distributed => return Err(crate::unsupported(NAME, other)),
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State {
    pub c: Array1<i64>,
    pub orig: Array3<i64>,
    pub sol: Array3<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct Stencil3d {
    pub dims: Dims,
}

impl Stencil3d {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self { dims }
    }
}

impl Kernel for Stencil3d {
    type State = State;

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

    fn scales(&self) -> &'static [f64] {
        &[1.0]
    }

    fn init(&self, init: &mut Init) -> State {
        let Dims { height, cols, rows } = self.dims;
        let shape = (height, cols, rows);
        let c = init.int_array3((1, 1, 2), -100, 101);
        State {
            c: c.into_iter().collect(),
            orig: init.int_array3(shape, -1000, 1001),
            sol: init.int_array3(shape, -1000, 1001),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State) -> Result<(), Error> {
        run(
            schedule,
            state.c.view(),
            state.orig.view(),
            state.sol.view_mut(),
        )
    }

    fn outputs(&self, state: &State) -> Vec<Output> {
        vec![Output::exact("sol", &state.sol)]
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Dims, Stencil3d};
    use crate::testing::check_schedules;
    use ndarray::{array, Array3};
    use polyverify::{Error, Init, Schedule};

    #[test]
    fn laplacian_of_linear_field_vanishes() -> Result<(), Error> {
        let orig = Array3::from_shape_fn((4, 5, 6), |(i, j, k)| (i + 2 * j + 3 * k) as i64);
        let mut sol = Array3::<i64>::zeros((4, 5, 6));
        // C0 = -6, C1 = 1 is the discrete laplacian
        let c = array![-6, 1];
        run(Schedule::Reference, c.view(), orig.view(), sol.view_mut())?;
        assert_eq!(sol[[1, 2, 3]], 0);
        assert_eq!(sol[[2, 3, 4]], 0);
        assert_eq!(sol[[0, 2, 3]], orig[[0, 2, 3]]);
        assert_eq!(sol[[3, 4, 5]], orig[[3, 4, 5]]);
        Ok(())
    }

    #[test]
    fn boundary_is_copied() -> Result<(), Error> {
        let orig = Init::new(9).int_array3((5, 5, 5), -1000, 1001);
        let mut sol = Array3::<i64>::zeros((5, 5, 5));
        let c = array![2, 3];
        run(Schedule::Parallel, c.view(), orig.view(), sol.view_mut())?;
        for ((i, j, k), value) in sol.indexed_iter() {
            if [i, j, k].iter().any(|&x| x == 0 || x == 4) {
                assert_eq!(*value, orig[[i, j, k]], "at {:?}", (i, j, k));
            }
        }
        Ok(())
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(
            &Stencil3d::new(Dims {
                height: 7,
                cols: 19,
                rows: 21,
            }),
            5,
        )?;
        check_schedules(&Stencil3d::default(), 2)?;
        Ok(())
    }
}
