//! MachSuite 2-D stencil: a 3x3 integer filter over an image.
//!
//! ```text
//! sol[r][c] = sum_{k1, k2} filter[k1][k2] * orig[r + k1][c + k2]
//! ```
//!
//! Only the `(rows - 2) x (cols - 2)` leading block of `sol` is written.
//! Arithmetic wraps on overflow, so every summation order is exact.
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis};
use polyverify::{
    parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Schedule, DEFAULT_TILE,
};

pub const NAME: &str = "stencil2d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub rows: usize,
    pub cols: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self { rows: 128, cols: 64 }
    }
}

#[inline]
fn point(orig: &ArrayView2<'_, i32>, filter: &ArrayView2<'_, i32>, r: usize, c: usize) -> i32 {
    let mut temp = 0i32;
    for k1 in 0..3 {
        for k2 in 0..3 {
            let mul = filter[[k1, k2]].wrapping_mul(orig[[r + k1, c + k2]]);
            temp = temp.wrapping_add(mul);
        }
    }
    temp
}

pub fn reference(
    orig: ArrayView2<'_, i32>,
    filter: ArrayView2<'_, i32>,
    mut sol: ArrayViewMut2<'_, i32>,
) {
    let (rows, cols) = orig.dim();
    for r in 0..rows.saturating_sub(2) {
        for c in 0..cols.saturating_sub(2) {
            sol[[r, c]] = point(&orig, &filter, r, c);
        }
    }
}

fn interchanged(
    orig: ArrayView2<'_, i32>,
    filter: ArrayView2<'_, i32>,
    mut sol: ArrayViewMut2<'_, i32>,
) {
    let (rows, cols) = orig.dim();
    for c in 0..cols.saturating_sub(2) {
        for r in 0..rows.saturating_sub(2) {
            sol[[r, c]] = point(&orig, &filter, r, c);
        }
    }
}

fn tiled(
    tile: usize,
    orig: ArrayView2<'_, i32>,
    filter: ArrayView2<'_, i32>,
    mut sol: ArrayViewMut2<'_, i32>,
) {
    let (rows, cols) = orig.dim();
    for tr in tiles(0..rows.saturating_sub(2), tile) {
        for tc in tiles(0..cols.saturating_sub(2), tile) {
            for r in tr.clone() {
                for c in tc.clone() {
                    sol[[r, c]] = point(&orig, &filter, r, c);
                }
            }
        }
    }
}

fn parallel(orig: ArrayView2<'_, i32>, filter: ArrayView2<'_, i32>, sol: ArrayViewMut2<'_, i32>) {
    let (rows, cols) = orig.dim();
    parallel::for_each_lane(sol, Axis(0), |r, mut row| {
        if r + 2 >= rows {
            return;
        }
        for c in 0..cols.saturating_sub(2) {
            row[c] = point(&orig, &filter, r, c);
        }
    });
}

pub fn run(
    schedule: Schedule,
    orig: ArrayView2<'_, i32>,
    filter: ArrayView2<'_, i32>,
    sol: ArrayViewMut2<'_, i32>,
) -> Result<(), Error> {
    let (rows, cols) = orig.dim();
    ensure_shape("filter", &filter, &[3, 3])?;
    ensure_shape("sol", &sol, &[rows, cols])?;
    match schedule {
        Schedule::Reference => reference(orig, filter, sol),
        Schedule::Interchanged => interchanged(orig, filter, sol),
        Schedule::Tiled(tile) => tiled(tile, orig, filter, sol),
        Schedule::Parallel => parallel(orig, filter, sol),
        other @ (Schedule::Fused | Schedule::Distributed) => {
            return Err(crate::unsupported(NAME, other))
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State {
    pub orig: Array2<i32>,
    pub filter: Array2<i32>,
    pub sol: Array2<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct Stencil2d {
    pub dims: Dims,
}

impl Stencil2d {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self { dims }
    }
}

impl Kernel for Stencil2d {
    type State = State;

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

    fn scales(&self) -> &'static [f64] {
        &[1.0]
    }

    fn init(&self, init: &mut Init) -> State {
        let Dims { rows, cols } = self.dims;
        State {
            orig: init.int_array2((rows, cols), -100, 101),
            filter: init.int_array2((3, 3), -100, 101),
            sol: init.int_array2((rows, cols), -100, 101),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State) -> Result<(), Error> {
        run(
            schedule,
            state.orig.view(),
            state.filter.view(),
            state.sol.view_mut(),
        )
    }

    fn outputs(&self, state: &State) -> Vec<Output> {
        vec![Output::exact("sol", &state.sol)]
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Dims, Stencil2d};
    use crate::testing::check_schedules;
    use ndarray::{s, Array2};
    use polyverify::{Error, Init, Schedule};

    #[test]
    fn identity_filter_shifts_the_image() -> Result<(), Error> {
        let orig = Init::new(12).int_array2((4, 4), -100, 101);
        let mut filter = Array2::<i32>::zeros((3, 3));
        filter[[1, 1]] = 1;
        let mut sol = Array2::<i32>::from_elem((4, 4), 7);
        run(Schedule::Reference, orig.view(), filter.view(), sol.view_mut())?;
        assert_eq!(sol.slice(s![..2, ..2]), orig.slice(s![1..3, 1..3]));
        // the last two rows and columns are left alone
        assert!(sol.slice(s![2.., ..]).iter().all(|&v| v == 7));
        assert!(sol.slice(s![.., 2..]).iter().all(|&v| v == 7));
        Ok(())
    }

    #[test]
    fn box_filter_sums_the_neighborhood() -> Result<(), Error> {
        let orig = Array2::from_shape_fn((3, 3), |(r, c)| (3 * r + c) as i32);
        let filter = Array2::<i32>::ones((3, 3));
        let mut sol = Array2::<i32>::zeros((3, 3));
        run(Schedule::Parallel, orig.view(), filter.view(), sol.view_mut())?;
        assert_eq!(sol[[0, 0]], 36);
        Ok(())
    }

    #[test]
    fn filter_must_be_three_by_three() {
        let orig = Array2::<i32>::zeros((4, 4));
        let mut sol = orig.clone();
        let filter = Array2::<i32>::zeros((2, 2));
        assert!(matches!(
            run(Schedule::Reference, orig.view(), filter.view(), sol.view_mut()),
            Err(Error::Shape { .. })
        ));
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(&Stencil2d::new(Dims { rows: 19, cols: 23 }), 5)?;
        check_schedules(&Stencil2d::default(), 2)?;
        Ok(())
    }
}
