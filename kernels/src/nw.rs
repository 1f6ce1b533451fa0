//! Needleman-Wunsch global sequence alignment.
//!
//! Scores a match with `+1` and both mismatches and gaps with `-1`. The score
//! matrix `M` has one row per prefix of `seq_b` and one column per prefix of
//! `seq_a`. The traceback emits both aligned sequences backwards, padded with
//! `_` to `alen + blen` bytes.
use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use polyverify::{
    parallel, shape::ensure_len, shape::ensure_shape, tiles, Error, Init, Kernel, Output,
    Schedule, DEFAULT_TILE,
};
use rand::seq::SliceRandom;

pub const NAME: &str = "nw";

pub const MATCH_SCORE: i32 = 1;
pub const MISMATCH_SCORE: i32 = -1;
pub const GAP_SCORE: i32 = -1;

pub const ALIGN: u8 = b'\\';
/// Consumes a character of `seq_a` only.
pub const SKIP_B: u8 = b'<';
/// Consumes a character of `seq_b` only.
pub const SKIP_A: u8 = b'^';
pub const PAD: u8 = b'_';
pub const GAP: u8 = b'-';

const ALPHABET: &[u8] = b"ACGT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub alen: usize,
    pub blen: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self {
            alen: 128,
            blen: 128,
        }
    }
}

pub struct Alignment<'a> {
    pub aligned_a: &'a mut [u8],
    pub aligned_b: &'a mut [u8],
}

/// Score and pointer of cell `(b, a)`.
#[inline]
fn cell(seq_a: &[u8], seq_b: &[u8], m: &ArrayView2<'_, i32>, b: usize, a: usize) -> (i32, u8) {
    let score = if seq_a[a - 1] == seq_b[b - 1] {
        MATCH_SCORE
    } else {
        MISMATCH_SCORE
    };
    let up_left = m[[b - 1, a - 1]] + score;
    let up = m[[b - 1, a]] + GAP_SCORE;
    let left = m[[b, a - 1]] + GAP_SCORE;
    let max = up_left.max(up.max(left));
    let ptr = if max == left {
        SKIP_B
    } else if max == up {
        SKIP_A
    } else {
        ALIGN
    };
    (max, ptr)
}

fn init_borders(m: &mut ArrayViewMut2<'_, i32>, ptr: &mut ArrayViewMut2<'_, u8>) {
    let (rows, cols) = m.dim();
    for a in 0..cols {
        m[[0, a]] = a as i32 * GAP_SCORE;
        ptr[[0, a]] = SKIP_B;
    }
    for b in 0..rows {
        m[[b, 0]] = b as i32 * GAP_SCORE;
        ptr[[b, 0]] = SKIP_A;
    }
    if rows > 0 && cols > 0 {
        ptr[[0, 0]] = ALIGN;
    }
}

fn fill_reference(
    seq_a: &[u8],
    seq_b: &[u8],
    mut m: ArrayViewMut2<'_, i32>,
    mut ptr: ArrayViewMut2<'_, u8>,
) {
    for b in 1..=seq_b.len() {
        for a in 1..=seq_a.len() {
            let (score, dir) = cell(seq_a, seq_b, &m.view(), b, a);
            m[[b, a]] = score;
            ptr[[b, a]] = dir;
        }
    }
}

/// Column by column.
fn fill_interchanged(
    seq_a: &[u8],
    seq_b: &[u8],
    mut m: ArrayViewMut2<'_, i32>,
    mut ptr: ArrayViewMut2<'_, u8>,
) {
    for a in 1..=seq_a.len() {
        for b in 1..=seq_b.len() {
            let (score, dir) = cell(seq_a, seq_b, &m.view(), b, a);
            m[[b, a]] = score;
            ptr[[b, a]] = dir;
        }
    }
}

/// Tiles in row-major order, so the tiles above and to the left are complete.
fn fill_tiled(
    tile: usize,
    seq_a: &[u8],
    seq_b: &[u8],
    mut m: ArrayViewMut2<'_, i32>,
    mut ptr: ArrayViewMut2<'_, u8>,
) {
    for tb in tiles(1..seq_b.len() + 1, tile) {
        for ta in tiles(1..seq_a.len() + 1, tile) {
            for b in tb.clone() {
                for a in ta.clone() {
                    let (score, dir) = cell(seq_a, seq_b, &m.view(), b, a);
                    m[[b, a]] = score;
                    ptr[[b, a]] = dir;
                }
            }
        }
    }
}

/// Anti-diagonal wavefront: the cells with `a + b == d` only depend on the
/// two previous diagonals.
fn fill_parallel(
    seq_a: &[u8],
    seq_b: &[u8],
    mut m: ArrayViewMut2<'_, i32>,
    mut ptr: ArrayViewMut2<'_, u8>,
) {
    let (alen, blen) = (seq_a.len(), seq_b.len());
    for d in 2..=alen + blen {
        let first = d.saturating_sub(alen).max(1);
        let last = blen.min(d - 1);
        if first > last {
            continue;
        }
        let view = m.view();
        let cells = parallel::map_range(last - first + 1, |t| {
            let b = first + t;
            cell(seq_a, seq_b, &view, b, d - b)
        });
        for (t, (score, dir)) in cells.into_iter().enumerate() {
            let b = first + t;
            m[[b, d - b]] = score;
            ptr[[b, d - b]] = dir;
        }
    }
}

/// Follows the pointers from the bottom right corner back to the origin.
pub fn traceback(seq_a: &[u8], seq_b: &[u8], ptr: &ArrayView2<'_, u8>, out: Alignment<'_>) {
    let Alignment {
        aligned_a,
        aligned_b,
    } = out;
    let (mut a, mut b) = (seq_a.len(), seq_b.len());
    let (mut a_str, mut b_str) = (0, 0);
    while a > 0 || b > 0 {
        match ptr[[b, a]] {
            ALIGN => {
                aligned_a[a_str] = seq_a[a - 1];
                aligned_b[b_str] = seq_b[b - 1];
                a -= 1;
                b -= 1;
            }
            SKIP_B => {
                aligned_a[a_str] = seq_a[a - 1];
                aligned_b[b_str] = GAP;
                a -= 1;
            }
            _ => {
                aligned_a[a_str] = GAP;
                aligned_b[b_str] = seq_b[b - 1];
                b -= 1;
            }
        }
        a_str += 1;
        b_str += 1;
    }
    aligned_a[a_str..].fill(PAD);
    aligned_b[b_str..].fill(PAD);
}

pub fn reference(
    seq_a: &[u8],
    seq_b: &[u8],
    m: ArrayViewMut2<'_, i32>,
    ptr: ArrayViewMut2<'_, u8>,
    out: Alignment<'_>,
) -> Result<(), Error> {
    run(Schedule::Reference, seq_a, seq_b, m, ptr, out)
}

pub fn run(
    schedule: Schedule,
    seq_a: &[u8],
    seq_b: &[u8],
    mut m: ArrayViewMut2<'_, i32>,
    mut ptr: ArrayViewMut2<'_, u8>,
    out: Alignment<'_>,
) -> Result<(), Error> {
    let (alen, blen) = (seq_a.len(), seq_b.len());
    ensure_shape("M", &m, &[blen + 1, alen + 1])?;
    ensure_shape("ptr", &ptr, &[blen + 1, alen + 1])?;
    ensure_len("alignedA", out.aligned_a, alen + blen)?;
    ensure_len("alignedB", out.aligned_b, alen + blen)?;
    if !matches!(
        schedule,
        Schedule::Reference | Schedule::Interchanged | Schedule::Tiled(_) | Schedule::Parallel
    ) {
        return Err(crate::unsupported(NAME, schedule));
    }
    init_borders(&mut m, &mut ptr);
    match schedule {
        Schedule::Interchanged => fill_interchanged(seq_a, seq_b, m, ptr.view_mut()),
        Schedule::Tiled(tile) => fill_tiled(tile, seq_a, seq_b, m, ptr.view_mut()),
        Schedule::Parallel => fill_parallel(seq_a, seq_b, m, ptr.view_mut()),
        _ => fill_reference(seq_a, seq_b, m, ptr.view_mut()),
    }
    traceback(seq_a, seq_b, &ptr.view(), out);
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State {
    pub seq_a: Vec<u8>,
    pub seq_b: Vec<u8>,
    pub m: Array2<i32>,
    pub ptr: Array2<u8>,
    pub aligned_a: Vec<u8>,
    pub aligned_b: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct Nw {
    pub dims: Dims,
}

impl Nw {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self { dims }
    }
}

fn random_sequence(init: &mut Init, len: usize) -> Vec<u8> {
    (0..len)
        .map(|_| ALPHABET.choose(init.rng()).copied().unwrap_or(b'A'))
        .collect()
}

impl Kernel for Nw {
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
        let Dims { alen, blen } = self.dims;
        let seq_a = random_sequence(init, alen);
        let seq_b = random_sequence(init, blen);
        let garbage = init.int_array2((blen + 1, alen + 1), -1000, 1000);
        State {
            seq_a,
            seq_b,
            ptr: garbage.mapv(|v| v.to_le_bytes()[0]),
            m: garbage,
            aligned_a: vec![0; alen + blen],
            aligned_b: vec![0; alen + blen],
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State) -> Result<(), Error> {
        run(
            schedule,
            &state.seq_a,
            &state.seq_b,
            state.m.view_mut(),
            state.ptr.view_mut(),
            Alignment {
                aligned_a: &mut state.aligned_a,
                aligned_b: &mut state.aligned_b,
            },
        )
    }

    fn outputs(&self, state: &State) -> Vec<Output> {
        vec![
            Output::exact("M", &state.m),
            Output::exact("ptr", &state.ptr),
            Output::bytes("alignedA", &state.aligned_a),
            Output::bytes("alignedB", &state.aligned_b),
        ]
    }
}
