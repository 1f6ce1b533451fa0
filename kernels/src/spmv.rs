//! Sparse matrix times dense vector in the CRS and ELLPACK formats.
//!
//! CRS stores the nonzeros row by row with `row_delimiters[i]..row_delimiters[i + 1]`
//! selecting the entries of row `i`. ELLPACK stores a fixed number of entries
//! per row, padded with explicit zeros.
//!
//! The CRS kernel overwrites `out`, the ELLPACK kernel accumulates into it.
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1};
use polyverify::{
    error::SparseError, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real,
    Schedule, Tolerance, DEFAULT_TILE,
};
use rand::seq::index::sample;
use rand::Rng;
use std::marker::PhantomData;

pub const CRS: &str = "spmv-crs";
pub const ELLPACK: &str = "spmv-ellpack";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub rows: usize,
    /// Maximum number of nonzeros per row, which is also the ELLPACK width.
    pub width: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self {
            rows: 494,
            width: 10,
        }
    }
}

/// Compressed row storage.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<T> {
    values: Array1<T>,
    cols: Vec<usize>,
    row_delimiters: Vec<usize>,
    num_cols: usize,
}

impl<T: Real> CsrMatrix<T> {
    /// Validates the three CRS arrays.
    ///
    /// An empty delimiter list is treated as `[0]`, a matrix without rows.
    pub fn new(
        values: Array1<T>,
        cols: Vec<usize>,
        row_delimiters: Vec<usize>,
        num_cols: usize,
    ) -> Result<Self, SparseError> {
        let nnz = values.len();
        if cols.len() != nnz {
            return Err(SparseError::Length {
                values: nnz,
                cols: cols.len(),
            });
        }
        let row_delimiters = if row_delimiters.is_empty() {
            vec![0]
        } else {
            row_delimiters
        };
        if row_delimiters[0] != 0 {
            return Err(SparseError::FirstDelimiter(row_delimiters[0]));
        }
        for (row, window) in row_delimiters.windows(2).enumerate() {
            if window[0] > window[1] {
                return Err(SparseError::Decreasing {
                    row,
                    start: window[0],
                    end: window[1],
                });
            }
        }
        let last = row_delimiters[row_delimiters.len() - 1];
        if last != nnz {
            return Err(SparseError::LastDelimiter { nnz, found: last });
        }
        if let Some((position, &col)) = cols.iter().enumerate().find(|(_, c)| **c >= num_cols) {
            return Err(SparseError::Column {
                position,
                col,
                num_cols,
            });
        }
        Ok(Self {
            values,
            cols,
            row_delimiters,
            num_cols,
        })
    }

    /// Random matrix with up to `width` distinct sorted columns per row.
    pub fn random(init: &mut Init, rows: usize, num_cols: usize, width: usize) -> Self {
        let mut cols = Vec::new();
        let mut row_delimiters = Vec::with_capacity(rows + 1);
        row_delimiters.push(0);
        for _ in 0..rows {
            let len = init.rng().gen_range(0..=width.min(num_cols));
            let mut row = sample(init.rng(), num_cols, len).into_vec();
            row.sort_unstable();
            cols.extend(row);
            row_delimiters.push(cols.len());
        }
        let values = init.array1(cols.len());
        Self {
            values,
            cols,
            row_delimiters,
            num_cols,
        }
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.row_delimiters.len() - 1
    }

    #[must_use]
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    #[must_use]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn row_range(&self, row: usize) -> std::ops::Range<usize> {
        self.row_delimiters[row]..self.row_delimiters[row + 1]
    }

    #[inline]
    fn row_dot(&self, row: usize, vec: &ArrayView1<'_, T>) -> T {
        let mut sum = T::zero();
        for k in self.row_range(row) {
            sum += self.values[k] * vec[self.cols[k]];
        }
        sum
    }
}

/// Fixed width row storage. Padding entries have value zero and column zero.
#[derive(Debug, Clone, PartialEq)]
pub struct EllpackMatrix<T> {
    nzval: Array2<T>,
    cols: Array2<usize>,
    num_cols: usize,
}

impl<T: Real> EllpackMatrix<T> {
    pub fn new(nzval: Array2<T>, cols: Array2<usize>, num_cols: usize) -> Result<Self, Error> {
        ensure_shape("cols", &cols, nzval.shape())?;
        if let Some((position, &col)) = cols.iter().enumerate().find(|(_, c)| **c >= num_cols) {
            return Err(SparseError::Column {
                position,
                col,
                num_cols,
            }
            .into());
        }
        Ok(Self {
            nzval,
            cols,
            num_cols,
        })
    }

    pub fn from_csr(csr: &CsrMatrix<T>, width: usize) -> Result<Self, SparseError> {
        for row in 0..csr.num_rows() {
            let len = csr.row_range(row).len();
            if len > width {
                return Err(SparseError::RowTooLong { row, len, width });
            }
        }
        if csr.num_cols == 0 && csr.num_rows() * width > 0 {
            // padding entries point at column zero
            return Err(SparseError::Column {
                position: 0,
                col: 0,
                num_cols: 0,
            });
        }
        Ok(Self::padded(csr, width))
    }

    /// Caller guarantees no row is longer than `width`.
    fn padded(csr: &CsrMatrix<T>, width: usize) -> Self {
        let rows = csr.num_rows();
        let mut nzval = Array2::zeros((rows, width));
        let mut cols = Array2::zeros((rows, width));
        for row in 0..rows {
            for (slot, k) in csr.row_range(row).enumerate() {
                nzval[[row, slot]] = csr.values[k];
                cols[[row, slot]] = csr.cols[k];
            }
        }
        Self {
            nzval,
            cols,
            num_cols: csr.num_cols,
        }
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.nzval.nrows()
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.nzval.ncols()
    }

    #[inline]
    fn row_dot(&self, row: usize, init: T, vec: &ArrayView1<'_, T>) -> T {
        let mut sum = init;
        for j in 0..self.width() {
            sum += self.nzval[[row, j]] * vec[self.cols[[row, j]]];
        }
        sum
    }
}

pub fn crs_reference<T: Real>(
    matrix: &CsrMatrix<T>,
    vec: ArrayView1<'_, T>,
    mut out: ArrayViewMut1<'_, T>,
) {
    for i in 0..matrix.num_rows() {
        out[i] = matrix.row_dot(i, &vec);
    }
}

/// Zeroes a scratch accumulator, accumulates, then copies it out.
fn crs_distributed<T: Real>(
    matrix: &CsrMatrix<T>,
    vec: ArrayView1<'_, T>,
    mut out: ArrayViewMut1<'_, T>,
) {
    let rows = matrix.num_rows();
    let mut sum = Array1::<T>::zeros(rows);
    for i in 0..rows {
        for k in matrix.row_range(i) {
            sum[i] += matrix.values[k] * vec[matrix.cols[k]];
        }
    }
    out.assign(&sum);
}

fn crs_tiled<T: Real>(
    tile: usize,
    matrix: &CsrMatrix<T>,
    vec: ArrayView1<'_, T>,
    mut out: ArrayViewMut1<'_, T>,
) {
    for ti in tiles(0..matrix.num_rows(), tile) {
        for i in ti {
            out[i] = matrix.row_dot(i, &vec);
        }
    }
}

fn crs_parallel<T: Real>(
    matrix: &CsrMatrix<T>,
    vec: ArrayView1<'_, T>,
    out: ArrayViewMut1<'_, T>,
) {
    parallel::fill_indexed(out, |i| matrix.row_dot(i, &vec));
}

pub fn run_crs<T: Real>(
    schedule: Schedule,
    matrix: &CsrMatrix<T>,
    vec: ArrayView1<'_, T>,
    out: ArrayViewMut1<'_, T>,
) -> Result<(), Error> {
    ensure_shape("vec", &vec, &[matrix.num_cols()])?;
    ensure_shape("out", &out, &[matrix.num_rows()])?;
    match schedule {
        Schedule::Reference => crs_reference(matrix, vec, out),
        Schedule::Distributed => crs_distributed(matrix, vec, out),
        Schedule::Tiled(tile) => crs_tiled(tile, matrix, vec, out),
        Schedule::Parallel => crs_parallel(matrix, vec, out),
        other @ (Schedule::Interchanged | Schedule::Fused) => {
            return Err(crate::unsupported(CRS, other))
        }
    }
    Ok(())
}

pub fn ellpack_reference<T: Real>(
    matrix: &EllpackMatrix<T>,
    vec: ArrayView1<'_, T>,
    mut out: ArrayViewMut1<'_, T>,
) {
    for i in 0..matrix.num_rows() {
        out[i] = matrix.row_dot(i, out[i], &vec);
    }
}

/// Slots outermost, rows innermost.
fn ellpack_interchanged<T: Real>(
    matrix: &EllpackMatrix<T>,
    vec: ArrayView1<'_, T>,
    mut out: ArrayViewMut1<'_, T>,
) {
    for j in 0..matrix.width() {
        for i in 0..matrix.num_rows() {
            out[i] += matrix.nzval[[i, j]] * vec[matrix.cols[[i, j]]];
        }
    }
}

fn ellpack_distributed<T: Real>(
    matrix: &EllpackMatrix<T>,
    vec: ArrayView1<'_, T>,
    mut out: ArrayViewMut1<'_, T>,
) {
    let mut sum = out.to_owned();
    for i in 0..matrix.num_rows() {
        for j in 0..matrix.width() {
            sum[i] += matrix.nzval[[i, j]] * vec[matrix.cols[[i, j]]];
        }
    }
    out.assign(&sum);
}

fn ellpack_tiled<T: Real>(
    tile: usize,
    matrix: &EllpackMatrix<T>,
    vec: ArrayView1<'_, T>,
    mut out: ArrayViewMut1<'_, T>,
) {
    for ti in tiles(0..matrix.num_rows(), tile) {
        for j in 0..matrix.width() {
            for i in ti.clone() {
                out[i] += matrix.nzval[[i, j]] * vec[matrix.cols[[i, j]]];
            }
        }
    }
}

fn ellpack_parallel<T: Real>(
    matrix: &EllpackMatrix<T>,
    vec: ArrayView1<'_, T>,
    mut out: ArrayViewMut1<'_, T>,
) {
    let init = out.to_owned();
    parallel::fill_indexed(out.view_mut(), |i| matrix.row_dot(i, init[i], &vec));
}

pub fn run_ellpack<T: Real>(
    schedule: Schedule,
    matrix: &EllpackMatrix<T>,
    vec: ArrayView1<'_, T>,
    out: ArrayViewMut1<'_, T>,
) -> Result<(), Error> {
    ensure_shape("vec", &vec, &[matrix.num_cols])?;
    ensure_shape("out", &out, &[matrix.num_rows()])?;
    match schedule {
        Schedule::Reference => ellpack_reference(matrix, vec, out),
        Schedule::Interchanged => ellpack_interchanged(matrix, vec, out),
        Schedule::Distributed => ellpack_distributed(matrix, vec, out),
        Schedule::Tiled(tile) => ellpack_tiled(tile, matrix, vec, out),
        Schedule::Parallel => ellpack_parallel(matrix, vec, out),
        other @ Schedule::Fused => return Err(crate::unsupported(ELLPACK, other)),
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CrsState<T> {
    pub matrix: CsrMatrix<T>,
    pub vec: Array1<T>,
    pub out: Array1<T>,
}

#[derive(Debug, Clone, Default)]
pub struct SpmvCrs<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> SpmvCrs<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for SpmvCrs<T> {
    type State = CrsState<T>;

    fn name(&self) -> &'static str {
        CRS
    }

    fn schedules(&self) -> Vec<Schedule> {
        vec![
            Schedule::Reference,
            Schedule::Distributed,
            Schedule::Tiled(DEFAULT_TILE),
            Schedule::Parallel,
        ]
    }

    fn tolerance(&self) -> Tolerance {
        T::default_tolerance()
    }

    fn init(&self, init: &mut Init) -> CrsState<T> {
        let Dims { rows, width } = self.dims;
        CrsState {
            matrix: CsrMatrix::random(init, rows, rows, width),
            vec: init.array1(rows),
            out: init.array1(rows),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut CrsState<T>) -> Result<(), Error> {
        run_crs(
            schedule,
            &state.matrix,
            state.vec.view(),
            state.out.view_mut(),
        )
    }

    fn outputs(&self, state: &CrsState<T>) -> Vec<Output> {
        vec![Output::float("out", &state.out)]
    }
}

#[derive(Debug, Clone)]
pub struct EllpackState<T> {
    pub matrix: EllpackMatrix<T>,
    pub vec: Array1<T>,
    pub out: Array1<T>,
}

#[derive(Debug, Clone, Default)]
pub struct SpmvEllpack<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> SpmvEllpack<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for SpmvEllpack<T> {
    type State = EllpackState<T>;

    fn name(&self) -> &'static str {
        ELLPACK
    }

    fn schedules(&self) -> Vec<Schedule> {
        vec![
            Schedule::Reference,
            Schedule::Interchanged,
            Schedule::Distributed,
            Schedule::Tiled(DEFAULT_TILE),
            Schedule::Parallel,
        ]
    }

    fn tolerance(&self) -> Tolerance {
        T::default_tolerance()
    }

    fn init(&self, init: &mut Init) -> EllpackState<T> {
        let Dims { rows, width } = self.dims;
        let csr = CsrMatrix::random(init, rows, rows, width);
        EllpackState {
            matrix: EllpackMatrix::padded(&csr, width),
            vec: init.array1(rows),
            out: init.array1(rows),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut EllpackState<T>) -> Result<(), Error> {
        run_ellpack(
            schedule,
            &state.matrix,
            state.vec.view(),
            state.out.view_mut(),
        )
    }

    fn outputs(&self, state: &EllpackState<T>) -> Vec<Output> {
        vec![Output::float("out", &state.out)]
    }
}
