use crate::compare::Divergence;
use crate::schedule::Schedule;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("array {array:?} has shape {found:?}, expected {expected:?}")]
    Shape {
        array: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("kernel {kernel:?} does not support schedule {schedule}")]
    UnsupportedSchedule {
        kernel: &'static str,
        schedule: Schedule,
    },

    #[error("invalid schedule {0:?}")]
    InvalidSchedule(String),

    #[error("unknown kernel {0:?}")]
    UnknownKernel(String),

    #[error("failed to configure worker threads: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Sparse(#[from] SparseError),

    #[error("neighbor {neighbor} of atom {atom} is {index}, but there are only {atoms} atoms")]
    Neighbor {
        atom: usize,
        neighbor: usize,
        index: usize,
        atoms: usize,
    },

    #[error("{kernel} {original} vs {transformed} diverged in array {array:?} (trial {trial}): {divergence}")]
    Diverged {
        kernel: String,
        original: Schedule,
        transformed: Schedule,
        array: String,
        trial: usize,
        divergence: Box<Divergence>,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SparseError {
    #[error("row delimiters must start at 0, found {0}")]
    FirstDelimiter(usize),

    #[error("row delimiters must end at {nnz} (number of nonzeros), found {found}")]
    LastDelimiter { nnz: usize, found: usize },

    #[error("row delimiters decrease at row {row}: {start} > {end}")]
    Decreasing { row: usize, start: usize, end: usize },

    #[error("column index {col} at position {position} is out of range for {num_cols} columns")]
    Column {
        position: usize,
        col: usize,
        num_cols: usize,
    },

    #[error("{values} values but {cols} column indices")]
    Length { values: usize, cols: usize },

    #[error("row {row} has {len} nonzeros, more than the ELLPACK width {width}")]
    RowTooLong { row: usize, len: usize, width: usize },
}
