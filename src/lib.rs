#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

//! Equivalence checking for loop-transformed numeric kernels.
//!
//! A [`Kernel`] computes one numeric function under several loop
//! [`Schedule`]s. The [`check`] harness runs two schedules of the same kernel
//! on identical randomized input and compares every output array under a
//! combined absolute and relative [`Tolerance`].

pub mod check;
pub mod compare;
pub mod element;
pub mod error;
pub mod init;
pub mod kernel;
pub mod parallel;
pub mod report;
pub mod schedule;
pub mod shape;
pub mod testing;

pub use check::{check, Options};
pub use compare::{compare_arrays, compare_exact, Comparison, Divergence, DivergenceKind, Tolerance};
pub use element::{cast, DType, Real};
pub use error::Error;
pub use init::{init_array, Init};
pub use kernel::{DynKernel, Kernel, Output, Values};
pub use report::Report;
pub use schedule::{tiles, Schedule, DEFAULT_TILE};
