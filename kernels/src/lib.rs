#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::many_single_char_names,
    clippy::needless_range_loop,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

//! Reference loop nests and equivalent schedules of the PolyBench and
//! MachSuite kernel families.

pub mod adi;
pub mod aes;
pub mod atax;
pub mod bicg;
pub mod cnn;
pub mod correlation;
pub mod covariance;
pub mod doitgen;
pub mod fdtd_2d;
pub mod gemm;
pub mod gemver;
pub mod gesummv;
pub mod heat_3d;
pub mod jacobi_1d;
pub mod jacobi_2d;
pub mod md;
pub mod mvt;
pub mod nw;
pub mod registry;
pub mod seidel_2d;
pub mod spmv;
pub mod stencil2d;
pub mod stencil3d;
pub mod symm;
pub mod syr2k;
pub mod syrk;
pub mod three_mm;
pub mod trmm;
pub mod two_mm;

pub use registry::Registry;

use polyverify::{Error, Schedule};

pub(crate) fn unsupported(kernel: &'static str, schedule: Schedule) -> Error {
    Error::UnsupportedSchedule { kernel, schedule }
}

#[cfg(test)]
pub(crate) mod testing {
    use polyverify::{check, Error, Kernel, Options, Schedule};

    /// Checks every offered schedule of `kernel` against its reference.
    pub fn check_schedules<K: Kernel>(kernel: &K, trials: usize) -> Result<(), Error> {
        polyverify::testing::init_logging();
        for schedule in kernel.schedules() {
            let options = Options::default().trials(trials).seed(0x5eed);
            check(kernel, Schedule::Reference, schedule, &options)?.into_result()?;
        }
        Ok(())
    }
}
