use ndarray::{array, Array1, Array2};
use polyverify::{
    check, DivergenceKind, Error, Init, Kernel, Options, Output, Schedule, Tolerance,
};
use polyverify_kernels::{atax, bicg, cnn, nw, spmv, stencil2d, three_mm, Registry};
use utils::diff;

/// Replaces one schedule of a kernel with a hand written variant.
struct WithVariant<K: Kernel> {
    kernel: K,
    schedule: Schedule,
    variant: fn(&mut K::State),
}

impl<K: Kernel> Kernel for WithVariant<K> {
    type State = K::State;

    fn name(&self) -> &'static str {
        self.kernel.name()
    }

    fn schedules(&self) -> Vec<Schedule> {
        vec![Schedule::Reference, self.schedule]
    }

    fn scales(&self) -> &'static [f64] {
        self.kernel.scales()
    }

    fn tolerance(&self) -> Tolerance {
        self.kernel.tolerance()
    }

    fn init(&self, init: &mut Init) -> Self::State {
        self.kernel.init(init)
    }

    fn run(&self, schedule: Schedule, state: &mut Self::State) -> Result<(), Error> {
        if schedule == self.schedule {
            (self.variant)(state);
            Ok(())
        } else {
            self.kernel.run(schedule, state)
        }
    }

    fn outputs(&self, state: &Self::State) -> Vec<Output> {
        self.kernel.outputs(state)
    }
}

fn legal_schedules_match<T>(name: &str, trials: usize) -> Result<(), Error>
where
    T: polyverify::Real + Default,
{
    polyverify::testing::init_logging();
    let registry = Registry::with_default_kernels::<T>();
    let kernel = registry.get(name)?;
    let options = Options::default().trials(trials).seed(42);
    for schedule in kernel.schedules() {
        kernel
            .check(Schedule::Reference, schedule, &options)?
            .into_result()?;
    }
    Ok(())
}

macro_rules! schedule_tests {
    ($($name:ident => $kernel:literal,)*) => {
        paste::paste! {
            $(
                #[test]
                fn [<$name _schedules_match_reference>]() -> Result<(), Error> {
                    legal_schedules_match::<f64>($kernel, 3)
                }
            )*

            const COVERED: &[&str] = &[$($kernel),*];
        }
    };
}

schedule_tests! {
    atax => "atax",
    bicg => "bicg",
    gesummv => "gesummv",
    mvt => "mvt",
    gemm => "gemm",
    two_mm => "2mm",
    three_mm => "3mm",
    gemver => "gemver",
    syrk => "syrk",
    syr2k => "syr2k",
    symm => "symm",
    trmm => "trmm",
    doitgen => "doitgen",
    covariance => "covariance",
    correlation => "correlation",
    seidel_2d => "seidel-2d",
    jacobi_1d => "jacobi-1d",
    jacobi_2d => "jacobi-2d",
    heat_3d => "heat-3d",
    fdtd_2d => "fdtd-2d",
    adi => "adi",
    stencil2d => "stencil2d",
    stencil3d => "stencil3d",
    spmv_crs => "spmv-crs",
    spmv_ellpack => "spmv-ellpack",
    md => "md",
    nw => "nw",
    aes => "aes",
    cnn => "cnn",
}

#[test]
fn every_registered_kernel_is_covered() {
    let registry = Registry::with_default_kernels::<f64>();
    let names: Vec<&str> = registry.names().collect();
    diff::assert_eq!(have: names, want: COVERED.to_vec());
}

fn atax_state(init: &mut Init) -> atax::State<f64> {
    atax::Atax::<f64>::default().init(init)
}

fn run_atax(schedule: Schedule, state: &mut atax::State<f64>) -> Result<(), Error> {
    atax::run(
        schedule,
        state.a.view(),
        state.x.view(),
        state.y.view_mut(),
        state.tmp.view_mut(),
    )
}

#[test]
fn atax_schedules_over_many_trials() -> Result<(), Error> {
    polyverify::testing::init_logging();
    let kernel = atax::Atax::<f64>::default();
    let options = Options::default().trials(120).seed(2024);
    for schedule in kernel.schedules() {
        let report = check(&kernel, Schedule::Reference, schedule, &options)?;
        assert!(report.passed(), "{report}");
        assert_eq!(report.trials, 120);
        // y and tmp, every trial
        assert_eq!(report.arrays[0].elements, 120 * 124);
        assert_eq!(report.arrays[1].elements, 120 * 116);
    }
    Ok(())
}

#[test]
fn atax_zero_matrix_gives_zero_output() -> Result<(), Error> {
    let mut init = Init::new(1);
    for schedule in atax::Atax::<f64>::default().schedules() {
        let mut state = atax_state(&mut init);
        state.a.fill(0.0);
        run_atax(schedule, &mut state)?;
        assert!(state.y.iter().all(|v| *v == 0.0), "{schedule}: {:?}", state.y);
    }
    Ok(())
}

#[test]
fn atax_zero_vector_gives_zero_output() -> Result<(), Error> {
    let mut init = Init::new(2).with_scale(1e3);
    for schedule in atax::Atax::<f64>::default().schedules() {
        let mut state = atax_state(&mut init);
        state.x.fill(0.0);
        run_atax(schedule, &mut state)?;
        assert!(state.tmp.iter().all(|v| *v == 0.0), "{schedule}: {:?}", state.tmp);
        assert!(state.y.iter().all(|v| *v == 0.0), "{schedule}: {:?}", state.y);
    }
    Ok(())
}

#[test]
fn atax_scales_linearly_in_x_and_quadratically_in_a() -> Result<(), Error> {
    let c = 3.0;
    let mut init = Init::new(3);
    let base = atax_state(&mut init);
    for schedule in atax::Atax::<f64>::default().schedules() {
        let mut want = base.clone();
        run_atax(schedule, &mut want)?;

        let mut scaled_x = base.clone();
        scaled_x.x *= c;
        run_atax(schedule, &mut scaled_x)?;
        approx::assert_abs_diff_eq!(scaled_x.y, &want.y * c, epsilon = 1e-9);

        let mut scaled_a = base.clone();
        scaled_a.a *= c;
        run_atax(schedule, &mut scaled_a)?;
        approx::assert_abs_diff_eq!(scaled_a.y, &want.y * (c * c), epsilon = 1e-9);
    }
    Ok(())
}

/// `kernel_atax_transformed` of the original verification harness.
///
/// `tmp` is indexed by column and each `tmp[j]` only sums `A[i][j] * x[j]`.
/// The original also wrote past the end of `tmp`, here the column loop stops
/// at the length of `tmp`.
fn atax_from_harness(state: &mut atax::State<f64>) {
    let (m, n) = state.a.dim();
    state.y.fill(0.0);
    for j in 0..n.min(m) {
        state.tmp[j] = 0.0;
        for i in 0..m {
            state.tmp[j] += state.a[[i, j]] * state.x[j];
        }
    }
    for i in 0..m {
        for j in 0..n.min(m) {
            state.y[j] += state.a[[i, j]] * state.tmp[j];
        }
    }
}

#[test]
fn harness_atax_transformation_is_detected() -> Result<(), Error> {
    polyverify::testing::init_logging();
    let kernel = WithVariant {
        kernel: atax::Atax::<f64>::default(),
        schedule: Schedule::Interchanged,
        variant: atax_from_harness,
    };
    let options = Options::default().trials(5).seed(7);
    let report = check(&kernel, Schedule::Reference, Schedule::Interchanged, &options)?;
    assert!(!report.passed());
    assert!(report.arrays.iter().all(|array| array.divergent_trials == 5));

    let (array, first) = report.first_divergence().expect("divergence");
    assert_eq!(array, "y");
    assert_eq!(first.trial, 0);
    assert_eq!(first.seed, 7);
    assert_eq!(first.divergence.index, vec![0]);
    assert_eq!(first.divergence.kind, DivergenceKind::OutOfTolerance);

    match report.into_result() {
        Err(Error::Diverged { kernel, array, .. }) => {
            assert_eq!(kernel, "atax");
            assert_eq!(array, "y");
        }
        other => panic!("expected divergence, got {other:?}"),
    }
    Ok(())
}

#[test]
fn nan_output_is_flagged() -> Result<(), Error> {
    let kernel = WithVariant {
        kernel: atax::Atax::<f64>::default(),
        schedule: Schedule::Fused,
        variant: |state: &mut atax::State<f64>| {
            run_atax(Schedule::Reference, state).expect("reference atax");
            state.y[3] = f64::NAN;
        },
    };
    let report = check(
        &kernel,
        Schedule::Reference,
        Schedule::Fused,
        &Options::default().trials(2).seed(11),
    )?;
    let (array, first) = report.first_divergence().expect("divergence");
    assert_eq!(array, "y");
    assert_eq!(first.divergence.kind, DivergenceKind::NonFinite);
    assert_eq!(first.divergence.index, vec![3]);
    assert!(first.divergence.have.is_nan());
    assert_eq!(report.divergent_elements(), 2);
    Ok(())
}

/// `kernel_bicg_transformed` of the original verification harness, which
/// interchanged the loops but dropped the zeroing of `q`.
fn bicg_from_harness(state: &mut bicg::State<f64>) {
    let (n, m) = state.a.dim();
    state.s.fill(0.0);
    for j in 0..m {
        for i in 0..n {
            state.s[j] += state.r[i] * state.a[[i, j]];
            state.q[i] += state.a[[i, j]] * state.p[j];
        }
    }
}

#[test]
fn harness_bicg_transformation_is_detected() -> Result<(), Error> {
    let kernel = WithVariant {
        kernel: bicg::Bicg::<f64>::default(),
        schedule: Schedule::Interchanged,
        variant: bicg_from_harness,
    };
    let report = check(
        &kernel,
        Schedule::Reference,
        Schedule::Interchanged,
        &Options::default().trials(3).seed(5),
    )?;
    let s = report.arrays.iter().find(|a| a.name == "s").expect("s");
    let q = report.arrays.iter().find(|a| a.name == "q").expect("q");
    assert!(s.passed(), "s is only reordered");
    assert!(!q.passed(), "q accumulates onto garbage");
    assert_eq!(q.divergent_trials, 3);
    Ok(())
}

/// Tiled `E = A B` whose last tile stops one iteration short.
fn three_mm_off_by_one(state: &mut three_mm::State<f64>) {
    let (ni, nk) = state.a.dim();
    let nj = state.b.ncols();
    for i in 0..ni {
        for j in 0..nj {
            state.e[[i, j]] = 0.0;
            for k in 0..nk - 1 {
                state.e[[i, j]] += state.a[[i, k]] * state.b[[k, j]];
            }
        }
    }
    state.f = state.c.dot(&state.d);
    state.g = state.e.dot(&state.f);
}

#[test]
fn three_mm_boundary_off_by_one_is_detected() -> Result<(), Error> {
    let kernel = WithVariant {
        kernel: three_mm::ThreeMm::<f64>::default(),
        schedule: Schedule::Tiled(8),
        variant: three_mm_off_by_one,
    };
    let report = check(
        &kernel,
        Schedule::Reference,
        Schedule::Tiled(8),
        &Options::default().trials(2).seed(9),
    )?;
    let passed: Vec<(&str, bool)> = report
        .arrays
        .iter()
        .map(|a| (a.name.as_str(), a.passed()))
        .collect();
    diff::assert_eq!(have: passed, want: vec![("E", false), ("F", true), ("G", false)]);
    Ok(())
}

#[test]
fn spmv_crs_diagonal() -> Result<(), Error> {
    let matrix = spmv::CsrMatrix::new(array![1.0, 2.0, 3.0], vec![0, 1, 2], vec![0, 1, 2, 3], 3)?;
    let vec = Array1::<f64>::ones(3);
    for schedule in spmv::SpmvCrs::<f64>::default().schedules() {
        let mut out = Array1::from_elem(3, -1.0);
        spmv::run_crs(schedule, &matrix, vec.view(), out.view_mut())?;
        diff::assert_eq!(have: out, want: array![1.0, 2.0, 3.0]);
    }

    let ellpack = spmv::EllpackMatrix::from_csr(&matrix, 2)?;
    let mut out = Array1::zeros(3);
    spmv::run_ellpack(Schedule::Reference, &ellpack, vec.view(), out.view_mut())?;
    diff::assert_eq!(have: out, want: array![1.0, 2.0, 3.0]);
    Ok(())
}

#[test]
fn spmv_rejects_unsorted_delimiters() {
    let result = spmv::CsrMatrix::new(array![1.0, 2.0], vec![0, 1], vec![0, 2, 1, 2], 2);
    assert!(result.is_err());
}

#[test]
fn stencil2d_identity_filter() -> Result<(), Error> {
    let orig = Array2::from_shape_fn((4, 4), |(r, c)| (r * 4 + c) as i32 * 3 - 7);
    let mut filter = Array2::zeros((3, 3));
    filter[[1, 1]] = 1;
    for schedule in stencil2d::Stencil2d::default().schedules() {
        let mut sol = Array2::zeros((4, 4));
        stencil2d::run(schedule, orig.view(), filter.view(), sol.view_mut())?;
        for r in 0..2 {
            for c in 0..2 {
                assert_eq!(sol[[r, c]], orig[[r + 1, c + 1]], "{schedule} at ({r}, {c})");
            }
        }
    }
    Ok(())
}

#[test]
fn aes_fips_197_known_answer() -> Result<(), Error> {
    use polyverify_kernels::aes;
    let key = aes::from_hex::<32>(
        "key",
        "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
    )?;
    let mut blocks = vec![aes::from_hex::<16>("plaintext", "00112233445566778899aabbccddeeff")?];
    aes::run(Schedule::Parallel, &key, &mut blocks)?;
    let want = aes::from_hex::<16>("ciphertext", "8ea2b7ca516745bfeafc49904b496089")?;
    diff::assert_eq!(have: blocks, want: vec![want]);
    Ok(())
}

#[test]
fn nw_fills_agree_on_random_sequences() -> Result<(), Error> {
    let kernel = nw::Nw::new(nw::Dims { alen: 61, blen: 47 });
    let options = Options::default().trials(20).seed(13);
    for schedule in [Schedule::Interchanged, Schedule::Tiled(5), Schedule::Parallel] {
        check(&kernel, Schedule::Reference, schedule, &options)?.into_result()?;
    }
    Ok(())
}

#[test]
fn cnn_relu_output_is_nonnegative() -> Result<(), Error> {
    let kernel = cnn::Cnn::<f64>::new(cnn::Dims::SMALL);
    let mut init = Init::new(17);
    for schedule in kernel.schedules() {
        let mut state = kernel.init(&mut init);
        kernel.run(schedule, &mut state)?;
        let outputs = kernel.outputs(&state);
        let polyverify::Values::Float(values) = &outputs[0].values else {
            panic!("cnn output is not float");
        };
        assert!(values.iter().all(|v| *v >= 0.0), "{schedule}");
    }
    let options = Options::default().trials(3).seed(19);
    for schedule in [Schedule::Fused, Schedule::Tiled(4)] {
        check(&kernel, Schedule::Reference, schedule, &options)?.into_result()?;
    }
    Ok(())
}

#[test]
fn shape_mismatch_is_an_error() {
    let a = Array2::<f64>::zeros((4, 3));
    let x = Array1::<f64>::zeros(3);
    let mut y = Array1::<f64>::zeros(3);
    let mut tmp = Array1::<f64>::zeros(5);
    let result = atax::run(
        Schedule::Reference,
        a.view(),
        x.view(),
        y.view_mut(),
        tmp.view_mut(),
    );
    match result {
        Err(Error::Shape {
            array,
            expected,
            found,
        }) => {
            assert_eq!(array, "tmp");
            assert_eq!(expected, vec![4]);
            assert_eq!(found, vec![5]);
        }
        other => panic!("expected shape error, got {other:?}"),
    }
}

#[test]
fn unsupported_schedule_is_an_error() -> Result<(), Error> {
    let registry = Registry::with_default_kernels::<f64>();
    let result = registry
        .get("seidel-2d")?
        .check(Schedule::Reference, Schedule::Interchanged, &Options::default());
    assert!(matches!(
        result,
        Err(Error::UnsupportedSchedule {
            kernel: "seidel-2d",
            schedule: Schedule::Interchanged
        })
    ));
    Ok(())
}
