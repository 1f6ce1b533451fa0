use crate::{
    compare::{compare_arrays, compare_exact, Comparison, Tolerance},
    element::Real,
    error::Error,
    init::Init,
    schedule::Schedule,
};
use ndarray::{ArrayBase, Data, Dimension};

/// Flattened output values of a kernel.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    /// Floating point values, compared under a tolerance.
    Float(Vec<f64>),
    /// Integer or byte values, compared exactly.
    Exact(Vec<i64>),
}

impl Values {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Float(values) => values.len(),
            Self::Exact(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One named output array of a kernel run.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub name: &'static str,
    pub shape: Vec<usize>,
    pub values: Values,
}

impl Output {
    pub fn float<T, S, D>(name: &'static str, array: &ArrayBase<S, D>) -> Self
    where
        T: Real,
        S: Data<Elem = T>,
        D: Dimension,
    {
        Self {
            name,
            shape: array.shape().to_vec(),
            values: Values::Float(
                array
                    .iter()
                    .map(|v| v.to_f64().unwrap_or(f64::NAN))
                    .collect(),
            ),
        }
    }

    pub fn exact<V, S, D>(name: &'static str, array: &ArrayBase<S, D>) -> Self
    where
        V: Copy + Into<i64>,
        S: Data<Elem = V>,
        D: Dimension,
    {
        Self {
            name,
            shape: array.shape().to_vec(),
            values: Values::Exact(array.iter().map(|v| (*v).into()).collect()),
        }
    }

    pub fn bytes(name: &'static str, bytes: &[u8]) -> Self {
        Self {
            name,
            shape: vec![bytes.len()],
            values: Values::Exact(bytes.iter().copied().map(i64::from).collect()),
        }
    }

    /// Compares this output against the expected output of the same array.
    #[must_use]
    pub fn compare(&self, want: &Self, tolerance: &Tolerance) -> Comparison {
        let mut comparison = match (&self.values, &want.values) {
            (Values::Float(have), Values::Float(want)) => compare_arrays(have, want, tolerance),
            (Values::Exact(have), Values::Exact(want)) => compare_exact(have, want),
            (Values::Float(have), Values::Exact(want)) => {
                let want: Vec<f64> = want.iter().map(|v| *v as f64).collect();
                compare_arrays(have, &want, tolerance)
            }
            (Values::Exact(have), Values::Float(want)) => {
                let have: Vec<f64> = have.iter().map(|v| *v as f64).collect();
                compare_arrays(&have, want, tolerance)
            }
        };
        if self.shape == want.shape {
            comparison.first = comparison.first.map(|first| first.with_shape(&self.shape));
        }
        comparison
    }
}

/// A numeric kernel that can be computed under several loop schedules.
///
/// The harness generates one input [`Kernel::State`] per trial, clones it,
/// runs two schedules on the copies and compares [`Kernel::outputs`].
pub trait Kernel: Send + Sync {
    /// Inputs and outputs of one kernel invocation.
    type State: Clone + Send;

    fn name(&self) -> &'static str;

    /// Schedules that compute the same function as the reference loop order.
    fn schedules(&self) -> Vec<Schedule>;

    fn supports(&self, schedule: &Schedule) -> bool {
        self.schedules().iter().any(|s| s.same_kind(schedule))
    }

    /// Input magnitudes cycled through by the trials.
    fn scales(&self) -> &'static [f64] {
        &[1.0, 1e-3, 1e3]
    }

    fn tolerance(&self) -> Tolerance {
        Tolerance::default()
    }

    /// Generates a fresh randomized input.
    ///
    /// Output buffers are filled with garbage so that a schedule relying on
    /// caller-side zeroing is caught.
    fn init(&self, init: &mut Init) -> Self::State;

    fn run(&self, schedule: Schedule, state: &mut Self::State) -> Result<(), Error>;

    fn outputs(&self, state: &Self::State) -> Vec<Output>;
}

/// Object safe view of a [`Kernel`], used by registries and runners.
pub trait DynKernel: Send + Sync {
    fn name(&self) -> &'static str;

    fn schedules(&self) -> Vec<Schedule>;

    fn tolerance(&self) -> Tolerance;

    fn check(
        &self,
        original: Schedule,
        transformed: Schedule,
        options: &crate::check::Options,
    ) -> Result<crate::report::Report, Error>;
}

impl<K> DynKernel for K
where
    K: Kernel,
{
    fn name(&self) -> &'static str {
        Kernel::name(self)
    }

    fn schedules(&self) -> Vec<Schedule> {
        Kernel::schedules(self)
    }

    fn tolerance(&self) -> Tolerance {
        Kernel::tolerance(self)
    }

    fn check(
        &self,
        original: Schedule,
        transformed: Schedule,
        options: &crate::check::Options,
    ) -> Result<crate::report::Report, Error> {
        crate::check::check(self, original, transformed, options)
    }
}

impl std::fmt::Debug for dyn DynKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("name", &self.name())
            .field("schedules", &self.schedules())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Output, Values};
    use crate::{DivergenceKind, Tolerance};
    use ndarray::array;

    #[test]
    fn float_output_is_row_major() {
        let a = array![[1.0f32, 2.0], [3.0, 4.0]];
        let out = Output::float("A", &a.t());
        assert_eq!(out.shape, vec![2, 2]);
        assert_eq!(out.values, Values::Float(vec![1.0, 3.0, 2.0, 4.0]));
    }

    #[test]
    fn compare_resolves_index() {
        let want = Output::float("y", &array![[0.0, 0.0], [0.0, 0.0]]);
        let have = Output::float("y", &array![[0.0, 0.0], [1.0, 0.0]]);
        let cmp = have.compare(&want, &Tolerance::default());
        let first = cmp.first.expect("divergence");
        assert_eq!(first.index, vec![1, 0]);
        assert_eq!(first.kind, DivergenceKind::OutOfTolerance);
    }

    #[test]
    fn exact_outputs_ignore_tolerance() {
        let want = Output::exact("sol", &array![1i32, 2, 3]);
        let have = Output::exact("sol", &array![1i32, 2, 4]);
        assert!(!have.compare(&want, &Tolerance::new(10.0, 10.0)).is_equivalent());
        assert_eq!(Output::bytes("buf", &[0xff]).values, Values::Exact(vec![255]));
    }
}
