use crate::element::{cast, Real};
use ndarray::{Array1, Array2, Array3, Array4};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Fills `buffer` with independent uniform values in `[-1, 1]`.
pub fn init_array<T, R>(buffer: &mut [T], rng: &mut R)
where
    T: Real,
    R: Rng + ?Sized,
{
    for value in buffer.iter_mut() {
        *value = cast(rng.gen_range(-1.0..=1.0));
    }
}

/// Seeded generator of kernel inputs.
///
/// Float values are uniform in `[-scale, scale]`. The scale lets the harness
/// cover near-zero and large magnitude inputs with the same kernel.
#[derive(Debug, Clone)]
pub struct Init {
    rng: StdRng,
    scale: f64,
}

impl Init {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            scale: 1.0,
        }
    }

    #[must_use]
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn value<T: Real>(&mut self) -> T {
        cast(self.rng.gen_range(-1.0..=1.0) * self.scale)
    }

    /// Uniform value in `[low, high)`, independent of the scale.
    pub fn uniform<T: Real>(&mut self, low: f64, high: f64) -> T {
        cast(self.rng.gen_range(low..high))
    }

    pub fn fill<T: Real>(&mut self, buffer: &mut [T]) {
        init_array(buffer, &mut self.rng);
        if (self.scale - 1.0).abs() > f64::EPSILON {
            let scale: T = cast(self.scale);
            for value in buffer.iter_mut() {
                *value *= scale;
            }
        }
    }

    pub fn array1<T: Real>(&mut self, len: usize) -> Array1<T> {
        Array1::from_shape_simple_fn(len, || self.value())
    }

    pub fn array2<T: Real>(&mut self, shape: (usize, usize)) -> Array2<T> {
        Array2::from_shape_simple_fn(shape, || self.value())
    }

    pub fn array3<T: Real>(&mut self, shape: (usize, usize, usize)) -> Array3<T> {
        Array3::from_shape_simple_fn(shape, || self.value())
    }

    pub fn array4<T: Real>(&mut self, shape: (usize, usize, usize, usize)) -> Array4<T> {
        Array4::from_shape_simple_fn(shape, || self.value())
    }

    /// Integer array with values in `[low, high)`.
    pub fn int_array2(&mut self, shape: (usize, usize), low: i32, high: i32) -> Array2<i32> {
        Array2::from_shape_simple_fn(shape, || self.rng.gen_range(low..high))
    }

    pub fn int_array3(&mut self, shape: (usize, usize, usize), low: i64, high: i64) -> Array3<i64> {
        Array3::from_shape_simple_fn(shape, || self.rng.gen_range(low..high))
    }
}

#[cfg(test)]
mod tests {
    use super::{init_array, Init};
    use rand::SeedableRng;

    #[test]
    fn values_are_within_unit_interval() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut buffer = vec![0.0f64; 1000];
        init_array(&mut buffer, &mut rng);
        assert!(buffer.iter().all(|v| (-1.0..=1.0).contains(v)));
        assert!(buffer.iter().any(|v| *v < 0.0));
        assert!(buffer.iter().any(|v| *v > 0.0));
    }

    #[test]
    fn same_seed_same_input() {
        let a = Init::new(42).array2::<f64>((4, 5));
        let b = Init::new(42).array2::<f64>((4, 5));
        let c = Init::new(43).array2::<f64>((4, 5));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn scale_bounds_magnitude() {
        let mut init = Init::new(1).with_scale(1e-6);
        let small = init.array1::<f64>(100);
        assert!(small.iter().all(|v| v.abs() <= 1e-6));

        let mut buffer = vec![0.0f32; 100];
        Init::new(1).with_scale(1e3).fill(&mut buffer);
        assert!(buffer.iter().all(|v| v.abs() <= 1e3));
        assert!(buffer.iter().any(|v| v.abs() > 1.0));
    }
}
