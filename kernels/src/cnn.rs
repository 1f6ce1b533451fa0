//! Convolution layer with bias, ReLU and 2x2 max pooling.
//!
//! ```text
//! C[i][h][w]   = bias[i] + sum_{j, p, q} weight[i][j][p][q] * input[j][h + p][w + q]
//! C[i][h][w]   = max(0, C[i][h][w])
//! out[i][h][w] = max of C[i][2h..2h + 2][2w..2w + 2]
//! ```
//!
//! The convolution result `C` is a scratch buffer allocated for each call.
use ndarray::{Array1, Array3, Array4, ArrayView1, ArrayView3, ArrayView4, ArrayViewMut3, Axis};
use polyverify::{
    parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule, Tolerance,
    DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "cnn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    /// Number of input and output channels.
    pub channels: usize,
    pub kernel: usize,
    /// Edge of the convolution output, before pooling.
    pub im_size: usize,
}

impl Dims {
    /// Reduced layer used by the registry, the full layer takes minutes.
    pub const SMALL: Self = Self {
        channels: 8,
        kernel: 5,
        im_size: 32,
    };

    #[must_use]
    pub fn in_im_size(&self) -> usize {
        (self.im_size + self.kernel).saturating_sub(1)
    }

    #[must_use]
    pub fn out_im_size(&self) -> usize {
        self.im_size / 2
    }
}

impl Default for Dims {
    fn default() -> Self {
        Self {
            channels: 256,
            kernel: 5,
            im_size: 224,
        }
    }
}

pub struct Layer<'a, T> {
    pub input: ArrayView3<'a, T>,
    pub weight: ArrayView4<'a, T>,
    pub bias: ArrayView1<'a, T>,
}

#[inline]
fn max<T: Real>(x: T, y: T) -> T {
    if x > y {
        x
    } else {
        y
    }
}

#[inline]
fn pool<T: Real>(c: &ArrayView3<'_, T>, i: usize, h: usize, w: usize) -> T {
    max(
        max(c[[i, h * 2, w * 2]], c[[i, h * 2 + 1, w * 2]]),
        max(c[[i, h * 2, w * 2 + 1]], c[[i, h * 2 + 1, w * 2 + 1]]),
    )
}

/// Accumulates input channel `j` into output channel `i` at `(h, w)`.
#[inline]
fn accumulate<T: Real>(
    layer: &Layer<'_, T>,
    mut acc: T,
    i: usize,
    j: usize,
    h: usize,
    w: usize,
) -> T {
    let k = layer.weight.dim().2;
    for p in 0..k {
        for q in 0..k {
            acc += layer.weight[[i, j, p, q]] * layer.input[[j, h + p, w + q]];
        }
    }
    acc
}

fn relu<T: Real>(c: &mut ArrayViewMut3<'_, T>) {
    c.mapv_inplace(|v| max(T::zero(), v));
}

fn max_pool<T: Real>(c: &ArrayView3<'_, T>, mut output: ArrayViewMut3<'_, T>) {
    let (num, out, _) = output.dim();
    for i in 0..num {
        for h in 0..out {
            for w in 0..out {
                output[[i, h, w]] = pool(c, i, h, w);
            }
        }
    }
}

fn fill_bias<T: Real>(bias: &ArrayView1<'_, T>, c: &mut ArrayViewMut3<'_, T>) {
    for (mut plane, &b) in c.axis_iter_mut(Axis(0)).zip(bias) {
        plane.fill(b);
    }
}

pub fn reference<T: Real>(
    layer: Layer<'_, T>,
    mut c: ArrayViewMut3<'_, T>,
    output: ArrayViewMut3<'_, T>,
) {
    let (num, im, _) = c.dim();
    fill_bias(&layer.bias, &mut c);
    for i in 0..num {
        for j in 0..num {
            for h in 0..im {
                for w in 0..im {
                    c[[i, h, w]] = accumulate(&layer, c[[i, h, w]], i, j, h, w);
                }
            }
        }
    }
    relu(&mut c);
    max_pool(&c.view(), output);
}

/// Input channels outermost.
fn interchanged<T: Real>(
    layer: Layer<'_, T>,
    mut c: ArrayViewMut3<'_, T>,
    output: ArrayViewMut3<'_, T>,
) {
    let (num, im, _) = c.dim();
    fill_bias(&layer.bias, &mut c);
    for j in 0..num {
        for i in 0..num {
            for h in 0..im {
                for w in 0..im {
                    c[[i, h, w]] = accumulate(&layer, c[[i, h, w]], i, j, h, w);
                }
            }
        }
    }
    relu(&mut c);
    max_pool(&c.view(), output);
}

/// Bias initialization inside the channel loop and ReLU folded into pooling.
fn fused<T: Real>(
    layer: Layer<'_, T>,
    mut c: ArrayViewMut3<'_, T>,
    mut output: ArrayViewMut3<'_, T>,
) {
    let (num, im, _) = c.dim();
    let out = output.dim().1;
    for i in 0..num {
        c.index_axis_mut(Axis(0), i).fill(layer.bias[i]);
        for j in 0..num {
            for h in 0..im {
                for w in 0..im {
                    c[[i, h, w]] = accumulate(&layer, c[[i, h, w]], i, j, h, w);
                }
            }
        }
        for h in 0..out {
            for w in 0..out {
                output[[i, h, w]] = max(T::zero(), pool(&c.view(), i, h, w));
            }
        }
    }
}

fn tiled<T: Real>(
    tile: usize,
    layer: Layer<'_, T>,
    mut c: ArrayViewMut3<'_, T>,
    output: ArrayViewMut3<'_, T>,
) {
    let (num, im, _) = c.dim();
    fill_bias(&layer.bias, &mut c);
    for th in tiles(0..im, tile) {
        for tw in tiles(0..im, tile) {
            for i in 0..num {
                for j in 0..num {
                    for h in th.clone() {
                        for w in tw.clone() {
                            c[[i, h, w]] = accumulate(&layer, c[[i, h, w]], i, j, h, w);
                        }
                    }
                }
            }
        }
    }
    relu(&mut c);
    max_pool(&c.view(), output);
}

fn parallel<T: Real>(
    layer: Layer<'_, T>,
    mut c: ArrayViewMut3<'_, T>,
    output: ArrayViewMut3<'_, T>,
) {
    let num = c.dim().0;
    parallel::for_each_lane(c.view_mut(), Axis(0), |i, mut plane| {
        plane.fill(layer.bias[i]);
        for j in 0..num {
            for ((h, w), value) in plane.indexed_iter_mut() {
                *value = accumulate(&layer, *value, i, j, h, w);
            }
        }
        plane.mapv_inplace(|v| max(T::zero(), v));
    });
    let c = c.view();
    parallel::for_each_lane(output, Axis(0), |i, mut plane| {
        for ((h, w), value) in plane.indexed_iter_mut() {
            *value = pool(&c, i, h, w);
        }
    });
}

pub fn run<T: Real>(
    schedule: Schedule,
    layer: Layer<'_, T>,
    output: ArrayViewMut3<'_, T>,
) -> Result<(), Error> {
    let num = layer.bias.len();
    let k = layer.weight.dim().2;
    let in_size = layer.input.dim().1;
    let im = (in_size + 1).saturating_sub(k);
    ensure_shape("weight", &layer.weight, &[num, num, k, k])?;
    ensure_shape("input", &layer.input, &[num, in_size, in_size])?;
    ensure_shape("output", &output, &[num, im / 2, im / 2])?;

    let mut scratch = Array3::<T>::zeros((num, im, im));
    let c = scratch.view_mut();
    match schedule {
        Schedule::Reference => reference(layer, c, output),
        Schedule::Interchanged => interchanged(layer, c, output),
        Schedule::Fused => fused(layer, c, output),
        Schedule::Tiled(tile) => tiled(tile, layer, c, output),
        Schedule::Parallel => parallel(layer, c, output),
        other @ Schedule::Distributed => return Err(crate::unsupported(NAME, other)),
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub input: Array3<T>,
    pub weight: Array4<T>,
    pub bias: Array1<T>,
    pub output: Array3<T>,
}

#[derive(Debug, Clone, Default)]
pub struct Cnn<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Cnn<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Cnn<T> {
    type State = State<T>;

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

    fn tolerance(&self) -> Tolerance {
        T::default_tolerance()
    }

    fn init(&self, init: &mut Init) -> State<T> {
        let num = self.dims.channels;
        let (k, in_size, out) = (
            self.dims.kernel,
            self.dims.in_im_size(),
            self.dims.out_im_size(),
        );
        State {
            input: init.array3((num, in_size, in_size)),
            weight: init.array4((num, num, k, k)),
            bias: init.array1(num),
            output: init.array3((num, out, out)),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        run(
            schedule,
            Layer {
                input: state.input.view(),
                weight: state.weight.view(),
                bias: state.bias.view(),
            },
            state.output.view_mut(),
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![Output::float("output", &state.output)]
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Cnn, Dims, Layer};
    use crate::testing::check_schedules;
    use ndarray::{array, Array3, Array4};
    use polyverify::{Error, Init, Schedule};

    #[test]
    fn single_channel_box_filter() -> Result<(), Error> {
        // 1x1 kernel, the layer reduces to relu(w * x + b) then pooling
        let input = array![[
            [1.0, -2.0, 3.0, 0.5],
            [0.0, 4.0, -1.0, 2.0],
            [-5.0, -6.0, -7.0, -8.0],
            [-1.0, -2.0, -3.0, -4.0]
        ]];
        let weight = Array4::from_elem((1, 1, 1, 1), 2.0);
        let mut output = Array3::zeros((1, 2, 2));
        run(
            Schedule::Reference,
            Layer {
                input: input.view(),
                weight: weight.view(),
                bias: array![1.0].view(),
            },
            output.view_mut(),
        )?;
        assert_eq!(output, array![[[9.0, 7.0], [0.0, 0.0]]]);
        Ok(())
    }

    #[test]
    fn relu_output_is_non_negative() -> Result<(), Error> {
        let dims = Dims {
            channels: 3,
            kernel: 3,
            im_size: 10,
        };
        let mut init = Init::new(4);
        let n = dims.in_im_size();
        let input = init.array3::<f64>((3, n, n));
        let weight = init.array4::<f64>((3, 3, 3, 3));
        let bias = init.array1::<f64>(3) - 2.0;
        for schedule in [Schedule::Reference, Schedule::Fused, Schedule::Parallel] {
            let mut output = Array3::from_elem((3, 5, 5), -1.0);
            run(
                schedule,
                Layer {
                    input: input.view(),
                    weight: weight.view(),
                    bias: bias.view(),
                },
                output.view_mut(),
            )?;
            assert!(output.iter().all(|&v| v >= 0.0), "{schedule}");
        }
        Ok(())
    }

    #[test]
    fn output_shape_follows_kernel() {
        let input = Array3::<f64>::zeros((2, 8, 8));
        let weight = Array4::<f64>::zeros((2, 2, 5, 5));
        let mut output = Array3::<f64>::zeros((2, 4, 4));
        let result = run(
            Schedule::Reference,
            Layer {
                input: input.view(),
                weight: weight.view(),
                bias: array![0.0, 0.0].view(),
            },
            output.view_mut(),
        );
        // 8 - 5 + 1 = 4 before pooling
        assert!(matches!(result, Err(Error::Shape { array: "output", .. })));
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(
            &Cnn::<f64>::new(Dims {
                channels: 3,
                kernel: 3,
                im_size: 18,
            }),
            5,
        )?;
        check_schedules(&Cnn::<f32>::new(Dims::SMALL), 2)?;
        Ok(())
    }
}
