//! MachSuite molecular dynamics: Lennard-Jones forces over a k-nearest
//! neighbor list.
//!
//! ```text
//! r2inv     = 1 / |p_i - p_j|^2
//! r6inv     = r2inv^3
//! potential = r6inv (1.5 r6inv - 2)
//! f_i      += (p_i - p_j) r2inv potential    for every neighbor j of i
//! ```
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1};
use polyverify::{
    cast, parallel, shape::ensure_shape, tiles, Error, Init, Kernel, Output, Real, Schedule,
    Tolerance, DEFAULT_TILE,
};
use std::marker::PhantomData;

pub const NAME: &str = "md";

/// Edge of the cube the atoms are scattered in.
pub const DOMAIN_EDGE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub atoms: usize,
    pub neighbors: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self {
            atoms: 256,
            neighbors: 16,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Positions<'a, T> {
    pub x: ArrayView1<'a, T>,
    pub y: ArrayView1<'a, T>,
    pub z: ArrayView1<'a, T>,
}

pub struct Forces<'a, T> {
    pub x: ArrayViewMut1<'a, T>,
    pub y: ArrayViewMut1<'a, T>,
    pub z: ArrayViewMut1<'a, T>,
}

/// Contribution of neighbor `j` to the force on atom `i`.
#[inline]
fn pair<T: Real>(p: &Positions<'_, T>, i: usize, j: usize) -> [T; 3] {
    let delx = p.x[i] - p.x[j];
    let dely = p.y[i] - p.y[j];
    let delz = p.z[i] - p.z[j];
    let r2inv = T::one() / (delx * delx + dely * dely + delz * delz);
    let r6inv = r2inv * r2inv * r2inv;
    let potential = r6inv * (cast::<T>(1.5) * r6inv - cast(2.0));
    let force = r2inv * potential;
    [delx * force, dely * force, delz * force]
}

#[inline]
fn atom<T: Real>(p: &Positions<'_, T>, neighbors: &ArrayView2<'_, usize>, i: usize) -> [T; 3] {
    let mut f = [T::zero(); 3];
    for &j in neighbors.row(i) {
        let [fx, fy, fz] = pair(p, i, j);
        f[0] += fx;
        f[1] += fy;
        f[2] += fz;
    }
    f
}

/// Checks that every neighbor index names an atom.
pub fn validate_neighbors(neighbors: &ArrayView2<'_, usize>, atoms: usize) -> Result<(), Error> {
    match neighbors.indexed_iter().find(|(_, index)| **index >= atoms) {
        Some(((atom, neighbor), &index)) => Err(Error::Neighbor {
            atom,
            neighbor,
            index,
            atoms,
        }),
        None => Ok(()),
    }
}

pub fn reference<T: Real>(
    p: Positions<'_, T>,
    neighbors: ArrayView2<'_, usize>,
    f: Forces<'_, T>,
) {
    let Forces {
        x: mut force_x,
        y: mut force_y,
        z: mut force_z,
    } = f;
    for i in 0..p.x.len() {
        let [fx, fy, fz] = atom(&p, &neighbors, i);
        force_x[i] = fx;
        force_y[i] = fy;
        force_z[i] = fz;
    }
}

/// Zeroed accumulators, then the neighbor loop, then a copy out.
fn distributed<T: Real>(
    p: Positions<'_, T>,
    neighbors: ArrayView2<'_, usize>,
    mut f: Forces<'_, T>,
) {
    let atoms = p.x.len();
    let mut fx = Array1::<T>::zeros(atoms);
    let mut fy = Array1::<T>::zeros(atoms);
    let mut fz = Array1::<T>::zeros(atoms);
    for i in 0..atoms {
        for &j in neighbors.row(i) {
            let [dx, dy, dz] = pair(&p, i, j);
            fx[i] += dx;
            fy[i] += dy;
            fz[i] += dz;
        }
    }
    f.x.assign(&fx);
    f.y.assign(&fy);
    f.z.assign(&fz);
}

/// Neighbor slot outermost, atoms innermost.
fn interchanged<T: Real>(
    p: Positions<'_, T>,
    neighbors: ArrayView2<'_, usize>,
    mut f: Forces<'_, T>,
) {
    let (atoms, k) = neighbors.dim();
    f.x.fill(T::zero());
    f.y.fill(T::zero());
    f.z.fill(T::zero());
    for slot in 0..k {
        for i in 0..atoms {
            let [dx, dy, dz] = pair(&p, i, neighbors[[i, slot]]);
            f.x[i] += dx;
            f.y[i] += dy;
            f.z[i] += dz;
        }
    }
}

fn tiled<T: Real>(
    tile: usize,
    p: Positions<'_, T>,
    neighbors: ArrayView2<'_, usize>,
    mut f: Forces<'_, T>,
) {
    for ti in tiles(0..p.x.len(), tile) {
        for i in ti {
            let [fx, fy, fz] = atom(&p, &neighbors, i);
            f.x[i] = fx;
            f.y[i] = fy;
            f.z[i] = fz;
        }
    }
}

fn parallel<T: Real>(
    p: Positions<'_, T>,
    neighbors: ArrayView2<'_, usize>,
    mut f: Forces<'_, T>,
) {
    let forces = parallel::map_range(p.x.len(), |i| atom(&p, &neighbors, i));
    for (i, [fx, fy, fz]) in forces.into_iter().enumerate() {
        f.x[i] = fx;
        f.y[i] = fy;
        f.z[i] = fz;
    }
}

pub fn run<T: Real>(
    schedule: Schedule,
    positions: Positions<'_, T>,
    neighbors: ArrayView2<'_, usize>,
    forces: Forces<'_, T>,
) -> Result<(), Error> {
    let atoms = positions.x.len();
    ensure_shape("position_y", &positions.y, &[atoms])?;
    ensure_shape("position_z", &positions.z, &[atoms])?;
    ensure_shape("NL", &neighbors, &[atoms, neighbors.ncols()])?;
    ensure_shape("force_x", &forces.x, &[atoms])?;
    ensure_shape("force_y", &forces.y, &[atoms])?;
    ensure_shape("force_z", &forces.z, &[atoms])?;
    validate_neighbors(&neighbors, atoms)?;
    match schedule {
        Schedule::Reference => reference(positions, neighbors, forces),
        Schedule::Distributed => distributed(positions, neighbors, forces),
        Schedule::Interchanged => interchanged(positions, neighbors, forces),
        Schedule::Tiled(tile) => tiled(tile, positions, neighbors, forces),
        Schedule::Parallel => parallel(positions, neighbors, forces),
        other @ Schedule::Fused => return Err(crate::unsupported(NAME, other)),
    }
    Ok(())
}

/// The `k` nearest other atoms of every atom, closest first.
pub fn nearest_neighbors<T: Real>(positions: Positions<'_, T>, k: usize) -> Array2<usize> {
    let atoms = positions.x.len();
    let k = k.min(atoms.saturating_sub(1));
    let mut neighbors = Array2::zeros((atoms, k));
    for i in 0..atoms {
        let mut others: Vec<(T, usize)> = (0..atoms)
            .filter(|&j| j != i)
            .map(|j| {
                let dx = positions.x[i] - positions.x[j];
                let dy = positions.y[i] - positions.y[j];
                let dz = positions.z[i] - positions.z[j];
                (dx * dx + dy * dy + dz * dz, j)
            })
            .collect();
        others.sort_by(|a, b| {
            let by_distance = a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal);
            by_distance.then(a.1.cmp(&b.1))
        });
        for (slot, (_, j)) in others.into_iter().take(k).enumerate() {
            neighbors[[i, slot]] = j;
        }
    }
    neighbors
}

#[derive(Debug, Clone)]
pub struct State<T> {
    pub position_x: Array1<T>,
    pub position_y: Array1<T>,
    pub position_z: Array1<T>,
    pub neighbors: Array2<usize>,
    pub force_x: Array1<T>,
    pub force_y: Array1<T>,
    pub force_z: Array1<T>,
}

impl<T: Real> State<T> {
    fn positions(&self) -> Positions<'_, T> {
        Positions {
            x: self.position_x.view(),
            y: self.position_y.view(),
            z: self.position_z.view(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Md<T> {
    pub dims: Dims,
    phantom: PhantomData<T>,
}

impl<T> Md<T> {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            phantom: PhantomData,
        }
    }
}

impl<T: Real> Kernel for Md<T> {
    type State = State<T>;

    fn name(&self) -> &'static str {
        NAME
    }

    fn schedules(&self) -> Vec<Schedule> {
        vec![
            Schedule::Reference,
            Schedule::Distributed,
            Schedule::Interchanged,
            Schedule::Tiled(DEFAULT_TILE),
            Schedule::Parallel,
        ]
    }

    // positions are physical coordinates, rescaling them only moves the
    // forces into overflow
    fn scales(&self) -> &'static [f64] {
        &[1.0]
    }

    fn tolerance(&self) -> Tolerance {
        T::default_tolerance()
    }

    fn init(&self, init: &mut Init) -> State<T> {
        let Dims { atoms, neighbors } = self.dims;
        let mut coordinate =
            || Array1::from_shape_simple_fn(atoms, || init.uniform(0.0, DOMAIN_EDGE));
        let (position_x, position_y, position_z) = (coordinate(), coordinate(), coordinate());
        let mut state = State {
            position_x,
            position_y,
            position_z,
            neighbors: Array2::zeros((0, 0)),
            force_x: init.array1(atoms),
            force_y: init.array1(atoms),
            force_z: init.array1(atoms),
        };
        state.neighbors = nearest_neighbors(state.positions(), neighbors);
        state
    }

    fn run(&self, schedule: Schedule, state: &mut State<T>) -> Result<(), Error> {
        let State {
            position_x,
            position_y,
            position_z,
            neighbors,
            force_x,
            force_y,
            force_z,
        } = state;
        run(
            schedule,
            Positions {
                x: position_x.view(),
                y: position_y.view(),
                z: position_z.view(),
            },
            neighbors.view(),
            Forces {
                x: force_x.view_mut(),
                y: force_y.view_mut(),
                z: force_z.view_mut(),
            },
        )
    }

    fn outputs(&self, state: &State<T>) -> Vec<Output> {
        vec![
            Output::float("force_x", &state.force_x),
            Output::float("force_y", &state.force_y),
            Output::float("force_z", &state.force_z),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{nearest_neighbors, run, Dims, Forces, Md, Positions};
    use crate::testing::check_schedules;
    use ndarray::{array, Array1};
    use polyverify::{Error, Schedule};

    fn forces(
        schedule: Schedule,
        x: &Array1<f64>,
        neighbors: &ndarray::Array2<usize>,
    ) -> Result<Array1<f64>, Error> {
        let zeros = Array1::<f64>::zeros(x.len());
        let mut fx = Array1::from_elem(x.len(), 7.0);
        let mut fy = fx.clone();
        let mut fz = fx.clone();
        run(
            schedule,
            Positions {
                x: x.view(),
                y: zeros.view(),
                z: zeros.view(),
            },
            neighbors.view(),
            Forces {
                x: fx.view_mut(),
                y: fy.view_mut(),
                z: fz.view_mut(),
            },
        )?;
        assert!(fy.iter().chain(fz.iter()).all(|&f| f == 0.0));
        Ok(fx)
    }

    #[test]
    fn pair_at_unit_distance() -> Result<(), Error> {
        // r2inv = r6inv = 1, potential = -0.5, force = -0.5
        let x = array![0.0, 1.0];
        let fx = forces(Schedule::Reference, &x, &array![[1], [0]])?;
        assert_eq!(fx, array![0.5, -0.5]);
        Ok(())
    }

    #[test]
    fn forces_are_antisymmetric() -> Result<(), Error> {
        let x = array![0.0, 1.3, 2.9];
        let neighbors = nearest_neighbors(
            Positions {
                x: x.view(),
                y: Array1::zeros(3).view(),
                z: Array1::zeros(3).view(),
            },
            2,
        );
        assert_eq!(neighbors, array![[1, 2], [0, 2], [1, 0]]);
        let fx = forces(Schedule::Parallel, &x, &neighbors)?;
        approx::assert_abs_diff_eq!(fx.sum(), 0.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn out_of_range_neighbor_is_rejected() {
        let x = array![0.0, 1.0];
        let result = forces(Schedule::Reference, &x, &array![[1], [2]]);
        assert!(matches!(
            result,
            Err(Error::Neighbor {
                atom: 1,
                neighbor: 0,
                index: 2,
                atoms: 2
            })
        ));
    }

    #[test]
    fn schedules_match_reference() -> Result<(), Error> {
        check_schedules(
            &Md::<f64>::new(Dims {
                atoms: 40,
                neighbors: 6,
            }),
            10,
        )?;
        check_schedules(&Md::<f32>::default(), 3)?;
        Ok(())
    }
}
