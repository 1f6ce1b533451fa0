use indexmap::IndexMap;
use polyverify::{DType, DynKernel, Error, Real};
use std::sync::Arc;

/// Kernels by name, in registration order.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    kernels: IndexMap<&'static str, Arc<dyn DynKernel>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default kernels with floating point arrays of `dtype`.
    #[must_use]
    pub fn for_dtype(dtype: DType) -> Self {
        match dtype {
            DType::F32 => Self::with_default_kernels::<f32>(),
            DType::F64 => Self::with_default_kernels::<f64>(),
        }
    }

    /// Every kernel family at its default shape.
    ///
    /// The CNN layer is registered at [`crate::cnn::Dims::SMALL`], the full
    /// 256 channel layer is too slow for repeated trials.
    #[must_use]
    pub fn with_default_kernels<T>() -> Self
    where
        T: Real + Default,
    {
        use crate::*;
        let mut registry = Self::new();
        // linear algebra
        registry.register(atax::Atax::<T>::default());
        registry.register(bicg::Bicg::<T>::default());
        registry.register(gesummv::Gesummv::<T>::default());
        registry.register(mvt::Mvt::<T>::default());
        registry.register(gemm::Gemm::<T>::default());
        registry.register(two_mm::TwoMm::<T>::default());
        registry.register(three_mm::ThreeMm::<T>::default());
        registry.register(gemver::Gemver::<T>::default());
        registry.register(syrk::Syrk::<T>::default());
        registry.register(syr2k::Syr2k::<T>::default());
        registry.register(symm::Symm::<T>::default());
        registry.register(trmm::Trmm::<T>::default());
        registry.register(doitgen::Doitgen::<T>::default());

        // data mining
        registry.register(covariance::Covariance::<T>::default());
        registry.register(correlation::Correlation::<T>::default());

        // stencils
        registry.register(seidel_2d::Seidel2d::<T>::default());
        registry.register(jacobi_1d::Jacobi1d::<T>::default());
        registry.register(jacobi_2d::Jacobi2d::<T>::default());
        registry.register(heat_3d::Heat3d::<T>::default());
        registry.register(fdtd_2d::Fdtd2d::<T>::default());
        registry.register(adi::Adi::<T>::default());
        registry.register(stencil2d::Stencil2d::default());
        registry.register(stencil3d::Stencil3d::default());

        // machsuite
        registry.register(spmv::SpmvCrs::<T>::default());
        registry.register(spmv::SpmvEllpack::<T>::default());
        registry.register(md::Md::<T>::default());
        registry.register(nw::Nw::default());
        registry.register(aes::Aes::default());
        registry.register(cnn::Cnn::<T>::new(cnn::Dims::SMALL));
        registry
    }

    /// Adds `kernel`, replacing any kernel registered under the same name.
    pub fn register<K>(&mut self, kernel: K) -> &mut Self
    where
        K: DynKernel + 'static,
    {
        let name = kernel.name();
        if self.kernels.insert(name, Arc::new(kernel)).is_some() {
            log::warn!("replaced kernel {name:?}");
        }
        self
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn DynKernel>, Error> {
        let name = name.trim().to_lowercase();
        self.kernels
            .get(name.as_str())
            .ok_or(Error::UnknownKernel(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kernels.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn DynKernel>> + '_ {
        self.kernels.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use polyverify::{DType, Error, Schedule};

    #[test]
    fn dtype_registries_have_the_same_kernels() {
        let single: Vec<_> = Registry::for_dtype(DType::F32).names().collect();
        let double: Vec<_> = Registry::for_dtype(DType::F64).names().collect();
        assert_eq!(single, double);
    }

    #[test]
    fn default_kernels_are_registered() -> Result<(), Error> {
        let registry = Registry::with_default_kernels::<f64>();
        assert_eq!(registry.len(), 29);
        for name in [
            "atax", "bicg", "3mm", "2mm", "seidel-2d", "fdtd-2d", "spmv-crs", "spmv-ellpack",
            "md", "nw", "aes", "cnn", "stencil2d", "stencil3d",
        ] {
            assert_eq!(registry.get(name)?.name(), name);
        }
        assert!(registry.contains(" ATAX "));
        Ok(())
    }

    #[test]
    fn every_kernel_offers_its_reference() {
        let registry = Registry::with_default_kernels::<f32>();
        for kernel in registry.iter() {
            assert!(
                kernel.schedules().contains(&Schedule::Reference),
                "{kernel:?} has no reference schedule"
            );
        }
    }

    #[test]
    fn unknown_kernel_is_reported() {
        let registry = Registry::with_default_kernels::<f64>();
        assert!(matches!(
            registry.get("lu"),
            Err(Error::UnknownKernel(name)) if name == "lu"
        ));
    }

    #[test]
    fn register_replaces_by_name() {
        let mut registry = Registry::new();
        assert!(registry.is_empty());
        registry
            .register(crate::aes::Aes::default())
            .register(crate::aes::Aes::new(crate::aes::Dims { blocks: 4 }));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["aes"]);
    }
}
