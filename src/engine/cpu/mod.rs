use super::{Capabilities, ConvSpec, Engine, PadMode, ReduceWindowSpec};
use crate::{
    array::Array,
    capability::{DtypeTable, Version},
    error::{Result, unsupported},
    num::{Float, Scalar},
};

pub mod conv;
pub mod matmul;
pub mod pad;
pub mod sort;
pub mod window;

/// The reference engine: direct loops over contiguous arrays.
#[derive(Debug, Clone)]
pub struct Cpu {
    name: String,
    capabilities: Capabilities,
}

impl Engine for Cpu {
    #[inline]
    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn pad<T: Scalar>(
        &self,
        x: &Array<T>,
        pads: &[(usize, usize)],
        mode: PadMode<T>,
    ) -> Result<Array<T>> {
        log::trace!("{}: pad {} by {pads:?}", self.name, x.layout());
        pad::pad(x, pads, mode)
    }

    fn reduce_window<T: Float>(&self, x: &Array<T>, spec: &ReduceWindowSpec) -> Result<Array<T>> {
        log::trace!("{}: reduce_window {} with {spec:?}", self.name, x.layout());
        self.check_dilation(&spec.dilation)?;
        window::reduce_window(x, spec)
    }

    fn conv<T: Float>(
        &self,
        x: &Array<T>,
        filters: &Array<T>,
        spec: &ConvSpec,
    ) -> Result<Array<T>> {
        log::trace!(
            "{}: conv {} with filters {} and {spec:?}",
            self.name,
            x.layout(),
            filters.layout()
        );
        self.check_dilation(&spec.dilation)?;
        conv::conv(x, filters, spec)
    }

    fn matmul<T: Float>(&self, lhs: &Array<T>, rhs: &Array<T>) -> Result<Array<T>> {
        log::trace!("{}: matmul {} x {}", self.name, lhs.layout(), rhs.layout());
        matmul::matmul(lhs, rhs)
    }

    fn argsort<T: Scalar>(&self, x: &Array<T>, axis: usize) -> Result<Array<i64>> {
        log::trace!("{}: argsort {} along {axis}", self.name, x.layout());
        sort::argsort(x, axis)
    }
}

impl Cpu {
    fn check_dilation(&self, dilation: &[usize]) -> Result<()> {
        if !self.capabilities.native_dilation && dilation.iter().any(|&d| d > 1) {
            unsupported!("engine `{}` has no native dilation", self.name);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CpuBuilder {
    pub name: String,
    pub version: Version,
    pub dtypes: DtypeTable,
    pub native_dilation: bool,
}

impl Default for CpuBuilder {
    fn default() -> Self {
        Self {
            name: "cpu".into(),
            version: Version::default(),
            dtypes: DtypeTable::default(),
            native_dilation: true,
        }
    }
}

impl CpuBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> Cpu {
        let capabilities = Capabilities {
            version: self.version,
            native_dilation: self.native_dilation,
            dtypes: self.dtypes,
        };
        log::debug!("built engine `{}` at version {}", self.name, self.version);
        Cpu {
            name: self.name,
            capabilities,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_dtypes(mut self, dtypes: DtypeTable) -> Self {
        self.dtypes = dtypes;
        self
    }

    /// Makes kernel dilation an [`UnsupportedConfiguration`](crate::Error::UnsupportedConfiguration).
    pub fn without_native_dilation(mut self) -> Self {
        self.native_dilation = false;
        self
    }
}

/// Evaluates `f` at every output offset, in parallel with `rayon`.
pub(crate) fn generate<T, F>(len: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Send + Sync,
{
    #[cfg(not(feature = "rayon"))]
    let output = (0..len).map(f).collect();
    #[cfg(feature = "rayon")]
    let output = {
        use rayon::prelude::*;
        (0..len).into_par_iter().map(f).collect()
    };
    output
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::CpuBuilder;
    use crate::{
        array::Array,
        capability::{DtypeTable, Version},
        engine::{ConvSpec, Engine, ReduceKind, ReduceWindowSpec},
        error::Error as WeftError,
        num::DataType,
    };

    #[test]
    fn test_builder() {
        let cpu = CpuBuilder::new()
            .with_version(Version::new(1, 11, 0))
            .with_dtypes(DtypeTable::torch())
            .build();
        assert_eq!(cpu.name(), "cpu");
        assert!(cpu.capabilities().native_dilation);
        assert!(!cpu.supports(DataType::F16, "relu6"));
        assert!(cpu.supports(DataType::F32, "relu6"));

        let cpu = CpuBuilder::new()
            .with_dtypes(DtypeTable::torch())
            .with_version(Version::new(2, 0, 0))
            .build();
        assert!(cpu.supports(DataType::F16, "relu6"));
    }

    #[test]
    fn test_without_native_dilation() -> Result<(), Box<dyn Error>> {
        let cpu = CpuBuilder::new().without_native_dilation().build();
        let x = Array::<f32>::ones([1, 5, 1]);

        let spec = ReduceWindowSpec {
            window: vec![2],
            strides: vec![1],
            dilation: vec![2],
            reduce: ReduceKind::Sum,
        };
        let err = cpu.reduce_window(&x, &spec).unwrap_err();
        assert!(matches!(err, WeftError::UnsupportedConfiguration(_)));

        let filters = Array::<f32>::ones([2, 1, 1]);
        let spec = ConvSpec {
            strides: vec![1],
            dilation: vec![1],
            groups: 1,
        };
        let y = cpu.conv(&x, &filters, &spec)?;
        assert_eq!(y.data(), &[2.0; 4]);
        Ok(())
    }
}
