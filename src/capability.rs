//! Per-engine tables of element types an operation does not support at a given engine version.

use std::{fmt, str::FromStr};

use derive_more::Display;
use rustc_hash::FxHashMap as HashMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result, unsupported},
    num::DataType,
};

/// A `major.minor.patch` engine version. Missing components parse as zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[display("{major}.{minor}.{patch}")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidArgument(format!("invalid version `{s}`"));
        let mut parts = [0u32; 3];
        for (index, part) in s.trim().split('.').enumerate() {
            let slot = parts.get_mut(index).ok_or_else(invalid)?;
            *slot = part.parse().map_err(|_| invalid())?;
        }
        let [major, minor, patch] = parts;
        Ok(Self::new(major, minor, patch))
    }
}

/// The versions a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VersionBound {
    AndBelow(Version),
    AndAbove(Version),
    Exact(Version),
}

impl VersionBound {
    pub fn contains(&self, version: Version) -> bool {
        match *self {
            VersionBound::AndBelow(bound) => version <= bound,
            VersionBound::AndAbove(bound) => version >= bound,
            VersionBound::Exact(bound) => version == bound,
        }
    }
}

impl fmt::Display for VersionBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionBound::AndBelow(version) => write!(f, "{version} and below"),
            VersionBound::AndAbove(version) => write!(f, "{version} and above"),
            VersionBound::Exact(version) => write!(f, "{version}"),
        }
    }
}

impl FromStr for VersionBound {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(version) = s.strip_suffix("and below") {
            return Ok(Self::AndBelow(version.parse()?));
        }
        if let Some(version) = s.strip_suffix("and above") {
            return Ok(Self::AndAbove(version.parse()?));
        }
        Ok(Self::Exact(s.parse()?))
    }
}

/// Expands a dtype name or one of the group names `complex` and `float`.
pub fn expand_dtype_name(name: &str) -> Result<Vec<DataType>> {
    match name {
        "complex" => Ok(DataType::ALL
            .into_iter()
            .filter(|r#type| r#type.is_complex())
            .collect()),
        "float" => Ok(DataType::ALL
            .into_iter()
            .filter(|r#type| r#type.is_float())
            .collect()),
        name => Ok(vec![name.parse()?]),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    bound: VersionBound,
    types: Vec<DataType>,
}

/// Operation name to the dtypes it excludes, per version range.
#[derive(Debug, Default, Clone)]
pub struct DtypeTable {
    rules: HashMap<String, Vec<Rule>>,
}

impl DtypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Excludes `types` from `operation` on versions within `bound`.
    pub fn unsupported(
        mut self,
        operation: impl Into<String>,
        bound: VersionBound,
        types: impl IntoIterator<Item = DataType>,
    ) -> Self {
        let types = types.into_iter().collect();
        self.rules
            .entry(operation.into())
            .or_default()
            .push(Rule { bound, types });
        self
    }

    /// Like [`DtypeTable::unsupported`], with the bound and dtypes written as names,
    /// e.g. `("2.9.1 and below", &["bfloat16", "complex"])`.
    pub fn unsupported_names(
        self,
        operation: impl Into<String>,
        bound: &str,
        names: &[&str],
    ) -> Result<Self> {
        let bound = bound.parse()?;
        let mut types = vec![];
        for name in names {
            types.extend(expand_dtype_name(name)?);
        }
        Ok(self.unsupported(operation, bound, types))
    }

    /// Whether `operation` supports `r#type` at `version`. Operations without rules support
    /// everything.
    pub fn supports(&self, r#type: DataType, operation: &str, version: Version) -> bool {
        self.rules.get(operation).is_none_or(|rules| {
            !rules
                .iter()
                .any(|rule| rule.bound.contains(version) && rule.types.contains(&r#type))
        })
    }

    /// Fails with [`Error::UnsupportedConfiguration`] if `r#type` is excluded.
    pub fn ensure_supported(&self, r#type: DataType, operation: &str, version: Version) -> Result<()> {
        if !self.supports(r#type, operation, version) {
            unsupported!(
                "{operation} does not support {} at version {version}",
                r#type
            );
        }
        Ok(())
    }

    /// Exclusions of a tensorflow-style backend.
    pub fn tensorflow() -> Self {
        use DataType::{BF16, Complex64, Complex128, F16, F64};
        let bound = VersionBound::AndBelow(Version::new(2, 9, 1));

        let table = [
            "conv1d",
            "conv1d_transpose",
            "conv2d",
            "conv2d_transpose",
            "depthwise_conv2d",
            "conv3d",
            "conv3d_transpose",
            "conv_general_dilated",
            "conv_general_transpose",
        ]
        .into_iter()
        .fold(Self::new(), |table, op| {
            table.unsupported(op, bound, [BF16, Complex64, Complex128])
        });

        table
            .unsupported("max_pool3d", bound, [BF16, F64, F16])
            .unsupported("avg_pool1d", bound, [BF16, F64])
            .unsupported("avg_pool2d", bound, [BF16, F64, F16])
            .unsupported("avg_pool3d", bound, [BF16, F64, F16])
    }

    /// Exclusions of a torch-style backend.
    pub fn torch() -> Self {
        use DataType::{BF16, Complex64, Complex128, F16};
        let bound = VersionBound::AndBelow(Version::new(1, 11, 0));
        Self::new()
            .unsupported("logit", bound, [F16])
            .unsupported("thresholded_relu", bound, [Complex64, Complex128, F16])
            .unsupported("relu6", bound, [BF16, F16])
            .unsupported("batch_norm", bound, [BF16, F16])
            .unsupported("median", bound, [F16])
            .unsupported("quantile", bound, [BF16, F16])
    }

    /// Exclusions of the torch frontend functions.
    pub fn torch_frontend() -> Self {
        use DataType::{BF16, F16};
        let bound = VersionBound::AndBelow(Version::new(1, 11, 0));
        Self::new().unsupported("interpolate", bound, [BF16, F16])
    }
}

/// Whether `operation` supports `r#type` on an engine at `version`, according to `table`.
#[inline]
pub fn supports(table: &DtypeTable, r#type: DataType, operation: &str, version: Version) -> bool {
    table.supports(r#type, operation, version)
}
