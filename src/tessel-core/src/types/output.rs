//! Declared output kinds of logical and chunk nodes.

use std::fmt;
use std::str::FromStr;

use common_error::TesselError;
use serde::{Deserialize, Serialize};

/// Kind of value a node produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    /// Opaque object; the default for user functions.
    #[default]
    Object,
    /// Scalar value.
    Scalar,
    /// N-dimensional tensor.
    Tensor,
    /// Two-axis table.
    DataFrame,
    /// Single named column.
    Series,
    /// Row labels.
    Index,
    /// Either a dataframe or a series, resolved at execution time.
    DfOrSeries,
}

impl OutputType {
    /// Distributed kinds whose full extent is too large to fetch by default.
    pub fn is_distributed(self) -> bool {
        matches!(
            self,
            Self::Tensor | Self::DataFrame | Self::Series | Self::Index
        )
    }

    /// Number of axes a single black-box chunk of this kind carries.
    ///
    /// Tensors are tiled as opaque blocks because their rank is unknown
    /// before execution.
    pub fn chunk_ndim(self) -> usize {
        match self {
            Self::DataFrame | Self::DfOrSeries => 2,
            Self::Series | Self::Index => 1,
            Self::Tensor | Self::Scalar | Self::Object => 0,
        }
    }

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Scalar => "scalar",
            Self::Tensor => "tensor",
            Self::DataFrame => "dataframe",
            Self::Series => "series",
            Self::Index => "index",
            Self::DfOrSeries => "df_or_series",
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputType {
    type Err = TesselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "object" => Ok(Self::Object),
            "scalar" => Ok(Self::Scalar),
            "tensor" => Ok(Self::Tensor),
            "dataframe" => Ok(Self::DataFrame),
            "series" => Ok(Self::Series),
            "index" => Ok(Self::Index),
            "df_or_series" => Ok(Self::DfOrSeries),
            other => Err(TesselError::value_error(format!(
                "unknown output type: {other}"
            ))),
        }
    }
}
