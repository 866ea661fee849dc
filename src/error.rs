//! Fatal run-abort conditions.
//!
//! Degradations are not errors: they are skip outcomes absorbed by the
//! quality flag. Everything here aborts the remaining pipeline the moment
//! it is raised.

use {
    crate::{catalog::Variable, store::StoreError},
    chrono::NaiveDate,
    std::path::PathBuf,
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum FatalError {
    /// No lead within the allowed range supplies this analysis valid date.
    #[error("missing file: analysis, valid={valid}, lead_max={lead_max}")]
    MissingAnalysis { valid: NaiveDate, lead_max: usize },

    /// The candidate window closed before enough forecast inits were accepted.
    #[error("insufficient forecast inits: accepted {accepted} of {required}")]
    InsufficientForecast { accepted: usize, required: usize },

    #[error("file missing: obs clim {var}")]
    ObsClimMissing { var: Variable },

    /// Wrong day count or spatial extent smaller than the configured grid.
    #[error("wrong file dimension: obs clim {var}, shape ({nday}, {nlat}, {nlon})")]
    ObsClimDimension {
        var: Variable,
        nday: usize,
        nlat: usize,
        nlon: usize,
    },

    #[error("file missing: model clim {files}")]
    ModelClimMissing { files: String },

    #[error("lead too short: model clim {files}")]
    ModelClimLeadShort { files: String },

    /// A range read produced a different extent than the configured grid.
    #[error("dimension mismatch: {path:?} read ({nlat}, {nlon}), grid is ({ny}, {nx})")]
    GridMismatch {
        path: PathBuf,
        nlat: usize,
        nlon: usize,
        ny: usize,
        nx: usize,
    },

    /// A corrected array still holds sentinel or non-finite cells.
    #[error("unfilled cells after computing {what}")]
    UnfilledCells { what: &'static str },

    #[error("no writing permission for output dir {path:?}")]
    OutputNotWritable { path: PathBuf },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("i/o error writing {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
