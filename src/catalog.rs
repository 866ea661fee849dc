//! Variables and the file-naming scheme of the input/output catalog.

use {
    crate::parameters::Paths,
    chrono::{Datelike, NaiveDate},
    std::{fmt, path::PathBuf},
};

/// The fixed set of exported variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    U850,
    Olr,
}

impl Variable {
    pub const ALL: [Variable; 2] = [Variable::U850, Variable::Olr];

    /// Lower-case name used in source file stems.
    pub fn name(self) -> &'static str {
        match self {
            Variable::U850 => "u850",
            Variable::Olr => "olr",
        }
    }

    /// Token used in the output artifact name.
    pub fn token(self) -> &'static str {
        match self {
            Variable::U850 => "U850",
            Variable::Olr => "OLRA",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds every path the pipeline touches from the configured roots.
#[derive(Debug, Clone)]
pub struct Catalog {
    paths: Paths,
}

impl Catalog {
    pub fn new(paths: &Paths) -> Self {
        Catalog {
            paths: paths.clone(),
        }
    }

    /// Daily-mean file for one init date and variable.
    pub fn daymean(&self, init: NaiveDate, var: Variable) -> PathBuf {
        self.paths
            .source_dir
            .join(format!("{}", init.year()))
            .join(format!("{}_{}.grd", init.format("%y%m%d"), var.name()))
    }

    /// Model climatology file keyed by the init's calendar month/day.
    pub fn model_clim(&self, init: NaiveDate, var: Variable) -> PathBuf {
        self.paths.model_clim_dir.join(var.name()).join(format!(
            "global_daily_2p5_{}_{}_1991_2020_3harm.grd",
            var.name(),
            init.format("%m%d"),
        ))
    }

    /// Observed 365-day climatology file for one variable.
    pub fn obs_clim(&self, var: Variable) -> PathBuf {
        self.paths
            .obs_clim_dir
            .join(format!("obs_{}_clim_2p5.grd", var.name()))
    }

    /// Output artifact for one reference date and variable.
    pub fn output(&self, refdate: NaiveDate, var: Variable) -> PathBuf {
        self.paths
            .output_dir
            .join(format!("{}", refdate.year()))
            .join(format!(
                "{}_CWBC_{}_BSISO",
                refdate.format("%Y%m%d"),
                var.token(),
            ))
    }

    /// Warning marker for one reference date and outcome kind.
    pub fn marker(&self, refdate: NaiveDate, kind: &str) -> PathBuf {
        self.paths
            .run_dir
            .join(format!("warning-{}-{}", refdate.format("%y%m%d"), kind))
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.paths.output_dir
    }
}
