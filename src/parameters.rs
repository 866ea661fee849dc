use {serde::Deserialize, std::path::PathBuf};

/// Run parameters
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Parameters {
    pub run: Run,
    pub grid: Grid,
    pub paths: Paths,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Run {
    /// Number of forecast initializations that must be accepted
    pub forecast_members: usize,
    /// Forecast lead days, covering valid dates T+1 to T+forecast_leads
    pub forecast_leads: usize,
    /// Length of the analysis window, valid dates T-(analysis_days-1) to T
    pub analysis_days: usize,
    /// Maximum lead usable to supply an analysis valid date
    pub analysis_lead_max: usize,
    /// Oldest forecast init candidate, T-max_forecast_delay
    pub max_forecast_delay: usize,
}

impl Default for Run {
    fn default() -> Self {
        Run {
            forecast_members: 3,
            forecast_leads: 40,
            analysis_days: 120,
            analysis_lead_max: 3,
            max_forecast_delay: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Grid {
    /// Western longitude bound in degrees east
    pub lon_west: f64,
    /// Eastern longitude bound in degrees east
    pub lon_east: f64,
    /// Southern latitude bound in degrees north
    pub lat_south: f64,
    /// Northern latitude bound in degrees north
    pub lat_north: f64,
    /// Grid spacing in degrees, identical in both directions
    pub resolution: f64,
}

impl Default for Grid {
    fn default() -> Self {
        Grid {
            lon_west: 40.0,
            lon_east: 160.0,
            lat_south: -10.0,
            lat_north: 40.0,
            resolution: 2.5,
        }
    }
}

impl Grid {
    /// Number of longitude points.
    pub fn nx(&self) -> usize {
        ((self.lon_east - self.lon_west) / self.resolution).round() as usize + 1
    }

    /// Number of latitude points.
    pub fn ny(&self) -> usize {
        ((self.lat_north - self.lat_south) / self.resolution).round() as usize + 1
    }

    pub fn lat_range(&self) -> (f64, f64) {
        (self.lat_south, self.lat_north)
    }

    pub fn lon_range(&self) -> (f64, f64) {
        (self.lon_west, self.lon_east)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Paths {
    /// Per-init daily-mean grid files, one per variable
    pub source_dir: PathBuf,
    /// Model climatology files keyed by calendar month/day
    pub model_clim_dir: PathBuf,
    /// Observed 365-day climatology files
    pub obs_clim_dir: PathBuf,
    /// ASCII output artifacts, one year directory per year
    pub output_dir: PathBuf,
    /// Run logs and warning markers
    pub run_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Paths {
            source_dir: PathBuf::from("data/daymean"),
            model_clim_dir: PathBuf::from("data/clim_mod"),
            obs_clim_dir: PathBuf::from("data/clim_obs"),
            output_dir: PathBuf::from("data/output"),
            run_dir: PathBuf::from("."),
        }
    }
}
