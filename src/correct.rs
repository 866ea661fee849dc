//! Bias-correction engine.
//!
//! For one variable, turns the resolver's init/lead assignments into the
//! corrected analysis and forecast arrays:
//!
//! ```text
//! corrected = raw - model_clim + obs_clim[day-of-year]
//! ```
//!
//! applied per grid cell, with the observed climatology expanded from 365
//! to 366 days so every valid date indexes it through the leap-adjusted
//! day of year. Buffers start NaN-filled; a populated artifact is verified
//! sentinel-free before it is handed to the writer.

use {
    crate::{
        calendar::day_of_year_366,
        catalog::{Catalog, Variable},
        error::FatalError,
        parameters::Parameters,
        resolve::Resolution,
        store::GridStore,
    },
    chrono::NaiveDate,
    log::info,
    ndarray::{Array2, Array3, Array4, Axis},
    std::path::Path,
};

/// Corrected output for one variable: analysis grids then per-member
/// forecast grids.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// (analysis_days, ny, nx)
    pub analysis: Array3<f64>,
    /// (members, forecast_leads, ny, nx)
    pub forecast: Array4<f64>,
}

pub fn correct<S: GridStore>(
    params: &Parameters,
    catalog: &Catalog,
    store: &S,
    refdate: NaiveDate,
    resolution: &Resolution,
    var: Variable,
) -> Result<Artifact, FatalError> {
    info!("  reading obs clim");
    let obs_clim = read_obs_clim_366(params, store, &catalog.obs_clim(var))?;

    let analysis = correct_analysis(params, catalog, store, resolution, var, &obs_clim)?;
    let forecast = correct_forecast(params, catalog, store, refdate, resolution, var, &obs_clim)?;

    if analysis.iter().any(|v| !v.is_finite()) {
        return Err(FatalError::UnfilledCells { what: "analysis" });
    }
    if forecast.iter().any(|v| !v.is_finite()) {
        return Err(FatalError::UnfilledCells { what: "forecast" });
    }

    Ok(Artifact { analysis, forecast })
}

/// Reads the 365-day observed climatology over the configured domain and
/// inserts a 366th day after Feb 28 as the mean of its two calendar
/// neighbours, so leap and non-leap valid dates index one array.
fn read_obs_clim_366<S: GridStore>(
    params: &Parameters,
    store: &S,
    path: &Path,
) -> Result<Array3<f64>, FatalError> {
    let days365 = store.read_leads(path, 0..365, params.grid.lat_range(), params.grid.lon_range())?;
    check_grid(params, path, &days365)?;

    let (ny, nx) = (params.grid.ny(), params.grid.nx());
    // 0-based index of Feb 28 (day 59) and Mar 1 (day 60 in the 365-day file)
    let feb28 = 58;
    let mar01 = 59;

    let mut days366 = Array3::from_elem((366, ny, nx), f64::NAN);
    for day in 0..=feb28 {
        days366
            .index_axis_mut(Axis(0), day)
            .assign(&days365.index_axis(Axis(0), day));
    }
    let leap_day =
        (&days365.index_axis(Axis(0), feb28) + &days365.index_axis(Axis(0), mar01)) * 0.5;
    days366.index_axis_mut(Axis(0), mar01).assign(&leap_day);
    for day in mar01..365 {
        days366
            .index_axis_mut(Axis(0), day + 1)
            .assign(&days365.index_axis(Axis(0), day));
    }

    Ok(days366)
}

fn correct_analysis<S: GridStore>(
    params: &Parameters,
    catalog: &Catalog,
    store: &S,
    resolution: &Resolution,
    var: Variable,
    obs_clim: &Array3<f64>,
) -> Result<Array3<f64>, FatalError> {
    let (ny, nx) = (params.grid.ny(), params.grid.nx());
    let mut analysis = Array3::from_elem((resolution.analysis.len(), ny, nx), f64::NAN);

    info!("  reading analysis - model clim");
    info!("  reading analysis - raw");
    for (i, slot) in resolution.analysis.iter().enumerate() {
        let model_clim = read_one_lead(params, store, &catalog.model_clim(slot.init, var), slot.lead - 1)?;
        let raw = read_one_lead(params, store, &catalog.daymean(slot.init, var), slot.lead - 1)?;
        let obs = obs_clim.index_axis(Axis(0), day_of_year_366(slot.valid) - 1);

        let corrected = &raw - &model_clim + &obs;
        analysis.index_axis_mut(Axis(0), i).assign(&corrected);
    }

    Ok(analysis)
}

fn correct_forecast<S: GridStore>(
    params: &Parameters,
    catalog: &Catalog,
    store: &S,
    refdate: NaiveDate,
    resolution: &Resolution,
    var: Variable,
    obs_clim: &Array3<f64>,
) -> Result<Array4<f64>, FatalError> {
    let (ny, nx) = (params.grid.ny(), params.grid.nx());
    let leads = params.run.forecast_leads;
    let valid_dates = Resolution::forecast_valid_dates(refdate, leads);
    let mut forecast =
        Array4::from_elem((resolution.forecast_inits.len(), leads, ny, nx), f64::NAN);

    info!("  reading forecast - model clim");
    info!("  reading forecast - raw");
    for (m, &init) in resolution.forecast_inits.iter().enumerate() {
        // lead indices are offset by how far this init trails the reference date
        let delta = (refdate - init).num_days() as usize;
        let range = delta..delta + leads;

        let model_clim = read_lead_range(params, store, &catalog.model_clim(init, var), range.clone())?;
        let raw = read_lead_range(params, store, &catalog.daymean(init, var), range)?;

        for (l, &valid) in valid_dates.iter().enumerate() {
            let obs = obs_clim.index_axis(Axis(0), day_of_year_366(valid) - 1);
            let corrected =
                &raw.index_axis(Axis(0), l) - &model_clim.index_axis(Axis(0), l) + &obs;
            forecast
                .index_axis_mut(Axis(0), m)
                .index_axis_mut(Axis(0), l)
                .assign(&corrected);
        }
    }

    Ok(forecast)
}

fn read_one_lead<S: GridStore>(
    params: &Parameters,
    store: &S,
    path: &Path,
    lead_index: usize,
) -> Result<Array2<f64>, FatalError> {
    let block = read_lead_range(params, store, path, lead_index..lead_index + 1)?;
    Ok(block.index_axis(Axis(0), 0).to_owned())
}

fn read_lead_range<S: GridStore>(
    params: &Parameters,
    store: &S,
    path: &Path,
    range: std::ops::Range<usize>,
) -> Result<Array3<f64>, FatalError> {
    let block = store.read_leads(path, range, params.grid.lat_range(), params.grid.lon_range())?;
    check_grid(params, path, &block)?;
    Ok(block)
}

/// The spatial extent of every read must equal the configured grid.
fn check_grid(params: &Parameters, path: &Path, block: &Array3<f64>) -> Result<(), FatalError> {
    let (_, nlat, nlon) = block.dim();
    let (ny, nx) = (params.grid.ny(), params.grid.nx());
    if nlat != ny || nlon != nx {
        return Err(FatalError::GridMismatch {
            path: path.to_path_buf(),
            nlat,
            nlon,
            ny,
            nx,
        });
    }
    Ok(())
}
