//! Availability resolver.
//!
//! For a reference date T the resolver decides, before any bulk read,
//! which init date and lead supplies every analysis valid date, which
//! forecast inits are accepted, and whether any substitution degraded the
//! run. Every per-step decision is an explicit outcome (accepted, skipped
//! with a reason, or fatal); the quality flag is an accumulator threaded
//! through both phases, never ambient state.

use {
    crate::{
        calendar::format_ymd,
        catalog::{Catalog, Variable},
        error::FatalError,
        parameters::Parameters,
        store::GridStore,
    },
    chrono::{Duration, NaiveDate},
    log::{info, warn},
};

/// One resolved analysis valid date: the init/lead pair that supplies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisSlot {
    pub valid: NaiveDate,
    pub init: NaiveDate,
    pub lead: usize,
}

/// Resolver output, consumed by the correction engine and the controller.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// One slot per analysis valid date, oldest first.
    pub analysis: Vec<AnalysisSlot>,
    /// Accepted forecast inits, most recent first.
    pub forecast_inits: Vec<NaiveDate>,
    /// True once any fallback or substitution occurred; never reset.
    pub degraded: bool,
}

impl Resolution {
    /// Forecast valid dates T+1 to T+forecast_leads.
    pub fn forecast_valid_dates(refdate: NaiveDate, leads: usize) -> Vec<NaiveDate> {
        (1..=leads as i64)
            .map(|l| refdate + Duration::days(l))
            .collect()
    }
}

/// Outcome of probing one candidate, before any fatal decision is taken.
enum Probe<T> {
    Accepted(T),
    Skipped(String),
}

/// Quality-flag accumulator. Logs each degradation as it happens and
/// latches; OR-combined across the analysis and forecast phases. Owned by
/// the controller so degradations recorded before a fatal return are not
/// lost with the resolver's output.
#[derive(Debug, Default)]
pub struct Quality {
    degraded: bool,
}

impl Quality {
    fn degrade(&mut self, reason: String) {
        warn!("{}", reason);
        self.degraded = true;
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

pub fn resolve<S: GridStore>(
    params: &Parameters,
    catalog: &Catalog,
    store: &S,
    refdate: NaiveDate,
    quality: &mut Quality,
) -> Result<Resolution, FatalError> {
    let analysis = resolve_analysis(params, catalog, store, refdate, quality)?;
    let forecast_inits = resolve_forecast(params, catalog, store, refdate, quality)?;

    check_obs_clim(params, catalog, store)?;
    check_model_clim(
        catalog,
        store,
        analysis.iter().map(|slot| slot.init),
        params.run.analysis_lead_max,
    )?;
    check_model_clim(
        catalog,
        store,
        forecast_inits.iter().copied(),
        params.run.forecast_leads + params.run.max_forecast_delay,
    )?;

    if quality.degraded {
        warn!("the output quality will be degraded");
    } else {
        info!("  pre-checking passed");
    }
    log_summary(&analysis, &forecast_inits, refdate, params.run.forecast_leads);

    Ok(Resolution {
        analysis,
        forecast_inits,
        degraded: quality.degraded,
    })
}

/// Finds, for every valid date in the analysis window (oldest first), the
/// smallest lead whose init has all variables on disk. The pairing
/// (lead 1, init T-1) is never used; it would duplicate the forecast's
/// most recent input.
fn resolve_analysis<S: GridStore>(
    params: &Parameters,
    catalog: &Catalog,
    store: &S,
    refdate: NaiveDate,
    quality: &mut Quality,
) -> Result<Vec<AnalysisSlot>, FatalError> {
    let days = params.run.analysis_days as i64;
    let lead_max = params.run.analysis_lead_max;
    let mut slots = Vec::with_capacity(params.run.analysis_days);

    for delta in (1 - days)..=0 {
        let valid = refdate + Duration::days(delta);

        match probe_valid_date(catalog, store, refdate, valid, lead_max) {
            Some(slot) => {
                if slot.lead > 1 && valid != refdate {
                    // only the reference date itself may silently fall back
                    quality.degrade(format!(
                        "using lead={} for analysis valid={}",
                        slot.lead,
                        format_ymd(valid),
                    ));
                }
                slots.push(slot);
            }
            None => {
                return Err(FatalError::MissingAnalysis { valid, lead_max });
            }
        }
    }

    Ok(slots)
}

fn probe_valid_date<S: GridStore>(
    catalog: &Catalog,
    store: &S,
    refdate: NaiveDate,
    valid: NaiveDate,
    lead_max: usize,
) -> Option<AnalysisSlot> {
    for lead in 1..=lead_max {
        let init = valid - Duration::days(lead as i64);

        if lead == 1 && init == refdate - Duration::days(1) {
            continue;
        }
        let all_present = Variable::ALL
            .iter()
            .all(|&var| store.exists(&catalog.daymean(init, var)));
        if all_present {
            return Some(AnalysisSlot { valid, init, lead });
        }
    }
    None
}

/// Scans inits T-1 back to T-max_forecast_delay, accepting each whose
/// files exist and store enough leads to reach T+forecast_leads, until the
/// member target is met.
fn resolve_forecast<S: GridStore>(
    params: &Parameters,
    catalog: &Catalog,
    store: &S,
    refdate: NaiveDate,
    quality: &mut Quality,
) -> Result<Vec<NaiveDate>, FatalError> {
    let required = params.run.forecast_members;
    let mut accepted = Vec::with_capacity(required);

    for delta in 1..=params.run.max_forecast_delay {
        let init = refdate - Duration::days(delta as i64);

        match probe_forecast_init(params, catalog, store, init, delta)? {
            Probe::Accepted(init) => {
                accepted.push(init);
                if accepted.len() >= required {
                    break;
                }
            }
            Probe::Skipped(reason) => quality.degrade(reason),
        }
    }

    if accepted.len() < required {
        return Err(FatalError::InsufficientForecast {
            accepted: accepted.len(),
            required,
        });
    }
    Ok(accepted)
}

fn probe_forecast_init<S: GridStore>(
    params: &Parameters,
    catalog: &Catalog,
    store: &S,
    init: NaiveDate,
    delta: usize,
) -> Result<Probe<NaiveDate>, FatalError> {
    let paths: Vec<_> = Variable::ALL
        .iter()
        .map(|&var| catalog.daymean(init, var))
        .collect();

    if paths.iter().any(|path| !store.exists(path)) {
        return Ok(Probe::Skipped(format!(
            "missing file: forecast, init={}",
            format_ymd(init),
        )));
    }

    // an init delayed by delta days needs delta extra leads to reach T+forecast_leads
    let min_leads = params.run.forecast_leads + delta;
    for path in &paths {
        if store.lead_len(path)? < min_leads {
            return Ok(Probe::Skipped(format!(
                "too short numLeads: forecast, init={}",
                format_ymd(init),
            )));
        }
    }

    Ok(Probe::Accepted(init))
}

/// Observed climatology must exist per variable, hold exactly 365 days and
/// at least cover the configured grid.
fn check_obs_clim<S: GridStore>(
    params: &Parameters,
    catalog: &Catalog,
    store: &S,
) -> Result<(), FatalError> {
    for &var in Variable::ALL.iter() {
        let path = catalog.obs_clim(var);
        if !store.exists(&path) {
            return Err(FatalError::ObsClimMissing { var });
        }
        let (nday, nlat, nlon) = store.shape(&path)?;
        if nday != 365 || nlat < params.grid.ny() || nlon < params.grid.nx() {
            return Err(FatalError::ObsClimDimension {
                var,
                nday,
                nlat,
                nlon,
            });
        }
    }
    Ok(())
}

/// Model climatology must exist for every resolved init, with lead
/// coverage for the whole window it will be read over.
fn check_model_clim<S, I>(
    catalog: &Catalog,
    store: &S,
    inits: I,
    min_leads: usize,
) -> Result<(), FatalError>
where
    S: GridStore,
    I: Iterator<Item = NaiveDate> + Clone,
{
    let missing: Vec<String> = inits
        .clone()
        .flat_map(|init| {
            Variable::ALL.iter().filter_map(move |&var| {
                if store.exists(&catalog.model_clim(init, var)) {
                    None
                } else {
                    Some(format!("{}_{}", var, init.format("%m%d")))
                }
            })
        })
        .collect();
    if !missing.is_empty() {
        return Err(FatalError::ModelClimMissing {
            files: missing.join(","),
        });
    }

    let mut too_short = Vec::new();
    for init in inits {
        for &var in Variable::ALL.iter() {
            if store.lead_len(&catalog.model_clim(init, var))? < min_leads {
                too_short.push(format!("{}_{}", var, init.format("%m%d")));
            }
        }
    }
    if !too_short.is_empty() {
        return Err(FatalError::ModelClimLeadShort {
            files: too_short.join(","),
        });
    }
    Ok(())
}

fn log_summary(
    analysis: &[AnalysisSlot],
    forecast_inits: &[NaiveDate],
    refdate: NaiveDate,
    forecast_leads: usize,
) {
    if let (Some(first), Some(last)) = (analysis.first(), analysis.last()) {
        info!(
            "  analysis inits = {} to {}",
            format_ymd(first.init),
            format_ymd(last.init),
        );
        let lead_max = analysis.iter().map(|s| s.lead).max().unwrap_or(0);
        info!(
            "  analysis valid (max_lead={}) = {} to {}",
            lead_max,
            format_ymd(first.valid),
            format_ymd(last.valid),
        );
    }
    let inits: Vec<String> = forecast_inits
        .iter()
        .map(|&init| {
            format!(
                "(T-{}) {}",
                (refdate - init).num_days(),
                format_ymd(init),
            )
        })
        .collect();
    info!("  forecast inits {}", inits.join(", "));
    info!(
        "  forecast valid (T+1 to T+{}) = {} to {}",
        forecast_leads,
        format_ymd(refdate + Duration::days(1)),
        format_ymd(refdate + Duration::days(forecast_leads as i64)),
    );
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{
            parameters::{Grid, Parameters, Paths, Run},
            store::{write_grid, FlatGridStore, GridHeader},
        },
        chrono::{Duration, NaiveDate},
        ndarray::Array3,
        std::path::Path,
        tempdir::TempDir,
    };

    // Small window: 6 analysis days, 4 forecast leads, 2 members.
    fn test_params(root: &Path) -> Parameters {
        Parameters {
            run: Run {
                forecast_members: 2,
                forecast_leads: 4,
                analysis_days: 6,
                analysis_lead_max: 3,
                max_forecast_delay: 3,
            },
            grid: Grid {
                lon_west: 40.0,
                lon_east: 50.0,
                lat_south: -10.0,
                lat_north: 0.0,
                resolution: 2.5,
            },
            paths: Paths {
                source_dir: root.join("daymean"),
                model_clim_dir: root.join("clim_mod"),
                obs_clim_dir: root.join("clim_obs"),
                output_dir: root.join("output"),
                run_dir: root.to_path_buf(),
            },
        }
    }

    fn refdate() -> NaiveDate {
        NaiveDate::from_ymd(2025, 1, 25)
    }

    fn header(nlead: usize) -> GridHeader {
        GridHeader::new(nlead, 5, 5, -10.0, 2.5, 40.0, 2.5)
    }

    fn flat(nlead: usize, value: f64) -> Array3<f64> {
        Array3::from_elem((nlead, 5, 5), value)
    }

    /// Writes daymean files for all inits the default scenario needs, a
    /// 365-day obs clim, and model clim files for every calendar day that
    /// could be touched.
    fn seed(params: &Parameters, refdate: NaiveDate) {
        let catalog = Catalog::new(&params.paths);
        // inits back to (oldest valid) - max lead, plus the forecast candidates
        for delta in -((params.run.analysis_days + params.run.analysis_lead_max) as i64)..=-1 {
            let init = refdate + Duration::days(delta);
            seed_daymean(params, init, 10);
        }
        for &var in Variable::ALL.iter() {
            write_grid(
                &catalog.obs_clim(var),
                &GridHeader::new(365, 5, 5, -10.0, 2.5, 40.0, 2.5),
                flat(365, 1.0).view(),
            )
            .unwrap();
        }
        seed_model_clim(params, refdate, 10);
    }

    fn seed_daymean(params: &Parameters, init: NaiveDate, nlead: usize) {
        let catalog = Catalog::new(&params.paths);
        for &var in Variable::ALL.iter() {
            write_grid(&catalog.daymean(init, var), &header(nlead), flat(nlead, 0.0).view()).unwrap();
        }
    }

    fn seed_model_clim(params: &Parameters, refdate: NaiveDate, nlead: usize) {
        let catalog = Catalog::new(&params.paths);
        for delta in -((params.run.analysis_days + params.run.analysis_lead_max) as i64)..=-1 {
            let init = refdate + Duration::days(delta);
            for &var in Variable::ALL.iter() {
                write_grid(
                    &catalog.model_clim(init, var),
                    &header(nlead),
                    flat(nlead, 0.0).view(),
                )
                .unwrap();
            }
        }
    }

    fn remove_daymean(params: &Parameters, init: NaiveDate) {
        let catalog = Catalog::new(&params.paths);
        for &var in Variable::ALL.iter() {
            std::fs::remove_file(catalog.daymean(init, var)).unwrap();
        }
    }

    #[test]
    fn clean_window_resolves_lead_one_everywhere() {
        let dir = TempDir::new("resolve").unwrap();
        let params = test_params(dir.path());
        seed(&params, refdate());
        let catalog = Catalog::new(&params.paths);

        let res = resolve(&params, &catalog, &FlatGridStore, refdate(), &mut Quality::default()).unwrap();

        assert!(!res.degraded);
        assert_eq!(res.analysis.len(), 6);
        for slot in &res.analysis[..5] {
            assert_eq!(slot.lead, 1);
            assert_eq!(slot.init, slot.valid - Duration::days(1));
        }
        // valid = T: lead 1 would pair with init T-1, which is forbidden
        let last = res.analysis.last().unwrap();
        assert_eq!(last.valid, refdate());
        assert_eq!(last.lead, 2);
        assert_eq!(last.init, refdate() - Duration::days(2));

        assert_eq!(
            res.forecast_inits,
            vec![
                refdate() - Duration::days(1),
                refdate() - Duration::days(2),
            ]
        );
    }

    #[test]
    fn missing_init_falls_back_to_lead_two_and_degrades() {
        let dir = TempDir::new("resolve").unwrap();
        let params = test_params(dir.path());
        let t = refdate();
        seed(&params, t);
        // valid = T-4 loses its lead-1 init (T-5)
        remove_daymean(&params, t - Duration::days(5));

        let catalog = Catalog::new(&params.paths);
        let res = resolve(&params, &catalog, &FlatGridStore, t, &mut Quality::default()).unwrap();

        assert!(res.degraded);
        let slot = res
            .analysis
            .iter()
            .find(|s| s.valid == t - Duration::days(4))
            .unwrap();
        assert_eq!(slot.lead, 2);
        // valid = T-5 is supplied by init T-6 at lead 1, unaffected
        let earlier = res
            .analysis
            .iter()
            .find(|s| s.valid == t - Duration::days(5))
            .unwrap();
        assert_eq!(earlier.lead, 1);
    }

    #[test]
    fn analysis_gap_beyond_lead_max_is_fatal() {
        let dir = TempDir::new("resolve").unwrap();
        let params = test_params(dir.path());
        let t = refdate();
        seed(&params, t);
        // valid = T-3 has candidates at T-4, T-5, T-6; remove them all
        for back in 4..=6 {
            remove_daymean(&params, t - Duration::days(back));
        }

        let catalog = Catalog::new(&params.paths);
        match resolve(&params, &catalog, &FlatGridStore, t, &mut Quality::default()) {
            Err(FatalError::MissingAnalysis { valid, lead_max }) => {
                assert_eq!(valid, t - Duration::days(3));
                assert_eq!(lead_max, 3);
            }
            other => panic!("expected MissingAnalysis, got {:?}", other),
        }
    }

    #[test]
    fn too_short_forecast_init_is_skipped_not_fatal() {
        let dir = TempDir::new("resolve").unwrap();
        let params = test_params(dir.path());
        let t = refdate();
        seed(&params, t);
        // T-1 needs forecast_leads + 1 = 5 leads; give it only 4
        seed_daymean(&params, t - Duration::days(1), 4);

        let catalog = Catalog::new(&params.paths);
        let res = resolve(&params, &catalog, &FlatGridStore, t, &mut Quality::default()).unwrap();

        assert!(res.degraded);
        assert_eq!(
            res.forecast_inits,
            vec![
                t - Duration::days(2),
                t - Duration::days(3),
            ]
        );
    }

    #[test]
    fn insufficient_forecast_members_is_fatal() {
        let dir = TempDir::new("resolve").unwrap();
        let params = test_params(dir.path());
        let t = refdate();
        seed(&params, t);
        // leave only T-3 usable out of the 3-day candidate window
        seed_daymean(&params, t - Duration::days(1), 4);
        seed_daymean(&params, t - Duration::days(2), 4);

        let catalog = Catalog::new(&params.paths);
        let mut quality = Quality::default();
        match resolve(&params, &catalog, &FlatGridStore, t, &mut quality) {
            Err(FatalError::InsufficientForecast { accepted, required }) => {
                assert_eq!(accepted, 1);
                assert_eq!(required, 2);
            }
            other => panic!("expected InsufficientForecast, got {:?}", other),
        }
        // the two skips recorded before the fatal stay latched
        assert!(quality.is_degraded());
    }

    #[test]
    fn short_obs_clim_is_fatal() {
        let dir = TempDir::new("resolve").unwrap();
        let params = test_params(dir.path());
        let t = refdate();
        seed(&params, t);
        let catalog = Catalog::new(&params.paths);
        write_grid(
            &catalog.obs_clim(Variable::U850),
            &GridHeader::new(300, 5, 5, -10.0, 2.5, 40.0, 2.5),
            flat(300, 1.0).view(),
        )
        .unwrap();

        match resolve(&params, &catalog, &FlatGridStore, t, &mut Quality::default()) {
            Err(FatalError::ObsClimDimension { var, nday, .. }) => {
                assert_eq!(var, Variable::U850);
                assert_eq!(nday, 300);
            }
            other => panic!("expected ObsClimDimension, got {:?}", other),
        }
    }

    #[test]
    fn missing_model_clim_is_fatal_and_names_files() {
        let dir = TempDir::new("resolve").unwrap();
        let params = test_params(dir.path());
        let t = refdate();
        seed(&params, t);
        let catalog = Catalog::new(&params.paths);
        let gone = t - Duration::days(3);
        for &var in Variable::ALL.iter() {
            std::fs::remove_file(catalog.model_clim(gone, var)).unwrap();
        }

        match resolve(&params, &catalog, &FlatGridStore, t, &mut Quality::default()) {
            Err(FatalError::ModelClimMissing { files }) => {
                assert!(files.contains("u850_0122"), "got {}", files);
            }
            other => panic!("expected ModelClimMissing, got {:?}", other),
        }
    }

    #[test]
    fn short_model_clim_is_fatal() {
        let dir = TempDir::new("resolve").unwrap();
        let params = test_params(dir.path());
        let t = refdate();
        seed(&params, t);
        let catalog = Catalog::new(&params.paths);
        // forecast clim needs forecast_leads + max_forecast_delay = 7 leads
        let init = t - Duration::days(1);
        write_grid(
            &catalog.model_clim(init, Variable::Olr),
            &header(6),
            flat(6, 0.0).view(),
        )
        .unwrap();

        match resolve(&params, &catalog, &FlatGridStore, t, &mut Quality::default()) {
            Err(FatalError::ModelClimLeadShort { files }) => {
                assert!(files.contains("olr_0124"), "got {}", files);
            }
            other => panic!("expected ModelClimLeadShort, got {:?}", other),
        }
    }
}
