//! Run controller.
//!
//! One invocation walks `PRECHECK -> PROCESS(variable)* -> POSTCHECK`. A
//! fatal precheck or processing error short-circuits straight to the
//! postcheck, which inspects what actually landed on disk and maintains
//! the warning-marker contract for downstream monitoring: a marker file
//! on a degraded or error outcome, and removal of stale markers once a
//! previously failing date runs clean.

use {
    crate::{
        calendar::format_ymd,
        catalog::{Catalog, Variable},
        correct::correct,
        error::FatalError,
        output::write_artifact,
        parameters::Parameters,
        resolve::{resolve, Quality},
        store::GridStore,
    },
    chrono::NaiveDate,
    log::{error, info},
    std::{fmt, fs, path::Path},
};

/// Tri-state result of the postcheck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// All outputs written, no degradation.
    Ok,
    /// All outputs written but at least one substitution occurred.
    Degraded,
    /// At least one variable's output is missing.
    Error,
}

impl Outcome {
    fn kind(self) -> Option<&'static str> {
        match self {
            Outcome::Ok => None,
            Outcome::Degraded => Some("degraded"),
            Outcome::Error => Some("error"),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.kind().unwrap_or("ok"))
    }
}

pub fn run<S: GridStore>(
    params: &Parameters,
    store: &S,
    refdate: NaiveDate,
    log_file: &Path,
) -> Result<Outcome, FatalError> {
    let catalog = Catalog::new(&params.paths);

    check_output_writable(&catalog)?;

    info!("pre-checking");
    // the accumulator lives here so degradations recorded before a fatal
    // resolver return still reach the postcheck
    let mut quality = Quality::default();
    let resolution = match resolve(params, &catalog, store, refdate, &mut quality) {
        Ok(resolution) => resolution,
        Err(e) => {
            error!("{}", e);
            return post_check(&catalog, refdate, quality.is_degraded(), log_file);
        }
    };

    for &var in Variable::ALL.iter() {
        info!("variable {}", var);
        let outcome = correct(params, &catalog, store, refdate, &resolution, var)
            .and_then(|artifact| write_artifact(&catalog.output(refdate, var), &artifact));
        if let Err(e) = outcome {
            error!("{}", e);
            return post_check(&catalog, refdate, quality.is_degraded(), log_file);
        }
    }

    post_check(&catalog, refdate, quality.is_degraded(), log_file)
}

/// The output root must exist and be writable before any resolution work.
fn check_output_writable(catalog: &Catalog) -> Result<(), FatalError> {
    let dir = catalog.output_dir();
    let not_writable = || FatalError::OutputNotWritable {
        path: dir.clone(),
    };

    fs::create_dir_all(dir).map_err(|_| not_writable())?;
    let metadata = fs::metadata(dir).map_err(|_| not_writable())?;
    if metadata.permissions().readonly() {
        return Err(not_writable());
    }
    Ok(())
}

fn post_check(
    catalog: &Catalog,
    refdate: NaiveDate,
    degraded: bool,
    log_file: &Path,
) -> Result<Outcome, FatalError> {
    info!("post-checking");

    let any_missing = Variable::ALL
        .iter()
        .any(|&var| !catalog.output(refdate, var).is_file());
    let outcome = if any_missing {
        Outcome::Error
    } else if degraded {
        Outcome::Degraded
    } else {
        Outcome::Ok
    };
    info!("  outcome = {}", outcome);

    let kind = match outcome.kind() {
        None => {
            // the output is correct now, so any previous warning can go
            for stale in &["error", "degraded"] {
                let marker = catalog.marker(refdate, stale);
                if marker.is_file() {
                    info!("  removing the warning marker {}", marker.display());
                    fs::remove_file(&marker).map_err(|e| write_fatal(&marker, e))?;
                }
            }
            info!("normal exit");
            return Ok(outcome);
        }
        Some(kind) => kind,
    };

    info!("  creating the warning marker");
    let marker = catalog.marker(refdate, kind);
    let marked_log = mark_path(log_file, kind);
    fs::write(
        &marker,
        format!("warning details in {}\n", marked_log.display()),
    )
    .map_err(|e| write_fatal(&marker, e))?;

    // rename the log so the marked name the marker points at exists
    if log_file.is_file() {
        fs::rename(log_file, &marked_log).map_err(|e| write_fatal(&marked_log, e))?;
    }
    info!("normal exit (log file marked for {})", format_ymd(refdate));

    Ok(outcome)
}

fn mark_path(log_file: &Path, kind: &str) -> std::path::PathBuf {
    let mut name = log_file.as_os_str().to_os_string();
    name.push("-");
    name.push(kind);
    std::path::PathBuf::from(name)
}

fn write_fatal(path: &Path, source: std::io::Error) -> FatalError {
    FatalError::Write {
        path: path.to_path_buf(),
        source,
    }
}
