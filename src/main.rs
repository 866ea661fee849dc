#[macro_use]
extern crate clap;

use {
    bsiso_export::{
        calendar::parse_ymd,
        parameters::Parameters,
        run::{run, Outcome},
        store::FlatGridStore,
    },
    chrono::Local,
    log::{error, info},
    simplelog::{
        CombinedLogger, Config as LogConfig, LevelFilter, TermLogger, TerminalMode, WriteLogger,
    },
    std::{
        fs::{create_dir_all, File},
        path::PathBuf,
    },
};

#[quit::main]
fn main() {
    let matches = clap_app!(bsiso_export =>
        (version: crate_version!())
        (about: "Converts daily forecast grids to the bias-corrected BSISO ASCII format.")
        (@arg DATE: "Reference date as YYYYMMDD; defaults to today.")
        (@arg PARAMETERS: -p --parameters +takes_value "Path to a YAML parameters file; defaults apply when omitted.")
    )
    .get_matches();

    let refdate = match matches.value_of("DATE") {
        None => Local::now().date().naive_local(),
        Some(arg) => parse_ymd(arg).unwrap_or_else(|| {
            eprintln!("ERROR: unrecognized reference date \"{}\"", arg);
            eprintln!("SYNTAX:");
            eprintln!("bsiso-export");
            eprintln!("bsiso-export YYYYMMDD");
            quit::with_code(2);
        }),
    };

    let params = match matches.value_of("PARAMETERS") {
        None => Parameters::default(),
        Some(path) => {
            let file = File::open(path).unwrap_or_else(|e| {
                eprintln!("Failed to open {}: \"{}\"", path, e);
                quit::with_code(2);
            });
            serde_yaml::from_reader::<_, Parameters>(file).unwrap_or_else(|e| {
                eprintln!("Failed to parse parameters from {}: \"{}\"", path, e);
                quit::with_code(2);
            })
        }
    };

    let log_file = init_logger(&params).unwrap_or_else(|e| {
        eprintln!("Failed to initialize logger: \"{}\"", e);
        quit::with_code(1);
    });

    info!("beginning converting grid files to ASCII format for APCC BSISO");
    info!("  REFDATE (T) = {}", refdate.format("%Y%m%d"));

    match run(&params, &FlatGridStore, refdate, &log_file) {
        Ok(Outcome::Ok) | Ok(Outcome::Degraded) => {}
        Ok(Outcome::Error) => quit::with_code(1),
        Err(e) => {
            error!("Error: \"{}\"", e);
            quit::with_code(1);
        }
    }
}

/// Logs to the terminal and to a timestamped file under `<run_dir>/logs/`.
fn init_logger(params: &Parameters) -> anyhow::Result<PathBuf> {
    let run_id = Local::now().format("%y%m%d_%H%M%S");
    let logs_dir = params.paths.run_dir.join("logs");
    create_dir_all(&logs_dir)?;
    let log_file = logs_dir.join(format!("bsiso-export.{}", run_id));

    CombinedLogger::init(vec![
        TermLogger::new(LevelFilter::Debug, LogConfig::default(), TerminalMode::Mixed),
        WriteLogger::new(
            LevelFilter::Debug,
            LogConfig::default(),
            File::create(&log_file)?,
        ),
    ])?;

    Ok(log_file)
}
