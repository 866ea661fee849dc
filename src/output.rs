//! Fixed-width ASCII artifact writer.
//!
//! The downstream reader reshapes the flat stream by line count alone, so
//! the block order is a wire format: analysis grids first, then forecast
//! grids per member in acceptance order. One line per latitude row, each
//! value fixed-precision `%7.2f`, space-joined.

use {
    crate::{correct::Artifact, error::FatalError},
    log::info,
    ndarray::{ArrayView2, Axis},
    std::{
        fs::{self, File},
        io::{BufWriter, Write},
        path::Path,
    },
};

pub fn write_artifact(path: &Path, artifact: &Artifact) -> Result<(), FatalError> {
    info!("  writing to {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| write_error(path, e))?;
    }
    let file = File::create(path).map_err(|e| write_error(path, e))?;
    let mut writer = BufWriter::new(file);

    for grid in artifact.analysis.axis_iter(Axis(0)) {
        write_grid(&mut writer, grid).map_err(|e| write_error(path, e))?;
    }
    for member in artifact.forecast.axis_iter(Axis(0)) {
        for grid in member.axis_iter(Axis(0)) {
            write_grid(&mut writer, grid).map_err(|e| write_error(path, e))?;
        }
    }
    writer.flush().map_err(|e| write_error(path, e))?;

    Ok(())
}

fn write_grid<W: Write>(writer: &mut W, grid: ArrayView2<f64>) -> std::io::Result<()> {
    for row in grid.axis_iter(Axis(0)) {
        let line = row
            .iter()
            .map(|value| format!("{:7.2}", value))
            .collect::<Vec<String>>()
            .join(" ");
        writeln!(writer, "{}", line)?;
    }
    Ok(())
}

fn write_error(path: &Path, source: std::io::Error) -> FatalError {
    FatalError::Write {
        path: path.to_path_buf(),
        source,
    }
}
