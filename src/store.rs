//! Gridded-file store: existence and shape probes plus range-restricted
//! reads over flat binary grid files.
//!
//! A grid file holds one variable as `nlead * nlat * nlon` little-endian
//! f64 values, lead-major, preceded by a fixed header describing the
//! regular latitude/longitude axes. The upstream conversion stage writes
//! these files; this module only needs the read patterns the resolver and
//! correction engine consume.

use {
    byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt},
    ndarray::{Array3, ArrayView3},
    std::{
        fs::File,
        io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write},
        ops::Range,
        path::{Path, PathBuf},
    },
    thiserror::Error,
};

const MAGIC: &[u8; 4] = b"DGRD";
const VERSION: u32 = 1;
const HEADER_LEN: u64 = 4 + 4 + 3 * 4 + 4 * 8;

/// Axis tolerance when mapping coordinate bounds to indices.
const COORD_EPS: f64 = 1.0e-6;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("not a grid file: {path:?}")]
    BadMagic { path: PathBuf },
    #[error("unsupported grid file version {version}: {path:?}")]
    BadVersion { path: PathBuf, version: u32 },
    #[error("lead range {start}..{end} outside file with {nlead} leads: {path:?}")]
    LeadOutOfRange {
        path: PathBuf,
        start: usize,
        end: usize,
        nlead: usize,
    },
    #[error("coordinate range ({lo}, {hi}) selects no {axis} points: {path:?}")]
    EmptyRange {
        path: PathBuf,
        axis: &'static str,
        lo: f64,
        hi: f64,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Header of a flat grid file: leading-dimension length and the regular
/// spatial axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridHeader {
    pub nlead: usize,
    pub nlat: usize,
    pub nlon: usize,
    pub lat0: f64,
    pub dlat: f64,
    pub lon0: f64,
    pub dlon: f64,
}

impl GridHeader {
    /// Header for a file on a regular grid starting at (lat0, lon0),
    /// ascending in both axes.
    pub fn new(nlead: usize, nlat: usize, nlon: usize, lat0: f64, dlat: f64, lon0: f64, dlon: f64) -> Self {
        GridHeader {
            nlead,
            nlat,
            nlon,
            lat0,
            dlat,
            lon0,
            dlon,
        }
    }

    fn lat_indices(&self, lo: f64, hi: f64) -> Range<usize> {
        axis_indices(self.lat0, self.dlat, self.nlat, lo, hi)
    }

    fn lon_indices(&self, lo: f64, hi: f64) -> Range<usize> {
        axis_indices(self.lon0, self.dlon, self.nlon, lo, hi)
    }
}

fn axis_indices(origin: f64, step: f64, len: usize, lo: f64, hi: f64) -> Range<usize> {
    let mut start = len;
    let mut end = 0;
    for i in 0..len {
        let value = origin + i as f64 * step;
        if value >= lo - COORD_EPS && value <= hi + COORD_EPS {
            if i < start {
                start = i;
            }
            end = i + 1;
        }
    }
    start..end.max(start)
}

/// Read side of the store, the only surface the core depends on.
pub trait GridStore {
    /// Existence probe; no file open.
    fn exists(&self, path: &Path) -> bool;

    /// Length of the leading (lead/time) dimension.
    fn lead_len(&self, path: &Path) -> Result<usize, StoreError>;

    /// Full dimensionality `(nlead, nlat, nlon)`.
    fn shape(&self, path: &Path) -> Result<(usize, usize, usize), StoreError>;

    /// Reads a lead index range restricted to latitude/longitude value
    /// bounds, returning a `(leads, lat, lon)` array.
    fn read_leads(
        &self,
        path: &Path,
        leads: Range<usize>,
        lat: (f64, f64),
        lon: (f64, f64),
    ) -> Result<Array3<f64>, StoreError>;
}

/// Store backed by flat binary grid files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatGridStore;

impl FlatGridStore {
    fn open(&self, path: &Path) -> Result<(BufReader<File>, GridHeader), StoreError> {
        let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
        let mut reader = BufReader::new(file);
        let header = read_header(&mut reader, path)?;
        Ok((reader, header))
    }
}

fn read_header<R: Read>(reader: &mut R, path: &Path) -> Result<GridHeader, StoreError> {
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|e| StoreError::io(path, e))?;
    if &magic != MAGIC {
        return Err(StoreError::BadMagic {
            path: path.to_path_buf(),
        });
    }
    let version = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| StoreError::io(path, e))?;
    if version != VERSION {
        return Err(StoreError::BadVersion {
            path: path.to_path_buf(),
            version,
        });
    }

    let mut dims = [0u32; 3];
    for d in dims.iter_mut() {
        *d = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| StoreError::io(path, e))?;
    }
    let mut axes = [0f64; 4];
    for a in axes.iter_mut() {
        *a = reader
            .read_f64::<LittleEndian>()
            .map_err(|e| StoreError::io(path, e))?;
    }

    Ok(GridHeader {
        nlead: dims[0] as usize,
        nlat: dims[1] as usize,
        nlon: dims[2] as usize,
        lat0: axes[0],
        dlat: axes[1],
        lon0: axes[2],
        dlon: axes[3],
    })
}

impl GridStore for FlatGridStore {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn lead_len(&self, path: &Path) -> Result<usize, StoreError> {
        Ok(self.shape(path)?.0)
    }

    fn shape(&self, path: &Path) -> Result<(usize, usize, usize), StoreError> {
        let (_, header) = self.open(path)?;
        Ok((header.nlead, header.nlat, header.nlon))
    }

    fn read_leads(
        &self,
        path: &Path,
        leads: Range<usize>,
        lat: (f64, f64),
        lon: (f64, f64),
    ) -> Result<Array3<f64>, StoreError> {
        let (mut reader, header) = self.open(path)?;

        if leads.end > header.nlead || leads.start >= leads.end {
            return Err(StoreError::LeadOutOfRange {
                path: path.to_path_buf(),
                start: leads.start,
                end: leads.end,
                nlead: header.nlead,
            });
        }
        let lat_idx = header.lat_indices(lat.0, lat.1);
        if lat_idx.is_empty() {
            return Err(StoreError::EmptyRange {
                path: path.to_path_buf(),
                axis: "latitude",
                lo: lat.0,
                hi: lat.1,
            });
        }
        let lon_idx = header.lon_indices(lon.0, lon.1);
        if lon_idx.is_empty() {
            return Err(StoreError::EmptyRange {
                path: path.to_path_buf(),
                axis: "longitude",
                lo: lon.0,
                hi: lon.1,
            });
        }

        let nlead = leads.end - leads.start;
        let nlat = lat_idx.end - lat_idx.start;
        let nlon = lon_idx.end - lon_idx.start;
        let mut values = vec![0f64; nlead * nlat * nlon];

        if lon_idx.start == 0 && lon_idx.end == header.nlon {
            // the selected latitude rows are contiguous in the file, so one
            // read covers a whole lead
            let mut block = vec![0u8; nlat * nlon * 8];
            for (il, lead) in leads.clone().enumerate() {
                let cell = (lead * header.nlat + lat_idx.start) * header.nlon;
                reader
                    .seek(SeekFrom::Start(HEADER_LEN + cell as u64 * 8))
                    .map_err(|e| StoreError::io(path, e))?;
                reader
                    .read_exact(&mut block)
                    .map_err(|e| StoreError::io(path, e))?;
                let offset = il * nlat * nlon;
                LittleEndian::read_f64_into(&block, &mut values[offset..offset + nlat * nlon]);
            }
        } else {
            let mut row = vec![0u8; nlon * 8];
            for (il, lead) in leads.clone().enumerate() {
                for (ila, ilat) in lat_idx.clone().enumerate() {
                    let cell = (lead * header.nlat + ilat) * header.nlon + lon_idx.start;
                    reader
                        .seek(SeekFrom::Start(HEADER_LEN + cell as u64 * 8))
                        .map_err(|e| StoreError::io(path, e))?;
                    reader
                        .read_exact(&mut row)
                        .map_err(|e| StoreError::io(path, e))?;
                    let offset = (il * nlat + ila) * nlon;
                    LittleEndian::read_f64_into(&row, &mut values[offset..offset + nlon]);
                }
            }
        }

        // Shape is (lead, lat, lon) with lon fastest, matching the file layout.
        Ok(Array3::from_shape_vec((nlead, nlat, nlon), values)
            .expect("vector length matches requested shape"))
    }
}

/// Writes a grid file; used by the upstream conversion stage and tests.
pub fn write_grid(path: &Path, header: &GridHeader, data: ArrayView3<f64>) -> Result<(), StoreError> {
    assert_eq!(
        data.dim(),
        (header.nlead, header.nlat, header.nlon),
        "data shape must match header"
    );

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(path, e))?;
    }
    let file = File::create(path).map_err(|e| StoreError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    writer.write_all(MAGIC).map_err(|e| StoreError::io(path, e))?;
    writer
        .write_u32::<LittleEndian>(VERSION)
        .map_err(|e| StoreError::io(path, e))?;
    for d in &[header.nlead, header.nlat, header.nlon] {
        writer
            .write_u32::<LittleEndian>(*d as u32)
            .map_err(|e| StoreError::io(path, e))?;
    }
    for a in &[header.lat0, header.dlat, header.lon0, header.dlon] {
        writer
            .write_f64::<LittleEndian>(*a)
            .map_err(|e| StoreError::io(path, e))?;
    }
    for value in data.iter() {
        writer
            .write_f64::<LittleEndian>(*value)
            .map_err(|e| StoreError::io(path, e))?;
    }
    writer.flush().map_err(|e| StoreError::io(path, e))?;

    Ok(())
}
