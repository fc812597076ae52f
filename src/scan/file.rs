use super::codec::{ScanReader, ScanWriter};
use super::grid::{AxisPlan, GridDescriptor};
use super::header::{check_header_strings, fit_channel_names, ScanInfo};
use super::protocol::SCAN_EXTENSION;
use super::transform::{self, WireLayout};
use crate::error::ScanError;
use crate::types::{
    Decoded, Measurements, Notice, PartialFilePolicy, ReadOptions, ScanData, ScanHeader,
    WriteOptions,
};
use log::{debug, info, warn};
use ndarray::{Axis, IxDyn};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Append the scan extension to a path that has none.
pub fn resolve_scan_path(path: &Path, extension: Option<&str>) -> PathBuf {
    let mut resolved = path.to_path_buf();
    if resolved.extension().is_none() {
        resolved.set_extension(extension.unwrap_or(SCAN_EXTENSION));
    }
    resolved
}

/// Data block layout of a grid: scan-ordered axis sizes, or the point count.
fn wire_layout(info: &ScanInfo) -> WireLayout {
    let spatial = if info.grid.is_uniform {
        info.grid.sizes_in_scan_order()
    } else {
        vec![info.grid.num_spatial_points()]
    };
    WireLayout::new(info.num_freq, info.num_channels, spatial)
}

fn is_rastered(grid: &GridDescriptor) -> bool {
    grid.is_uniform && grid.num_dims() > 1
}

/// A scan checked and laid out for the wire, with nothing written yet.
#[derive(Debug)]
pub struct PreparedScan<'a> {
    info: ScanInfo,
    axes: Cow<'a, [Vec<f64>]>,
    frequencies: &'a [f64],
    values: Vec<f64>,
    pub notices: Vec<Notice>,
}

impl<'a> PreparedScan<'a> {
    /// Validate shapes and strings and build the data block.
    pub fn prepare(scan: &'a ScanData) -> Result<Self, ScanError> {
        let mut notices = Vec::new();
        let plan = GridDescriptor::plan_encode(
            scan.grid,
            &scan.axes,
            scan.data.shape(),
            scan.frequencies.len(),
            &mut notices,
        )?;

        let channel_names =
            fit_channel_names(&scan.header.channel_names, plan.num_channels, &mut notices);
        let header = ScanHeader {
            channel_names,
            ..scan.header.clone()
        };
        check_header_strings(&header)?;

        let axes = if plan.synthetic_axis {
            Cow::Owned(vec![vec![0.0; plan.grid.num_spatial_points()]])
        } else {
            Cow::Borrowed(scan.axes.as_slice())
        };

        let info = ScanInfo {
            header,
            num_channels: plan.num_channels,
            num_freq: scan.frequencies.len(),
            is_complex: scan.data.is_complex(),
            grid: plan.grid,
        };

        let values = transform::encode_measurements(
            &scan.data,
            &wire_layout(&info),
            plan.data_spatial_axes,
            plan.has_channel_axis,
            is_rastered(&info.grid),
        );
        debug!("Prepared {} measurement value(s)", values.len());

        Ok(Self {
            info,
            axes,
            frequencies: &scan.frequencies,
            values,
            notices,
        })
    }

    pub fn info(&self) -> &ScanInfo {
        &self.info
    }

    /// Stream every field group in canonical order.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<W, ScanError> {
        let mut writer = ScanWriter::new(writer);
        writer.write_info(&self.info)?;
        writer.write_coordinates(&self.axes)?;
        writer.write_frequencies(self.frequencies)?;
        writer.write_measurements(&self.values)?;
        writer.finish()
    }
}

/// Encode a scan into any byte sink.
pub fn encode<W: Write>(writer: W, scan: &ScanData) -> Result<Vec<Notice>, ScanError> {
    let prepared = PreparedScan::prepare(scan)?;
    prepared.write_to(writer)?;
    Ok(prepared.notices)
}

/// Decode a scan from any byte source.
pub fn decode<R: Read>(reader: R, options: &ReadOptions) -> Result<Decoded, ScanError> {
    let mut notices = Vec::new();
    let mut reader = ScanReader::new(reader);

    let info = reader.read_info()?;
    let plan = info.grid.reconcile(options.output_dims, &mut notices)?;
    let coordinates = reader.read_coordinates(&info.grid)?;
    let frequencies = reader.read_frequencies(info.num_freq)?;
    let values = reader.read_measurements(info.num_data_values()?, &mut notices)?;

    let positions = if info.grid.is_uniform {
        info.grid.scan_positions()
    } else {
        vec![0]
    };
    let data = transform::decode_measurements(
        values,
        info.is_complex,
        &wire_layout(&info),
        &positions,
        is_rastered(&info.grid),
    )?;

    let (axes, data) = shape_output(&info, plan, coordinates, data, options.squeeze_channels)?;

    Ok(Decoded {
        scan: ScanData {
            grid: info.grid.kind(),
            header: info.header,
            axes,
            frequencies,
            data,
        },
        notices,
    })
}

/// Apply the axis plan to coordinates and samples, and drop a lone channel axis on request.
fn shape_output(
    info: &ScanInfo,
    plan: AxisPlan,
    coordinates: Vec<Vec<f64>>,
    data: Measurements,
    squeeze_channels: bool,
) -> Result<(Vec<Vec<f64>>, Measurements), ScanError> {
    let uniform = info.grid.is_uniform;
    let pad_len = if uniform {
        1
    } else {
        info.grid.num_spatial_points()
    };

    let mut axes: Vec<Vec<f64>> = coordinates.into_iter().take(plan.keep).collect();
    axes.extend((0..plan.add).map(|_| vec![0.0; pad_len]));

    let mut data = data;
    if uniform && plan.output_dims() != info.grid.num_dims() {
        let mut shape: Vec<usize> = axes.iter().map(Vec::len).collect();
        shape.extend([info.num_freq, info.num_channels]);
        data = reshape(data, &shape)?;
    }

    if squeeze_channels && info.num_channels == 1 {
        data = drop_channel_axis(data);
    }

    Ok((axes, data))
}

fn reshape(data: Measurements, shape: &[usize]) -> Result<Measurements, ScanError> {
    let corrupt = |e: ndarray::ShapeError| {
        ScanError::Corrupt(format!("measurements do not fit shape {shape:?}: {e}"))
    };
    Ok(match data {
        Measurements::Real(a) => {
            Measurements::Real(a.into_shape_with_order(IxDyn(shape)).map_err(corrupt)?)
        }
        Measurements::Complex(a) => {
            Measurements::Complex(a.into_shape_with_order(IxDyn(shape)).map_err(corrupt)?)
        }
    })
}

fn drop_channel_axis(data: Measurements) -> Measurements {
    match data {
        Measurements::Real(a) => {
            let last = Axis(a.ndim() - 1);
            Measurements::Real(a.index_axis_move(last, 0))
        }
        Measurements::Complex(a) => {
            let last = Axis(a.ndim() - 1);
            Measurements::Complex(a.index_axis_move(last, 0))
        }
    }
}

/// Where a scan was written and what was noticed on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteReport {
    pub path: PathBuf,
    pub notices: Vec<Notice>,
}

/// Write a scan file, appending the extension when the path has none.
///
/// All validation happens before the file is created. If writing fails part way,
/// `options.partial_file` decides whether the incomplete file stays on disk.
pub fn write_scan<P: AsRef<Path>>(
    path: P,
    scan: &ScanData,
    options: &WriteOptions,
) -> Result<WriteReport, ScanError> {
    let path = resolve_scan_path(path.as_ref(), options.extension.as_deref());
    let prepared = PreparedScan::prepare(scan)?;

    let file = File::create(&path)
        .map_err(|e| ScanError::io(e, format!("Could not create scan file {}", path.display())))?;

    match prepared.write_to(BufWriter::new(file)) {
        Ok(_) => {
            info!("Scan file '{}' exported successfully", path.display());
            Ok(WriteReport {
                path,
                notices: prepared.notices,
            })
        }
        Err(e) => {
            if options.partial_file == PartialFilePolicy::Remove {
                remove_partial(&path);
            }
            Err(e)
        }
    }
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => info!("Removed incomplete scan file '{}'", path.display()),
        Err(e) => warn!(
            "Failed to remove incomplete scan file '{}': {}",
            path.display(),
            e
        ),
    }
}

fn open_scan(path: &Path, extension: Option<&str>) -> Result<(PathBuf, BufReader<File>), ScanError> {
    let path = resolve_scan_path(path, extension);
    let file = File::open(&path)
        .map_err(|e| ScanError::io(e, format!("Could not open scan file {}", path.display())))?;
    Ok((path, BufReader::new(file)))
}

/// Read and decode a scan file.
pub fn read_scan<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<Decoded, ScanError> {
    let (path, reader) = open_scan(path.as_ref(), options.extension.as_deref())?;
    let decoded = decode(reader, options)?;
    info!(
        "Read scan file '{}' ({} notice(s))",
        path.display(),
        decoded.notices.len()
    );
    Ok(decoded)
}

/// Outcome of [`rewrite_scan`].
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteReport {
    pub path: PathBuf,
    pub read_notices: Vec<Notice>,
    pub write_notices: Vec<Notice>,
}

/// Decode a scan file and encode it again, normalising padded or overlong data.
///
/// `device_name` fills in the device when the source file stores none.
pub fn rewrite_scan<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    read: &ReadOptions,
    write: &WriteOptions,
    device_name: Option<&str>,
) -> Result<RewriteReport, ScanError> {
    let Decoded { mut scan, notices } = read_scan(input, read)?;
    if scan.header.device_name.is_empty() {
        scan.header.device_name = device_name.unwrap_or_default().to_string();
    }

    let report = write_scan(output, &scan, write)?;
    Ok(RewriteReport {
        path: report.path,
        read_notices: notices,
        write_notices: report.notices,
    })
}

/// Read only the header groups of a scan file.
pub fn read_scan_info<P: AsRef<Path>>(path: P) -> Result<ScanInfo, ScanError> {
    let (_, reader) = open_scan(path.as_ref(), None)?;
    ScanReader::new(reader).read_info()
}
