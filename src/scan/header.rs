use super::grid::GridDescriptor;
use super::protocol::{Protocol, SCAN_FILE_CODE, SCAN_FILE_VERSION};
use crate::error::ScanError;
use crate::types::{raise, Notice, ScanHeader};
use log::debug;
use serde::Serialize;
use std::io::{Read, Write};

/// Everything stored ahead of the coordinate block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanInfo {
    pub header: ScanHeader,
    pub grid: GridDescriptor,
    pub num_channels: usize,
    pub num_freq: usize,
    pub is_complex: bool,
}

impl ScanInfo {
    /// Number of doubles in the measurement block.
    pub fn num_data_values(&self) -> Result<usize, ScanError> {
        [
            self.num_freq,
            self.num_channels,
            self.grid.num_spatial_points(),
            if self.is_complex { 2 } else { 1 },
        ]
        .into_iter()
        .try_fold(1usize, |acc, n| acc.checked_mul(n))
        .ok_or_else(|| {
            ScanError::Corrupt(format!(
                "data block of {} x {} x {} values overflows",
                self.num_freq,
                self.num_channels,
                self.grid.num_spatial_points()
            ))
        })
    }
}

/// Fit the caller's channel names to the channel count.
///
/// Missing names become `Channel N` (1-based), surplus names are dropped.
pub fn fit_channel_names(
    names: &[String],
    num_channels: usize,
    notices: &mut Vec<Notice>,
) -> Vec<String> {
    let given = names.len();
    let mut fitted: Vec<String> = names.iter().take(num_channels).cloned().collect();

    if given < num_channels {
        raise(
            notices,
            Notice::ChannelNamesPadded {
                given,
                channels: num_channels,
            },
        );
        fitted.extend((given + 1..=num_channels).map(|i| format!("Channel {i}")));
    } else if given > num_channels {
        raise(
            notices,
            Notice::ChannelNamesTruncated {
                given,
                channels: num_channels,
            },
        );
    }

    fitted
}

/// Check every string of the header before a single byte goes out.
pub fn check_header_strings(header: &ScanHeader) -> Result<(), ScanError> {
    Protocol::check_string(&header.header, "header")?;
    Protocol::check_string(&header.description, "description")?;
    Protocol::check_string(&header.device_name, "device name")?;
    for (i, name) in header.channel_names.iter().enumerate() {
        Protocol::check_string(name, &format!("channel name {i}"))?;
    }
    Ok(())
}

pub fn write_identity<W: Write>(writer: &mut W) -> Result<(), ScanError> {
    Protocol::write_f64(writer, SCAN_FILE_CODE, "magic code")?;
    Protocol::write_f64(writer, SCAN_FILE_VERSION, "format version")
}

pub fn read_identity<R: Read>(reader: &mut R) -> Result<(), ScanError> {
    let code = Protocol::read_f64(reader, "magic code")?;
    if code != SCAN_FILE_CODE {
        return Err(ScanError::UnrecognizedFormat { code });
    }

    let version = Protocol::read_f64(reader, "format version")?;
    if version != SCAN_FILE_VERSION {
        return Err(ScanError::UnsupportedVersion { version });
    }

    Ok(())
}

pub fn write_text_fields<W: Write>(writer: &mut W, header: &ScanHeader) -> Result<(), ScanError> {
    Protocol::write_string(writer, &header.header, "header")?;
    Protocol::write_string(writer, &header.description, "description")?;
    Protocol::write_string(writer, &header.device_name, "device name")
}

/// Returns a header with empty channel names; those follow the grid parameters.
pub fn read_text_fields<R: Read>(reader: &mut R) -> Result<ScanHeader, ScanError> {
    Ok(ScanHeader {
        header: Protocol::read_string(reader, "header")?,
        description: Protocol::read_string(reader, "description")?,
        device_name: Protocol::read_string(reader, "device name")?,
        channel_names: Vec::new(),
    })
}

pub fn write_grid<W: Write>(writer: &mut W, grid: &GridDescriptor) -> Result<(), ScanError> {
    Protocol::write_flag(writer, grid.is_uniform, "uniform flag")?;
    Protocol::write_count(writer, grid.num_dims(), "dimension count")?;
    if grid.num_dims() > 0 {
        Protocol::write_counts(writer, &grid.dim_order, "dim_order")?;
        Protocol::write_counts(writer, &grid.dim_size, "dim_size")?;
    }
    Ok(())
}

pub fn read_grid<R: Read>(reader: &mut R) -> Result<GridDescriptor, ScanError> {
    let is_uniform = Protocol::read_flag(reader, "uniform flag")?;
    let num_dims = Protocol::read_count(reader, "dimension count")?;
    let (dim_order, dim_size) = if num_dims > 0 {
        (
            Protocol::read_counts(reader, num_dims, "dim_order")?,
            Protocol::read_counts(reader, num_dims, "dim_size")?,
        )
    } else {
        (Vec::new(), Vec::new())
    };

    let grid = GridDescriptor {
        is_uniform,
        dim_order,
        dim_size,
    };
    grid.validate()?;
    debug!(
        "Grid: uniform={}, dim_order={:?}, dim_size={:?}",
        grid.is_uniform, grid.dim_order, grid.dim_size
    );
    Ok(grid)
}

pub fn write_channels<W: Write>(writer: &mut W, names: &[String]) -> Result<(), ScanError> {
    Protocol::write_count(writer, names.len(), "channel count")?;
    for name in names {
        Protocol::write_string(writer, name, "channel name")?;
    }
    Ok(())
}

pub fn read_channels<R: Read>(reader: &mut R) -> Result<Vec<String>, ScanError> {
    let num_channels = Protocol::read_count(reader, "channel count")?;
    (0..num_channels)
        .map(|i| Protocol::read_string(reader, &format!("channel name {i}")))
        .collect()
}

pub fn write_spectrum_info<W: Write>(
    writer: &mut W,
    num_freq: usize,
    is_complex: bool,
) -> Result<(), ScanError> {
    Protocol::write_count(writer, num_freq, "frequency count")?;
    Protocol::write_flag(writer, is_complex, "complex flag")
}

pub fn read_spectrum_info<R: Read>(reader: &mut R) -> Result<(usize, bool), ScanError> {
    Ok((
        Protocol::read_count(reader, "frequency count")?,
        Protocol::read_flag(reader, "complex flag")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_identity_round_trip() {
        let mut buf = Vec::new();
        write_identity(&mut buf).unwrap();
        assert_eq!(buf.len(), 16);
        assert!(read_identity(&mut Cursor::new(buf)).is_ok());
    }

    #[test]
    fn test_bad_magic_code() {
        let mut buf = Vec::new();
        Protocol::write_f64(&mut buf, 1234.0, "magic code").unwrap();
        Protocol::write_f64(&mut buf, SCAN_FILE_VERSION, "format version").unwrap();
        let result = read_identity(&mut Cursor::new(buf));
        assert!(matches!(result, Err(ScanError::UnrecognizedFormat { code }) if code == 1234.0));
    }

    #[test]
    fn test_bad_version() {
        let mut buf = Vec::new();
        Protocol::write_f64(&mut buf, SCAN_FILE_CODE, "magic code").unwrap();
        Protocol::write_f64(&mut buf, 2.0, "format version").unwrap();
        let result = read_identity(&mut Cursor::new(buf));
        assert!(matches!(result, Err(ScanError::UnsupportedVersion { version }) if version == 2.0));
    }

    #[test]
    fn test_grid_without_dims_writes_no_arrays() {
        let grid = GridDescriptor::sequential(true, Vec::new());
        let mut buf = Vec::new();
        write_grid(&mut buf, &grid).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(read_grid(&mut Cursor::new(buf)).unwrap(), grid);
    }

    #[test]
    fn test_grid_keeps_stored_order() {
        let grid = GridDescriptor {
            is_uniform: true,
            dim_order: vec![1, 0],
            dim_size: vec![4, 5],
        };
        let mut buf = Vec::new();
        write_grid(&mut buf, &grid).unwrap();
        assert_eq!(read_grid(&mut Cursor::new(buf)).unwrap(), grid);
    }

    #[test]
    fn test_channels_read_as_declared() {
        let names = vec!["S11".to_string(), "S21".to_string()];
        let mut buf = Vec::new();
        write_channels(&mut buf, &names).unwrap();
        assert_eq!(read_channels(&mut Cursor::new(buf)).unwrap(), names);
    }

    #[test]
    fn test_fit_channel_names() {
        let mut notices = Vec::new();
        let names = vec!["A".to_string()];

        let padded = fit_channel_names(&names, 3, &mut notices);
        assert_eq!(padded, vec!["A", "Channel 2", "Channel 3"]);

        let names = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let truncated = fit_channel_names(&names, 2, &mut notices);
        assert_eq!(truncated, vec!["A", "B"]);

        assert_eq!(notices.len(), 2);
        assert!(fit_channel_names(&truncated, 2, &mut Vec::new()).len() == 2);
    }

    #[test]
    fn test_num_data_values() {
        let info = ScanInfo {
            header: ScanHeader::default(),
            grid: GridDescriptor::sequential(true, vec![2, 3]),
            num_channels: 2,
            num_freq: 5,
            is_complex: true,
        };
        assert_eq!(info.num_data_values().unwrap(), 2 * 3 * 2 * 5 * 2);
    }
}
