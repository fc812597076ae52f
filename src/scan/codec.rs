use super::grid::GridDescriptor;
use super::header::{self, ScanInfo};
use super::protocol::{Protocol, VALUE_SIZE};
use crate::error::ScanError;
use crate::types::{raise, Notice};
use log::debug;
use std::io::{Read, Write};

/// Field groups in the only order the format allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Identity,
    Text,
    Grid,
    Channels,
    Spectrum,
    Coordinates,
    Frequencies,
    Measurements,
    Done,
}

impl Stage {
    fn next(self) -> Self {
        match self {
            Stage::Identity => Stage::Text,
            Stage::Text => Stage::Grid,
            Stage::Grid => Stage::Channels,
            Stage::Channels => Stage::Spectrum,
            Stage::Spectrum => Stage::Coordinates,
            Stage::Coordinates => Stage::Frequencies,
            Stage::Frequencies => Stage::Measurements,
            Stage::Measurements | Stage::Done => Stage::Done,
        }
    }
}

fn advance(stage: &mut Stage, expected: Stage) -> Result<(), ScanError> {
    if *stage != expected {
        return Err(ScanError::Protocol(format!(
            "{expected:?} fields requested while at {stage:?}"
        )));
    }
    *stage = stage.next();
    Ok(())
}

/// Writes a scan file one field group at a time.
pub struct ScanWriter<W: Write> {
    writer: W,
    stage: Stage,
}

impl<W: Write> ScanWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            stage: Stage::Identity,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn write_identity(&mut self) -> Result<(), ScanError> {
        advance(&mut self.stage, Stage::Identity)?;
        header::write_identity(&mut self.writer)
    }

    pub fn write_text(&mut self, info: &ScanInfo) -> Result<(), ScanError> {
        advance(&mut self.stage, Stage::Text)?;
        header::write_text_fields(&mut self.writer, &info.header)
    }

    pub fn write_grid(&mut self, grid: &GridDescriptor) -> Result<(), ScanError> {
        advance(&mut self.stage, Stage::Grid)?;
        header::write_grid(&mut self.writer, grid)
    }

    pub fn write_channels(&mut self, names: &[String]) -> Result<(), ScanError> {
        advance(&mut self.stage, Stage::Channels)?;
        header::write_channels(&mut self.writer, names)
    }

    pub fn write_spectrum_info(&mut self, num_freq: usize, is_complex: bool) -> Result<(), ScanError> {
        advance(&mut self.stage, Stage::Spectrum)?;
        header::write_spectrum_info(&mut self.writer, num_freq, is_complex)
    }

    /// All header groups in order.
    pub fn write_info(&mut self, info: &ScanInfo) -> Result<(), ScanError> {
        self.write_identity()?;
        self.write_text(info)?;
        self.write_grid(&info.grid)?;
        self.write_channels(&info.header.channel_names)?;
        self.write_spectrum_info(info.num_freq, info.is_complex)
    }

    /// Relative coordinates, then the identical absolute copy the format reserves.
    pub fn write_coordinates(&mut self, axes: &[Vec<f64>]) -> Result<(), ScanError> {
        advance(&mut self.stage, Stage::Coordinates)?;
        for coords in axes {
            Protocol::write_f64_slice(&mut self.writer, coords, "relative coordinates")?;
        }
        for coords in axes {
            Protocol::write_f64_slice(&mut self.writer, coords, "absolute coordinates")?;
        }
        Ok(())
    }

    pub fn write_frequencies(&mut self, frequencies: &[f64]) -> Result<(), ScanError> {
        advance(&mut self.stage, Stage::Frequencies)?;
        Protocol::write_f64_slice(&mut self.writer, frequencies, "frequency vector")
    }

    pub fn write_measurements(&mut self, values: &[f64]) -> Result<(), ScanError> {
        advance(&mut self.stage, Stage::Measurements)?;
        Protocol::write_f64_slice(&mut self.writer, values, "measurement data")
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W, ScanError> {
        if self.stage != Stage::Done {
            return Err(ScanError::Protocol(format!(
                "scan file finished while at {:?}",
                self.stage
            )));
        }
        self.writer
            .flush()
            .map_err(|e| ScanError::io(e, "Failed to flush scan file"))?;
        Ok(self.writer)
    }
}

/// Reads a scan file one field group at a time.
pub struct ScanReader<R: Read> {
    reader: R,
    stage: Stage,
}

impl<R: Read> ScanReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            stage: Stage::Identity,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// All header groups in order, validating magic code, version and grid.
    pub fn read_info(&mut self) -> Result<ScanInfo, ScanError> {
        advance(&mut self.stage, Stage::Identity)?;
        header::read_identity(&mut self.reader)?;

        advance(&mut self.stage, Stage::Text)?;
        let mut scan_header = header::read_text_fields(&mut self.reader)?;

        advance(&mut self.stage, Stage::Grid)?;
        let grid = header::read_grid(&mut self.reader)?;

        advance(&mut self.stage, Stage::Channels)?;
        scan_header.channel_names = header::read_channels(&mut self.reader)?;

        advance(&mut self.stage, Stage::Spectrum)?;
        let (num_freq, is_complex) = header::read_spectrum_info(&mut self.reader)?;

        debug!(
            "Header: {} channel(s), {} frequency point(s), complex={}",
            scan_header.channel_names.len(),
            num_freq,
            is_complex
        );

        Ok(ScanInfo {
            num_channels: scan_header.channel_names.len(),
            header: scan_header,
            grid,
            num_freq,
            is_complex,
        })
    }

    /// Relative coordinates; the absolute copy is read past.
    pub fn read_coordinates(&mut self, grid: &GridDescriptor) -> Result<Vec<Vec<f64>>, ScanError> {
        advance(&mut self.stage, Stage::Coordinates)?;
        let lengths = grid.coordinate_lengths();

        let relative = lengths
            .iter()
            .map(|&len| Protocol::read_f64_vec(&mut self.reader, len, "relative coordinates"))
            .collect::<Result<Vec<_>, _>>()?;
        let absolute = lengths
            .iter()
            .map(|&len| Protocol::read_f64_vec(&mut self.reader, len, "absolute coordinates"))
            .collect::<Result<Vec<_>, _>>()?;

        if absolute != relative {
            debug!("Absolute coordinates differ from relative coordinates, using relative");
        }
        Ok(relative)
    }

    pub fn read_frequencies(&mut self, num_freq: usize) -> Result<Vec<f64>, ScanError> {
        advance(&mut self.stage, Stage::Frequencies)?;
        Protocol::read_f64_vec(&mut self.reader, num_freq, "frequency vector")
    }

    /// Read the data block, zero-padding a short one and skipping anything after it.
    pub fn read_measurements(
        &mut self,
        expected: usize,
        notices: &mut Vec<Notice>,
    ) -> Result<Vec<f64>, ScanError> {
        advance(&mut self.stage, Stage::Measurements)?;
        let mut values = Protocol::read_available(&mut self.reader, expected, "measurement data")?;

        let actual = values.len();
        if actual < expected {
            values
                .try_reserve_exact(expected - actual)
                .map_err(|_| ScanError::OutOfMemory { values: expected })?;
            values.resize(expected, 0.0);
            raise(notices, Notice::DataTruncated { expected, actual });
        } else {
            let extra_bytes = Protocol::count_remaining(&mut self.reader)?;
            if extra_bytes > 0 {
                raise(notices, Notice::TrailingData { extra_bytes });
            }
        }

        debug!(
            "Read {} measurement value(s) ({} bytes)",
            actual,
            actual * VALUE_SIZE
        );
        Ok(values)
    }
}
