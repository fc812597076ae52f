use crate::error::ScanError;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::{self, Read, Write};

// Wire constants
pub const SCAN_FILE_CODE: f64 = 63_474_328.0;
pub const SCAN_FILE_VERSION: f64 = 1.0;
pub const SCAN_EXTENSION: &str = "scan";
pub const VALUE_SIZE: usize = 8;
/// Values pulled from the stream per read call when the total is not trusted yet
pub const READ_CHUNK_VALUES: usize = 64 * 1024;
/// Largest count accepted from a header field (2^48)
pub const MAX_COUNT: f64 = 281_474_976_710_656.0;

/// Little-endian f64 field primitives shared by every field group of the format.
pub struct Protocol;

impl Protocol {
    pub fn write_f64<W: Write>(writer: &mut W, value: f64, field: &str) -> Result<(), ScanError> {
        writer
            .write_f64::<LittleEndian>(value)
            .map_err(|e| ScanError::io(e, format!("Failed to write {field}")))
    }

    /// Counts and flags are stored as integer-valued doubles.
    pub fn write_count<W: Write>(writer: &mut W, count: usize, field: &str) -> Result<(), ScanError> {
        Self::write_f64(writer, count as f64, field)
    }

    pub fn write_flag<W: Write>(writer: &mut W, flag: bool, field: &str) -> Result<(), ScanError> {
        Self::write_f64(writer, if flag { 1.0 } else { 0.0 }, field)
    }

    pub fn write_f64_slice<W: Write>(
        writer: &mut W,
        values: &[f64],
        field: &str,
    ) -> Result<(), ScanError> {
        let mut buf = vec![0u8; values.len().min(READ_CHUNK_VALUES) * VALUE_SIZE];
        for chunk in values.chunks(READ_CHUNK_VALUES) {
            let bytes = &mut buf[..chunk.len() * VALUE_SIZE];
            LittleEndian::write_f64_into(chunk, bytes);
            writer
                .write_all(bytes)
                .map_err(|e| ScanError::io(e, format!("Failed to write {field}")))?;
        }
        Ok(())
    }

    pub fn write_counts<W: Write>(
        writer: &mut W,
        counts: &[usize],
        field: &str,
    ) -> Result<(), ScanError> {
        let values: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
        Self::write_f64_slice(writer, &values, field)
    }

    /// Reject strings that cannot survive the char-per-double encoding.
    pub fn check_string(text: &str, field: &str) -> Result<(), ScanError> {
        match text.chars().find(|&c| u32::from(c) > 0xFF) {
            Some(c) => Err(ScanError::InvalidString(format!(
                "{field} contains '{c}' (U+{:04X}), only single-byte characters can be stored",
                u32::from(c)
            ))),
            None => Ok(()),
        }
    }

    /// `{length}{one double per character code}`
    pub fn write_string<W: Write>(writer: &mut W, text: &str, field: &str) -> Result<(), ScanError> {
        Self::check_string(text, field)?;
        let codes: Vec<f64> = text.chars().map(|c| f64::from(u32::from(c))).collect();
        Self::write_count(writer, codes.len(), field)?;
        Self::write_f64_slice(writer, &codes, field)
    }

    pub fn read_f64<R: Read>(reader: &mut R, field: &str) -> Result<f64, ScanError> {
        reader
            .read_f64::<LittleEndian>()
            .map_err(|e| Self::read_error(e, field))
    }

    /// Read an integer-valued double and convert it to a count.
    pub fn read_count<R: Read>(reader: &mut R, field: &str) -> Result<usize, ScanError> {
        let value = Self::read_f64(reader, field)?;
        Self::to_count(value, field)
    }

    pub fn read_flag<R: Read>(reader: &mut R, field: &str) -> Result<bool, ScanError> {
        let value = Self::read_f64(reader, field)?;
        if value.is_nan() {
            return Err(ScanError::Corrupt(format!("{field} flag is NaN")));
        }
        Ok(value != 0.0)
    }

    pub fn to_count(value: f64, field: &str) -> Result<usize, ScanError> {
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > MAX_COUNT {
            return Err(ScanError::Corrupt(format!(
                "{field} must be a non-negative integer, got {value}"
            )));
        }
        Ok(value as usize)
    }

    /// Read exactly `len` doubles; running out of bytes is structural corruption.
    pub fn read_f64_vec<R: Read>(
        reader: &mut R,
        len: usize,
        field: &str,
    ) -> Result<Vec<f64>, ScanError> {
        let values = Self::read_available(reader, len, field)?;
        if values.len() < len {
            debug!("{field}: expected {len} values, stream ended after {}", values.len());
            return Err(ScanError::Corrupt(format!(
                "stream ended while reading {field} ({} of {len} values)",
                values.len()
            )));
        }
        Ok(values)
    }

    pub fn read_counts<R: Read>(
        reader: &mut R,
        len: usize,
        field: &str,
    ) -> Result<Vec<usize>, ScanError> {
        Self::read_f64_vec(reader, len, field)?
            .into_iter()
            .map(|v| Self::to_count(v, field))
            .collect()
    }

    pub fn read_string<R: Read>(reader: &mut R, field: &str) -> Result<String, ScanError> {
        let len = Self::read_count(reader, field)?;
        let codes = Self::read_f64_vec(reader, len, field)?;
        codes
            .into_iter()
            .map(|code| {
                Self::to_count(code, field)
                    .ok()
                    .and_then(|c| u32::try_from(c).ok())
                    .and_then(char::from_u32)
                    .ok_or_else(|| {
                        ScanError::Corrupt(format!("{field} holds invalid character code {code}"))
                    })
            })
            .collect()
    }

    /// Read up to `len` doubles, stopping early at end of stream.
    ///
    /// Memory grows chunk by chunk so a garbage length in a damaged header fails on
    /// end of stream instead of on one huge allocation. A trailing partial value
    /// (fewer than 8 bytes) is discarded.
    pub fn read_available<R: Read>(
        reader: &mut R,
        len: usize,
        field: &str,
    ) -> Result<Vec<f64>, ScanError> {
        let mut values: Vec<f64> = Vec::new();
        let mut bytes: Vec<u8> = Vec::new();

        while values.len() < len {
            let want = (len - values.len()).min(READ_CHUNK_VALUES);
            bytes.clear();
            reader
                .by_ref()
                .take((want * VALUE_SIZE) as u64)
                .read_to_end(&mut bytes)
                .map_err(|e| Self::read_error(e, field))?;

            let whole = bytes.len() / VALUE_SIZE;
            let start = values.len();
            values
                .try_reserve_exact(whole)
                .map_err(|_| ScanError::OutOfMemory { values: len })?;
            values.resize(start + whole, 0.0);
            LittleEndian::read_f64_into(&bytes[..whole * VALUE_SIZE], &mut values[start..]);

            if whole < want {
                break;
            }
        }

        Ok(values)
    }

    /// Count (and consume) whatever is left in the stream.
    pub fn count_remaining<R: Read>(reader: &mut R) -> Result<u64, ScanError> {
        io::copy(reader, &mut io::sink())
            .map_err(|e| ScanError::io(e, "Failed to skip trailing data"))
    }

    fn read_error(e: io::Error, field: &str) -> ScanError {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ScanError::Corrupt(format!("stream ended while reading {field}"))
        } else {
            ScanError::io(e, format!("Failed to read {field}"))
        }
    }
}
