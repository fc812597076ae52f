use crate::error::ScanError;
use crate::scan::transform::column_major_index;
use log::warn;
use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Free-text metadata stored at the top of every scan file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanHeader {
    /// Provenance (user, date, time)
    pub header: String,
    pub description: String,
    pub device_name: String,
    pub channel_names: Vec<String>,
}

impl ScanHeader {
    pub fn new(description: impl Into<String>, device_name: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            device_name: device_name.into(),
            ..Default::default()
        }
    }

    /// Header with the provenance line filled from the current user and local time.
    pub fn stamped(description: impl Into<String>, device_name: impl Into<String>) -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        let now = chrono::Local::now();

        Self {
            header: format!("{}, {}", user, now.format("%Y-%m-%d, %H:%M:%S")),
            ..Self::new(description, device_name)
        }
    }

    pub fn with_channel_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channel_names = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Sampling grid topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridKind {
    /// Rectilinear grid, one coordinate vector per axis
    Uniform,
    /// Scattered points, one coordinate per point and axis
    NonUniform,
}

impl GridKind {
    pub fn is_uniform(self) -> bool {
        matches!(self, GridKind::Uniform)
    }
}

impl From<bool> for GridKind {
    fn from(is_uniform: bool) -> Self {
        if is_uniform {
            GridKind::Uniform
        } else {
            GridKind::NonUniform
        }
    }
}

/// Measurement samples, laid out `(axis_0, .., axis_n-1, freq[, channel])` for uniform
/// grids or `(point, freq[, channel])` for non-uniform grids.
#[derive(Debug, Clone, PartialEq)]
pub enum Measurements {
    Real(ArrayD<f64>),
    Complex(ArrayD<Complex64>),
}

impl Measurements {
    pub fn shape(&self) -> &[usize] {
        match self {
            Measurements::Real(a) => a.shape(),
            Measurements::Complex(a) => a.shape(),
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Measurements::Complex(_))
    }

    /// Magnitude of every sample, keeping the shape.
    pub fn magnitude(&self) -> ArrayD<f64> {
        match self {
            Measurements::Real(a) => a.mapv(f64::abs),
            Measurements::Complex(a) => a.mapv(|c| c.norm()),
        }
    }
}

impl From<ArrayD<f64>> for Measurements {
    fn from(value: ArrayD<f64>) -> Self {
        Measurements::Real(value)
    }
}

impl From<ArrayD<Complex64>> for Measurements {
    fn from(value: ArrayD<Complex64>) -> Self {
        Measurements::Complex(value)
    }
}

/// Everything a scan file holds, in the caller's natural layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanData {
    pub header: ScanHeader,
    pub grid: GridKind,
    /// One coordinate vector per spatial axis
    pub axes: Vec<Vec<f64>>,
    pub frequencies: Vec<f64>,
    pub data: Measurements,
}

impl ScanData {
    pub fn uniform(axes: Vec<Vec<f64>>, frequencies: Vec<f64>, data: impl Into<Measurements>) -> Self {
        Self {
            header: ScanHeader::default(),
            grid: GridKind::Uniform,
            axes,
            frequencies,
            data: data.into(),
        }
    }

    pub fn non_uniform(
        axes: Vec<Vec<f64>>,
        frequencies: Vec<f64>,
        data: impl Into<Measurements>,
    ) -> Self {
        Self {
            grid: GridKind::NonUniform,
            ..Self::uniform(axes, frequencies, data)
        }
    }

    pub fn with_header(mut self, header: ScanHeader) -> Self {
        self.header = header;
        self
    }

    /// Magnitude over frequency at one spatial point and channel.
    ///
    /// Points are counted with the first spatial axis fastest.
    pub fn magnitude_spectrum(&self, point: usize, channel: usize) -> Result<Vec<f64>, ScanError> {
        let magnitude = self.data.magnitude();
        let shape = magnitude.shape();
        let spatial_dims = if self.grid.is_uniform() {
            self.axes.len()
        } else {
            1
        };

        if shape.len() != spatial_dims + 1 && shape.len() != spatial_dims + 2 {
            return Err(ScanError::ShapeMismatch(format!(
                "data has {} dimension(s) for {spatial_dims} spatial axis/axes",
                shape.len()
            )));
        }
        let has_channel_axis = shape.len() == spatial_dims + 2;
        let num_channels = if has_channel_axis {
            shape[spatial_dims + 1]
        } else {
            1
        };
        if channel >= num_channels {
            return Err(ScanError::ShapeMismatch(format!(
                "channel {channel} out of range ({num_channels} channel(s))"
            )));
        }

        let spatial = &shape[..spatial_dims];
        let mut index = column_major_index(spatial, point).ok_or_else(|| {
            ScanError::ShapeMismatch(format!(
                "point {point} out of range ({} point(s))",
                spatial.iter().product::<usize>()
            ))
        })?;
        let freq_pos = index.len();
        index.push(0);
        if has_channel_axis {
            index.push(channel);
        }

        Ok((0..shape[spatial_dims])
            .map(|f| {
                index[freq_pos] = f;
                magnitude[IxDyn(&index)]
            })
            .collect())
    }
}

/// Non-fatal conditions met while encoding or decoding.
///
/// Every notice is logged at `warn` level when raised and also handed back to the
/// caller, so a result that may be incomplete is never silently accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    SyntheticAxis { num_points: usize },
    ChannelNamesPadded { given: usize, channels: usize },
    ChannelNamesTruncated { given: usize, channels: usize },
    DataTruncated { expected: usize, actual: usize },
    TrailingData { extra_bytes: u64 },
    ExtraOutputAxes { stored: usize, requested: usize },
    DroppedSingletonAxes { stored: usize, requested: usize },
    InferredOutputAxes { stored: usize, inferred: usize },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::SyntheticAxis { num_points } => write!(
                f,
                "Non-uniform scan with 0 axes, stored as 1 axis of {num_points} zero coordinates"
            ),
            Notice::ChannelNamesPadded { given, channels } => write!(
                f,
                "{given} channel name(s) for {channels} channel(s), default names appended"
            ),
            Notice::ChannelNamesTruncated { given, channels } => write!(
                f,
                "{given} channel name(s) for {channels} channel(s), extra names ignored"
            ),
            Notice::DataTruncated { expected, actual } => write!(
                f,
                "Scan file contains {actual} measurement values, less than the {expected} expected; data padded with zeros"
            ),
            Notice::TrailingData { extra_bytes } => write!(
                f,
                "Scan file contains {extra_bytes} byte(s) more than expected; extra data ignored"
            ),
            Notice::ExtraOutputAxes { stored, requested } => write!(
                f,
                "Requested {requested} output dimension(s), file has {stored}; zero coordinates added"
            ),
            Notice::DroppedSingletonAxes { stored, requested } => write!(
                f,
                "Requested {requested} output dimension(s), file has {stored}; singleton axes dropped"
            ),
            Notice::InferredOutputAxes { stored, inferred } => write!(
                f,
                "Output dimensions inferred as {inferred} from significant axes, file has {stored}"
            ),
        }
    }
}

pub(crate) fn raise(notices: &mut Vec<Notice>, notice: Notice) {
    warn!("{notice}");
    notices.push(notice);
}

/// How many spatial axes a decode hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputDims {
    /// As many as the file stores
    #[default]
    Stored,
    /// Up to the last axis with more than one point (at least one)
    Significant,
    /// Exactly this many, dropping singleton or adding zero axes
    Exact(usize),
}

/// What happens to a half-written file when encoding fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialFilePolicy {
    #[default]
    Keep,
    Remove,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub output_dims: OutputDims,
    /// Drop the channel axis when the file holds a single channel
    pub squeeze_channels: bool,
    /// Appended to paths without an extension
    pub extension: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub partial_file: PartialFilePolicy,
    pub extension: Option<String>,
}

/// Result of a decode: the scan plus every notice raised on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub scan: ScanData,
    pub notices: Vec<Notice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamped_header_has_provenance() {
        let header = ScanHeader::stamped("grid scan", "VNA");
        assert!(header.header.contains(", "));
        assert_eq!(header.description, "grid scan");
        assert_eq!(header.device_name, "VNA");
        assert!(header.channel_names.is_empty());
    }

    #[test]
    fn test_measurements_shape_and_magnitude() {
        let data = ArrayD::from_shape_vec(
            IxDyn(&[1, 2]),
            vec![Complex64::new(3.0, 4.0), Complex64::new(0.0, -1.0)],
        )
        .unwrap();
        let m = Measurements::from(data);

        assert!(m.is_complex());
        assert_eq!(m.shape(), &[1, 2]);
        assert_eq!(m.magnitude().into_raw_vec_and_offset().0, vec![5.0, 1.0]);
    }

    #[test]
    fn test_magnitude_spectrum_uniform() {
        // data[x, y, f, c] = 12x + 4y + 2f + c
        let data = ArrayD::from_shape_vec(IxDyn(&[2, 3, 2, 2]), (0..24).map(f64::from).collect())
            .unwrap();
        let scan = ScanData::uniform(
            vec![vec![0.0, 1.0], vec![0.0, 1.0, 2.0]],
            vec![1.0, 2.0],
            data,
        );

        // Point 3 is x = 1, y = 1.
        assert_eq!(scan.magnitude_spectrum(3, 1).unwrap(), vec![17.0, 19.0]);
        assert_eq!(scan.magnitude_spectrum(0, 0).unwrap(), vec![0.0, 2.0]);
        assert!(scan.magnitude_spectrum(6, 0).is_err());
        assert!(scan.magnitude_spectrum(0, 2).is_err());
    }

    #[test]
    fn test_magnitude_spectrum_without_channel_axis() {
        let data = ArrayD::from_shape_vec(
            IxDyn(&[2, 2]),
            vec![
                Complex64::new(3.0, 4.0),
                Complex64::new(0.0, 1.0),
                Complex64::new(-6.0, 8.0),
                Complex64::new(0.0, -2.0),
            ],
        )
        .unwrap();
        let scan = ScanData::non_uniform(vec![vec![0.0, 1.0]], vec![1.0, 2.0], data);

        assert_eq!(scan.magnitude_spectrum(1, 0).unwrap(), vec![10.0, 2.0]);
        assert!(scan.magnitude_spectrum(0, 1).is_err());
    }

    #[test]
    fn test_notice_display() {
        let notice = Notice::DataTruncated {
            expected: 12,
            actual: 10,
        };
        assert!(notice.to_string().contains("padded with zeros"));
    }
}
