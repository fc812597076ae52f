use crate::error::ScanError;
use crate::types::{raise, GridKind, Notice, OutputDims};
use log::debug;
use serde::Serialize;

/// The four scan parameters stored in the file header.
///
/// `dim_order` lists file axes in sweep precedence. It is always sequential for files
/// written by this crate but is kept verbatim when read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridDescriptor {
    pub is_uniform: bool,
    pub dim_order: Vec<usize>,
    /// Per-axis point counts, or `[num_points, 1, ..]` for non-uniform grids
    pub dim_size: Vec<usize>,
}

/// Encode-side outcome of checking caller arrays against each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodePlan {
    pub grid: GridDescriptor,
    pub num_channels: usize,
    /// Leading axes of the caller's sample array before the frequency axis
    pub data_spatial_axes: usize,
    pub has_channel_axis: bool,
    /// Non-uniform data without axes gets one axis of zero coordinates
    pub synthetic_axis: bool,
}

/// Decode-side outcome of reconciling stored and requested dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisPlan {
    /// Stored axes handed back
    pub keep: usize,
    /// Zero-coordinate axes appended
    pub add: usize,
}

impl AxisPlan {
    pub fn output_dims(&self) -> usize {
        self.keep + self.add
    }
}

impl GridDescriptor {
    pub fn sequential(is_uniform: bool, dim_size: Vec<usize>) -> Self {
        Self {
            is_uniform,
            dim_order: (0..dim_size.len()).collect(),
            dim_size,
        }
    }

    pub fn kind(&self) -> GridKind {
        GridKind::from(self.is_uniform)
    }

    pub fn num_dims(&self) -> usize {
        self.dim_size.len()
    }

    /// Spatial sample count: product of axis sizes, or the point count.
    pub fn num_spatial_points(&self) -> usize {
        if self.is_uniform {
            self.dim_size.iter().product()
        } else {
            self.dim_size.first().copied().unwrap_or(0)
        }
    }

    /// Length of each stored coordinate vector.
    pub fn coordinate_lengths(&self) -> Vec<usize> {
        if self.is_uniform {
            self.dim_size.clone()
        } else {
            vec![self.num_spatial_points(); self.num_dims()]
        }
    }

    /// One past the last axis holding more than one point.
    pub fn significant_dims(&self) -> usize {
        self.dim_size
            .iter()
            .rposition(|&size| size > 1)
            .map_or(0, |i| i + 1)
    }

    /// Axis sizes in sweep precedence, the spatial layout of the data block.
    pub fn sizes_in_scan_order(&self) -> Vec<usize> {
        self.dim_order.iter().map(|&axis| self.dim_size[axis]).collect()
    }

    /// Position of every file axis within the sweep precedence.
    pub fn scan_positions(&self) -> Vec<usize> {
        let mut positions = vec![0; self.dim_order.len()];
        for (position, &axis) in self.dim_order.iter().enumerate() {
            positions[axis] = position;
        }
        positions
    }

    /// Check a descriptor read from a file before anything is sized from it.
    pub fn validate(&self) -> Result<(), ScanError> {
        let n = self.num_dims();
        if self.dim_order.len() != n {
            return Err(ScanError::Corrupt(format!(
                "dim_order has {} entries for {n} dimension(s)",
                self.dim_order.len()
            )));
        }

        let mut seen = vec![false; n];
        for &axis in &self.dim_order {
            if axis >= n || seen[axis] {
                return Err(ScanError::Corrupt(format!(
                    "dim_order {:?} is not a permutation of 0..{n}",
                    self.dim_order
                )));
            }
            seen[axis] = true;
        }

        if !self.is_uniform && n == 0 {
            return Err(ScanError::Corrupt(
                "non-uniform scan stores no point axis".to_string(),
            ));
        }

        if self.is_uniform {
            self.dim_size
                .iter()
                .try_fold(1usize, |acc, &size| acc.checked_mul(size))
                .ok_or_else(|| {
                    ScanError::Corrupt(format!("grid {:?} is too large", self.dim_size))
                })?;
        }

        Ok(())
    }

    /// Derive the stored grid from the caller's coordinates and sample array shape.
    pub fn plan_encode(
        kind: GridKind,
        axes: &[Vec<f64>],
        data_shape: &[usize],
        num_freq: usize,
        notices: &mut Vec<Notice>,
    ) -> Result<EncodePlan, ScanError> {
        let num_dims = axes.len();
        let ndim = data_shape.len();

        let plan = match kind {
            GridKind::Uniform => {
                if !(num_dims + 1..=num_dims + 2).contains(&ndim) {
                    return Err(ScanError::ShapeMismatch(format!(
                        "uniform data has {ndim} dimension(s), expected {} or {} for {num_dims} spatial axis/axes",
                        num_dims + 1,
                        num_dims + 2
                    )));
                }

                for (i, coords) in axes.iter().enumerate() {
                    if coords.len() != data_shape[i] {
                        return Err(ScanError::ShapeMismatch(format!(
                            "axis {i} has {} coordinate(s), data dimension {i} has size {}",
                            coords.len(),
                            data_shape[i]
                        )));
                    }
                }

                if data_shape[num_dims] != num_freq {
                    return Err(ScanError::ShapeMismatch(format!(
                        "data dimension {num_dims} has size {}, frequency vector has {num_freq} value(s)",
                        data_shape[num_dims]
                    )));
                }

                let has_channel_axis = ndim == num_dims + 2;
                EncodePlan {
                    grid: Self::sequential(true, axes.iter().map(Vec::len).collect()),
                    num_channels: if has_channel_axis { data_shape[num_dims + 1] } else { 1 },
                    data_spatial_axes: num_dims,
                    has_channel_axis,
                    synthetic_axis: false,
                }
            }
            GridKind::NonUniform => {
                if !(2..=3).contains(&ndim) {
                    return Err(ScanError::ShapeMismatch(format!(
                        "non-uniform data has {ndim} dimension(s), expected 2 (points, freq) or 3 (points, freq, channel)"
                    )));
                }

                let num_points = data_shape[0];
                for (i, coords) in axes.iter().enumerate() {
                    if coords.len() != num_points {
                        return Err(ScanError::ShapeMismatch(format!(
                            "axis {i} has {} coordinate(s), data holds {num_points} point(s)",
                            coords.len()
                        )));
                    }
                }

                if data_shape[1] != num_freq {
                    return Err(ScanError::ShapeMismatch(format!(
                        "data dimension 1 has size {}, frequency vector has {num_freq} value(s)",
                        data_shape[1]
                    )));
                }

                let synthetic_axis = num_dims == 0;
                if synthetic_axis {
                    raise(notices, Notice::SyntheticAxis { num_points });
                }

                let mut dim_size = vec![1; num_dims.max(1)];
                dim_size[0] = num_points;

                let has_channel_axis = ndim == 3;
                EncodePlan {
                    grid: Self::sequential(false, dim_size),
                    num_channels: if has_channel_axis { data_shape[2] } else { 1 },
                    data_spatial_axes: 1,
                    has_channel_axis,
                    synthetic_axis,
                }
            }
        };

        debug!(
            "Encode grid: uniform={}, dim_size={:?}, channels={}",
            plan.grid.is_uniform, plan.grid.dim_size, plan.num_channels
        );
        Ok(plan)
    }

    /// Reconcile the stored dimensionality with what the caller asked for.
    ///
    /// Axes holding more than one point are never dropped. Surplus stored axes of
    /// size one are dropped, and missing axes are filled with zero coordinates.
    pub fn reconcile(
        &self,
        requested: OutputDims,
        notices: &mut Vec<Notice>,
    ) -> Result<AxisPlan, ScanError> {
        let stored = self.num_dims();
        let significant = self.significant_dims();

        let target = match requested {
            OutputDims::Stored => stored,
            OutputDims::Exact(n) => n,
            OutputDims::Significant => {
                let inferred = if stored > 0 { significant.max(1) } else { 0 };
                if inferred != stored {
                    raise(
                        notices,
                        Notice::InferredOutputAxes {
                            stored,
                            inferred,
                        },
                    );
                }
                inferred
            }
        };

        if target < significant {
            return Err(ScanError::DimensionMismatch {
                requested: target,
                significant,
            });
        }

        let plan = if target < stored {
            if matches!(requested, OutputDims::Exact(_)) {
                raise(
                    notices,
                    Notice::DroppedSingletonAxes {
                        stored,
                        requested: target,
                    },
                );
            }
            AxisPlan {
                keep: target,
                add: 0,
            }
        } else if target > stored {
            raise(
                notices,
                Notice::ExtraOutputAxes {
                    stored,
                    requested: target,
                },
            );
            AxisPlan {
                keep: stored,
                add: target - stored,
            }
        } else {
            AxisPlan {
                keep: stored,
                add: 0,
            }
        };

        Ok(plan)
    }
}
