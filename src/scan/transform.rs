//! Layout transforms between the caller's sample arrays and the flat data block.
//!
//! The data block is the sample array permuted to `(freq, channel, spatial..)` and
//! flattened column-major, so its flat index is
//! `f + nf * (c + nc * (s0 + S0 * (s1 + S1 * ..)))`. Uniform grids additionally get
//! the raster flip, which turns forward-ordered rows into the back-and-forth order
//! the scan head actually swept. Complex samples are stored as all real parts
//! followed by all imaginary parts.

use crate::error::ScanError;
use crate::types::Measurements;
use ndarray::{ArrayD, Axis, IxDyn, ShapeBuilder};
use num_complex::Complex64;

/// Shape of the data block: frequency, channel, then spatial axes in scan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireLayout {
    pub num_freq: usize,
    pub num_channels: usize,
    pub spatial: Vec<usize>,
}

impl WireLayout {
    pub fn new(num_freq: usize, num_channels: usize, spatial: Vec<usize>) -> Self {
        Self {
            num_freq,
            num_channels,
            spatial,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.num_freq * self.num_channels * self.spatial.iter().product::<usize>()
    }

    fn shape(&self) -> Vec<usize> {
        let mut shape = vec![self.num_freq, self.num_channels];
        shape.extend_from_slice(&self.spatial);
        shape
    }

    /// Spatial axes that take part in the raster flip (all but the last).
    fn flip_axes(&self) -> std::ops::Range<usize> {
        0..self.spatial.len().saturating_sub(1)
    }
}

/// Reverse spatial axis `axis` on every odd stripe of the axes after it.
///
/// The block is walked as `(inner, size, after)` where `inner` covers frequency,
/// channel and all spatial axes before `axis`. For each odd `after` index, the
/// `size` sub-blocks of length `inner` are swapped end for end. Applying this twice
/// restores the input.
pub fn flip_axis<T>(values: &mut [T], layout: &WireLayout, axis: usize) {
    let spatial = &layout.spatial;
    let inner = layout.num_freq * layout.num_channels * spatial[..axis].iter().product::<usize>();
    let size = spatial[axis];
    let after: usize = spatial[axis + 1..].iter().product();
    let stripe = inner * size;

    if inner == 0 || size < 2 {
        return;
    }

    for a in (1..after).step_by(2) {
        let base = a * stripe;
        for k in 0..size / 2 {
            let lo = base + k * inner;
            let hi = base + (size - 1 - k) * inner;
            let (head, tail) = values.split_at_mut(hi);
            head[lo..lo + inner].swap_with_slice(&mut tail[..inner]);
        }
    }
}

/// Forward-ordered rows to sweep order: flip axes first to last-but-one, in turn.
pub fn raster_flip<T>(values: &mut [T], layout: &WireLayout) {
    for axis in layout.flip_axes() {
        flip_axis(values, layout, axis);
    }
}

/// Sweep order back to forward-ordered rows.
///
/// Each pass is its own inverse, but passes on different axes do not commute once a
/// row count is even, so they are undone last to first.
pub fn raster_unflip<T>(values: &mut [T], layout: &WireLayout) {
    for axis in layout.flip_axes().rev() {
        flip_axis(values, layout, axis);
    }
}

/// Split a flat index, first axis fastest, into one index per axis.
///
/// Returns `None` when `flat` lies outside `shape`.
pub fn column_major_index(shape: &[usize], flat: usize) -> Option<Vec<usize>> {
    if flat >= shape.iter().product::<usize>() {
        return None;
    }
    let mut rest = flat;
    Some(
        shape
            .iter()
            .map(|&len| {
                let index = rest % len;
                rest /= len;
                index
            })
            .collect(),
    )
}

/// `[re_0, .., re_n-1, im_0, .., im_n-1]`
pub fn pack_complex(values: &[Complex64]) -> Vec<f64> {
    values
        .iter()
        .map(|c| c.re)
        .chain(values.iter().map(|c| c.im))
        .collect()
}

pub fn unpack_complex(values: &[f64]) -> Result<Vec<Complex64>, ScanError> {
    if values.len() % 2 != 0 {
        return Err(ScanError::Corrupt(format!(
            "complex data block holds an odd number of values ({})",
            values.len()
        )));
    }
    let (re, im) = values.split_at(values.len() / 2);
    Ok(re
        .iter()
        .zip(im)
        .map(|(&re, &im)| Complex64::new(re, im))
        .collect())
}

/// Flatten `(spatial.., freq[, channel])` into the column-major `(freq, channel, spatial..)` block.
pub fn to_wire_order<T: Clone>(
    data: &ArrayD<T>,
    spatial_axes: usize,
    has_channel_axis: bool,
) -> Vec<T> {
    let mut view = data.view();
    if !has_channel_axis {
        view = view.insert_axis(Axis(spatial_axes + 1));
    }

    let mut order = vec![spatial_axes, spatial_axes + 1];
    order.extend(0..spatial_axes);

    // Iterating the reversed axes in logical order runs the first axis fastest.
    view.permuted_axes(order)
        .reversed_axes()
        .iter()
        .cloned()
        .collect()
}

/// Rebuild `(file axes.., freq, channel)` from a column-major block.
///
/// `scan_positions[k]` is the position of file axis `k` among the block's spatial
/// axes, as laid down by the stored `dim_order`.
pub fn from_wire_order<T: Clone>(
    values: Vec<T>,
    layout: &WireLayout,
    scan_positions: &[usize],
) -> Result<ArrayD<T>, ScanError> {
    let block = ArrayD::from_shape_vec(IxDyn(&layout.shape()).f(), values).map_err(|e| {
        ScanError::Corrupt(format!(
            "data block does not fit shape {:?}: {e}",
            layout.shape()
        ))
    })?;

    let mut order: Vec<usize> = scan_positions.iter().map(|&p| p + 2).collect();
    order.extend([0, 1]);

    Ok(block.permuted_axes(order).as_standard_layout().into_owned())
}

/// Turn caller samples into the values of the data block.
pub fn encode_measurements(
    data: &Measurements,
    layout: &WireLayout,
    spatial_axes: usize,
    has_channel_axis: bool,
    raster: bool,
) -> Vec<f64> {
    match data {
        Measurements::Real(array) => {
            let mut values = to_wire_order(array, spatial_axes, has_channel_axis);
            if raster {
                raster_flip(&mut values, layout);
            }
            values
        }
        Measurements::Complex(array) => {
            let mut values = to_wire_order(array, spatial_axes, has_channel_axis);
            if raster {
                raster_flip(&mut values, layout);
            }
            pack_complex(&values)
        }
    }
}

/// Inverse of [`encode_measurements`]; the result has shape `(file axes.., freq, channel)`.
pub fn decode_measurements(
    values: Vec<f64>,
    is_complex: bool,
    layout: &WireLayout,
    scan_positions: &[usize],
    raster: bool,
) -> Result<Measurements, ScanError> {
    let expected = layout.len() * if is_complex { 2 } else { 1 };
    if values.len() != expected {
        return Err(ScanError::Corrupt(format!(
            "data block holds {} value(s), layout needs {expected}",
            values.len()
        )));
    }

    if is_complex {
        let mut samples = unpack_complex(&values)?;
        if raster {
            raster_unflip(&mut samples, layout);
        }
        Ok(Measurements::Complex(from_wire_order(
            samples,
            layout,
            scan_positions,
        )?))
    } else {
        let mut samples = values;
        if raster {
            raster_unflip(&mut samples, layout);
        }
        Ok(Measurements::Real(from_wire_order(
            samples,
            layout,
            scan_positions,
        )?))
    }
}
