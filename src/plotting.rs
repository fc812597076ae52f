use textplots::{Chart, Plot};

/// Determine the best scale and unit for a given maximum value
fn determine_scale(max_value: f64) -> (f64, &'static str) {
    if max_value >= 1e9 {
        (1e-9, "G")
    } else if max_value >= 1e6 {
        (1e-6, "M")
    } else if max_value >= 1e3 {
        (1e-3, "k")
    } else if max_value >= 1.0 {
        (1.0, "")
    } else if max_value >= 1e-3 {
        (1e3, "m")
    } else if max_value >= 1e-6 {
        (1e6, "μ")
    } else if max_value >= 1e-9 {
        (1e9, "n")
    } else {
        (1e12, "p")
    }
}

fn value_range(values: &[f64]) -> (f64, f64) {
    let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    (min, max)
}

/// Plot any slice of f64 values against their sample index
///
/// # Examples
/// ```
/// use rusty_scan::plotting::plot_values;
///
/// let data = vec![1e-12, 2e-12, 1.5e-12, 3e-12];
/// plot_values(&data, Some("Magnitude"), None, None).unwrap();
/// ```
pub fn plot_values(
    values: &[f64],
    title: Option<&str>,
    width: Option<usize>,
    height: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let index: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    plot_spectrum(&index, values, title, width, height)
}

/// Plot values against a frequency axis, scaling both to a readable unit
///
/// # Arguments
/// * `frequencies` - X coordinates, one per value
/// * `values` - The data values to plot
/// * `title` - Optional title for the plot
/// * `width` - Optional plot width (default: 140)
/// * `height` - Optional plot height (default: 60)
pub fn plot_spectrum(
    frequencies: &[f64],
    values: &[f64],
    title: Option<&str>,
    width: Option<usize>,
    height: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    if values.is_empty() {
        return Err("Cannot plot empty data".into());
    }
    if frequencies.len() != values.len() {
        return Err(format!(
            "{} frequency point(s) for {} value(s)",
            frequencies.len(),
            values.len()
        )
        .into());
    }

    let width = width.unwrap_or(140);
    let height = height.unwrap_or(60);

    let (min_value, max_value) = value_range(values);
    let (value_scale, value_unit) = determine_scale(max_value.abs().max(min_value.abs()));

    let (min_freq, max_freq) = value_range(frequencies);
    let (freq_scale, freq_unit) = determine_scale(max_freq.abs().max(min_freq.abs()));

    let frame: Vec<(f32, f32)> = frequencies
        .iter()
        .zip(values)
        .map(|(&f, &v)| ((f * freq_scale) as f32, (v * value_scale) as f32))
        .collect();

    let x_min = (min_freq * freq_scale) as f32;
    // A single point still needs a non-empty x range
    let x_max = ((max_freq * freq_scale) as f32).max(x_min + 1.0);

    println!("{}", title.unwrap_or("Spectrum"));
    println!("X-axis: {}Hz | Y-axis: {}units", freq_unit, value_unit);
    println!(
        "Range: {} points | Values: {:.3} to {:.3} {}units",
        values.len(),
        min_value * value_scale,
        max_value * value_scale,
        value_unit
    );
    println!("{}", "─".repeat(width));

    Chart::new(width as u32, height as u32, x_min, x_max)
        .lineplot(&textplots::Shape::Lines(&frame))
        .nice();

    println!("Frequency ({}Hz) →", freq_unit);

    Ok(())
}
