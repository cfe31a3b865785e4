use anyhow::{Context, Result, bail};
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::io::Cursor;

use crate::blocks::ChartBlock;

/// Pixel size of a rendered chart.
pub const CHART_SIZE: (u32, u32) = (1100, 600);

const IN_RANGE: RGBColor = RGBColor(0x2E, 0xCC, 0x71);
const OUT_OF_RANGE: RGBColor = RGBColor(0xE7, 0x4C, 0x3C);
const NORMAL_MIDPOINT: RGBColor = RGBColor(0x34, 0x98, 0xDB);

const BAR_WIDTH: f64 = 0.35;

/// Draw a value-vs-normal-range bar chart and encode it as PNG.
///
/// Each test gets two bars: the patient's value (red when outside the
/// range) and the range midpoint with an error bar spanning min..max.
pub fn render_chart_png(chart: &ChartBlock) -> Result<Vec<u8>> {
    let y_max = axis_top(chart)?;
    let (width, height) = CHART_SIZE;
    let mut buffer = vec![0u8; width as usize * height as usize * 3];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw_chart(&root, chart, y_max)?;
        root.present()?;
    }

    encode_png(buffer, width, height)
}

/// Upper end of the value axis, with headroom for the labels. The mesh is
/// generated over the whole axis, so every bar must be finite.
fn axis_top(chart: &ChartBlock) -> Result<f64> {
    let mut top = 0.0f64;
    for bar in &chart.bars {
        if ![bar.value, bar.min, bar.max].iter().all(|v| v.is_finite()) {
            bail!("chart value for {} is not a finite number", bar.label);
        }
        top = top.max(bar.value).max(bar.max);
    }

    let top = if top > 0.0 { top * 1.2 } else { 1.0 };
    if !top.is_finite() {
        bail!("chart values are too large to plot");
    }
    Ok(top)
}

fn draw_chart(
    root: &DrawingArea<BitMapBackend<'_>, Shift>,
    chart: &ChartBlock,
    y_max: f64,
) -> Result<()> {
    root.fill(&WHITE)?;

    let count = chart.bars.len().max(1);
    let labels: Vec<String> = chart.bars.iter().map(|bar| bar.label.clone()).collect();

    let mut ctx = ChartBuilder::on(root)
        .caption(&chart.title, ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(count as f64 - 0.5), 0f64..y_max)?;

    ctx.configure_mesh()
        .disable_x_mesh()
        .x_labels(count)
        .x_label_formatter(&|x| tick_label(&labels, *x))
        .x_desc("Blood Tests")
        .y_desc("Values")
        .draw()?;

    ctx.draw_series(chart.bars.iter().enumerate().map(|(i, bar)| {
        let x = i as f64;
        let color = if bar.out_of_range() { OUT_OF_RANGE } else { IN_RANGE };
        Rectangle::new([(x - BAR_WIDTH, 0.0), (x, bar.value)], color.filled())
    }))?
    .label("Your Values")
    .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], IN_RANGE.filled()));

    ctx.draw_series(chart.bars.iter().enumerate().map(|(i, bar)| {
        let x = i as f64;
        Rectangle::new([(x, 0.0), (x + BAR_WIDTH, bar.midpoint())], NORMAL_MIDPOINT.filled())
    }))?
    .label("Normal Range (Average)")
    .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], NORMAL_MIDPOINT.filled()));

    ctx.draw_series(chart.bars.iter().enumerate().map(|(i, bar)| {
        ErrorBar::new_vertical(
            i as f64 + BAR_WIDTH / 2.0,
            bar.min,
            bar.midpoint(),
            bar.max,
            BLACK.filled(),
            10,
        )
    }))?;

    let value_font = ("sans-serif", 14).into_font();
    ctx.draw_series(chart.bars.iter().enumerate().map(|(i, bar)| {
        Text::new(
            format!("{:.1}", bar.value),
            (i as f64 - BAR_WIDTH, bar.value + y_max * 0.01),
            value_font.clone(),
        )
    }))?;
    ctx.draw_series(chart.bars.iter().enumerate().map(|(i, bar)| {
        Text::new(
            format!("{:.1}-{:.1}", bar.min, bar.max),
            (i as f64 + 0.02, bar.max + y_max * 0.01),
            value_font.clone(),
        )
    }))?;

    ctx.configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    Ok(())
}

/// Test name for integer ticks; blank elsewhere.
fn tick_label(labels: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    labels.get(idx as usize).cloned().unwrap_or_default()
}

fn encode_png(buffer: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>> {
    let image = RgbImage::from_raw(width, height, buffer)
        .context("chart buffer does not match the chart size")?;

    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut png, ImageOutputFormat::Png)
        .context("failed to encode chart as PNG")?;

    Ok(png.into_inner())
}
