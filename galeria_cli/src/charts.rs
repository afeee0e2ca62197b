use std::f64::consts::PI;
use std::panic;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use galeria::{ChartKind, ChartSpec};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle};

const GRID_COLUMNS: usize = 2;
const CELL_SIZE: (u32, u32) = (800, 480);

#[derive(Clone, Copy, Debug)]
pub enum ImageFormat {
    Png,
    Svg,
}

fn grid_size(count: usize) -> (usize, (u32, u32)) {
    let rows = count.div_ceil(GRID_COLUMNS).max(1);
    let size = (
        CELL_SIZE.0 * GRID_COLUMNS as u32,
        CELL_SIZE.1 * rows as u32,
    );
    (rows, size)
}

/// Render the charts into one image. A panicking backend (missing fonts and
/// the like) is reported as an error rather than unwinding into the caller.
pub fn render_charts(specs: &[ChartSpec], path: &Path, format: ImageFormat) -> Result<()> {
    if specs.is_empty() {
        return Err(anyhow!("nothing to draw"));
    }
    let (rows, size) = grid_size(specs.len());
    panic::catch_unwind(panic::AssertUnwindSafe(|| match format {
        ImageFormat::Png => draw_grid(BitMapBackend::new(path, size).into_drawing_area(), rows, specs),
        ImageFormat::Svg => draw_grid(SVGBackend::new(path, size).into_drawing_area(), rows, specs),
    }))
    .map_err(|_| anyhow!("plotting backend panicked while writing {}", path.display()))?
    .with_context(|| format!("failed to draw {}", path.display()))
}

fn draw_grid<DB>(root: DrawingArea<DB, Shift>, rows: usize, specs: &[ChartSpec]) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let cells = root.split_evenly((rows, GRID_COLUMNS));
    for (cell, spec) in cells.iter().zip(specs) {
        match spec.kind {
            ChartKind::Radar => draw_radar(cell, spec)?,
            ChartKind::Bar | ChartKind::MultiBar { .. } => draw_bars(cell, spec)?,
        }
    }
    root.present()?;
    Ok(())
}

fn caption_font() -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, 22.0, FontStyle::Bold)
}

fn label_font() -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, 13.0, FontStyle::Normal)
}

fn series_color(idx: usize) -> RGBAColor {
    Palette99::pick(idx).mix(0.8)
}

/// Horizontal extent of each dataset's bar inside category `idx`.
fn bar_span(idx: usize, dataset: usize, datasets: usize, stacked: bool) -> (f64, f64) {
    let left = idx as f64 + 0.1;
    if stacked || datasets <= 1 {
        return (left, left + 0.8);
    }
    let width = 0.8 / datasets as f64;
    let start = left + width * dataset as f64;
    (start, start + width)
}

fn draw_bars<DB>(area: &DrawingArea<DB, Shift>, spec: &ChartSpec) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let categories = spec.labels.len();
    let (lo, hi) = spec.value_range();
    // room under the data for the category labels
    let pad = (hi - lo) * 0.12;
    let stacked = spec.is_stacked();

    let mut chart = ChartBuilder::on(area)
        .caption(spec.title, caption_font())
        .margin(12)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .build_cartesian_2d(0.0..categories as f64, (lo - pad)..hi * 1.05)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_x_axis()
        .light_line_style(&TRANSPARENT)
        .y_label_formatter(&|v| format!("{:.0}", v))
        .label_style(label_font().color(&BLACK.mix(0.85)))
        .draw()?;

    chart.draw_series(std::iter::once(PathElement::new(
        vec![(0.0, 0.0), (categories as f64, 0.0)],
        BLACK.mix(0.6),
    )))?;

    let mut positive = vec![0.0_f64; categories];
    let mut negative = vec![0.0_f64; categories];
    for (d, dataset) in spec.datasets.iter().enumerate() {
        let color = series_color(d);
        let mut bars = Vec::with_capacity(categories);
        for (idx, value) in dataset.data.iter().copied().enumerate().take(categories) {
            let (x0, x1) = bar_span(idx, d, spec.datasets.len(), stacked);
            let (y0, y1) = if !stacked {
                (0.0, value)
            } else if value < 0.0 {
                let base = negative[idx];
                negative[idx] += value;
                (base, base + value)
            } else {
                let base = positive[idx];
                positive[idx] += value;
                (base, base + value)
            };
            bars.push(Rectangle::new([(x0, y0), (x1, y1)], color.filled()));
        }
        chart
            .draw_series(bars)?
            .label(dataset.label.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 14, y + 5)], color.filled()));
    }

    let text_style = label_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Top));
    chart.draw_series(spec.labels.iter().enumerate().map(|(idx, label)| {
        Text::new(label.clone(), (idx as f64 + 0.5, lo - pad * 0.25), text_style.clone())
    }))?;

    if spec.datasets.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.7))
            .border_style(&BLACK.mix(0.3))
            .label_font(label_font().color(&BLACK))
            .position(SeriesLabelPosition::UpperRight)
            .draw()?;
    }
    Ok(())
}

/// Point on the unit circle for spoke `idx` of `spokes`, first spoke pointing up.
fn spoke(idx: usize, spokes: usize, radius: f64) -> (f64, f64) {
    let angle = PI / 2.0 - 2.0 * PI * idx as f64 / spokes as f64;
    (radius * angle.cos(), radius * angle.sin())
}

fn draw_radar<DB>(area: &DrawingArea<DB, Shift>, spec: &ChartSpec) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let spokes = spec.labels.len().max(1);
    let scale = spec.suggested_max().unwrap_or(1.0);

    let mut chart = ChartBuilder::on(area)
        .caption(spec.title, caption_font())
        .margin(12)
        .build_cartesian_2d(-1.5..1.5, -1.2..1.2)?;

    let grid = BLACK.mix(0.2);
    for ring in 1..=4 {
        let radius = ring as f64 / 4.0;
        let mut outline: Vec<(f64, f64)> = (0..spokes).map(|i| spoke(i, spokes, radius)).collect();
        outline.push(outline[0]);
        chart.draw_series(std::iter::once(PathElement::new(outline, grid)))?;
    }
    chart.draw_series((0..spokes).map(|i| PathElement::new(vec![(0.0, 0.0), spoke(i, spokes, 1.0)], grid)))?;

    for (d, dataset) in spec.datasets.iter().enumerate() {
        let color = series_color(d);
        let mut points: Vec<(f64, f64)> = (0..spokes)
            .map(|i| {
                let value = dataset.data.get(i).copied().unwrap_or(0.0).max(0.0);
                spoke(i, spokes, value / scale)
            })
            .collect();
        chart.draw_series(std::iter::once(Polygon::new(points.clone(), color.mix(0.25).filled())))?;
        points.push(points[0]);
        chart
            .draw_series(std::iter::once(PathElement::new(points, color.stroke_width(2))))?
            .label(dataset.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    let text_style = label_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center));
    chart.draw_series(
        spec.labels
            .iter()
            .enumerate()
            .map(|(i, label)| Text::new(label.clone(), spoke(i, spokes, 1.12), text_style.clone())),
    )?;

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .label_font(label_font().color(&BLACK))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;
    Ok(())
}

/// Chart data embedded in a saved results page, or the file itself when it
/// is plain JSON.
pub fn extract_chart_json(text: &str) -> &str {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') {
        return trimmed;
    }
    let Some(marker) = text.find("id=\"cmp-data\"") else {
        return text;
    };
    let rest = &text[marker..];
    let Some(open_end) = rest.find('>') else {
        return text;
    };
    let body = &rest[open_end + 1..];
    match body.find("</script>") {
        Some(close) => body[..close].trim(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_chart_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_charts(&[], &dir.path().join("out.svg"), ImageFormat::Svg).unwrap_err();
        assert!(err.to_string().contains("nothing to draw"));
    }

    #[test]
    fn grid_grows_by_rows() {
        assert_eq!(grid_size(10), (5, (1600, 2400)));
        assert_eq!(grid_size(3), (2, (1600, 960)));
        assert_eq!(grid_size(0).0, 1);
    }

    #[test]
    fn grouped_bars_share_the_category() {
        let (a0, a1) = bar_span(2, 0, 2, false);
        let (b0, b1) = bar_span(2, 1, 2, false);
        assert!((a0 - 2.1).abs() < 1e-9);
        assert!((a1 - b0).abs() < 1e-9);
        assert!((b1 - 2.9).abs() < 1e-9);
        assert_eq!(bar_span(1, 3, 4, true), bar_span(1, 0, 4, true));
    }

    #[test]
    fn first_spoke_points_up() {
        let (x, y) = spoke(0, 4, 1.0);
        assert!(x.abs() < 1e-9);
        assert!((y - 1.0).abs() < 1e-9);
        let (x, y) = spoke(1, 4, 0.5);
        assert!((x - 0.5).abs() < 1e-9);
        assert!(y.abs() < 1e-9);
    }

    #[test]
    fn pulls_json_out_of_results_page() {
        let page = r#"<html><script type="application/json" id="cmp-data">
            {"labels": ["Base"]}
        </script></html>"#;
        assert_eq!(extract_chart_json(page), r#"{"labels": ["Base"]}"#);
        assert_eq!(extract_chart_json("  {\"a\":1}"), "{\"a\":1}");
        assert_eq!(extract_chart_json("no data"), "no data");
    }
}
