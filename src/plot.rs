//! Comparison plots across run logs.
//!
//! Each selected metric becomes one SVG line chart with every run drawn
//! as a colored series. An `index.html` is written next to the charts
//! with a legend checkbox per run; unticking one hides that run's lines
//! in every chart on the page.

use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::error::{BenchtraceError, Result};
use crate::logfile::{self, RunTag, SampleRow};
use crate::resample;

const CHART_SIZE: (u32, u32) = (1000, 420);

/// Matplotlib-style series colors, cycled when there are more runs.
const PALETTE: [RGBColor; 10] = [
    RGBColor(0, 0, 255),     // blue
    RGBColor(0, 128, 0),     // green
    RGBColor(255, 0, 0),     // red
    RGBColor(0, 191, 191),   // cyan
    RGBColor(191, 0, 191),   // magenta
    RGBColor(191, 191, 0),   // yellow
    RGBColor(0, 0, 0),       // black
    RGBColor(255, 165, 0),   // orange
    RGBColor(128, 0, 128),   // purple
    RGBColor(165, 42, 42),   // brown
];

/// A plottable metric, selected by one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cpu,
    Mem,
    Reads,
}

impl Metric {
    /// Parse a selector such as `cmr`. Order is kept, duplicates are
    /// dropped, and anything outside `{c,m,r}` is a usage error.
    pub fn parse_selector(selector: &str) -> Result<Vec<Metric>> {
        if selector.is_empty() {
            return Err(BenchtraceError::Config("metric selector is empty".into()));
        }
        let mut metrics = Vec::new();
        for ch in selector.chars() {
            let metric = match ch {
                'c' => Metric::Cpu,
                'm' => Metric::Mem,
                'r' => Metric::Reads,
                other => return Err(BenchtraceError::InvalidMetric(other)),
            };
            if !metrics.contains(&metric) {
                metrics.push(metric);
            }
        }
        Ok(metrics)
    }

    pub fn title(self) -> &'static str {
        match self {
            Metric::Cpu => "Cumulative CPU Usage",
            Metric::Mem => "Memory Usage",
            Metric::Reads => "Disk Reads",
        }
    }

    pub fn y_desc(self) -> &'static str {
        match self {
            Metric::Cpu => "Percent",
            Metric::Mem => "MB",
            Metric::Reads => "KB",
        }
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Mem => "mem",
            Metric::Reads => "reads",
        }
    }

    /// Chart-space value of a row for this metric.
    pub fn value(self, row: &SampleRow) -> f64 {
        match self {
            Metric::Cpu => row.cpu_percent,
            Metric::Mem => row.mem_bytes / 1_000_000.0,
            Metric::Reads => row.io_read_bytes / 1000.0,
        }
    }
}

/// One run ready to draw: label, color and post-processed rows.
pub struct RunSeries {
    pub label: String,
    pub color: RGBColor,
    pub rows: Vec<SampleRow>,
}

impl RunSeries {
    fn color_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.color.0, self.color.1, self.color.2)
    }
}

pub struct PlotOptions {
    pub metrics: Vec<Metric>,
    pub resample: Option<f64>,
    pub pretty: bool,
    pub max_mem_mb: Option<f64>,
    pub max_time_secs: Option<f64>,
    pub out_dir: PathBuf,
}

/// Load logs and turn them into plottable series.
///
/// Runs are sorted by tag group so variants of the same program/dataset
/// sit next to each other in the legend, then colored in order.
pub fn prepare_series(paths: &[PathBuf], opts: &PlotOptions) -> Result<Vec<RunSeries>> {
    let mut loaded: Vec<(RunTag, Vec<SampleRow>)> = Vec::new();

    for path in paths {
        let tag = RunTag::parse(&logfile::tag_from_path(path));
        let mut rows = logfile::read_log(path)?;

        if let Some(interval) = opts.resample {
            rows = resample::resample(&rows, interval)?;
        }
        if let Some(max_time) = opts.max_time_secs {
            resample::clip_time(&mut rows, max_time);
        }
        if opts.pretty {
            resample::normalize_cpu(&mut rows, tag.workers());
        }

        loaded.push((tag, rows));
    }

    loaded.sort_by(|a, b| {
        (a.0.group_key(), a.0.label()).cmp(&(b.0.group_key(), b.0.label()))
    });

    Ok(loaded
        .into_iter()
        .enumerate()
        .map(|(i, (tag, rows))| RunSeries {
            label: tag.label(),
            color: PALETTE[i % PALETTE.len()],
            rows,
        })
        .collect())
}

/// Render one SVG per selected metric plus the interactive index page.
///
/// Returns the path of the index page.
pub fn render(series: &[RunSeries], opts: &PlotOptions) -> Result<PathBuf> {
    fs::create_dir_all(&opts.out_dir)?;

    let mut chart_paths = Vec::new();
    for &metric in &opts.metrics {
        let path = opts.out_dir.join(format!("{}.svg", metric.file_stem()));
        render_metric(metric, series, opts, &path)?;
        chart_paths.push((metric, path));
    }

    write_index_html(&opts.out_dir, &chart_paths, series)
}

fn perr<E: std::fmt::Display>(e: E) -> BenchtraceError {
    BenchtraceError::Plot(e.to_string())
}

fn render_metric(
    metric: Metric,
    series: &[RunSeries],
    opts: &PlotOptions,
    path: &Path,
) -> Result<()> {
    let x_max = series
        .iter()
        .flat_map(|s| s.rows.iter())
        .map(|r| r.time)
        .fold(0.0, f64::max)
        .max(1.0);

    let mut y_max = series
        .iter()
        .flat_map(|s| s.rows.iter())
        .map(|r| metric.value(r))
        .fold(0.0, f64::max);
    if metric == Metric::Mem {
        if let Some(cap) = opts.max_mem_mb {
            y_max = y_max.min(cap);
        }
    }
    let y_max = (y_max * 1.05).max(1.0);

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(perr)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(metric.title(), ("sans-serif", 24))
        .margin(12)
        .x_label_area_size(36)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, 0.0..y_max)
        .map_err(perr)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc(metric.y_desc())
        .draw()
        .map_err(perr)?;

    for s in series {
        let color = s.color;
        chart
            .draw_series(LineSeries::new(
                s.rows.iter().map(|r| (r.time, metric.value(r))),
                &color,
            ))
            .map_err(perr)?
            .label(s.label.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(perr)?;

    root.present().map_err(perr)?;
    Ok(())
}

/// Write `index.html` with the charts inlined and a legend checkbox per
/// run. Toggling matches SVG elements by stroke color, the same way the
/// legend itself is keyed.
fn write_index_html(
    out_dir: &Path,
    charts: &[(Metric, PathBuf)],
    series: &[RunSeries],
) -> Result<PathBuf> {
    let mut legend = String::new();
    for s in series {
        legend.push_str(&format!(
            "    <label class=\"run\"><input type=\"checkbox\" checked \
             onchange=\"toggleRun('{hex}', this.checked)\">\
             <span class=\"swatch\" style=\"background:{hex}\"></span>{label}</label>\n",
            hex = s.color_hex(),
            label = s.label,
        ));
    }

    let mut sections = String::new();
    for (metric, path) in charts {
        let svg = fs::read_to_string(path)?;
        // Strip a leading XML declaration so the markup can be inlined.
        let svg = svg.trim_start_matches(|c| c != '<');
        let svg = if svg.starts_with("<?xml") {
            &svg[svg.find("?>").map(|i| i + 2).unwrap_or(0)..]
        } else {
            svg
        };
        sections.push_str(&format!(
            "  <section>\n    <h2>{}</h2>\n{}\n  </section>\n",
            metric.title(),
            svg
        ));
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>benchtrace</title>
  <style>
    body {{ font-family: sans-serif; margin: 2em; }}
    .run {{ margin-right: 1.5em; cursor: pointer; }}
    .swatch {{ display: inline-block; width: 1em; height: 1em;
              margin: 0 0.3em; vertical-align: middle; }}
    section svg {{ max-width: 98vw; height: auto; }}
  </style>
</head>
<body>
  <h1>benchtrace</h1>
  <div id="legend">
{legend}  </div>
{sections}
<script>
function toggleRun(hex, visible) {{
  document.querySelectorAll('svg [stroke]').forEach(el => {{
    if (el.getAttribute('stroke').toUpperCase() === hex.toUpperCase()) {{
      el.style.visibility = visible ? 'visible' : 'hidden';
    }}
  }});
}}
</script>
</body>
</html>
"#
    );

    let index_path = out_dir.join("index.html");
    fs::write(&index_path, html)?;
    Ok(index_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logfile::LogWriter;
    use tempfile::tempdir;

    fn write_log(dir: &Path, name: &str, rows: &[(f64, f64)]) -> PathBuf {
        let path = dir.join(name);
        let mut writer = LogWriter::create(&path).unwrap();
        for &(time, cpu) in rows {
            writer
                .append(&SampleRow {
                    time,
                    cpu_percent: cpu,
                    mem_bytes: 2_000_000.0,
                    io_read_bytes: 4_000.0,
                    nproc: 2,
                })
                .unwrap();
        }
        path
    }

    fn options(out_dir: PathBuf) -> PlotOptions {
        PlotOptions {
            metrics: vec![Metric::Cpu, Metric::Mem],
            resample: None,
            pretty: false,
            max_mem_mb: None,
            max_time_secs: None,
            out_dir,
        }
    }

    #[test]
    fn selector_parses_in_order_without_duplicates() {
        assert_eq!(
            Metric::parse_selector("cmr").unwrap(),
            vec![Metric::Cpu, Metric::Mem, Metric::Reads]
        );
        assert_eq!(
            Metric::parse_selector("rrc").unwrap(),
            vec![Metric::Reads, Metric::Cpu]
        );
    }

    #[test]
    fn selector_rejects_unknown_characters() {
        match Metric::parse_selector("cxm").unwrap_err() {
            BenchtraceError::InvalidMetric(ch) => assert_eq!(ch, 'x'),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            Metric::parse_selector(""),
            Err(BenchtraceError::Config(_))
        ));
    }

    #[test]
    fn metric_values_use_plot_units() {
        let row = SampleRow {
            time: 1.0,
            cpu_percent: 85.0,
            mem_bytes: 3_000_000.0,
            io_read_bytes: 6_000.0,
            nproc: 1,
        };
        assert_eq!(Metric::Cpu.value(&row), 85.0);
        assert_eq!(Metric::Mem.value(&row), 3.0);
        assert_eq!(Metric::Reads.value(&row), 6.0);
    }

    #[test]
    fn pretty_mode_normalizes_by_tag_workers() {
        let dir = tempdir().unwrap();
        let path = write_log(
            dir.path(),
            "benchtrace-tc_ontology_4_souffle-2026-08-06T10:00:00.log",
            &[(0.0, 400.0), (1.0, 200.0)],
        );

        let mut opts = options(dir.path().join("plots"));
        opts.pretty = true;
        let series = prepare_series(&[path], &opts).unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].label, "souffle ontology (4w)");
        assert_eq!(series[0].rows[0].cpu_percent, 100.0);
        assert_eq!(series[0].rows[1].cpu_percent, 50.0);
    }

    #[test]
    fn series_are_grouped_and_colored_in_order() {
        let dir = tempdir().unwrap();
        let a = write_log(
            dir.path(),
            "benchtrace-tc_graph_1_ddlog-2026-08-06T10:00:00.log",
            &[(0.0, 1.0)],
        );
        let b = write_log(
            dir.path(),
            "benchtrace-tc_graph_1_souffle-2026-08-06T11:00:00.log",
            &[(0.0, 1.0)],
        );

        // Pass in reverse order; grouping should sort them back.
        let series = prepare_series(&[b, a], &options(dir.path().join("plots"))).unwrap();
        assert_eq!(series[0].label, "ddlog graph (1w)");
        assert_eq!(series[1].label, "souffle graph (1w)");
        assert_eq!(series[0].color, PALETTE[0]);
        assert_eq!(series[1].color, PALETTE[1]);
    }

    #[test]
    fn render_writes_charts_and_index() {
        let dir = tempdir().unwrap();
        let log = write_log(
            dir.path(),
            "benchtrace-smoke-2026-08-06T10:00:00.log",
            &[(0.0, 10.0), (0.5, 20.0), (1.0, 15.0)],
        );

        let opts = options(dir.path().join("plots"));
        let series = prepare_series(&[log], &opts).unwrap();
        let index = render(&series, &opts).unwrap();

        let cpu_svg = fs::read_to_string(opts.out_dir.join("cpu.svg")).unwrap();
        assert!(cpu_svg.contains("<svg"));

        let html = fs::read_to_string(&index).unwrap();
        assert!(html.contains("smoke"));
        assert!(html.contains("toggleRun"));
        assert!(html.contains("Cumulative CPU Usage"));
        assert!(html.contains("Memory Usage"));
        assert!(!opts.out_dir.join("reads.svg").exists());
    }
}
