use super::CliError;
use anyhow::Context;
use rsm_core::common::{PipelineConfig, load_pipeline_config};
use rsm_core::export::write_vtk_rectilinear;
use rsm_core::pipeline::ScanPipeline;
use rsm_core::project::Project;
use rsm_core::{HklAxis, RsmError};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub(super) struct CommandContext {
    config: PipelineConfig,
}

impl CommandContext {
    pub(super) fn load(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => load_pipeline_config(path).map_err(|error| {
                CliError::Compute(RsmError::invalid_config(
                    "CONFIG.PIPELINE",
                    error.to_string(),
                ))
            })?,
            None => PipelineConfig::default(),
        };
        Ok(Self { config })
    }

    fn open_project(&self, args: &ProjectArgs) -> Result<Project, CliError> {
        let project = match &args.log {
            Some(log) => Project::open_log(&args.project, log, self.config.clone())?,
            None => Project::open(&args.project, self.config.clone())?,
        };
        Ok(project)
    }
}

#[derive(clap::Args)]
pub(super) struct ProjectArgs {
    /// Project directory holding the SPEC log, XML configs and images/
    #[arg(value_name = "PROJECT")]
    project: PathBuf,

    /// SPEC log file name, when the project holds more than one
    #[arg(long, value_name = "NAME")]
    log: Option<String>,

    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
pub(super) struct ScansArgs {
    #[command(flatten)]
    project: ProjectArgs,
}

#[derive(clap::Args)]
pub(super) struct MapArgs {
    #[command(flatten)]
    project: ProjectArgs,

    /// Scan number
    #[arg(long)]
    scan: u32,
}

#[derive(clap::Args)]
pub(super) struct GridArgs {
    #[command(flatten)]
    project: ProjectArgs,

    /// Scan number
    #[arg(long)]
    scan: u32,

    /// H axis range
    #[arg(long = "h", num_args = 3, value_names = ["MIN", "MAX", "N"], allow_negative_numbers = true)]
    h_axis: Option<Vec<f64>>,

    /// K axis range
    #[arg(long = "k", num_args = 3, value_names = ["MIN", "MAX", "N"], allow_negative_numbers = true)]
    k_axis: Option<Vec<f64>>,

    /// L axis range
    #[arg(long = "l", num_args = 3, value_names = ["MIN", "MAX", "N"], allow_negative_numbers = true)]
    l_axis: Option<Vec<f64>>,

    /// Write the gridded volume as a VTK rectilinear grid
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanRow {
    number: u32,
    points: usize,
    frames: usize,
    command: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AxisReport {
    axis: &'static str,
    min: f64,
    max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MapReport {
    scan: u32,
    points: usize,
    dropped_points: Vec<usize>,
    bounds: Vec<AxisReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GridReport {
    scan: u32,
    shape: [usize; 3],
    filled_nodes: usize,
    total_intensity: f64,
    axes: Vec<AxisReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
}

pub(super) fn run_scans_command(
    context: &CommandContext,
    args: ScansArgs,
) -> Result<i32, CliError> {
    let project = context.open_project(&args.project)?;
    let rows: Vec<ScanRow> = project
        .scan_summaries()?
        .into_iter()
        .map(|summary| ScanRow {
            number: summary.number,
            points: summary.points,
            frames: summary.frames,
            command: summary.command,
        })
        .collect();

    if args.project.json {
        print_json(&rows)?;
    } else {
        println!("{:>6} {:>7} {:>7}  command", "scan", "points", "frames");
        for row in &rows {
            println!(
                "{:>6} {:>7} {:>7}  {}",
                row.number, row.points, row.frames, row.command
            );
        }
    }
    Ok(0)
}

pub(super) fn run_map_command(context: &CommandContext, args: MapArgs) -> Result<i32, CliError> {
    let project = context.open_project(&args.project)?;
    let mut pipeline = project.pipeline(args.scan)?;
    pipeline.load_raw()?;
    report_warnings(&pipeline);
    pipeline.map()?;

    let rsm = pipeline
        .reciprocal_space_map()
        .context("mapping finished without a reciprocal-space map")?;
    let mut bounds = Vec::with_capacity(3);
    for axis in HklAxis::ALL {
        let (min, max) = rsm
            .axis_bounds(axis)
            .with_context(|| format!("no finite {} values in the map", axis))?;
        bounds.push(AxisReport {
            axis: axis.as_str(),
            min,
            max,
            n: None,
        });
    }
    let report = MapReport {
        scan: args.scan,
        points: rsm.point_count(),
        dropped_points: dropped_points(&pipeline, rsm.point_indices()),
        bounds,
    };

    if args.project.json {
        print_json(&report)?;
    } else {
        println!("Scan {}: {} points mapped", report.scan, report.points);
        if !report.dropped_points.is_empty() {
            println!("Dropped points: {:?}", report.dropped_points);
        }
        for axis in &report.bounds {
            println!("{}: {:.6} .. {:.6}", axis.axis, axis.min, axis.max);
        }
    }
    Ok(0)
}

pub(super) fn run_grid_command(context: &CommandContext, args: GridArgs) -> Result<i32, CliError> {
    let project = context.open_project(&args.project)?;
    let mut pipeline = project.pipeline(args.scan)?;
    pipeline.load_raw()?;
    report_warnings(&pipeline);
    pipeline.map()?;

    let defaults = *pipeline
        .grid_parameters()
        .context("mapping finished without default grid parameters")?;
    let mut parts = [(0.0, 0.0, 0); 3];
    for (axis, requested) in HklAxis::ALL
        .into_iter()
        .zip([&args.h_axis, &args.k_axis, &args.l_axis])
    {
        let range = defaults.axis(axis);
        parts[axis.index()] = match requested {
            Some(values) => axis_part(axis, values)?,
            None => (range.min(), range.max(), range.n()),
        };
    }
    pipeline.set_grid_parameters(parts)?;
    let gridded = pipeline.grid()?;

    if let Some(output) = &args.output {
        let title = format!("{} scan {}", project.spec_path().display(), args.scan);
        write_vtk_rectilinear(&gridded, &title, output)?;
    }

    let (h_n, k_n, l_n) = gridded.shape();
    let spec = gridded.spec();
    let report = GridReport {
        scan: args.scan,
        shape: [h_n, k_n, l_n],
        filled_nodes: gridded.filled_nodes(),
        total_intensity: gridded.total_intensity(),
        axes: HklAxis::ALL
            .into_iter()
            .map(|axis| {
                let range = spec.axis(axis);
                AxisReport {
                    axis: axis.as_str(),
                    min: range.min(),
                    max: range.max(),
                    n: Some(range.n()),
                }
            })
            .collect(),
        output: args.output.clone(),
    };

    if args.project.json {
        print_json(&report)?;
    } else {
        println!(
            "Scan {}: grid {}x{}x{}, {} filled nodes, total intensity {:.6}",
            report.scan, h_n, k_n, l_n, report.filled_nodes, report.total_intensity
        );
        for axis in &report.axes {
            println!(
                "{}: {:.6} .. {:.6} ({} nodes)",
                axis.axis,
                axis.min,
                axis.max,
                axis.n.unwrap_or_default()
            );
        }
        if let Some(output) = &report.output {
            println!("Volume written to {}", output.display());
        }
    }
    Ok(0)
}

fn axis_part(axis: HklAxis, values: &[f64]) -> Result<(f64, f64, usize), CliError> {
    let [min, max, n] = values else {
        return Err(CliError::Usage(format!(
            "--{} takes MIN MAX N",
            axis.as_str().to_ascii_lowercase()
        )));
    };
    if !(n.is_finite() && n.fract() == 0.0 && *n >= 0.0) {
        return Err(CliError::Usage(format!(
            "--{} node count must be a whole number, got {}",
            axis.as_str().to_ascii_lowercase(),
            n
        )));
    }
    Ok((*min, *max, *n as usize))
}

fn dropped_points(pipeline: &ScanPipeline, mapped: &[usize]) -> Vec<usize> {
    (0..pipeline.scan().data_lines())
        .filter(|point| !mapped.contains(point))
        .collect()
}

fn report_warnings(pipeline: &ScanPipeline) {
    for warning in pipeline.warnings() {
        eprintln!("{}", warning.warning_line());
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON report")?;
    println!("{}", rendered);
    Ok(())
}
