use super::CliError;
use pedcal_core::common::config::CalibrationConfig;
use pedcal_core::domain::CalibError;
use pedcal_core::engine::{NullObserver, run_calibration};
use pedcal_core::io::ascii::write_detector_tables;
use pedcal_core::io::run_file::read_run_file;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(clap::Args)]
pub(super) struct RunArgs {
    /// Run file with geometry and the recorded event stream
    run_file: PathBuf,

    /// Calibration configuration (JSON); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output path for the JSON calibration record
    #[arg(long, default_value = "calibration.json")]
    output: PathBuf,

    /// Also write per-detector ASCII pedestal tables next to the record
    #[arg(long)]
    ascii: bool,
}

#[derive(clap::Args)]
pub(super) struct ValidateArgs {
    /// Calibration configuration (JSON)
    config: PathBuf,

    /// Check the pass plan against this total event budget
    #[arg(long)]
    event_budget: Option<u64>,
}

pub(super) fn run_calibration_command(args: RunArgs) -> Result<i32, CliError> {
    let config = load_config(args.config.as_deref())?;
    let run_file = read_run_file(&args.run_file).map_err(CliError::Calibration)?;
    let geometry = run_file.geometry.clone();
    let mut source = run_file.into_source();

    tracing::info!(
        detectors = geometry.detector_count(),
        loops = config.loop_count(),
        algorithm = config.algorithm.as_str(),
        "starting calibration"
    );
    let record = run_calibration(&geometry, config, &mut source, &mut NullObserver)
        .map_err(CliError::Calibration)?;

    let json = serde_json::to_string_pretty(&record).map_err(|error| {
        CliError::Calibration(CalibError::io_system(
            "IO.RECORD_SERIALIZE",
            format!("failed to serialize the calibration record: {error}"),
        ))
    })?;
    if let Some(parent) = non_empty_parent(&args.output) {
        fs::create_dir_all(parent).map_err(|error| {
            CliError::Calibration(CalibError::io_system(
                "IO.RECORD_OUTPUT_DIRECTORY",
                format!(
                    "failed to create output directory '{}': {}",
                    parent.display(),
                    error
                ),
            ))
        })?;
    }
    fs::write(&args.output, json).map_err(|error| {
        CliError::Calibration(CalibError::io_system(
            "IO.RECORD_WRITE",
            format!("failed to write '{}': {}", args.output.display(), error),
        ))
    })?;
    println!(
        "Calibrated {} detectors; record written to {}",
        record.detectors.len(),
        args.output.display()
    );

    if args.ascii {
        let directory = non_empty_parent(&args.output).unwrap_or(Path::new("."));
        let stem = args
            .output
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("calibration");
        let paths =
            write_detector_tables(&record, directory, stem).map_err(CliError::Calibration)?;
        for path in paths {
            println!("ASCII table: {}", path.display());
        }
    }
    Ok(0)
}

pub(super) fn run_validate_command(args: ValidateArgs) -> Result<i32, CliError> {
    let config = load_config(Some(&args.config))?;
    config
        .check_event_budget(args.event_budget)
        .map_err(CliError::Calibration)?;
    println!(
        "Configuration is valid: {} calibration loops ({} algorithm, {} masking).",
        config.loop_count(),
        config.algorithm.as_str(),
        config.bad_pixel_algorithm.as_str()
    );
    Ok(0)
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|parent| !parent.as_os_str().is_empty())
}

fn load_config(path: Option<&Path>) -> Result<CalibrationConfig, CliError> {
    let Some(path) = path else {
        return Ok(CalibrationConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|error| {
        CliError::Calibration(CalibError::io_system(
            "IO.CONFIG_READ",
            format!("failed to read configuration '{}': {}", path.display(), error),
        ))
    })?;
    let config: CalibrationConfig = serde_json::from_str(&text).map_err(|error| {
        CliError::Calibration(CalibError::configuration(
            "INPUT.CONFIG_PARSE",
            format!("failed to parse configuration '{}': {}", path.display(), error),
        ))
    })?;
    config.validate().map_err(CliError::Calibration)?;
    Ok(config)
}
