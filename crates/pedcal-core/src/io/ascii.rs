//! ASCII pedestal tables, one file per detector.
//!
//! Output format mirrors the legacy calibration files: a two-line comment
//! header followed by one row per pixel,
//! `detector  x  y  pedestal  noise  status`, with fixed column widths and
//! 8-digit fixed-point statistics so repeated runs diff cleanly.

use crate::domain::{CalResult, CalibError, CalibrationRecord, DetectorCalibration};
use std::fs;
use std::path::{Path, PathBuf};

pub fn format_fixed_f64(value: f64, width: usize, precision: usize) -> String {
    format!(
        "{value:>width$.precision$}",
        width = width,
        precision = precision
    )
}

/// Canonical line endings plus a guaranteed trailing newline.
pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn render_detector_table(calibration: &DetectorCalibration, run_label: &str) -> String {
    let mut table = String::new();
    table.push_str(&format!(
        "# Pedestal and noise for detector {}\n",
        calibration.detector
    ));
    table.push_str(&format!("# calculated from run {}\n", run_label));

    for (pixel, ((&pedestal, &noise), &status)) in calibration
        .pedestal
        .iter()
        .zip(calibration.noise.iter())
        .zip(calibration.status.iter())
        .enumerate()
    {
        let (x, y) = calibration.bounds.coordinates(pixel);
        table.push_str(&format!(
            "{:<3}{:<4}{:<4}{}{}{:>3}\n",
            calibration.detector,
            x,
            y,
            format_fixed_f64(pedestal, 15, 8),
            format_fixed_f64(noise, 15, 8),
            status.code(),
        ));
    }
    table
}

/// Write `<stem>-d<detector>.dat` for every detector of the record into
/// `directory`. Returns the written paths in detector order.
pub fn write_detector_tables(
    record: &CalibrationRecord,
    directory: &Path,
    stem: &str,
) -> CalResult<Vec<PathBuf>> {
    fs::create_dir_all(directory).map_err(|source| {
        CalibError::io_system(
            "IO.ASCII_OUTPUT_DIRECTORY",
            format!(
                "failed to create output directory '{}': {}",
                directory.display(),
                source
            ),
        )
    })?;

    let mut paths = Vec::with_capacity(record.detectors.len());
    for calibration in &record.detectors {
        let path = directory.join(format!("{}-d{}.dat", stem, calibration.detector));
        let table = normalize_text_artifact(&render_detector_table(calibration, stem));
        fs::write(&path, table).map_err(|source| {
            CalibError::io_system(
                "IO.ASCII_TABLE_WRITE",
                format!("failed to write '{}': {}", path.display(), source),
            )
        })?;
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::{
        format_fixed_f64, normalize_text_artifact, render_detector_table, write_detector_tables,
    };
    use crate::domain::{CalibrationRecord, DetectorCalibration, PixelBounds, PixelStatus};
    use std::fs;
    use tempfile::TempDir;

    fn sample_calibration() -> DetectorCalibration {
        DetectorCalibration {
            detector: 0,
            bounds: PixelBounds {
                x_min: 0,
                x_max: 1,
                y_min: 0,
                y_max: 0,
            },
            pedestal: vec![10.0, 9.875],
            noise: vec![1.5, 0.0],
            status: vec![PixelStatus::Good, PixelStatus::Bad],
        }
    }

    #[test]
    fn fixed_width_float_formatting_is_deterministic() {
        assert_eq!(format_fixed_f64(1.23, 13, 5), "      1.23000");
        assert_eq!(format_fixed_f64(10.0, 15, 8), "    10.00000000");
    }

    #[test]
    fn table_rows_carry_coordinates_statistics_and_status_codes() {
        let table = render_detector_table(&sample_calibration(), "run-012");
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "# Pedestal and noise for detector 0");
        assert_eq!(lines[1], "# calculated from run run-012");
        assert_eq!(lines[2], "0  0   0       10.00000000     1.50000000  0");
        assert_eq!(lines[3], "0  1   0        9.87500000     0.00000000  1");
    }

    #[test]
    fn repeated_writes_produce_identical_files() {
        let temp = TempDir::new().expect("tempdir should be created");
        let record = CalibrationRecord {
            detectors: vec![sample_calibration()],
        };

        let first_paths =
            write_detector_tables(&record, temp.path(), "pede").expect("first write");
        let first = fs::read(&first_paths[0]).expect("table should be readable");
        let second_paths =
            write_detector_tables(&record, temp.path(), "pede").expect("second write");
        let second = fs::read(&second_paths[0]).expect("table should be readable");

        assert_eq!(first_paths, second_paths);
        assert_eq!(first, second);
        assert!(first.ends_with(b"\n"));
        assert_eq!(
            first_paths[0].file_name().and_then(|n| n.to_str()),
            Some("pede-d0.dat")
        );
    }

    #[test]
    fn normalization_fixes_line_endings() {
        assert_eq!(normalize_text_artifact("a\r\nb\rc"), "a\nb\nc\n");
    }
}
