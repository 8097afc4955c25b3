// src/io/reporting.rs

use crate::simulation::runner::HistoryRecord;
use log::info;
use std::path::Path;

/// Writes evaluation history to a CSV file, one row per period and unit.
///
/// # Arguments
/// * `file_path` - The path to save the file (e.g., "results/test_saa.csv").
/// * `data` - The history records of one or more evaluation episodes.
pub fn write_history<P: AsRef<Path>>(
    file_path: P,
    data: &[HistoryRecord],
) -> Result<(), csv::Error> {
    let path = file_path.as_ref();
    let mut wtr = csv::Writer::from_path(path)?;

    for record in data {
        wtr.serialize(record)?;
    }

    // Flush the buffer to ensure all data is written
    wtr.flush()?;

    info!("Exported {} rows to '{}'", data.len(), path.display());
    Ok(())
}
