use std::fs;
use std::path::Path;

use crate::data::types::{CandidateRecord, DonationRecord, DonationSnapshot, VotingSnapshot};
use crate::utils::{format_eth, format_timestamp};

/// A mirrored snapshot that can be written out as CSV.
pub trait CsvExport {
    fn write_csv(&self, path: &Path) -> Result<String, String>;
}

impl CsvExport for DonationSnapshot {
    fn write_csv(&self, path: &Path) -> Result<String, String> {
        export_donations_csv(&self.donations, path)
    }
}

impl CsvExport for VotingSnapshot {
    fn write_csv(&self, path: &Path) -> Result<String, String> {
        export_candidates_csv(&self.candidates, path)
    }
}

/// Export donation history to CSV format.
///
/// Columns: donor, amount_wei, amount_eth, timestamp, date
pub fn export_donations_csv(donations: &[DonationRecord], path: &Path) -> Result<String, String> {
    let file = fs::File::create(path).map_err(|e| format!("Failed to create file: {e}"))?;
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record(["donor", "amount_wei", "amount_eth", "timestamp", "date"])
        .map_err(|e| format!("Failed to write CSV header: {e}"))?;

    for d in donations {
        wtr.write_record(&[
            format!("{:#x}", d.donor),
            d.amount.to_string(),
            format_eth(d.amount),
            d.timestamp.to_string(),
            format_timestamp(d.timestamp),
        ])
        .map_err(|e| format!("Failed to write CSV row: {e}"))?;
    }

    wtr.flush().map_err(|e| format!("Failed to flush CSV: {e}"))?;

    Ok(format!(
        "Exported {} donations to {}",
        donations.len(),
        path.display()
    ))
}

/// Export candidates to CSV format. Removed candidates are kept, flagged by `exists`.
///
/// Columns: id, name, description, votes, exists
pub fn export_candidates_csv(
    candidates: &[CandidateRecord],
    path: &Path,
) -> Result<String, String> {
    let file = fs::File::create(path).map_err(|e| format!("Failed to create file: {e}"))?;
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record(["id", "name", "description", "votes", "exists"])
        .map_err(|e| format!("Failed to write CSV header: {e}"))?;

    for c in candidates {
        wtr.write_record(&[
            c.id.to_string(),
            c.name.clone(),
            c.description.clone(),
            c.vote_count.to_string(),
            c.exists.to_string(),
        ])
        .map_err(|e| format!("Failed to write CSV row: {e}"))?;
    }

    wtr.flush().map_err(|e| format!("Failed to flush CSV: {e}"))?;

    Ok(format!(
        "Exported {} candidates to {}",
        candidates.len(),
        path.display()
    ))
}
