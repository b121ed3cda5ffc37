use actionplan_protocol::LabeledRecord;
use anyhow::{Context as AnyhowContext, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Read records from a JSON array or a JSON Lines file.
pub fn read_records(path: &Path) -> Result<Vec<LabeledRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;
    let records = parse_records(&raw).with_context(|| format!("Invalid dataset {}", path.display()))?;
    log::info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

pub fn parse_records(raw: &str) -> Result<Vec<LabeledRecord>> {
    if raw.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(raw)?);
    }
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", idx + 1))
        })
        .collect()
}

/// Write records as JSON Lines, creating parent directories as needed.
pub fn write_records(path: &Path, records: &[LabeledRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut out = Vec::new();
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.push(b'\n');
    }
    let mut file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(&out)?;
    log::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}
