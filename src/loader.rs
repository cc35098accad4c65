use crate::error::{ReportError, Result};
use crate::marketing::MarketingFiles;
use crate::table::RawTable;
use csv::ReaderBuilder;
use log::{debug, warn};
use std::fs::File;
use std::path::Path;

/// Reads a CSV export into a [`RawTable`], skipping `header_row_offset`
/// banner rows before the real header. Header names are whitespace-trimmed;
/// cells are kept verbatim.
pub fn read_table(path: &Path, header_row_offset: usize) -> Result<RawTable> {
    let display = path.display().to_string();
    let file = File::open(path).map_err(|e| ReportError::Unreadable {
        path: display.clone(),
        details: e.to_string(),
    })?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);
    let mut records = reader.records();

    for _ in 0..header_row_offset {
        match records.next() {
            Some(record) => {
                record?;
            }
            None => {
                return Err(ReportError::Unreadable {
                    path: display,
                    details: format!(
                        "file ended before the header row (expected {} banner rows)",
                        header_row_offset
                    ),
                });
            }
        }
    }

    let headers: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(|h| h.trim().to_string()).collect(),
        None => {
            return Err(ReportError::Unreadable {
                path: display,
                details: "file has no header row".to_string(),
            });
        }
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }

    debug!("{}: read {} rows, {} columns", display, rows.len(), headers.len());

    Ok(RawTable {
        source: display,
        headers,
        rows,
    })
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Collects marketing exports from every `marketing_*` subdirectory:
/// `MARKETING_PROMOTION*.csv` and `MARKETING_SPONSORED_LISTING*.csv` files,
/// in sorted order. A file that fails to read is skipped with a warning so
/// one bad export never blocks the rest.
pub fn load_marketing_dir(path: &Path) -> Result<MarketingFiles> {
    let mut files = MarketingFiles::default();
    if !path.is_dir() {
        return Ok(files);
    }

    let mut subdirs: Vec<_> = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir() && file_name_of(p).starts_with("marketing_"))
        .collect();
    subdirs.sort();

    for subdir in subdirs {
        let mut entries: Vec<_> = std::fs::read_dir(&subdir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect();
        entries.sort();

        for entry in entries {
            let name = file_name_of(&entry);
            if !name.ends_with(".csv") {
                continue;
            }
            let bucket = if name.starts_with("MARKETING_PROMOTION") {
                &mut files.promotions
            } else if name.starts_with("MARKETING_SPONSORED_LISTING") {
                &mut files.sponsored
            } else {
                continue;
            };

            match read_table(&entry, 0) {
                Ok(table) => bucket.push(table),
                Err(error) => warn!("skipping {}: {}", entry.display(), error),
            }
        }
    }

    Ok(files)
}
