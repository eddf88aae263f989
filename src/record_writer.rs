// record_writer.rs - Append-only CSV sink for per-record results
//
// Every processed record becomes one `account,address,amount-or-status` row.
// The file is opened once in append mode for the whole run, so rows from
// earlier runs are never touched. Rows are terminated with CRLF written as raw
// bytes; no newline translation happens, so spreadsheet tools never see blank
// separator lines. Each row is flushed as soon as it is written.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::pipeline::RetrievalResult;

/// Suffix inserted before the input file's extension to name the sink.
pub const OUTPUT_SUFFIX: &str = "_taxes";

pub struct RecordWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    count: usize,
}

impl RecordWriter {
    /// Open (or create) the sink at `path` for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create parent directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open output file for appending: {}", path.display()))?;

        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(false)
            .terminator(csv::Terminator::CRLF)
            .from_writer(file);

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            count: 0,
        })
    }

    /// Append one row and flush it to disk.
    pub fn append(&mut self, result: &RetrievalResult) -> Result<()> {
        self.writer
            .write_record(result.output_row())
            .with_context(|| format!("Failed to write row for account {}", result.account_number))?;
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush output file: {}", self.path.display()))?;
        self.count += 1;
        debug!("Wrote row {} to {}", self.count, self.path.display());
        Ok(())
    }

    /// Rows appended by this writer (not counting pre-existing content).
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Default sink path for an input file: same directory and extension, with
/// `_taxes` appended to the stem (`props.csv` → `props_taxes.csv`).
pub fn output_path_for_input(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let filename = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, OUTPUT_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, OUTPUT_SUFFIX),
    };
    input.with_file_name(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RetrievalStatus;
    use tempfile::TempDir;

    fn make_result(account: &str, status: RetrievalStatus, amount: Option<&str>) -> RetrievalResult {
        RetrievalResult {
            account_number: account.to_string(),
            raw_address: format!("MAIN ({})", account),
            status,
            tax_amount: amount.map(str::to_string),
            document_path: None,
            detail: String::new(),
        }
    }

    #[test]
    fn test_rows_in_order_without_blank_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");

        let mut writer = RecordWriter::open(&path).unwrap();
        writer.append(&make_result("1", RetrievalStatus::Matched, Some("$1.00"))).unwrap();
        writer.append(&make_result("2", RetrievalStatus::NoMatch, None)).unwrap();
        writer.append(&make_result("3", RetrievalStatus::Delinquent, None)).unwrap();
        assert_eq!(writer.count(), 3);
        drop(writer);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "1,MAIN (1),$1.00\r\n2,MAIN (2),NO MATCHING ACCOUNT\r\n3,MAIN (3),DELINQUENT\r\n"
        );
        assert!(!content.contains("\r\r"));
        assert!(!content.contains("\n\r\n"));
    }

    #[test]
    fn test_append_preserves_existing_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        std::fs::write(&path, "old,row,1\r\n").unwrap();

        let mut writer = RecordWriter::open(&path).unwrap();
        writer.append(&make_result("9", RetrievalStatus::MissingAmount, None)).unwrap();
        drop(writer);

        let mut writer = RecordWriter::open(&path).unwrap();
        writer.append(&make_result("10", RetrievalStatus::Matched, Some("5.00"))).unwrap();
        drop(writer);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "old,row,1\r\n9,MAIN (9),MISSING TAX AMOUNT\r\n10,MAIN (10),5.00\r\n"
        );
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");

        let mut writer = RecordWriter::open(&path).unwrap();
        writer.append(&make_result("7", RetrievalStatus::Matched, Some("$1,234.56"))).unwrap();
        drop(writer);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "7,MAIN (7),\"$1,234.56\"\r\n");
    }

    #[test]
    fn test_output_path_for_input() {
        assert_eq!(
            output_path_for_input(Path::new("/data/props.csv")),
            PathBuf::from("/data/props_taxes.csv")
        );
        assert_eq!(
            output_path_for_input(Path::new("props")),
            PathBuf::from("props_taxes")
        );
        assert_eq!(
            output_path_for_input(Path::new("dir/archive.2024.csv")),
            PathBuf::from("dir/archive.2024_taxes.csv")
        );
    }
}
