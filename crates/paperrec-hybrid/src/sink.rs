use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use paperrec_core::traits::ResultSink;
use paperrec_core::types::RankedResult;

/// Writes each result as one JSON object per line.
pub struct JsonlSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonlSink<BufWriter<File>> {
    /// Append to `path`, creating it and its parent directories as needed.
    pub fn append_to(path: &Path) -> Result<Self> {
        create_parent(path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ResultSink for JsonlSink<W> {
    fn persist(&mut self, results: &[RankedResult<'_>]) -> Result<()> {
        for r in results {
            serde_json::to_writer(&mut self.writer, r)?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Column order of `CsvSink` output.
pub const CSV_COLUMNS: [&str; 9] =
    ["rank", "doc_id", "title", "description", "url", "score", "tier", "shared_terms", "explanation"];

/// Tabular export: a header row, then one row per result. Shared terms are
/// joined with `"; "`.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    header_written: bool,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: csv::Writer::from_writer(writer), header_written: false }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| anyhow::anyhow!("flushing csv output: {}", e.error()))
    }
}

impl CsvSink<BufWriter<File>> {
    /// Replace `path` with a fresh export. Starts with a UTF-8 byte order
    /// mark so spreadsheet tools pick the right encoding for non-ASCII titles.
    pub fn create(path: &Path) -> Result<Self> {
        create_parent(path)?;
        let mut file = BufWriter::new(File::create(path).with_context(|| format!("creating {}", path.display()))?);
        file.write_all("\u{feff}".as_bytes())?;
        Ok(Self::new(file))
    }
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn persist(&mut self, results: &[RankedResult<'_>]) -> Result<()> {
        if !self.header_written {
            self.writer.write_record(CSV_COLUMNS)?;
            self.header_written = true;
        }
        for r in results {
            self.writer.write_record([
                r.rank.to_string(),
                r.doc_id.to_string(),
                r.document.title.clone(),
                r.document.description.clone(),
                r.document.url.clone().unwrap_or_default(),
                format!("{:.4}", r.score),
                r.tier.to_string(),
                r.shared_terms.join("; "),
                r.explanation.clone(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(())
}
