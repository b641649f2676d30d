//! Corpus loading from CSV, JSON and JSONL exports.
//!
//! Rows missing `title` or `description` (or holding `null` / an empty cell)
//! are normalized to empty strings here, so the engine never sees absent
//! fields. `desc`, `abstract` and `설명` are accepted as aliases for
//! `description`, `제목` for `title`. CSV headers match case-insensitively.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::Document;

const TITLE_KEYS: [&str; 2] = ["title", "제목"];
const DESCRIPTION_KEYS: [&str; 4] = ["description", "desc", "abstract", "설명"];
const CORPUS_EXTENSIONS: [&str; 4] = ["csv", "json", "jsonl", "ndjson"];

/// Load a file (`.csv` with a header row, `.json` array or `.jsonl`/`.ndjson`
/// lines) or every such file under a directory, in sorted path order.
pub fn load_path(path: &Path) -> Result<Vec<Document>> {
    if path.is_dir() {
        let files = list_corpus_files(path);
        if files.is_empty() {
            info!("No .csv/.json/.jsonl files found under {}", path.display());
            return Ok(vec![]);
        }
        let mut docs = Vec::new();
        for (file_index, file) in files.iter().enumerate() {
            debug!("Loading corpus file {}/{}: {}", file_index + 1, files.len(), file.display());
            docs.extend(load_file(file)?);
        }
        info!("Loaded {} documents from {} files", docs.len(), files.len());
        Ok(docs)
    } else {
        let docs = load_file(path)?;
        info!("Loaded {} documents from {}", docs.len(), path.display());
        Ok(docs)
    }
}

pub fn load_file(path: &Path) -> Result<Vec<Document>> {
    let content = read_file_content(path)?;
    match extension(path).as_deref() {
        Some("csv") => parse_csv(&content).with_context(|| format!("parsing {}", path.display())),
        Some("jsonl" | "ndjson") => parse_jsonl(&content).with_context(|| format!("parsing {}", path.display())),
        _ => parse_json(&content).with_context(|| format!("parsing {}", path.display())),
    }
}

/// Parse a JSON array of records (or a single record object).
pub fn parse_json(content: &str) -> Result<Vec<Document>> {
    match serde_json::from_str::<Value>(content)? {
        Value::Array(rows) => Ok(rows.iter().map(document_from_value).collect()),
        row @ Value::Object(_) => Ok(vec![document_from_value(&row)]),
        other => anyhow::bail!("expected an array of records, found {}", type_name(&other)),
    }
}

/// Parse newline-delimited records; blank lines are skipped.
pub fn parse_jsonl(content: &str) -> Result<Vec<Document>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(line_no, line)| {
            let value: Value = serde_json::from_str(line).with_context(|| format!("line {}", line_no + 1))?;
            Ok(document_from_value(&value))
        })
        .collect()
}

/// Parse a CSV export with a header row. Ragged rows are tolerated; missing
/// cells read as empty.
pub fn parse_csv(content: &str) -> Result<Vec<Document>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(content.as_bytes());
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect();
    reader
        .records()
        .enumerate()
        .map(|(row_no, record)| {
            let record = record.with_context(|| format!("row {}", row_no + 2))?;
            let row: serde_json::Map<String, Value> = headers
                .iter()
                .zip(record.iter())
                .map(|(h, cell)| (h.clone(), Value::String(cell.to_string())))
                .collect();
            Ok(document_from_value(&Value::Object(row)))
        })
        .collect()
}

fn document_from_value(value: &Value) -> Document {
    let first_of = |keys: &[&str]| keys.iter().map(|key| text_field(value, key)).find(|s| !s.is_empty()).unwrap_or_default();
    let title = first_of(&TITLE_KEYS[..]);
    let description = first_of(&DESCRIPTION_KEYS[..]);
    let url = Some(text_field(value, "url")).filter(|u| !u.trim().is_empty());
    Document { title, description, url }
}

fn text_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension().and_then(|s| s.to_str()).map(str::to_ascii_lowercase)
}

fn list_corpus_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| extension(p).is_some_and(|ext| CORPUS_EXTENSIONS.contains(&ext.as_str())))
        .collect();
    files.sort();
    files
}
