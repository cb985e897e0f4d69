//! Training-file I/O: a pretty JSON array or one example per line.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, instrument};

use ethicsgen_shared::{EthicsGenError, Result, TrainingExample};

/// On-disk layout of a training file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrainingFormat {
    /// Pretty-printed JSON array.
    #[default]
    Json,
    /// One JSON object per line.
    Jsonl,
}

impl FromStr for TrainingFormat {
    type Err = EthicsGenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            other => Err(EthicsGenError::config(format!(
                "unknown output format '{other}': expected 'json' or 'jsonl'"
            ))),
        }
    }
}

/// Write all examples at once, creating parent directories.
#[instrument(skip(examples), fields(count = examples.len()))]
pub fn write_training_file(
    path: &Path,
    examples: &[TrainingExample],
    format: TrainingFormat,
) -> Result<()> {
    let body = match format {
        TrainingFormat::Json => {
            let mut s = serde_json::to_string_pretty(examples)
                .map_err(|e| EthicsGenError::parse(format!("serializing examples: {e}")))?;
            s.push('\n');
            s
        }
        TrainingFormat::Jsonl => {
            let mut s = String::new();
            for example in examples {
                let line = serde_json::to_string(example)
                    .map_err(|e| EthicsGenError::parse(format!("serializing example: {e}")))?;
                s.push_str(&line);
                s.push('\n');
            }
            s
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| EthicsGenError::io(parent, e))?;
    }
    fs::write(path, body).map_err(|e| EthicsGenError::io(path, e))?;
    debug!(path = %path.display(), "training file written");
    Ok(())
}

/// Fail early if `path` cannot be written, creating parent directories.
///
/// Existing contents are left untouched and a file created only for the
/// check is removed again.
pub fn ensure_writable(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| EthicsGenError::io(parent, e))?;
    }
    let existed = path.exists();
    fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| EthicsGenError::io(path, e))?;
    if !existed {
        fs::remove_file(path).map_err(|e| EthicsGenError::io(path, e))?;
    }
    Ok(())
}

/// Read a training file in either layout. A leading `[` means JSON array.
pub fn read_training_file(path: &Path) -> Result<Vec<TrainingExample>> {
    let content = fs::read_to_string(path).map_err(|e| EthicsGenError::io(path, e))?;

    if content.trim_start().starts_with('[') {
        return serde_json::from_str(&content)
            .map_err(|e| EthicsGenError::parse(format!("{}: {e}", path.display())));
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| {
                EthicsGenError::parse(format!("{} line {}: {e}", path.display(), n + 1))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethicsgen_shared::Category;

    fn examples() -> Vec<TrainingExample> {
        vec![
            TrainingExample {
                passage: "Companies track browsing habits without consent.".into(),
                category: Category::Privacy,
                reasoning: "<|begin_of_thought|>\nt\n<|end_of_thought|>\n\n<|begin_of_solution|>\ns\n<|end_of_solution|>".into(),
                url: Some("https://news.example.com/a".into()),
                domain: Some("news.example.com".into()),
            },
            TrainingExample {
                passage: "Second passage".into(),
                category: Category::GeneralEthics,
                reasoning: "r".into(),
                url: None,
                domain: None,
            },
        ]
    }

    #[test]
    fn json_array_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/training.json");
        write_training_file(&path, &examples(), TrainingFormat::Json).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("[\n"));
        assert!(content.contains("\"category\": \"general_ethics\""));
        assert!(!content.contains("\"url\": null"));

        assert_eq!(read_training_file(&path).unwrap(), examples());
    }

    #[test]
    fn jsonl_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training.jsonl");
        write_training_file(&path, &examples(), TrainingFormat::Jsonl).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
        assert_eq!(read_training_file(&path).unwrap(), examples());
    }

    #[test]
    fn empty_json_is_an_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        write_training_file(&path, &[], TrainingFormat::Json).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "[]");
        assert!(read_training_file(&path).unwrap().is_empty());
    }

    #[test]
    fn malformed_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "\n{not json}\n").unwrap();
        let err = read_training_file(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn format_parsing() {
        assert_eq!("JSONL".parse::<TrainingFormat>().unwrap(), TrainingFormat::Jsonl);
        assert_eq!("json".parse::<TrainingFormat>().unwrap(), TrainingFormat::Json);
        assert!("yaml".parse::<TrainingFormat>().is_err());
    }

    #[test]
    fn writability_check_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = dir.path().join("nested/out.json");
        ensure_writable(&fresh).unwrap();
        assert!(!fresh.exists());
        assert!(dir.path().join("nested").is_dir());

        let existing = dir.path().join("kept.json");
        fs::write(&existing, "[]").unwrap();
        ensure_writable(&existing).unwrap();
        assert_eq!(fs::read_to_string(&existing).unwrap(), "[]");

        fs::write(dir.path().join("blocker"), "").unwrap();
        assert!(ensure_writable(&dir.path().join("blocker/out.json")).is_err());
    }
}
