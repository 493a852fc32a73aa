use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Read raw catalog rows from a `.json` / `.jsonl` file, or from every such
/// file under a directory (in sorted path order so row ids are stable).
pub fn read_catalog<P: AsRef<Path>>(path: P) -> Result<Vec<Value>> {
    let path = path.as_ref();
    let mut files: Vec<PathBuf> = Vec::new();
    if path.is_dir() {
        for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(extension(p), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if path.is_file() {
        files.push(path.to_path_buf());
    } else {
        bail!("catalog path not found: {}", path.display());
    }

    let mut rows = Vec::new();
    for file in files {
        let before = rows.len();
        if extension(&file) == Some("jsonl") {
            read_jsonl(&file, &mut rows)?;
        } else {
            read_json(&file, &mut rows)?;
        }
        tracing::debug!(file = %file.display(), rows = rows.len() - before, "read catalog file");
    }
    Ok(rows)
}

fn extension(p: &Path) -> Option<&str> {
    p.extension().and_then(|s| s.to_str())
}

fn read_jsonl(file: &Path, rows: &mut Vec<Value>) -> Result<()> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let row: Value = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid JSON", file.display(), lineno + 1))?;
        rows.push(row);
    }
    Ok(())
}

fn read_json(file: &Path, rows: &mut Vec<Value>) -> Result<()> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    let json: Value = serde_json::from_reader(reader).with_context(|| format!("{}: invalid JSON", file.display()))?;
    match json {
        Value::Array(arr) => rows.extend(arr),
        obj @ Value::Object(_) => rows.push(obj),
        _ => bail!("{}: expected an array or object of products", file.display()),
    }
    Ok(())
}
