//! Reading filter documents from inline text, files and stdin.

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum FilterSource {
    Inline(String),
    File(PathBuf),
    Stdin,
}

impl FilterSource {
    pub fn label(&self) -> String {
        match self {
            FilterSource::Inline(_) => "inline".to_string(),
            FilterSource::File(path) => path.display().to_string(),
            FilterSource::Stdin => "stdin".to_string(),
        }
    }

    fn read_text(&self) -> Result<String> {
        match self {
            FilterSource::Inline(text) => Ok(text.clone()),
            FilterSource::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Input: Failed to read {}", path.display())),
            FilterSource::Stdin => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("Input: Failed to read stdin")?;
                Ok(text)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    /// Try JSON first, then YAML
    Auto,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());
        match ext.as_deref() {
            Some("json") => DocumentFormat::Json,
            Some("yaml") | Some("yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Auto,
        }
    }
}

/// Parse one filter document.
pub fn parse_document(text: &str, format: DocumentFormat) -> Result<Value> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::Object(Default::default()));
    }

    match format {
        DocumentFormat::Json => {
            serde_json::from_str(text).context("Input: Filter is not valid JSON")
        }
        DocumentFormat::Yaml => {
            let yaml = serde_yaml::from_str(text).context("Input: Filter is not valid YAML")?;
            yaml_to_json(yaml)
        }
        DocumentFormat::Auto => match serde_json::from_str(text) {
            Ok(value) => Ok(value),
            Err(json_err) => {
                let yaml = serde_yaml::from_str(text).map_err(|yaml_err| {
                    anyhow::anyhow!(
                        "Input: Filter is neither JSON ({}) nor YAML ({})",
                        json_err,
                        yaml_err
                    )
                })?;
                yaml_to_json(yaml)
            }
        },
    }
}

/// JSON has no infinity or NaN; serde would turn them into `null` silently.
fn yaml_to_json(yaml: serde_yaml::Value) -> Result<Value> {
    check_finite(&yaml)?;
    serde_yaml::from_value(yaml).context("Input: Filter cannot be represented as JSON")
}

fn check_finite(yaml: &serde_yaml::Value) -> Result<()> {
    match yaml {
        serde_yaml::Value::Number(n) if n.is_nan() || n.is_infinite() => {
            anyhow::bail!("Input: YAML value {} is not a finite number", n)
        }
        serde_yaml::Value::Sequence(items) => items.iter().try_for_each(check_finite),
        serde_yaml::Value::Mapping(map) => map.values().try_for_each(check_finite),
        serde_yaml::Value::Tagged(tagged) => check_finite(&tagged.value),
        _ => Ok(()),
    }
}

/// Read a single filter document.
pub fn read_filter(source: &FilterSource) -> Result<Value> {
    let text = source.read_text()?;
    let format = match source {
        FilterSource::File(path) => DocumentFormat::from_path(path),
        _ => DocumentFormat::Auto,
    };
    parse_document(&text, format).with_context(|| format!("Input: {}", source.label()))
}

/// One line of a JSON Lines batch.
#[derive(Debug)]
pub struct BatchEntry {
    /// 1-based line number in the input
    pub line: usize,
    pub document: std::result::Result<Value, String>,
}

/// Read a JSON Lines batch. Blank lines are skipped; unparsable lines are kept as errors.
pub fn read_batch(source: &FilterSource) -> Result<Vec<BatchEntry>> {
    let text = source.read_text()?;
    Ok(parse_batch(&text))
}

pub fn parse_batch(text: &str) -> Vec<BatchEntry> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| BatchEntry {
            line: i + 1,
            document: serde_json::from_str(line.trim()).map_err(|e| format!("invalid JSON: {e}")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_json_and_yaml() {
        let json = parse_document(r#"{"$gt": {"year": 2020}}"#, DocumentFormat::Auto).unwrap();
        assert_eq!(json, json!({"$gt": {"year": 2020}}));

        let yaml = parse_document(
            "$and:\n  - location: pond\n  - $in:\n      year: [2020, 2021]\n",
            DocumentFormat::Auto,
        )
        .unwrap();
        assert_eq!(
            yaml,
            json!({"$and": [{"location": "pond"}, {"$in": {"year": [2020, 2021]}}]})
        );
    }

    #[test]
    fn test_blank_document_is_empty_filter() {
        assert_eq!(parse_document("  \n", DocumentFormat::Json).unwrap(), json!({}));
    }

    #[test]
    fn test_yaml_infinity_is_reported() {
        let err = parse_document("n: .inf", DocumentFormat::Yaml).unwrap_err();
        assert!(
            format!("{:#}", err).contains("not a finite number"),
            "unexpected error: {:#}",
            err
        );

        let err = parse_document("$in:\n  n: [1, .nan]", DocumentFormat::Auto).unwrap_err();
        assert!(format!("{:#}", err).contains("not a finite number"));
    }

    #[test]
    fn test_strict_json_rejects_yaml() {
        assert!(parse_document("location: pond", DocumentFormat::Json).is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(DocumentFormat::from_path(Path::new("f.JSON")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("f.yml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("filter")), DocumentFormat::Auto);
    }

    #[test]
    fn test_read_filter_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "topic: food").unwrap();

        let source = FilterSource::File(file.path().to_path_buf());
        assert_eq!(read_filter(&source).unwrap(), json!({"topic": "food"}));
    }

    #[test]
    fn test_missing_file() {
        let source = FilterSource::File(PathBuf::from("/nonexistent/filter.json"));
        assert!(read_filter(&source).is_err());
    }

    #[test]
    fn test_parse_batch() {
        let entries = parse_batch("{\"a\": 1}\n\n{broken\n{}\n");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].line, 1);
        assert_eq!(entries[0].document, Ok(json!({"a": 1})));
        assert_eq!(entries[1].line, 3);
        assert!(entries[1].document.is_err());
        assert_eq!(entries[2].line, 4);
    }
}
