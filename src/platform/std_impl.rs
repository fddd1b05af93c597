//! Standard library implementations of the capability traits.

use super::{Evaluator, RecordReader, RecordSource};
use crate::error::BlockError;
use crate::program::RecordFormat;
use crate::value::{Value, Variables};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::PathBuf;

/// Evaluator understanding JSON literals and bare variable names.
///
/// `evaluate("[1, 2]")` yields a list, `evaluate("count")` yields the value of
/// the `count` variable. Anything else is an error.
#[derive(Debug, Default)]
pub struct JsonLiteralEvaluator;

impl Evaluator for JsonLiteralEvaluator {
    fn evaluate(&mut self, expr: &str, vars: &mut Variables) -> Result<Value, BlockError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(Value::Null);
        }
        if let Some(value) = vars.get(expr) {
            return Ok(value.clone());
        }
        serde_json::from_str::<serde_json::Value>(expr)
            .map(Value::from)
            .map_err(|_| BlockError::script("ReferenceError", format!("Cannot evaluate '{}'", expr)))
    }

    fn evaluate_list(&mut self, expr: &str, vars: &mut Variables) -> Result<Vec<Value>, BlockError> {
        if let Some(Value::List(items)) = vars.get(expr.trim()) {
            return Ok(items.clone());
        }
        let wrapped = format!("[{}]", expr);
        match serde_json::from_str::<serde_json::Value>(&wrapped) {
            Ok(serde_json::Value::Array(items)) => Ok(items.into_iter().map(Value::from).collect()),
            _ => match self.evaluate(expr, vars)? {
                Value::List(items) => Ok(items),
                other => Ok(vec![other]),
            },
        }
    }
}

type Record = IndexMap<String, serde_json::Value>;

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonDocument {
    Many(Vec<Record>),
    One(Record),
}

type Loader = Box<dyn FnMut(&str) -> Result<String, BlockError>>;

/// Reader over a JSON document holding an array of flat objects.
///
/// Every record must carry the same attributes as the first one.
pub struct JsonRecordReader {
    loader: Loader,
    records: VecDeque<Record>,
}

impl JsonRecordReader {
    pub fn new(loader: impl FnMut(&str) -> Result<String, BlockError> + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            records: VecDeque::new(),
        }
    }

    /// Parse a document and check attribute consistency
    pub fn parse(text: &str) -> Result<(Vec<String>, Vec<Record>), BlockError> {
        let cleaned: String = text.trim_start_matches('\u{feff}').chars().filter(|c| *c != '\0').collect();
        let document: JsonDocument = serde_json::from_str(&cleaned)
            .map_err(|e| BlockError::script("DataError", format!("Invalid JSON records: {}", e)))?;
        let records = match document {
            JsonDocument::Many(records) => records,
            JsonDocument::One(record) => vec![record],
        };

        let names: Vec<String> = records
            .first()
            .map(|first| first.keys().cloned().collect())
            .unwrap_or_default();

        for (i, record) in records.iter().enumerate() {
            if record.len() != names.len() {
                return Err(BlockError::script(
                    "DataError",
                    format!(
                        "Inconsistent JSON object #{}; expected {} attributes, but found {}",
                        i + 1,
                        names.len(),
                        record.len()
                    ),
                ));
            }
            if let Some(extra) = record.keys().find(|key| !names.contains(key)) {
                return Err(BlockError::script(
                    "DataError",
                    format!(
                        "Inconsistent JSON object #{}; unexpected attribute '{}'",
                        i + 1,
                        extra
                    ),
                ));
            }
        }
        Ok((names, records))
    }
}

impl RecordReader for JsonRecordReader {
    fn load(&mut self, path: &str) -> Result<Vec<String>, BlockError> {
        let text = (self.loader)(path)?;
        let (names, records) = Self::parse(&text)?;
        self.records = records.into();
        Ok(names)
    }

    fn next(&mut self, vars: &mut Variables) -> Result<(), BlockError> {
        let Some(record) = self.records.pop_front() else {
            return Err(BlockError::assertion("No more records to read"));
        };
        for (name, value) in record {
            vars.set(name, Value::from(value));
        }
        Ok(())
    }

    fn eof(&self) -> bool {
        self.records.is_empty()
    }
}

fn unsupported(format: RecordFormat) -> BlockError {
    BlockError::assertion(format!(
        "{} record files are not supported by this record source",
        format
    ))
}

/// Reads record files relative to a base directory.
pub struct FileRecordSource {
    base_dir: PathBuf,
}

impl FileRecordSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl Default for FileRecordSource {
    fn default() -> Self {
        Self::new(".")
    }
}

impl RecordSource for FileRecordSource {
    fn open(&mut self, format: RecordFormat) -> Result<Box<dyn RecordReader>, BlockError> {
        match format {
            RecordFormat::Json => {
                let base = self.base_dir.clone();
                Ok(Box::new(JsonRecordReader::new(move |path| {
                    let full = base.join(path);
                    std::fs::read_to_string(&full).map_err(|e| {
                        BlockError::script("IOError", format!("Cannot read '{}': {}", full.display(), e))
                    })
                })))
            }
            RecordFormat::Xml => Err(unsupported(format)),
        }
    }
}

/// Serves record documents registered in memory under a path.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordSource {
    documents: FxHashMap<String, String>,
}

impl MemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(path.into(), text.into());
    }

    pub fn with_document(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }
}

impl RecordSource for MemoryRecordSource {
    fn open(&mut self, format: RecordFormat) -> Result<Box<dyn RecordReader>, BlockError> {
        match format {
            RecordFormat::Json => {
                let documents = self.documents.clone();
                Ok(Box::new(JsonRecordReader::new(move |path| {
                    documents
                        .get(path)
                        .cloned()
                        .ok_or_else(|| BlockError::script("IOError", format!("No document at '{}'", path)))
                })))
            }
            RecordFormat::Xml => Err(unsupported(format)),
        }
    }
}
