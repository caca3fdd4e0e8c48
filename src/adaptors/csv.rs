//! CSV parsing into pipeline data

use crate::core::reference::StatePath;
use crate::core::state::{compose_next_state, type_name, State};
use crate::core::Operation;
use crate::error::{AdaptorError, Result};
use async_trait::async_trait;
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::{debug, info};

/// Where the CSV text comes from
///
/// The caller states the shape explicitly; nothing is inferred from
/// whether a file happens to exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CsvSource {
    /// A local file
    File(PathBuf),
    /// Literal CSV text
    Text(String),
    /// A string stored in the pipeline state
    Reference(StatePath),
}

/// Dialect options handed to the tokenizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Field separator
    pub delimiter: char,

    /// Quote character
    #[serde(alias = "quoteChar", alias = "quote_char")]
    pub quote: char,

    /// Treat the first record as column names and emit objects
    #[serde(alias = "header")]
    pub columns: bool,

    /// Trim whitespace around fields and headers
    pub trim: bool,

    /// Lines starting with this character are ignored
    pub comment: Option<char>,

    /// Allow records with differing field counts
    #[serde(alias = "relaxColumnCount")]
    pub relax_column_count: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
            columns: false,
            trim: false,
            comment: None,
            relax_column_count: false,
        }
    }
}

impl CsvOptions {
    pub fn with_columns(mut self, columns: bool) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Check that every dialect character fits in a single byte
    pub fn validate(&self) -> Result<()> {
        single_byte("delimiter", self.delimiter)?;
        single_byte("quote", self.quote)?;
        if let Some(comment) = self.comment {
            single_byte("comment", comment)?;
        }
        Ok(())
    }

    fn reader_builder(&self) -> Result<ReaderBuilder> {
        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(single_byte("delimiter", self.delimiter)?)
            .quote(single_byte("quote", self.quote)?)
            .has_headers(self.columns)
            .flexible(self.relax_column_count)
            .trim(if self.trim { Trim::All } else { Trim::None });
        if let Some(comment) = self.comment {
            builder.comment(Some(single_byte("comment", comment)?));
        }
        Ok(builder)
    }
}

fn single_byte(option: &str, c: char) -> Result<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(AdaptorError::Configuration(format!(
            "CSV option '{}' must be a single ASCII character, got '{}'",
            option, c
        )))
    }
}

/// Tokenize CSV text into rows
///
/// Rows are arrays of strings, or objects keyed by the header row when
/// `options.columns` is set.
pub fn parse_csv_text(text: &str, options: &CsvOptions) -> Result<Vec<Value>> {
    let mut reader = options.reader_builder()?.from_reader(text.as_bytes());

    let headers = if options.columns {
        let headers = reader
            .headers()
            .map_err(|e| AdaptorError::parse("CSV header", e))?;
        Some(
            headers
                .iter()
                .map(|h| h.trim_start_matches('\u{feff}').to_string())
                .collect::<Vec<_>>(),
        )
    } else {
        None
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AdaptorError::parse("CSV record", e))?;
        let row = match &headers {
            Some(headers) => {
                let mut object = Map::new();
                for (idx, value) in record.iter().enumerate() {
                    let key = headers
                        .get(idx)
                        .cloned()
                        .unwrap_or_else(|| format!("column{}", idx + 1));
                    object.insert(key, Value::String(value.to_string()));
                }
                Value::Object(object)
            }
            None => Value::Array(
                record
                    .iter()
                    .map(|value| Value::String(value.to_string()))
                    .collect(),
            ),
        };
        rows.push(row);
    }

    Ok(rows)
}

/// Parse CSV into `data`
///
/// ```ignore
/// parse_csv(CsvSource::File("/home/user/someData.csv".into()), CsvOptions::default())
/// ```
pub fn parse_csv(source: CsvSource, options: CsvOptions) -> ParseCsv {
    ParseCsv { source, options }
}

pub struct ParseCsv {
    source: CsvSource,
    options: CsvOptions,
}

impl ParseCsv {
    async fn read_source(&self, state: &State) -> Result<String> {
        match &self.source {
            CsvSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| AdaptorError::io(path, e)),
            CsvSource::Text(text) => Ok(text.clone()),
            CsvSource::Reference(path) => match path.require(state)? {
                Value::String(text) => Ok(text),
                other => Err(AdaptorError::reference(
                    path.to_string(),
                    format!("expected CSV text, found {}", type_name(&other)),
                )),
            },
        }
    }
}

#[async_trait]
impl Operation for ParseCsv {
    fn name(&self) -> &str {
        "parse_csv"
    }

    async fn run(&self, state: State) -> Result<State> {
        self.options.validate()?;
        let text = self.read_source(&state).await?;

        let options = self.options.clone();
        let rows = tokio::task::spawn_blocking(move || parse_csv_text(&text, &options)).await??;

        info!("Parsed {} CSV row(s)", rows.len());
        for row in &rows {
            debug!("{}", row);
        }

        Ok(compose_next_state(&state, Value::Array(rows)))
    }
}
