//! Response payload parsing.
//!
//! The pipeline is generic over a [`PayloadParser`]; [`JsonPayloadParser`] handles the
//! host's `file_type=json` responses.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use time::Date;

use crate::domain::calendar::{parse_compact_date, parse_iso_date};
use crate::domain::is_missing_value;
use crate::{Observation, ParseError, Symbol};

/// Root element of observation payloads.
pub const OBSERVATIONS_ROOT: &str = "observations";
/// Root element of vintage date payloads.
pub const VINTAGE_DATES_ROOT: &str = "vintage_dates";

/// Format-specific decoding of host responses.
pub trait PayloadParser: Send + Sync + 'static {
    /// Value of the `file_type` query parameter this parser expects.
    fn file_type(&self) -> &'static str;

    /// Deserializes every row under `root`.
    fn parse_page<T: DeserializeOwned>(&self, body: &str, root: &str) -> Result<Vec<T>, ParseError>;

    fn parse_dates(&self, body: &str, root: &str) -> Result<Vec<Date>, ParseError>;

    /// Rows of a vintage-column observations response (`output_type` 2 or 3).
    ///
    /// Each `{SYMBOL}_{YYYYMMDD}` cell becomes one observation; "not available" cells are
    /// dropped.
    fn parse_observation_rows(
        &self,
        symbol: &Symbol,
        body: &str,
    ) -> Result<Vec<Observation>, ParseError>;

    /// Rows of a plain observations response (`output_type` 1). The vintage date of each
    /// observation is its observation date.
    fn parse_observation_values(
        &self,
        symbol: &Symbol,
        body: &str,
    ) -> Result<Vec<Observation>, ParseError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonPayloadParser;

impl JsonPayloadParser {
    pub const fn new() -> Self {
        Self
    }
}

impl PayloadParser for JsonPayloadParser {
    fn file_type(&self) -> &'static str {
        "json"
    }

    fn parse_page<T: DeserializeOwned>(&self, body: &str, root: &str) -> Result<Vec<T>, ParseError> {
        let rows = root_rows(body, root)?;
        Ok(serde_json::from_value(Value::Array(rows))?)
    }

    fn parse_dates(&self, body: &str, root: &str) -> Result<Vec<Date>, ParseError> {
        root_rows(body, root)?
            .iter()
            .enumerate()
            .map(|(index, row)| -> Result<Date, ParseError> {
                let raw = row.as_str().ok_or_else(|| ParseError::UnexpectedCell {
                    row: index,
                    column: root.to_owned(),
                })?;
                Ok(parse_iso_date(raw)?)
            })
            .collect()
    }

    fn parse_observation_rows(
        &self,
        symbol: &Symbol,
        body: &str,
    ) -> Result<Vec<Observation>, ParseError> {
        let mut observations = Vec::new();

        for (index, row) in root_rows(body, OBSERVATIONS_ROOT)?.iter().enumerate() {
            let fields = row_fields(index, row)?;
            let obs_date = row_date(index, fields)?;

            for (column, cell) in fields {
                let Some(vintage_date) = vintage_column(symbol, column) else {
                    continue;
                };
                let Some(raw) = cell_text(index, column, cell)? else {
                    continue;
                };
                if is_missing_value(&raw) {
                    continue;
                }
                observations.push(Observation::new(symbol.clone(), obs_date, vintage_date?, raw)?);
            }
        }

        Ok(observations)
    }

    fn parse_observation_values(
        &self,
        symbol: &Symbol,
        body: &str,
    ) -> Result<Vec<Observation>, ParseError> {
        let mut observations = Vec::new();

        for (index, row) in root_rows(body, OBSERVATIONS_ROOT)?.iter().enumerate() {
            let fields = row_fields(index, row)?;
            let obs_date = row_date(index, fields)?;
            let cell = fields.get("value").ok_or(ParseError::MissingField {
                row: index,
                field: "value",
            })?;

            match cell_text(index, "value", cell)? {
                Some(raw) if !is_missing_value(&raw) => {
                    observations.push(Observation::new(symbol.clone(), obs_date, obs_date, raw)?);
                }
                _ => {}
            }
        }

        Ok(observations)
    }
}

fn root_rows(body: &str, root: &str) -> Result<Vec<Value>, ParseError> {
    let mut document: Value = serde_json::from_str(body)?;
    match document.get_mut(root).map(Value::take) {
        Some(Value::Array(rows)) => Ok(rows),
        _ => Err(ParseError::MissingRoot {
            root: root.to_owned(),
        }),
    }
}

fn row_fields(index: usize, row: &Value) -> Result<&Map<String, Value>, ParseError> {
    row.as_object().ok_or_else(|| ParseError::UnexpectedCell {
        row: index,
        column: String::from(OBSERVATIONS_ROOT),
    })
}

fn row_date(index: usize, fields: &Map<String, Value>) -> Result<Date, ParseError> {
    let raw = fields
        .get("date")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingField {
            row: index,
            field: "date",
        })?;
    Ok(parse_iso_date(raw)?)
}

/// Vintage date encoded in a `{SYMBOL}_{YYYYMMDD}` column name, if the column is one.
fn vintage_column(symbol: &Symbol, column: &str) -> Option<Result<Date, ParseError>> {
    let (prefix, suffix) = column.rsplit_once('_')?;
    if !symbol.matches_column_prefix(prefix) {
        return None;
    }
    Some(parse_compact_date(suffix).map_err(ParseError::from))
}

fn cell_text(index: usize, column: &str, cell: &Value) -> Result<Option<String>, ParseError> {
    match cell {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        Value::Number(number) => Ok(Some(number.to_string())),
        _ => Err(ParseError::UnexpectedCell {
            row: index,
            column: column.to_owned(),
        }),
    }
}
