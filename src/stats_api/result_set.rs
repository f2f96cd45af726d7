//! Tabular `resultSets` payloads: `{ name, headers: [..], rowSet: [[..], ..] }`.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::StatsApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct ResultSet {
    pub name: String,
    pub headers: Vec<String>,
    #[serde(rename = "rowSet")]
    pub row_set: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<ResultSet>),
    One(ResultSet),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "resultSets", alias = "resultSet")]
    result_sets: OneOrMany,
}

/// Extract the result sets from a raw response body. Some endpoints use
/// `resultSet` with a single object instead of the `resultSets` array.
pub fn parse_result_sets(body: &Value) -> Result<Vec<ResultSet>, StatsApiError> {
    let env: Envelope = serde_json::from_value(body.clone())
        .map_err(|e| StatsApiError::Malformed(format!("no resultSets in response: {e}")))?;
    Ok(match env.result_sets {
        OneOrMany::Many(v) => v,
        OneOrMany::One(s) => vec![s],
    })
}

/// Pick a result set by name, falling back to the first one when `name` is
/// absent and there is exactly one set.
pub fn find_result_set<'a>(
    sets: &'a [ResultSet],
    name: &str,
) -> Result<&'a ResultSet, StatsApiError> {
    sets.iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .or_else(|| if sets.len() == 1 { sets.first() } else { None })
        .ok_or_else(|| StatsApiError::Malformed(format!("result set '{name}' missing")))
}

impl ResultSet {
    pub fn columns(&self) -> Columns {
        Columns {
            set: self.name.clone(),
            index: self
                .headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.to_ascii_uppercase(), i))
                .collect(),
            width: self.headers.len(),
        }
    }

    /// Iterate rows with column lookups by header name. Rows whose width
    /// doesn't match the headers are reported as malformed.
    pub fn rows(&self) -> impl Iterator<Item = Result<Row<'_>, StatsApiError>> + '_ {
        let cols = std::rc::Rc::new(self.columns());
        self.row_set.iter().enumerate().map(move |(i, values)| {
            if values.len() != cols.width {
                return Err(StatsApiError::Malformed(format!(
                    "{}: row {i} has {} values, expected {}",
                    self.name,
                    values.len(),
                    cols.width
                )));
            }
            Ok(Row {
                cols: cols.clone(),
                values,
            })
        })
    }
}

#[derive(Debug)]
pub struct Columns {
    set: String,
    index: HashMap<String, usize>,
    width: usize,
}

pub struct Row<'a> {
    cols: std::rc::Rc<Columns>,
    values: &'a [Value],
}

impl<'a> Row<'a> {
    fn value(&self, col: &str) -> Result<&'a Value, StatsApiError> {
        let idx = self.cols.index.get(col).copied().ok_or_else(|| {
            StatsApiError::Malformed(format!("{}: missing column {col}", self.cols.set))
        })?;
        Ok(&self.values[idx])
    }

    fn opt_value(&self, col: &str) -> Option<&'a Value> {
        self.cols
            .index
            .get(col)
            .map(|&i| &self.values[i])
            .filter(|v| !v.is_null())
    }

    /// Required string column. Numbers are stringified (some ids come as numbers).
    pub fn str(&self, col: &str) -> Result<String, StatsApiError> {
        let v = self.value(col)?;
        value_as_string(v).ok_or_else(|| {
            StatsApiError::Malformed(format!("{}: {col} is not a string: {v}", self.cols.set))
        })
    }

    pub fn opt_str(&self, col: &str) -> Option<String> {
        self.opt_value(col)
            .and_then(value_as_string)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn i64(&self, col: &str) -> Result<i64, StatsApiError> {
        let v = self.value(col)?;
        value_as_i64(v).ok_or_else(|| {
            StatsApiError::Malformed(format!("{}: {col} is not an integer: {v}", self.cols.set))
        })
    }

    pub fn opt_i32(&self, col: &str) -> Option<i32> {
        self.opt_value(col)
            .and_then(value_as_i64)
            .and_then(|n| i32::try_from(n).ok())
    }

    pub fn opt_f64(&self, col: &str) -> Option<f64> {
        self.opt_value(col).and_then(value_as_f64)
    }

    pub fn date(&self, col: &str) -> Result<NaiveDate, StatsApiError> {
        let raw = self.str(col)?;
        parse_game_date(&raw).ok_or_else(|| {
            StatsApiError::Malformed(format!("{}: {col} is not a date: {raw}", self.cols.set))
        })
    }
}

fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_f64(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str().and_then(|s| s.trim().parse::<f64>().ok())
}

fn value_as_i64(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = v.as_f64() {
        return (f.fract() == 0.0).then_some(f as i64);
    }
    v.as_str().and_then(|s| s.trim().parse::<i64>().ok())
}

/// Game dates appear as `2023-10-24`, `2023-10-24T00:00:00` or `OCT 24, 2023`
/// depending on the endpoint.
pub fn parse_game_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.split('T').next().unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%b %d, %Y"))
        .ok()
}
