//! Runs a query cell: interpolates `{{name}}` placeholders from the shared
//! namespace with type-aware quoting, executes the statement, and shapes
//! results as JSON lines.

use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::error::{Error, Result};
use crate::pool::PoolManager;
use crate::value::Value;

/// Query results beyond this many rows are truncated.
pub const ROW_CAP: usize = 1000;

pub struct QuerySuccess {
    pub outputs: Vec<String>,
}

/// Interpolates each `{{name}}` occurrence (in source order) into its SQL
/// literal form, by the runtime kind of the bound value.
pub fn interpolate(code: &str, namespace: &dyn Fn(&str) -> Option<Value>) -> Result<String> {
    let mut result = String::new();
    let mut last = 0;
    let re = regex::Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap();
    for caps in re.captures_iter(code) {
        let whole = caps.get(0).unwrap();
        let name = &caps[1];
        let value = namespace(name).ok_or_else(|| Error::MissingPlaceholder(name.to_string()))?;
        result.push_str(&code[last..whole.start()]);
        result.push_str(&quote(&value));
        last = whole.end();
    }
    result.push_str(&code[last..]);
    Ok(result)
}

fn quote(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Null => "NULL".to_string(),
        Value::List(items) => items.iter().map(quote).collect::<Vec<_>>().join(", "),
        Value::Other(repr) => format!("'{}'", repr.replace('\'', "''")),
    }
}

pub async fn execute(
    code: &str,
    namespace: &dyn Fn(&str) -> Option<Value>,
    dsn: Option<&str>,
    pool_manager: &Arc<PoolManager>,
    deadline: Duration,
) -> Result<QuerySuccess> {
    let dsn = dsn.ok_or_else(|| Error::QueryExecutionError("no DSN configured".to_string()))?;
    let statement = interpolate(code, namespace)?;
    let pool = pool_manager.get_pool(dsn).await?;

    // Bound the fetch itself at the driver level: the stream is stopped as
    // soon as ROW_CAP + 1 rows have arrived, so a query matching millions of
    // rows never materializes more than that in memory.
    let fetch = async {
        let mut stream = sqlx::query(&statement).fetch(&pool);
        let mut rows: Vec<AnyRow> = Vec::with_capacity(ROW_CAP + 1);
        while rows.len() <= ROW_CAP {
            match stream.try_next().await? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok::<_, sqlx::Error>(rows)
    };
    let rows: Vec<AnyRow> = tokio::time::timeout(deadline, fetch)
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(|e| Error::QueryExecutionError(e.to_string()))?;

    let truncated = rows.len() > ROW_CAP;
    let mut outputs: Vec<String> = rows
        .iter()
        .take(ROW_CAP)
        .map(|row| row_to_json_line(row))
        .collect::<Result<_>>()?;
    if truncated {
        outputs.push(format!("[truncated to {ROW_CAP} rows]"));
    }
    Ok(QuerySuccess { outputs })
}

fn row_to_json_line(row: &AnyRow) -> Result<String> {
    let mut obj = serde_json::Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        let value = any_value_to_json(row, i, col.type_info().name());
        obj.insert(col.name().to_string(), value);
    }
    serde_json::to_string(&serde_json::Value::Object(obj)).map_err(Error::from)
}

fn any_value_to_json(row: &AnyRow, index: usize, type_name: &str) -> serde_json::Value {
    let raw = match row.try_get_raw(index) {
        Ok(raw) => raw,
        Err(_) => return serde_json::Value::Null,
    };
    if raw.is_null() {
        return serde_json::Value::Null;
    }
    let upper = type_name.to_ascii_uppercase();
    if upper.contains("INT") {
        if let Ok(v) = row.try_get::<i64, _>(index) {
            return serde_json::Value::from(v);
        }
    }
    if upper.contains("FLOAT") || upper.contains("DOUBLE") || upper.contains("REAL") || upper.contains("NUMERIC") {
        if let Ok(v) = row.try_get::<f64, _>(index) {
            return serde_json::Value::from(v);
        }
    }
    if upper.contains("BOOL") {
        if let Ok(v) = row.try_get::<bool, _>(index) {
            return serde_json::Value::from(v);
        }
    }
    row.try_get::<String, _>(index)
        .map(serde_json::Value::from)
        .unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(values: &'static [(&'static str, Value)]) -> impl Fn(&str) -> Option<Value> {
        move |name: &str| values.iter().find(|(n, _)| *n == name).map(|(_, v)| v.clone())
    }

    #[test]
    fn interpolates_string_with_quote_doubling() {
        let lookup = ns(&[("name", Value::Str("O'Brien".to_string()))]);
        let sql = interpolate("SELECT * FROM t WHERE name = {{name}}", &lookup).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE name = 'O''Brien'");
    }

    #[test]
    fn interpolates_numeric_and_null() {
        let lookup = ns(&[("id", Value::Int(123)), ("x", Value::Null)]);
        let sql = interpolate("{{id}} {{x}}", &lookup).unwrap();
        assert_eq!(sql, "123 NULL");
    }

    #[test]
    fn interpolates_list_for_in_clause() {
        let lookup = ns(&[("xs", Value::List(vec![Value::Int(1), Value::Int(2)]))]);
        let sql = interpolate("WHERE id IN ({{xs}})", &lookup).unwrap();
        assert_eq!(sql, "WHERE id IN (1, 2)");
    }

    #[test]
    fn missing_placeholder_is_an_error() {
        let lookup = ns(&[]);
        let err = interpolate("SELECT {{missing}}", &lookup).unwrap_err();
        assert!(matches!(err, Error::MissingPlaceholder(n) if n == "missing"));
    }
}
