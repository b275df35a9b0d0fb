use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{ToSqlOutput, Value as SqliteValue, ValueRef};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::stores::table::{ColumnType, Value};

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn parse_timestamp(text: &str) -> anyhow::Result<NaiveDateTime> {
    // Accept both the space-separated layout written by this tool and the
    // T-separated layout rusqlite uses when binding chrono values directly.
    return NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .with_context(|| format!("Failed to parse timestamp {text}"));
}

impl Value {
    pub(crate) fn from_sqlite(
        column_type: ColumnType,
        value: ValueRef<'_>,
    ) -> anyhow::Result<Value> {
        if let ValueRef::Null = value {
            return Ok(Value::Null);
        }
        return match (column_type, value) {
            (ColumnType::String, ValueRef::Text(text)) => {
                Ok(Value::String(std::str::from_utf8(text)?.to_owned()))
            }
            (ColumnType::Bytes, ValueRef::Blob(blob)) => Ok(Value::Bytes(blob.to_vec())),
            (ColumnType::I64, ValueRef::Integer(num)) => Ok(Value::I64(num)),
            (ColumnType::F64, ValueRef::Real(num)) => Ok(Value::F64(num)),
            (ColumnType::F64, ValueRef::Integer(num)) => Ok(Value::F64(num as f64)),
            (ColumnType::Decimal, ValueRef::Text(text)) => Ok(Value::Decimal(
                std::str::from_utf8(text)?
                    .parse::<Decimal>()
                    .context("Failed to parse decimal")?,
            )),
            (ColumnType::Decimal, ValueRef::Integer(num)) => Ok(Value::Decimal(Decimal::from(num))),
            (ColumnType::Decimal, ValueRef::Real(num)) => Ok(Value::Decimal(
                Decimal::from_f64_retain(num).context("Failed to convert real to decimal")?,
            )),
            (ColumnType::Bool, ValueRef::Integer(num)) => Ok(Value::Bool(num != 0)),
            (ColumnType::Uuid, ValueRef::Text(text)) => {
                Ok(Value::Uuid(Uuid::parse_str(std::str::from_utf8(text)?)?))
            }
            (ColumnType::Uuid, ValueRef::Blob(blob)) => Ok(Value::Uuid(Uuid::from_slice(blob)?)),
            (ColumnType::Json, ValueRef::Text(text)) => Ok(Value::Json(
                serde_json::from_slice(text).context("Failed to parse json column")?,
            )),
            (ColumnType::Timestamp, ValueRef::Text(text)) => Ok(Value::Timestamp(
                parse_timestamp(std::str::from_utf8(text)?)?,
            )),
            (ColumnType::TimestampTz, ValueRef::Text(text)) => {
                let parsed = DateTime::parse_from_rfc3339(std::str::from_utf8(text)?)
                    .context("Failed to parse timestamptz column")?;
                Ok(Value::TimestampTz(parsed.with_timezone(&Utc)))
            }
            (column_type, value) => Err(anyhow::anyhow!(
                "Cannot read {} as {column_type:?}",
                value.data_type()
            )),
        };
    }
}

impl rusqlite::types::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        return match self {
            Value::String(v) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes()))),
            Value::Bytes(v) => Ok(ToSqlOutput::Borrowed(ValueRef::Blob(v))),
            Value::I64(v) => Ok(ToSqlOutput::Owned(SqliteValue::Integer(*v))),
            Value::F64(v) => Ok(ToSqlOutput::Owned(SqliteValue::Real(*v))),
            Value::Decimal(v) => Ok(ToSqlOutput::Owned(SqliteValue::Text(v.to_string()))),
            Value::Bool(v) => Ok(ToSqlOutput::Owned(SqliteValue::Integer(i64::from(*v)))),
            Value::Uuid(v) => Ok(ToSqlOutput::Owned(SqliteValue::Text(v.to_string()))),
            Value::Json(v) => Ok(ToSqlOutput::Owned(SqliteValue::Text(v.to_string()))),
            Value::Timestamp(v) => Ok(ToSqlOutput::Owned(SqliteValue::Text(
                v.format(TIMESTAMP_FORMAT).to_string(),
            ))),
            Value::TimestampTz(v) => Ok(ToSqlOutput::Owned(SqliteValue::Text(v.to_rfc3339()))),
            Value::Null => Ok(ToSqlOutput::Owned(SqliteValue::Null)),
        };
    }
}
