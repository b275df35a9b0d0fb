use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Bytes(Vec<u8>),
    I64(i64),
    F64(f64),
    Decimal(Decimal),
    Bool(bool),
    Uuid(Uuid),
    Json(serde_json::Value),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Null,
}

pub type Row = Vec<Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Bytes,
    I64,
    F64,
    Decimal,
    Bool,
    Uuid,
    Json,
    Timestamp,
    TimestampTz,
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<ColumnType, Self::Err> {
        let mut formatted = s.trim().to_lowercase();
        // Strip a length/precision suffix like varchar(255) or numeric(10,2)
        if let Some(idx) = formatted.find('(') {
            formatted.truncate(idx);
            formatted = formatted.trim_end().to_string();
        }
        if formatted.starts_with("varchar")
            | formatted.starts_with("nvarchar")
            | formatted.starts_with("nchar")
        {
            return Ok(ColumnType::String);
        }
        return match formatted.as_str() {
            "tinyint" | "smallint" | "int" | "integer" | "bigint" | "int2" | "int4" | "int8"
            | "serial" | "bigserial" => Ok(ColumnType::I64),
            "float" | "real" | "double" | "double precision" | "float4" | "float8" => {
                Ok(ColumnType::F64)
            }
            "numeric" | "decimal" => Ok(ColumnType::Decimal),
            "boolean" | "bool" => Ok(ColumnType::Bool),
            "uuid" => Ok(ColumnType::Uuid),
            "json" | "jsonb" => Ok(ColumnType::Json),
            "character" | "character varying" | "char" | "clob" | "text" => Ok(ColumnType::String),
            "blob" | "bytea" => Ok(ColumnType::Bytes),
            "datetime" | "timestamp" | "timestamp without time zone" => Ok(ColumnType::Timestamp),
            "timestamptz" | "timestamp with time zone" => Ok(ColumnType::TimestampTz),
            _ => Err(anyhow::anyhow!("Unknown column type {s}")),
        };
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableInfo {
    pub name: String,
    pub num_rows: u64,
    pub columns: Vec<Column>,
}

impl TableInfo {
    pub fn column_names(&self) -> Vec<&str> {
        return self.columns.iter().map(|c| c.name.as_str()).collect();
    }
}
