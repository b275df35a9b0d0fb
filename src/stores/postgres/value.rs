use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::stores::table::{ColumnType, Value};

impl TryFrom<&Type> for ColumnType {
    type Error = anyhow::Error;

    fn try_from(ty: &Type) -> Result<ColumnType, Self::Error> {
        return match ty {
            &Type::BOOL => Ok(ColumnType::Bool),
            &Type::INT2 | &Type::INT4 | &Type::INT8 => Ok(ColumnType::I64),
            &Type::FLOAT4 | &Type::FLOAT8 => Ok(ColumnType::F64),
            &Type::NUMERIC => Ok(ColumnType::Decimal),
            &Type::BYTEA => Ok(ColumnType::Bytes),
            &Type::TEXT | &Type::VARCHAR | &Type::BPCHAR => Ok(ColumnType::String),
            &Type::UUID => Ok(ColumnType::Uuid),
            &Type::JSON | &Type::JSONB => Ok(ColumnType::Json),
            &Type::TIMESTAMP => Ok(ColumnType::Timestamp),
            &Type::TIMESTAMPTZ => Ok(ColumnType::TimestampTz),
            other => Err(anyhow::anyhow!("Unsupported postgres column type {other}")),
        };
    }
}

impl Value {
    pub(crate) fn from_postgres(row: &postgres::Row, idx: usize) -> anyhow::Result<Value> {
        let ty = row.columns()[idx].type_();
        return match ty {
            &Type::BOOL => Ok(row
                .try_get::<_, Option<bool>>(idx)?
                .map_or(Value::Null, Value::Bool)),
            &Type::INT2 => Ok(row
                .try_get::<_, Option<i16>>(idx)?
                .map_or(Value::Null, |v| Value::I64(v.into()))),
            &Type::INT4 => Ok(row
                .try_get::<_, Option<i32>>(idx)?
                .map_or(Value::Null, |v| Value::I64(v.into()))),
            &Type::INT8 => Ok(row
                .try_get::<_, Option<i64>>(idx)?
                .map_or(Value::Null, Value::I64)),
            &Type::FLOAT4 => Ok(row
                .try_get::<_, Option<f32>>(idx)?
                .map_or(Value::Null, |v| Value::F64(v.into()))),
            &Type::FLOAT8 => Ok(row
                .try_get::<_, Option<f64>>(idx)?
                .map_or(Value::Null, Value::F64)),
            &Type::NUMERIC => Ok(row
                .try_get::<_, Option<Decimal>>(idx)?
                .map_or(Value::Null, Value::Decimal)),
            &Type::BYTEA => Ok(row
                .try_get::<_, Option<Vec<u8>>>(idx)?
                .map_or(Value::Null, Value::Bytes)),
            &Type::TEXT | &Type::VARCHAR | &Type::BPCHAR => Ok(row
                .try_get::<_, Option<String>>(idx)?
                .map_or(Value::Null, Value::String)),
            &Type::UUID => Ok(row
                .try_get::<_, Option<Uuid>>(idx)?
                .map_or(Value::Null, Value::Uuid)),
            &Type::JSON | &Type::JSONB => Ok(row
                .try_get::<_, Option<serde_json::Value>>(idx)?
                .map_or(Value::Null, Value::Json)),
            &Type::TIMESTAMP => Ok(row
                .try_get::<_, Option<NaiveDateTime>>(idx)?
                .map_or(Value::Null, Value::Timestamp)),
            &Type::TIMESTAMPTZ => Ok(row
                .try_get::<_, Option<DateTime<Utc>>>(idx)?
                .map_or(Value::Null, Value::TimestampTz)),
            other => Err(anyhow::anyhow!("Unsupported postgres column type {other}")),
        };
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        return match (ty, self) {
            (_, Value::Null) => Ok(IsNull::Yes),
            (&Type::INT2, Value::I64(num)) => i16::try_from(*num)?.to_sql(ty, out),
            (&Type::INT4, Value::I64(num)) => i32::try_from(*num)?.to_sql(ty, out),
            (&Type::FLOAT4, Value::F64(num)) => (*num as f32).to_sql(ty, out),
            (_, Value::String(v)) => v.to_sql(ty, out),
            (_, Value::Bytes(v)) => v.to_sql(ty, out),
            (_, Value::I64(v)) => v.to_sql(ty, out),
            (_, Value::F64(v)) => v.to_sql(ty, out),
            (_, Value::Decimal(v)) => v.to_sql(ty, out),
            (_, Value::Bool(v)) => v.to_sql(ty, out),
            (_, Value::Uuid(v)) => v.to_sql(ty, out),
            (_, Value::Json(v)) => v.to_sql(ty, out),
            (_, Value::Timestamp(v)) => v.to_sql(ty, out),
            (_, Value::TimestampTz(v)) => v.to_sql(ty, out),
        };
    }

    fn accepts(_ty: &Type) -> bool {
        // Checked per value at bind time.
        return true;
    }

    to_sql_checked!();
}
