use anyhow::Context;
use chrono::Utc;
use itertools::Itertools;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params, params_from_iter};
use uuid::Uuid;

use crate::stores::table::{Column, Row, TableInfo, Value};
use crate::stores::traits::{DestStore, NewPrincipal, Principal, PrincipalPage, SourceStore};

use self::value::TIMESTAMP_FORMAT;

mod value;

const AUTH_TABLE: &str = "auth_users";

pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    pub fn new(uri: &str) -> anyhow::Result<Self> {
        let path = uri.replace("sqlite://", "");
        let connection = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        return Ok(SqliteStore { connection });
    }

    fn get_num_rows(&mut self, table: &str) -> anyhow::Result<u64> {
        let query = format!("SELECT count(1) FROM {table}");
        let count: i64 = self
            .connection
            .query_row(&query, [], |row| row.get(0))
            .context("Failed to get number of rows in the table")?;
        return count.try_into().context("Failed to convert i64 to u64");
    }

    fn get_columns(&mut self, table: &str) -> anyhow::Result<Vec<Column>> {
        let mut stmt = self
            .connection
            .prepare(&format!("PRAGMA table_info({table})"))
            .context("Failed to query information about table")?;
        let mut columns = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            let decltype: String = row.get(2)?;
            let notnull: i64 = row.get(3)?;
            columns.push(Column {
                name,
                column_type: decltype.parse()?,
                nullable: notnull == 0,
            });
        }
        if columns.is_empty() {
            return Err(anyhow::anyhow!("Table {table} not found"));
        }
        return Ok(columns);
    }

    fn write_batch(
        &mut self,
        info: &TableInfo,
        batch: &[Row],
        conflict_key: Option<&str>,
    ) -> anyhow::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let columns = info.column_names();
        let row_placeholder = format!("({})", columns.iter().map(|_| "?").join(", "));
        let placeholders = batch.iter().map(|_| row_placeholder.as_str()).join(", ");
        let mut query = format!(
            "INSERT INTO {} ({}) VALUES {}",
            info.name,
            columns.iter().join(", "),
            placeholders
        );
        if let Some(key) = conflict_key {
            let assignments = columns
                .iter()
                .filter(|column| **column != key)
                .map(|column| format!("{column} = excluded.{column}"))
                .join(", ");
            if assignments.is_empty() {
                query.push_str(&format!(" ON CONFLICT({key}) DO NOTHING"));
            } else {
                query.push_str(&format!(" ON CONFLICT({key}) DO UPDATE SET {assignments}"));
            }
        }
        let mut stmt = self
            .connection
            .prepare(&query)
            .context("Failed to create write query")?;
        stmt.execute(params_from_iter(batch.concat().iter()))
            .context("Failed to write data")?;
        return Ok(());
    }
}

impl SourceStore for SqliteStore {
    fn get_table_info(&mut self, table: &str) -> anyhow::Result<TableInfo> {
        let num_rows = self.get_num_rows(table)?;
        let columns = self
            .get_columns(table)
            .context("Failed to get info about table columns")?;
        return Ok(TableInfo {
            name: table.to_string(),
            num_rows,
            columns,
        });
    }

    fn fetch_rows(&mut self, info: &TableInfo, offset: u64, limit: u64) -> anyhow::Result<Vec<Row>> {
        let query = format!(
            "SELECT {} FROM {} ORDER BY 1 LIMIT ? OFFSET ?",
            info.column_names().join(", "),
            info.name
        );
        let mut stmt = self
            .connection
            .prepare(&query)
            .context("Failed to create read query")?;
        let mut rows = stmt
            .query(params![limit as i64, offset as i64])
            .context("Failed to read rows")?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut out: Row = Vec::with_capacity(info.columns.len());
            for (idx, column) in info.columns.iter().enumerate() {
                let raw = row.get_ref(idx).context("Failed to read value")?;
                out.push(Value::from_sqlite(column.column_type, raw)?);
            }
            result.push(out);
        }
        return Ok(result);
    }

    fn list_principals(&mut self, offset: u64, limit: u64) -> anyhow::Result<PrincipalPage> {
        let total: i64 = self
            .connection
            .query_row(&format!("SELECT count(1) FROM {AUTH_TABLE}"), [], |row| {
                row.get(0)
            })
            .context("Failed to count principals")?;
        let mut stmt = self
            .connection
            .prepare(&format!(
                "SELECT id, email, raw_user_meta_data, raw_app_meta_data
                FROM {AUTH_TABLE} ORDER BY id LIMIT ? OFFSET ?"
            ))
            .context("Failed to create principal query")?;
        let mut rows = stmt
            .query(params![limit as i64, offset as i64])
            .context("Failed to list principals")?;
        let mut principals = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let email: Option<String> = row.get(1)?;
            let user_metadata: Option<String> = row.get(2)?;
            let app_metadata: Option<String> = row.get(3)?;
            principals.push(Principal {
                source_id: Uuid::parse_str(&id).context("Failed to parse principal id")?,
                email,
                user_metadata: parse_metadata(user_metadata)?,
                app_metadata: parse_metadata(app_metadata)?,
            });
        }
        return Ok(PrincipalPage {
            principals,
            total: total.try_into().context("Failed to convert i64 to u64")?,
        });
    }
}

fn parse_metadata(raw: Option<String>) -> anyhow::Result<serde_json::Value> {
    return match raw {
        Some(text) => serde_json::from_str(&text).context("Failed to parse principal metadata"),
        None => Ok(serde_json::Value::Null),
    };
}

impl DestStore for SqliteStore {
    fn count_rows(&mut self, table: &str) -> anyhow::Result<u64> {
        return self.get_num_rows(table);
    }

    fn clear_table(&mut self, table: &str) -> anyhow::Result<()> {
        self.connection
            .execute(&format!("DELETE FROM {table}"), [])
            .context("Failed to clear destination table")?;
        return Ok(());
    }

    fn insert_batch(&mut self, info: &TableInfo, batch: &[Row]) -> anyhow::Result<()> {
        return self.write_batch(info, batch, None);
    }

    fn upsert_batch(&mut self, info: &TableInfo, batch: &[Row], key: &str) -> anyhow::Result<()> {
        return self.write_batch(info, batch, Some(key));
    }

    fn create_principal(&mut self, principal: &NewPrincipal) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        let confirmed_at = principal
            .email_confirm
            .then(|| Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string());
        self.connection
            .execute(
                &format!(
                    "INSERT INTO {AUTH_TABLE}
                    (id, email, encrypted_password, email_confirmed_at, raw_user_meta_data, raw_app_meta_data)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                ),
                params![
                    id.to_string(),
                    principal.email,
                    principal.password,
                    confirmed_at,
                    principal.user_metadata.to_string(),
                    principal.app_metadata.to_string(),
                ],
            )
            .context("Failed to create principal")?;
        return Ok(id);
    }

    fn find_principal_by_email(&mut self, email: &str) -> anyhow::Result<Option<Uuid>> {
        let id: Option<String> = self
            .connection
            .query_row(
                &format!("SELECT id FROM {AUTH_TABLE} WHERE email = ?1"),
                params![email],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up principal by email")?;
        return match id {
            Some(id) => Ok(Some(
                Uuid::parse_str(&id).context("Failed to parse principal id")?,
            )),
            None => Ok(None),
        };
    }

    fn set_referential_integrity(&mut self, enabled: bool) -> anyhow::Result<()> {
        self.connection
            .pragma_update(None, "foreign_keys", enabled)
            .context("Failed to toggle foreign key enforcement")?;
        return Ok(());
    }
}
