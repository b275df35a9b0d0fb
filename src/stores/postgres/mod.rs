use anyhow::Context;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use postgres::types::ToSql;
use postgres::{Client, NoTls};
use uuid::Uuid;

use crate::stores::table::{Column, ColumnType, Row, TableInfo, Value};
use crate::stores::traits::{DestStore, NewPrincipal, Principal, PrincipalPage, SourceStore};

mod value;

const AUTH_TABLE: &str = "auth.users";

pub struct PostgresStore {
    client: Client,
}

impl PostgresStore {
    pub fn new(uri: &str) -> anyhow::Result<Self> {
        let client = Client::connect(uri, NoTls)?;
        return Ok(Self { client });
    }

    fn get_num_rows(&mut self, table: &str) -> anyhow::Result<u64> {
        let count_query = format!("SELECT count(1) FROM {table}");
        return self
            .client
            .query_one(&count_query, &[])
            .context("Failed to get number of rows in the table")?
            .get::<_, i64>(0)
            .try_into()
            .context("Failed to convert i64 to u64");
    }

    fn get_columns(&mut self, table: &str) -> anyhow::Result<Vec<Column>> {
        let mut columns = Vec::new();
        let rows = self
            .client
            .query(
                "SELECT column_name, is_nullable
            FROM information_schema.columns
            WHERE table_name = $1
            ORDER BY ordinal_position",
                &[&table],
            )
            .context("Failed to query information about table")?;
        for row in rows {
            let is_nullable: &str = row.get(1);
            columns.push(Column {
                name: row.get(0),
                column_type: ColumnType::I64, // Temp default
                nullable: is_nullable == "YES",
            })
        }
        if columns.is_empty() {
            return Err(anyhow::anyhow!("Table {table} not found"));
        }
        let column_names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let query = format!("SELECT {} FROM {}", column_names.join(", "), table);
        let stmt = self
            .client
            .prepare(&query)
            .context("Failed to prepare select statement")?;
        assert!(
            columns.len() == stmt.columns().len(),
            "Broken invariant. Expected to get {} column infos, got {}",
            columns.len(),
            stmt.columns().len()
        );
        for (column, column_info) in std::iter::zip(columns.iter_mut(), stmt.columns()) {
            assert!(
                column.name == column_info.name(),
                "Broken invariant. Expected to get {} column, got {}",
                column.name,
                column_info.name()
            );
            column.column_type = column_info.type_().try_into()?;
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
        let mut param_idx = 0;
        let placeholders = batch
            .iter()
            .map(|_| {
                let row_placeholder = columns
                    .iter()
                    .map(|_| {
                        param_idx += 1;
                        format!("${param_idx}")
                    })
                    .join(", ");
                format!("({row_placeholder})")
            })
            .join(", ");
        let mut query = format!(
            "INSERT INTO {} ({}) VALUES {}",
            info.name,
            columns.join(", "),
            placeholders
        );
        if let Some(key) = conflict_key {
            let assignments = columns
                .iter()
                .filter(|column| **column != key)
                .map(|column| format!("{column} = EXCLUDED.{column}"))
                .join(", ");
            if assignments.is_empty() {
                query.push_str(&format!(" ON CONFLICT ({key}) DO NOTHING"));
            } else {
                query.push_str(&format!(" ON CONFLICT ({key}) DO UPDATE SET {assignments}"));
            }
        }
        let params: Vec<&(dyn ToSql + Sync)> = batch
            .iter()
            .flatten()
            .map(|value| value as &(dyn ToSql + Sync))
            .collect();
        self.client
            .execute(&query, &params)
            .context("Failed to write data")?;
        return Ok(());
    }
}

impl SourceStore for PostgresStore {
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
            "SELECT {} FROM {} ORDER BY 1 LIMIT $1 OFFSET $2",
            info.column_names().join(", "),
            info.name
        );
        let rows = self
            .client
            .query(&query, &[&(limit as i64), &(offset as i64)])
            .context("Failed to get data from postgres source")?;
        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut out: Row = Vec::with_capacity(info.columns.len());
            for idx in 0..info.columns.len() {
                out.push(Value::from_postgres(row, idx)?);
            }
            result.push(out);
        }
        return Ok(result);
    }

    fn list_principals(&mut self, offset: u64, limit: u64) -> anyhow::Result<PrincipalPage> {
        let total: i64 = self
            .client
            .query_one(&format!("SELECT count(1) FROM {AUTH_TABLE}"), &[])
            .context("Failed to count principals")?
            .get(0);
        let rows = self
            .client
            .query(
                &format!(
                    "SELECT id, email, raw_user_meta_data, raw_app_meta_data
                    FROM {AUTH_TABLE} ORDER BY id LIMIT $1 OFFSET $2"
                ),
                &[&(limit as i64), &(offset as i64)],
            )
            .context("Failed to list principals")?;
        let mut principals = Vec::with_capacity(rows.len());
        for row in &rows {
            principals.push(Principal {
                source_id: row.try_get(0)?,
                email: row.try_get(1)?,
                user_metadata: row
                    .try_get::<_, Option<serde_json::Value>>(2)?
                    .unwrap_or(serde_json::Value::Null),
                app_metadata: row
                    .try_get::<_, Option<serde_json::Value>>(3)?
                    .unwrap_or(serde_json::Value::Null),
            });
        }
        return Ok(PrincipalPage {
            principals,
            total: total.try_into().context("Failed to convert i64 to u64")?,
        });
    }
}

impl DestStore for PostgresStore {
    fn count_rows(&mut self, table: &str) -> anyhow::Result<u64> {
        return self.get_num_rows(table);
    }

    fn clear_table(&mut self, table: &str) -> anyhow::Result<()> {
        self.client
            .execute(&format!("DELETE FROM {table}"), &[])
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
        let confirmed_at: Option<DateTime<Utc>> = principal.email_confirm.then(Utc::now);
        self.client
            .execute(
                &format!(
                    "INSERT INTO {AUTH_TABLE}
                    (id, email, encrypted_password, email_confirmed_at,
                     raw_user_meta_data, raw_app_meta_data, created_at, updated_at)
                    VALUES ($1, $2, crypt($3, gen_salt('bf')), $4, $5, $6, now(), now())"
                ),
                &[
                    &id,
                    &principal.email,
                    &principal.password,
                    &confirmed_at,
                    &principal.user_metadata,
                    &principal.app_metadata,
                ],
            )
            .context("Failed to create principal")?;
        return Ok(id);
    }

    fn find_principal_by_email(&mut self, email: &str) -> anyhow::Result<Option<Uuid>> {
        let row = self
            .client
            .query_opt(
                &format!("SELECT id FROM {AUTH_TABLE} WHERE email = $1"),
                &[&email],
            )
            .context("Failed to look up principal by email")?;
        return Ok(row.map(|row| row.get(0)));
    }

    fn set_referential_integrity(&mut self, enabled: bool) -> anyhow::Result<()> {
        // replica mode skips triggers and foreign key checks for this session
        let statement = if enabled {
            "SET session_replication_role = origin"
        } else {
            "SET session_replication_role = replica"
        };
        self.client
            .batch_execute(statement)
            .context("Failed to toggle referential integrity enforcement")?;
        return Ok(());
    }
}
