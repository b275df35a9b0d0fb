use uuid::Uuid;

use super::table::{Row, TableInfo};

/// An authentication account as read from the source auth store.
#[derive(Clone, Debug, PartialEq)]
pub struct Principal {
    pub source_id: Uuid,
    pub email: Option<String>,
    pub user_metadata: serde_json::Value,
    pub app_metadata: serde_json::Value,
}

/// An account to be created in the destination auth store.
#[derive(Clone, Debug)]
pub struct NewPrincipal {
    pub email: String,
    pub password: String,
    pub email_confirm: bool,
    pub user_metadata: serde_json::Value,
    pub app_metadata: serde_json::Value,
}

#[derive(Clone, Debug)]
pub struct PrincipalPage {
    pub principals: Vec<Principal>,
    /// Total number of principals the store reports, independent of paging.
    pub total: u64,
}

/// Read side of a migration run. Never mutated.
pub trait SourceStore: Send {
    fn get_table_info(&mut self, table: &str) -> anyhow::Result<TableInfo>;

    /// Reads one page of rows in a stable order. The returned rows are
    /// positional against `info.columns`.
    fn fetch_rows(&mut self, info: &TableInfo, offset: u64, limit: u64) -> anyhow::Result<Vec<Row>>;

    fn list_principals(&mut self, offset: u64, limit: u64) -> anyhow::Result<PrincipalPage>;
}

/// Write side of a migration run.
pub trait DestStore: Send {
    fn count_rows(&mut self, table: &str) -> anyhow::Result<u64>;

    fn clear_table(&mut self, table: &str) -> anyhow::Result<()>;

    fn insert_batch(&mut self, info: &TableInfo, batch: &[Row]) -> anyhow::Result<()>;

    /// Upserts keyed by `key`; conflicting rows are overwritten column by
    /// column, rows only present in the destination are left alone.
    fn upsert_batch(&mut self, info: &TableInfo, batch: &[Row], key: &str) -> anyhow::Result<()>;

    fn create_principal(&mut self, principal: &NewPrincipal) -> anyhow::Result<Uuid>;

    fn find_principal_by_email(&mut self, email: &str) -> anyhow::Result<Option<Uuid>>;

    fn set_referential_integrity(&mut self, enabled: bool) -> anyhow::Result<()>;
}
