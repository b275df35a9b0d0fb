use std::time::Duration;

use anyhow::Context;
use tracing::{error, warn};
use uuid::Uuid;

use crate::args::{Args, Mode};
use crate::error::CloneError;
use crate::identity_map::IdentityMap;
use crate::registry::TableSpec;
use crate::report::{RowFailure, TransferRecord};
use crate::stores::table::{Row, TableInfo, Value};
use crate::stores::traits::{DestStore, SourceStore};

pub struct TableTransferer<'a> {
    source: &'a mut dyn SourceStore,
    dest: &'a mut dyn DestStore,
    identity_map: &'a IdentityMap,
    mode: Mode,
    batch_size: usize,
    fetch_page_size: u64,
    batch_delay: Option<Duration>,
}

impl<'a> TableTransferer<'a> {
    pub fn new(
        source: &'a mut dyn SourceStore,
        dest: &'a mut dyn DestStore,
        identity_map: &'a IdentityMap,
        args: &Args,
    ) -> Self {
        return TableTransferer {
            source,
            dest,
            identity_map,
            mode: args.mode,
            batch_size: args.batch_size.max(1),
            fetch_page_size: args.fetch_page_size.max(1),
            batch_delay: (args.batch_delay_ms > 0)
                .then(|| Duration::from_millis(args.batch_delay_ms)),
        };
    }

    /// Moves one table. All failures are folded into the returned record; a
    /// broken table never takes the rest of the run down with it.
    pub fn transfer_table(&mut self, spec: &TableSpec) -> TransferRecord {
        return match self.try_transfer(spec) {
            Ok(record) => record,
            Err(err) => {
                error!("Transfer of table {} aborted: {err:#}", spec.name);
                TransferRecord::aborted(spec.name, format!("{err:#}"))
            }
        };
    }

    fn try_transfer(&mut self, spec: &TableSpec) -> anyhow::Result<TransferRecord> {
        let info = self
            .source
            .get_table_info(spec.name)
            .context("Unable to get information about source table")?;
        let rows = self.fetch_all(&info)?;
        let rows = remap_rows(rows, &info, spec, self.identity_map);
        if self.mode == Mode::Clear {
            self.dest
                .clear_table(spec.name)
                .context("Unable to clear destination table")?;
        }
        let mut record = TransferRecord::new(spec.name, info.num_rows);
        let num_chunks = rows.len().div_ceil(self.batch_size);
        for (chunk_idx, chunk) in rows.chunks(self.batch_size).enumerate() {
            match self.write_chunk(&info, spec, chunk) {
                Ok(()) => record.transferred += chunk.len() as u64,
                Err(err) => {
                    warn!(
                        "Batch {} of table {} failed: {err:#}. Retrying row by row",
                        chunk_idx + 1,
                        spec.name
                    );
                    let base = chunk_idx * self.batch_size;
                    for (offset, row) in chunk.iter().enumerate() {
                        match self.write_chunk(&info, spec, std::slice::from_ref(row)) {
                            Ok(()) => record.transferred += 1,
                            Err(row_err) => record.failed_rows.push(RowFailure {
                                row_index: (base + offset) as u64,
                                error: format!("{row_err:#}"),
                            }),
                        }
                    }
                }
            }
            if let Some(delay) = self.batch_delay {
                if chunk_idx + 1 < num_chunks {
                    std::thread::sleep(delay);
                }
            }
        }
        if !record.failed_rows.is_empty() {
            warn!(
                "Table {}: {} rows failed to write",
                spec.name,
                record.failed_rows.len()
            );
        }
        return Ok(record);
    }

    fn fetch_all(&mut self, info: &TableInfo) -> anyhow::Result<Vec<Row>> {
        let mut rows: Vec<Row> = Vec::with_capacity(info.num_rows as usize);
        loop {
            let page = self
                .source
                .fetch_rows(info, rows.len() as u64, self.fetch_page_size)
                .context("Failed to fetch rows from the source table")?;
            let retrieved = page.len() as u64;
            rows.extend(page);
            if retrieved < self.fetch_page_size {
                break;
            }
        }
        if rows.len() as u64 != info.num_rows {
            return Err(CloneError::IncompleteFetch {
                table: info.name.clone(),
                got: rows.len() as u64,
                expected: info.num_rows,
            }
            .into());
        }
        return Ok(rows);
    }

    fn write_chunk(
        &mut self,
        info: &TableInfo,
        spec: &TableSpec,
        chunk: &[Row],
    ) -> anyhow::Result<()> {
        return match self.mode {
            Mode::Clear => self.dest.insert_batch(info, chunk),
            Mode::Merge => self.dest.upsert_batch(info, chunk, spec.primary_key),
        };
    }
}

/// Replaces identity-column values that resolve in the map with their
/// destination-side ids. Values without a mapping pass through unchanged, so
/// a table's own non-principal ids are left alone.
fn remap_rows(rows: Vec<Row>, info: &TableInfo, spec: &TableSpec, map: &IdentityMap) -> Vec<Row> {
    let targets: Vec<usize> = info
        .columns
        .iter()
        .enumerate()
        .filter(|(_, column)| spec.identity_columns.contains(&column.name.as_str()))
        .map(|(idx, _)| idx)
        .collect();
    if targets.is_empty() || map.is_empty() {
        return rows;
    }
    return rows
        .into_iter()
        .map(|mut row| {
            for &idx in &targets {
                match &row[idx] {
                    Value::Uuid(source_id) => {
                        if let Some(dest_id) = map.resolve(source_id) {
                            row[idx] = Value::Uuid(dest_id);
                        }
                    }
                    // Identity columns declared as plain text still remap
                    // when they hold a parseable uuid.
                    Value::String(text) => {
                        if let Ok(source_id) = Uuid::parse_str(text) {
                            if let Some(dest_id) = map.resolve(&source_id) {
                                row[idx] = Value::String(dest_id.to_string());
                            }
                        }
                    }
                    _ => {}
                }
            }
            return row;
        })
        .collect();
}

#[cfg(test)]
mod tests {
    use crate::stores::table::{Column, ColumnType};

    use super::*;

    fn people_info() -> TableInfo {
        let column = |name: &str, column_type| Column {
            name: name.to_string(),
            column_type,
            nullable: true,
        };
        return TableInfo {
            name: "people".to_string(),
            num_rows: 0,
            columns: vec![
                column("id", ColumnType::Uuid),
                column("owner_id", ColumnType::Uuid),
                column("name", ColumnType::String),
            ],
        };
    }

    fn people_spec() -> TableSpec {
        return TableSpec {
            name: "people",
            dependency_rank: 2,
            primary_key: "id",
            identity_columns: &["id", "owner_id"],
        };
    }

    #[test]
    fn test_mapped_owner_is_remapped() {
        let source_owner = Uuid::new_v4();
        let dest_owner = Uuid::new_v4();
        let mut map = IdentityMap::new();
        map.record(source_owner, dest_owner);
        let row_id = Uuid::new_v4();
        let rows = vec![vec![
            Value::Uuid(row_id),
            Value::Uuid(source_owner),
            Value::String("Ana".to_string()),
        ]];
        let remapped = remap_rows(rows, &people_info(), &people_spec(), &map);
        assert_eq!(remapped[0][0], Value::Uuid(row_id));
        assert_eq!(remapped[0][1], Value::Uuid(dest_owner));
    }

    #[test]
    fn test_unmapped_values_pass_through() {
        let mut map = IdentityMap::new();
        map.record(Uuid::new_v4(), Uuid::new_v4());
        let row_id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let rows = vec![vec![
            Value::Uuid(row_id),
            Value::Uuid(owner),
            Value::String("Ana".to_string()),
        ]];
        let remapped = remap_rows(rows, &people_info(), &people_spec(), &map);
        assert_eq!(remapped[0][1], Value::Uuid(owner));
    }

    #[test]
    fn test_text_identity_columns_are_remapped() {
        let source_owner = Uuid::new_v4();
        let dest_owner = Uuid::new_v4();
        let mut map = IdentityMap::new();
        map.record(source_owner, dest_owner);
        let rows = vec![vec![
            Value::String(Uuid::new_v4().to_string()),
            Value::String(source_owner.to_string()),
            Value::String("Ana".to_string()),
        ]];
        let remapped = remap_rows(rows, &people_info(), &people_spec(), &map);
        assert_eq!(remapped[0][1], Value::String(dest_owner.to_string()));
    }

    #[test]
    fn test_non_identity_columns_are_untouched() {
        let source_owner = Uuid::new_v4();
        let mut map = IdentityMap::new();
        map.record(source_owner, Uuid::new_v4());
        let rows = vec![vec![
            Value::Uuid(Uuid::new_v4()),
            Value::Null,
            Value::String(source_owner.to_string()),
        ]];
        let remapped = remap_rows(rows, &people_info(), &people_spec(), &map);
        assert_eq!(remapped[0][2], Value::String(source_owner.to_string()));
    }

    #[test]
    fn test_empty_map_is_a_passthrough() {
        let map = IdentityMap::new();
        let rows = vec![vec![
            Value::Uuid(Uuid::new_v4()),
            Value::Uuid(Uuid::new_v4()),
            Value::String("Ana".to_string()),
        ]];
        let remapped = remap_rows(rows.clone(), &people_info(), &people_spec(), &map);
        assert_eq!(remapped, rows);
    }
}
