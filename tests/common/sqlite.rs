use std::path::PathBuf;

use db_cloner::uri::URI;
use rusqlite::{Connection, OpenFlags, params};
use tempfile::TempDir;
use uuid::Uuid;

use super::gen_database_name;

pub struct TestSqliteDatabase {
    pub path: PathBuf,
    pub conn: Connection,
    tmp_dir: TempDir,
}

impl TestSqliteDatabase {
    pub fn new() -> Self {
        let tmp_dir = tempfile::tempdir().unwrap();
        let path = tmp_dir.path().join(gen_database_name());
        let conn = Connection::open_with_flags(
            path.clone(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )
        .expect("Failed to create test sqlite database");

        return Self {
            conn,
            path,
            tmp_dir,
        };
    }

    pub fn get_uri(&self) -> URI {
        return URI::Sqlite(format!("sqlite://{}", self.path.to_str().unwrap()));
    }

    pub fn create_campaign_schema(&mut self) {
        self.conn
            .execute_batch(
                "CREATE TABLE auth_users (
                    id UUID PRIMARY KEY,
                    email TEXT UNIQUE,
                    encrypted_password TEXT,
                    email_confirmed_at TIMESTAMP,
                    raw_user_meta_data JSON,
                    raw_app_meta_data JSON
                );
                CREATE TABLE profiles (
                    id UUID PRIMARY KEY,
                    full_name TEXT,
                    role TEXT,
                    created_at TIMESTAMP
                );
                CREATE TABLE leaders (
                    id UUID PRIMARY KEY,
                    profile_id UUID REFERENCES profiles(id),
                    name TEXT,
                    phone TEXT,
                    created_by UUID,
                    created_at TIMESTAMP
                );
                CREATE TABLE people (
                    id UUID PRIMARY KEY,
                    owner_id UUID,
                    leader_id UUID REFERENCES leaders(id),
                    name TEXT,
                    email TEXT,
                    city TEXT,
                    support_level INTEGER,
                    created_by UUID,
                    created_at TIMESTAMP
                );
                CREATE TABLE invitations (
                    id UUID PRIMARY KEY,
                    leader_id UUID REFERENCES leaders(id),
                    email TEXT,
                    invited_by UUID,
                    accepted BOOLEAN,
                    created_at TIMESTAMP
                );
                CREATE TABLE projections (
                    id UUID PRIMARY KEY,
                    city TEXT,
                    goal DECIMAL,
                    created_by UUID,
                    created_at TIMESTAMP
                );",
            )
            .unwrap();
    }

    pub fn add_principal(&mut self, id: Uuid, email: &str) {
        self.add_principal_with_metadata(
            id,
            Some(email),
            r#"{"full_name":"Test User"}"#,
            r#"{"provider":"email"}"#,
        );
    }

    pub fn add_principal_with_metadata(
        &mut self,
        id: Uuid,
        email: Option<&str>,
        user_metadata: &str,
        app_metadata: &str,
    ) {
        self.conn
            .execute(
                "INSERT INTO auth_users
                (id, email, encrypted_password, raw_user_meta_data, raw_app_meta_data)
                VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    email,
                    "source-password-hash",
                    user_metadata,
                    app_metadata
                ],
            )
            .unwrap();
    }

    pub fn add_profile(&mut self, id: Uuid, full_name: &str) {
        self.conn
            .execute(
                "INSERT INTO profiles (id, full_name, role, created_at)
                VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), full_name, "LEADER", "2024-01-05 09:00:00"],
            )
            .unwrap();
    }

    pub fn add_person(&mut self, id: Uuid, owner_id: Option<Uuid>, name: &str, email: &str) {
        self.add_person_with_leader(id, owner_id, None, name, email);
    }

    pub fn add_person_with_leader(
        &mut self,
        id: Uuid,
        owner_id: Option<Uuid>,
        leader_id: Option<Uuid>,
        name: &str,
        email: &str,
    ) {
        self.conn
            .execute(
                "INSERT INTO people
                (id, owner_id, leader_id, name, email, city, support_level, created_by, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.to_string(),
                    owner_id.map(|owner| owner.to_string()),
                    leader_id.map(|leader| leader.to_string()),
                    name,
                    email,
                    "Porto Alegre",
                    3,
                    owner_id.map(|owner| owner.to_string()),
                    "2024-01-05 09:00:00"
                ],
            )
            .unwrap();
    }

    pub fn add_projection(&mut self, id: Uuid, city: &str, goal: &str) {
        self.conn
            .execute(
                "INSERT INTO projections (id, city, goal, created_by, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.to_string(), city, goal, None::<String>, "2024-01-05 09:00:00"],
            )
            .unwrap();
    }

    pub fn count(&mut self, table: &str) -> u64 {
        let query = format!("SELECT count(1) FROM {table}");
        let count: i64 = self.conn.query_row(&query, [], |row| row.get(0)).unwrap();
        return count as u64;
    }

    pub fn column_values(&mut self, table: &str, column: &str) -> Vec<Option<String>> {
        let query = format!("SELECT {column} FROM {table} ORDER BY 1");
        let mut stmt = self.conn.prepare(&query).unwrap();
        let mut values = Vec::new();
        let mut rows = stmt.query([]).unwrap();
        while let Some(row) = rows.next().unwrap() {
            values.push(row.get(0).unwrap());
        }
        return values;
    }

    pub fn get_all_rows(&mut self, table: &str) -> Vec<Vec<rusqlite::types::Value>> {
        let query = format!("SELECT * FROM {table} ORDER BY 1");
        let mut stmt = self.conn.prepare(&query).unwrap();
        let column_count = stmt.column_count();
        let mut rows = Vec::new();
        let mut raw_rows = stmt.query([]).unwrap();
        while let Some(row) = raw_rows.next().unwrap() {
            let mut out = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                out.push(row.get_ref(idx).unwrap().into());
            }
            rows.push(out);
        }
        return rows;
    }

    pub fn principal_id_for(&mut self, email: &str) -> Option<String> {
        use rusqlite::OptionalExtension;
        return self
            .conn
            .query_row(
                "SELECT id FROM auth_users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()
            .unwrap();
    }
}
