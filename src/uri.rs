use std::str::FromStr;

#[derive(Debug, Clone)]
pub enum URI {
    Sqlite(String),
    Postgres(String),
}

impl FromStr for URI {
    type Err = String;

    fn from_str(s: &str) -> Result<URI, Self::Err> {
        if s.starts_with("sqlite://") {
            return Ok(URI::Sqlite(s.to_owned()));
        }
        if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            return Ok(URI::Postgres(s.to_owned()));
        }
        return Err("Unknown URI format".to_string());
    }
}
