use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloneError {
    #[error("Unable to connect to the {0} store")]
    Connection(&'static str, #[source] anyhow::Error),
    #[error("Principal enumeration ended early: retrieved {got} of {expected} reported principals")]
    IncompleteEnumeration { got: u64, expected: u64 },
    #[error("Fetch of table {table} returned {got} rows but the source reported {expected}")]
    IncompleteFetch {
        table: String,
        got: u64,
        expected: u64,
    },
}
