use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("timestamp out of range: {0}us")]
    TimestampRange(i64),

    #[error("no results for query")]
    NoResults,

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("{0}")]
    Other(String),
}
