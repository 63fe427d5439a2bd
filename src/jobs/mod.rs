pub mod ingest;
pub mod keeper;
pub mod summarize;
