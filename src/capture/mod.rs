pub mod artifact;
pub mod ingest;
pub mod manager;
pub mod provider;
