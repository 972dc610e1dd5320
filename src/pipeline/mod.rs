// Seeding pipeline: ingestion, processing, upload, and local storage doubles

pub mod ingestion;
pub mod processing;
pub mod storage;
pub mod upload;
