//! Core services: directory walking, task accounting, and the serialized archive writer

pub mod format;
pub mod ingest;
pub mod progress;
pub mod tasks;
pub mod walk;
pub mod writer;
