//! Test support and end-to-end scenarios for the retrieval pipeline.

pub mod mocks;
