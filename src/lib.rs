pub mod cli;
pub mod config;
pub mod context;
pub mod ingest;
pub mod platform;
pub mod pricing;
pub mod status;
pub mod storage;
pub mod web;
