pub mod api;
pub mod auth;
pub mod server;

pub use server::{router, run_server};
