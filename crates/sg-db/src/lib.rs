//! Product catalog storage for the `/search` endpoint.

pub mod catalog;
pub mod pool;
