//! Direct program invocation with structured argument vectors.

pub mod executor;
