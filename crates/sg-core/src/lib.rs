//! Input-validation and safe-execution guards for request handlers.
//!
//! Untrusted request data enters as [`security::field::UntrustedField`] and can
//! only leave through one of two doors: HTML escaping into a fixed template, or
//! allowlist validation into an argument vector for a directly spawned program.

pub mod process;
pub mod security;
pub mod system;
