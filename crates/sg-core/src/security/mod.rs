//! Security utilities: untrusted value types, HTML escaping, fixed templates,
//! allowlist input validation, and audit logging.
//!
//! Raw request values are never interpolated into markup or command lines.
//! Markup gets an escaped [`escape::SanitizedField`]; subprocess arguments get an
//! allowlist-checked [`input::ValidatedHostname`].

pub mod audit;
pub mod escape;
pub mod field;
pub mod input;
pub mod template;
