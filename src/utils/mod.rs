//! Shared helpers for domain handling and DNS lookups.

pub(crate) mod dns;
pub(crate) mod domain;
