//! Prefixed ULID identifiers such as `conn_01J9…` and `agt_01J9…`.

use ulid::Ulid;

/// Prefixes in use across the service.
pub mod prefix {
    pub const CONNECTION: &str = "conn";
    pub const AGENT: &str = "agt";
}

pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{prefix}_{}", Ulid::new())
}

/// Whether `id` has the shape `<prefix>_<ulid>`.
pub fn is_prefixed(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|ulid| Ulid::from_string(ulid).is_ok())
}
