//! Canonicalization of upstream identifiers.
//!
//! Upstream sources hand us ids like `web-router-auth@docker` or
//! `svc@file`; the token after `@` names the Traefik provider that owns the
//! entity. The store keys everything by the canonical form: provider suffix
//! stripped and cascaded `-auth` segments collapsed. Results are memoized in
//! a process-wide map since the set of upstream ids is bounded in practice.

use dashmap::DashMap;
use std::sync::LazyLock;

/// Suffix for entities authored by Traefik's local file provider.
pub const SUFFIX_FILE: &str = "file";
/// Suffix for entities owned by the docker provider.
pub const SUFFIX_DOCKER: &str = "docker";
/// Suffix for entities served back through the merged-config HTTP provider.
pub const SUFFIX_HTTP: &str = "http";

/// Adapter name reported by the gateway upstream.
pub const SOURCE_GATEWAY: &str = "gateway";
/// Adapter name reported by the native Traefik upstream.
pub const SOURCE_TRAEFIK: &str = "traefik";
/// Source label for entities authored by the local file provider.
pub const SOURCE_FILE: &str = "file";

static CACHE: LazyLock<DashMap<String, String>> = LazyLock::new(DashMap::new);

/// Canonicalize a raw upstream identifier.
///
/// Strips everything from the first `@` onward, then collapses repeated
/// `-auth` suffixes (`x-auth-auth` becomes `x-auth`). Idempotent.
pub fn normalize(raw: &str) -> String {
    if let Some(hit) = CACHE.get(raw) {
        return hit.clone();
    }

    let bare = match raw.find('@') {
        Some(i) => &raw[..i],
        None => raw,
    };

    let mut canonical = bare.to_string();
    while canonical.ends_with("-auth-auth") {
        canonical.truncate(canonical.len() - "-auth".len());
    }

    CACHE.insert(raw.to_string(), canonical.clone());
    canonical
}

/// The provider suffix of a raw identifier, without the `@`.
pub fn provider_suffix(raw: &str) -> Option<&str> {
    raw.find('@').map(|i| &raw[i + 1..])
}

/// Append `@suffix` iff `id` carries no provider suffix already.
pub fn add_provider_suffix(id: &str, suffix: &str) -> String {
    if id.contains('@') {
        id.to_string()
    } else {
        format!("{id}@{suffix}")
    }
}

/// Which provider suffix a resource's backing service must be addressed
/// with in the served document.
///
/// File-authored resources keep `@file`. When both the row's source and the
/// active adapter are the native Traefik flavor, the backing service lives in
/// the docker provider. Everything else resolves through the merged-config
/// HTTP provider.
pub fn determine_provider_suffix(source_type: &str, active_adapter: &str) -> &'static str {
    if source_type == SOURCE_FILE {
        SUFFIX_FILE
    } else if source_type == SOURCE_TRAEFIK && active_adapter == SOURCE_TRAEFIK {
        SUFFIX_DOCKER
    } else {
        SUFFIX_HTTP
    }
}

/// Empty the memo map. Test hook.
pub fn clear_normalization_cache() {
    CACHE.clear();
}
