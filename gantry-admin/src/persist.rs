//! Config-file persistence for the data-source switch.
//!
//! The file is written atomically: first to a `.tmp` sibling, then renamed
//! over the final path, so a crash mid-write never corrupts the config.
//! A no-op when no config path is known (tests, pure-env deployments).

use std::path::Path;
use tracing::{debug, warn};

/// Rewrite `active_source` in the YAML config file.
pub fn persist_active_source(path: &Path, name: &str) {
    let mut doc: serde_yaml::Value = match std::fs::read_to_string(path) {
        Ok(raw) => match serde_yaml::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "persist: config file is malformed, not rewriting");
                return;
            }
        },
        // first write: start from an empty document
        Err(_) => serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
    };

    if !doc.is_mapping() {
        doc = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
    }
    if let Some(map) = doc.as_mapping_mut() {
        map.insert(
            serde_yaml::Value::String("active_source".to_string()),
            serde_yaml::Value::String(name.to_string()),
        );
    }

    let rendered = match serde_yaml::to_string(&doc) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "persist: failed to serialize config");
            return;
        }
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(error = %e, dir = %parent.display(), "persist: failed to create config dir");
        return;
    }

    let tmp = path.with_extension("yaml.tmp");
    if let Err(e) = std::fs::write(&tmp, &rendered) {
        warn!(error = %e, path = %tmp.display(), "persist: failed to write tmp file");
        return;
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        warn!(error = %e, "persist: failed to rename tmp over config file");
        return;
    }

    debug!(path = %path.display(), source = name, "persist: active source saved");
}
