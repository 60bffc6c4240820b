use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

/// Content hash of a configuration object.
///
/// Objects are serialized with recursively sorted keys before hashing, so
/// two configurations that differ only in key order produce the same hash.
pub fn config_hash(config: &serde_json::Value) -> String {
    let canonical = canonicalize(config);
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted: Vec<(&String, &serde_json::Value)> = map.iter().collect();
            sorted.sort_by_key(|(k, _)| k.as_str());

            let mut out = serde_json::Map::new();
            for (key, val) in sorted {
                out.insert(key.clone(), canonicalize(val));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

static HOSTNAME_RE: OnceLock<Regex> = OnceLock::new();

/// RFC-952-ish hostname validation: labels of alphanumerics and hyphens,
/// no leading/trailing hyphen, dot separated.
pub fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() || hostname.len() > 253 {
        return false;
    }

    let re = HOSTNAME_RE.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .unwrap()
    });

    re.is_match(hostname)
}

/// Human-readable duration, used in notification messages.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        return format!("{seconds:.0} seconds");
    }

    let minutes = (seconds / 60.0).floor() as u64;
    if minutes < 60 {
        return format!("{minutes} min");
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours} h {} min", minutes % 60);
    }

    format!("{} days {} h", hours / 24, hours % 24)
}

/// Round to two decimal places, matching the precision of reported rates.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
