//! Per-type coercion of middleware and service bodies.
//!
//! Traefik's dynamic-config decoder is strictly typed: a `rateLimit.average`
//! of `100.0` or a `frameDeny` of `"true"` is silently rejected. Operator
//! configs arrive as free-form JSON, so bodies are walked recursively:
//! whole-valued floats become integers and boolean-shaped strings become
//! booleans. Keys carrying URLs, paths, or literal header values are
//! whitelisted per middleware type and preserved verbatim.

use serde_json::{Map, Value};

/// Coerce a middleware body for its middleware type.
pub fn coerce_middleware_config(kind: &str, config: &Value) -> Value {
    walk(config, verbatim_keys(kind))
}

/// Coerce a service body. Service bodies have no verbatim keys beyond URLs.
pub fn coerce_service_config(config: &Value) -> Value {
    walk(config, &["url", "address"])
}

/// Subtrees under these keys are copied through untouched.
fn verbatim_keys(kind: &str) -> &'static [&'static str] {
    match kind {
        // header values like "true" are literal strings, never booleans
        "headers" => &[
            "customRequestHeaders",
            "customResponseHeaders",
            "sslProxyHeaders",
            "customFrameOptionsValue",
        ],
        "forwardAuth" => &["address", "authResponseHeaders", "authRequestHeaders"],
        "basicAuth" | "digestAuth" => &["users", "usersFile", "realm"],
        "addPrefix" | "stripPrefix" | "stripPrefixRegex" | "replacePath"
        | "replacePathRegex" | "redirectRegex" | "redirectScheme" => {
            &["prefix", "prefixes", "path", "regex", "replacement", "scheme", "port"]
        }
        "chain" => &["middlewares"],
        "ipAllowList" | "ipWhiteList" => &["sourceRange"],
        "errors" => &["service", "query", "status"],
        "rateLimit" | "buffering" | "plugin" => &[],
        _ => &[],
    }
}

fn walk(value: &Value, verbatim: &'static [&'static str]) -> Value {
    match value {
        Value::Object(map) => {
            let coerced: Map<String, Value> = map
                .iter()
                .map(|(key, inner)| {
                    if verbatim.contains(&key.as_str()) {
                        (key.clone(), inner.clone())
                    } else {
                        (key.clone(), walk(inner, verbatim))
                    }
                })
                .collect();
            Value::Object(coerced)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| walk(v, verbatim)).collect()),
        Value::Number(n) => coerce_number(n),
        Value::String(s) => match s.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

fn coerce_number(n: &serde_json::Number) -> Value {
    if n.is_f64()
        && let Some(f) = n.as_f64()
        && f.is_finite()
        && f.fract() == 0.0
        && f >= i64::MIN as f64
        && f <= i64::MAX as f64
    {
        return Value::from(f as i64);
    }
    Value::Number(n.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rate_limit_whole_floats_become_integers() {
        let config = json!({"average": 100.0, "burst": 50.0});
        let coerced = coerce_middleware_config("rateLimit", &config);
        assert_eq!(coerced, json!({"average": 100, "burst": 50}));
        assert!(coerced["average"].is_i64());
        assert!(coerced["burst"].is_i64());
    }

    #[test]
    fn fractional_floats_are_untouched() {
        let config = json!({"ratio": 0.5});
        let coerced = coerce_middleware_config("rateLimit", &config);
        assert_eq!(coerced["ratio"], 0.5);
    }

    #[test]
    fn boolean_shaped_strings_become_booleans() {
        let config = json!({"frameDeny": "true", "contentTypeNosniff": "false"});
        let coerced = coerce_middleware_config("headers", &config);
        assert_eq!(coerced["frameDeny"], true);
        assert_eq!(coerced["contentTypeNosniff"], false);
    }

    #[test]
    fn header_value_maps_are_preserved_verbatim() {
        let config = json!({
            "customRequestHeaders": {"X-Forwarded-Proto": "https", "X-Debug": "true"},
            "stsSeconds": 31536000.0,
        });
        let coerced = coerce_middleware_config("headers", &config);
        // literal header value "true" stays a string
        assert_eq!(coerced["customRequestHeaders"]["X-Debug"], "true");
        assert_eq!(coerced["stsSeconds"], 31536000);
    }

    #[test]
    fn forward_auth_address_is_preserved() {
        let config = json!({"address": "http://auth.local/verify", "trustForwardHeader": "true"});
        let coerced = coerce_middleware_config("forwardAuth", &config);
        assert_eq!(coerced["address"], "http://auth.local/verify");
        assert_eq!(coerced["trustForwardHeader"], true);
    }

    #[test]
    fn chain_middleware_list_is_preserved() {
        let config = json!({"middlewares": ["a@file", "b"]});
        let coerced = coerce_middleware_config("chain", &config);
        assert_eq!(coerced["middlewares"], json!(["a@file", "b"]));
    }

    #[test]
    fn ip_allow_list_ranges_are_preserved() {
        let config = json!({"sourceRange": ["10.0.0.0/8", "192.168.0.0/16"], "depth": 2.0});
        let coerced = coerce_middleware_config("ipAllowList", &config);
        assert_eq!(coerced["sourceRange"], json!(["10.0.0.0/8", "192.168.0.0/16"]));
        assert_eq!(coerced["depth"], 2);
    }

    #[test]
    fn nested_structures_are_walked() {
        let config = json!({"sourceCriterion": {"ipStrategy": {"depth": 1.0}}});
        let coerced = coerce_middleware_config("rateLimit", &config);
        assert_eq!(coerced["sourceCriterion"]["ipStrategy"]["depth"], 1);
        assert!(coerced["sourceCriterion"]["ipStrategy"]["depth"].is_i64());
    }

    #[test]
    fn unknown_type_gets_default_coercion() {
        let config = json!({"weight": 3.0, "enabled": "true"});
        let coerced = coerce_middleware_config("somethingElse", &config);
        assert_eq!(coerced["weight"], 3);
        assert_eq!(coerced["enabled"], true);
    }

    #[test]
    fn service_urls_are_preserved() {
        let config = json!({"servers": [{"url": "http://10.0.0.1:8080"}], "passHostHeader": "true"});
        let coerced = coerce_service_config(&config);
        assert_eq!(coerced["servers"][0]["url"], "http://10.0.0.1:8080");
        assert_eq!(coerced["passHostHeader"], true);
    }
}
