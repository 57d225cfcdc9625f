//! Shard-scoped parameter rewriting.
//!
//! The host layer builds one parameter set per query and fans it out to
//! every shard. Keys under the reserved `shard.` namespace carry per-shard
//! overrides: `shard.<name>.<key>` applies `<key>` only when dispatching to
//! `<name>` and is dropped for every other shard. Unscoped keys pass through
//! in their original order. `shard.` is therefore not usable as a plain
//! parameter name.

use crate::error::DispatchError;
use crate::request::ShardParams;

/// Reserved namespace for shard-scoped parameter keys.
pub const SHARD_SCOPE_PREFIX: &str = "shard.";

/// Produce the parameter set to send to `shard`.
///
/// Always returns a fresh `ShardParams`; the input is never mutated. Fails
/// on a scoped key that is missing the `<name>.<key>` structure, in which
/// case the caller forwards the original set instead.
pub fn rewrite_for_shard(
    shard: &str,
    params: &ShardParams,
) -> Result<ShardParams, DispatchError> {
    let mut rewritten = ShardParams::new();

    // Unscoped keys first, preserving wire order.
    for (key, value) in params.iter() {
        if !key.starts_with(SHARD_SCOPE_PREFIX) {
            rewritten.append(key.clone(), value.clone());
        }
    }

    // Scoped overrides, applied in declaration order.
    for (key, value) in params.iter() {
        let Some(scoped) = key.strip_prefix(SHARD_SCOPE_PREFIX) else {
            continue;
        };
        let (target, name) = scoped.split_once('.').ok_or_else(|| {
            DispatchError::MalformedScopedParam {
                shard: shard.to_string(),
                key: key.clone(),
            }
        })?;
        if target.is_empty() || name.is_empty() {
            return Err(DispatchError::MalformedScopedParam {
                shard: shard.to_string(),
                key: key.clone(),
            });
        }
        if target == shard {
            rewritten.set(name, value.clone());
        }
    }

    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscoped_params_pass_through_in_order() {
        let params = ShardParams::from_pairs([("fq", "type:doc"), ("q", "foo")]);
        let rewritten = rewrite_for_shard("shard3", &params).expect("rewrite");

        assert_eq!(rewritten, params, "content must be unchanged");
    }

    #[test]
    fn scoped_key_applies_only_to_target_shard() {
        let params = ShardParams::from_pairs([("q", "foo"), ("shard.shard3.fq", "zone:3")]);

        let for_shard3 = rewrite_for_shard("shard3", &params).expect("rewrite");
        assert_eq!(for_shard3.get("fq"), Some("zone:3"));
        assert_eq!(for_shard3.get("q"), Some("foo"));
        assert!(for_shard3.get("shard.shard3.fq").is_none());

        let for_shard1 = rewrite_for_shard("shard1", &params).expect("rewrite");
        assert_eq!(for_shard1, ShardParams::from_pairs([("q", "foo")]));
    }

    #[test]
    fn scoped_value_overrides_base_value_in_place() {
        let params = ShardParams::from_pairs([
            ("q", "foo"),
            ("fq", "type:doc"),
            ("shard.shard3.fq", "zone:3"),
        ]);

        let rewritten = rewrite_for_shard("shard3", &params).expect("rewrite");
        assert_eq!(rewritten.get("fq"), Some("zone:3"));
        let keys: Vec<&str> = rewritten.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["q", "fq"], "override keeps the base position");
    }

    #[test]
    fn scoped_key_for_unknown_name_is_dropped_not_an_error() {
        let params = ShardParams::from_pairs([("q", "foo"), ("shard.shard9.fq", "zone:9")]);
        let rewritten = rewrite_for_shard("shard3", &params).expect("rewrite");
        assert_eq!(rewritten, ShardParams::from_pairs([("q", "foo")]));
    }

    #[test]
    fn scoped_key_without_parameter_name_is_malformed() {
        let params = ShardParams::from_pairs([("shard.shard3", "zone:3")]);
        let err = rewrite_for_shard("shard3", &params).unwrap_err();
        assert_eq!(err.error_type_label(), "param_rewrite");
    }

    #[test]
    fn scoped_key_with_empty_segments_is_malformed() {
        for key in ["shard..fq", "shard.shard3.", "shard."] {
            let params = ShardParams::from_pairs([(key, "x")]);
            assert!(
                rewrite_for_shard("shard3", &params).is_err(),
                "'{key}' should be rejected"
            );
        }
    }

    #[test]
    fn rewrite_returns_a_fresh_instance() {
        let params = ShardParams::from_pairs([("q", "foo")]);
        let rewritten = rewrite_for_shard("shard3", &params).expect("rewrite");
        assert_eq!(rewritten, params);
        assert_ne!(
            params.as_pairs().as_ptr(),
            rewritten.as_pairs().as_ptr(),
            "forwarded params must not alias the caller's set"
        );
    }
}
