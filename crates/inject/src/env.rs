//! `KEY=VALUE` environment list handling

use tracing::debug;

/// Merge `additions` into `env`.
///
/// Keys the container already sets win unless `force` is set, in which
/// case the existing entry is rewritten in place. New keys are appended
/// in the order given, so the result is deterministic. Malformed
/// additions (no `=`) are skipped.
pub fn merge_env(env: &mut Vec<String>, additions: &[String], force: bool) {
    for addition in additions {
        let Some((key, value)) = addition.split_once('=') else {
            debug!(entry = %addition, "skipping malformed environment entry");
            continue;
        };

        let existing = env
            .iter_mut()
            .find(|entry| entry.split_once('=').is_some_and(|(k, _)| k == key));

        match existing {
            Some(entry) => {
                if force {
                    debug!(key, value, "overwriting environment variable");
                    *entry = addition.clone();
                } else {
                    debug!(key, "environment variable already set, keeping container value");
                }
            }
            None => {
                debug!(key, value, "adding environment variable");
                env.push(addition.clone());
            }
        }
    }
}
