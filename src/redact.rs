//! Secret redaction for diff text.

use regex::Regex;
use tracing::debug;

/// Replacement written over every secret-like match.
pub const REDACTION_TOKEN: &str = "[REDACTED]";

/// Replaces every match of each pattern, in order, with [`REDACTION_TOKEN`].
///
/// Returns the sanitized text and the total number of replacements. Patterns
/// are validated when configuration loads, so an invalid one is skipped here.
pub fn redact<S: AsRef<str>>(text: &str, patterns: &[S]) -> (String, usize) {
    let mut sanitized = text.to_string();
    let mut total = 0;

    for pattern in patterns {
        let pattern = pattern.as_ref();
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                debug!(pattern, "Skipping invalid secret pattern: {e}");
                continue;
            }
        };
        let matches = re.find_iter(&sanitized).count();
        if matches > 0 {
            sanitized = re.replace_all(&sanitized, REDACTION_TOKEN).into_owned();
            total += matches;
        }
    }

    (sanitized, total)
}
