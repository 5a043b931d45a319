//! Record fingerprinting for dedup and aggregate grouping (§4.A).
//!
//! A fingerprint is a hex-encoded SHA-256 digest over a canonicalized
//! `(app_id, level, normalized_message, service)` tuple. Normalization
//! replaces volatile tokens — numeric runs, UUIDs, email-like strings —
//! with stable placeholders so that two log lines differing only in a
//! request id or timestamp still group together.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::model::Level;

/// Normalize a message for fingerprinting: numeric runs, UUIDs, and
/// email-like tokens become placeholders so semantically-identical
/// records collapse onto the same fingerprint regardless of embedded
/// volatile values.
pub fn normalize_message(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut chars = message.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if is_uuid_start(message, i) {
            out.push_str("<uuid>");
            skip_ahead(&mut chars, 36);
            continue;
        }
        if c.is_ascii_digit() {
            out.push_str("<num>");
            while matches!(chars.peek(), Some((_, d)) if d.is_ascii_digit()) {
                chars.next();
            }
            continue;
        }
        if is_email_start(message, i) {
            out.push_str("<email>");
            let consumed = skip_email(message, i);
            skip_ahead(&mut chars, consumed.saturating_sub(1));
            continue;
        }
        out.push(c);
    }

    out
}

fn is_uuid_start(s: &str, at: usize) -> bool {
    if s.len() < at + 36 || !s.is_char_boundary(at + 36) {
        return false;
    }
    let candidate = &s[at..at + 36];
    Uuid::parse_str(candidate).is_ok()
}

fn is_email_start(s: &str, at: usize) -> bool {
    // Heuristic: a run of word chars immediately followed by '@' and then
    // at least one '.' before the next whitespace.
    let rest = &s[at..];
    let Some(at_pos) = rest.find('@') else {
        return false;
    };
    if at_pos == 0 {
        return false;
    }
    let local = &rest[..at_pos];
    if local.chars().any(|c| c.is_whitespace()) {
        return false;
    }
    let domain_and_rest = &rest[at_pos + 1..];
    let domain: String = domain_and_rest
        .chars()
        .take_while(|c| !c.is_whitespace())
        .collect();
    domain.contains('.')
}

fn skip_email(s: &str, at: usize) -> usize {
    let rest = &s[at..];
    rest.chars().take_while(|c| !c.is_whitespace()).count()
}

fn skip_ahead<I: Iterator<Item = (usize, char)>>(
    iter: &mut std::iter::Peekable<I>,
    n: usize,
) {
    for _ in 0..n {
        iter.next();
    }
}

/// Compute the stable, hex-encoded 64-char fingerprint for a record.
pub fn fingerprint(app_id: Uuid, level: Level, message: &str, service: &str) -> String {
    let normalized = normalize_message(message);
    let mut hasher = Sha256::new();
    hasher.update(app_id.as_bytes());
    hasher.update([b'|']);
    hasher.update(level.as_str().as_bytes());
    hasher.update([b'|']);
    hasher.update(normalized.as_bytes());
    hasher.update([b'|']);
    hasher.update(service.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_numeric_runs() {
        assert_eq!(
            normalize_message("request 12345 failed after 20 retries"),
            "request <num> failed after <num> retries"
        );
    }

    #[test]
    fn normalizes_uuids() {
        let msg = "user 123e4567-e89b-12d3-a456-426614174000 not found";
        assert_eq!(normalize_message(msg), "user <uuid> not found");
    }

    #[test]
    fn normalizes_emails() {
        assert_eq!(
            normalize_message("failed to notify a.b@example.com"),
            "failed to notify <email>"
        );
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let app = Uuid::new_v4();
        let a = fingerprint(app, Level::Error, "boom 42", "billing");
        let b = fingerprint(app, Level::Error, "boom 42", "billing");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_groups_volatile_values() {
        let app = Uuid::new_v4();
        let a = fingerprint(app, Level::Error, "timeout after 100ms", "billing");
        let b = fingerprint(app, Level::Error, "timeout after 900ms", "billing");
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_message_does_not_panic_on_multibyte_boundary() {
        let mut msg = "a".repeat(35);
        msg.push('é');
        msg.push_str(" more text");
        let _ = normalize_message(&msg);
    }

    #[test]
    fn fingerprint_differs_on_service() {
        let app = Uuid::new_v4();
        let a = fingerprint(app, Level::Error, "boom", "billing");
        let b = fingerprint(app, Level::Error, "boom", "auth");
        assert_ne!(a, b);
    }
}
