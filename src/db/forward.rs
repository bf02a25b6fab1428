//! Extraction of the forward ("Up") half of goose-format migration scripts.
//!
//! Migration files carry both directions in one file, delimited by
//! `-- +goose Up` and `-- +goose Down` marker lines. Only the Up section may
//! ever reach the database from here; executing a whole file would also run
//! the Down statements, which drop tables.

/// Comment prefix shared by all goose directives.
const DIRECTIVE_PREFIX: &str = "-- +goose";

/// Marker opening the forward section.
const FORWARD_MARKER: &str = "-- +goose Up";

/// Marker opening the reverse section; nothing after it is ever emitted.
const REVERSE_MARKER: &str = "-- +goose Down";

#[derive(Debug, PartialEq)]
enum ScanState {
    BeforeForward,
    InForward,
    Done,
}

/// Returns the forward section of `text`.
///
/// A file with no directives at all is passed through unchanged. A malformed
/// file (reverse marker but no forward marker) yields an empty string, which
/// callers treat as "nothing to execute" rather than an error.
pub fn extract_forward(text: &str) -> String {
    if !text.contains(DIRECTIVE_PREFIX) {
        return text.to_string();
    }

    let mut state = ScanState::BeforeForward;
    let mut out: Vec<&str> = Vec::new();

    for line in text.lines() {
        if state == ScanState::Done {
            break;
        }

        let trimmed = line.trim();
        // Markers are matched by prefix, not equality, so trailing text
        // (annotations, or a directive like `-- +goose Upgrade`) still flips
        // the state. That is how goose itself reads these lines; do not
        // tighten this to an exact match.
        if trimmed.starts_with(FORWARD_MARKER) {
            state = ScanState::InForward;
            continue;
        }
        if trimmed.starts_with(REVERSE_MARKER) {
            state = ScanState::Done;
            continue;
        }
        // Any other directive line is discarded, never emitted as SQL.
        if trimmed.starts_with(DIRECTIVE_PREFIX) {
            continue;
        }

        if state == ScanState::InForward {
            out.push(line);
        }
    }

    out.join("\n")
}
