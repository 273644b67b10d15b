//! Gutenberg boilerplate removal
//!
//! Every plain-text edition wraps the book in a license header and footer,
//! delimited by `*** START OF ...` and `*** END OF ...` lines.

use gutenload_common::types::truncate_on_char_boundary;

const START_MARKERS: [&str; 2] = ["*** START OF", "***START OF"];
const END_MARKERS: [&str; 2] = ["*** END OF", "***END OF"];

/// Strip header and footer, trim, and bound the text to `max_bytes`.
///
/// Without a start marker the text is kept from the beginning; without an
/// end marker it is kept to the end. An end marker is honoured even when no
/// start marker was found.
pub fn clean_content(raw: &str, max_bytes: usize) -> String {
    let body_start = find_first(raw, &START_MARKERS)
        .map(|marker| {
            raw[marker..]
                .find('\n')
                .map(|newline| marker + newline + 1)
                .unwrap_or(raw.len())
        })
        .unwrap_or(0);

    let body = &raw[body_start..];
    let body = match find_first(body, &END_MARKERS) {
        Some(end) => &body[..end],
        None => body,
    };

    let mut cleaned: String = body.trim().chars().filter(|c| *c != '\0').collect();
    truncate_on_char_boundary(&mut cleaned, max_bytes);
    cleaned
}

/// Earliest position of any of `markers`
fn find_first(text: &str, markers: &[&str]) -> Option<usize> {
    markers.iter().filter_map(|m| text.find(m)).min()
}
