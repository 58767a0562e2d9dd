//! Placeholder filling and roast-template splitting.

/// Placeholder token in every content template.
pub const PLACEHOLDER: &str = "{}";

/// Full-width comma separating the danmaku part of a roast template from
/// the presenter cue.
pub const ROAST_SEPARATOR: char = '\u{FF0C}';

/// Split a raw roast template on the last separator.
///
/// Returns `(danmaku_template, presenter_cue)`, both trimmed. Without a
/// separator the danmaku part is empty and the whole template is the cue.
pub fn split_roast_template(raw: &str) -> (String, String) {
    match raw.rfind(ROAST_SEPARATOR) {
        Some(idx) => {
            let before = &raw[..idx];
            let after = &raw[idx + ROAST_SEPARATOR.len_utf8()..];
            (before.trim().to_string(), after.trim().to_string())
        }
        None => (String::new(), raw.trim().to_string()),
    }
}

/// Replace every placeholder with `value`.
pub fn fill_all(template: &str, value: &str) -> String {
    template.replace(PLACEHOLDER, value)
}

/// Fill placeholders positionally.
///
/// Slot `i` takes `names[i]` unless it is blank, then `fallbacks[i]`.
/// Slots beyond both reuse the last fallback so no raw token is left.
/// Substituted text is never rescanned for placeholders.
pub fn fill_positional(template: &str, names: &[&str], fallbacks: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    for (i, part) in template.split(PLACEHOLDER).enumerate() {
        if i > 0 {
            out.push_str(slot_value(names, fallbacks, i - 1));
        }
        out.push_str(part);
    }
    out
}

fn slot_value<'a>(names: &[&'a str], fallbacks: &[&'a str], i: usize) -> &'a str {
    match names.get(i) {
        Some(name) if !name.trim().is_empty() => name,
        _ => fallbacks
            .get(i)
            .or_else(|| fallbacks.last())
            .copied()
            .unwrap_or(""),
    }
}
