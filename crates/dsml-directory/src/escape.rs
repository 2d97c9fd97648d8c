//! XML entity escaping for names and attribute values embedded in DSML documents.

use std::borrow::Cow;
use tracing::warn;

const NAMED_ENTITIES: [(&str, char); 5] = [
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&amp;", '&'),
    ("&quot;", '"'),
    ("&apos;", '\''),
];

/// Longest numeric reference accepted, `&#` and `;` included.
const MAX_NUMERIC_REFERENCE_LEN: usize = 10;

/// Escapes the five XML-significant characters.
///
/// Input without any of `< > & " '` is returned borrowed, untouched.
#[must_use]
pub fn escape(text: &str) -> Cow<'_, str> {
    let Some(first) = text.find(['<', '>', '&', '"', '\'']) else {
        return Cow::Borrowed(text);
    };

    let mut out = String::with_capacity(text.len() + 16);
    out.push_str(&text[..first]);
    for ch in text[first..].chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Resolves named entities and numeric character references.
///
/// Numeric references (`&#60;` or `&#x3c;`) are limited to code points up to `0xFF`. The
/// text is scanned once, left to right: a reference produced by decoding is not decoded
/// again, so `&#38;#60;` yields `&#60;`. When a numeric reference cannot be decoded a
/// warning is logged and the rest of the text is kept verbatim. An `&` that starts no
/// known entity is kept as is.
#[must_use]
pub fn unescape(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(position) = rest.find('&') {
        out.push_str(&rest[..position]);
        let tail = &rest[position..];

        if let Some((entity, ch)) = NAMED_ENTITIES
            .iter()
            .find(|(entity, _)| tail.starts_with(entity))
        {
            out.push(*ch);
            rest = &tail[entity.len()..];
            continue;
        }

        if tail.starts_with("&#") {
            if let Some((ch, len)) = decode_numeric_reference(tail) {
                out.push(ch);
                rest = &tail[len..];
                continue;
            }
            warn!("Unable to decode character reference in `{tail}`, leaving remainder as is");
            out.push_str(tail);
            return Cow::Owned(out);
        }

        out.push('&');
        rest = &tail[1..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Decodes the reference at the start of `text` (which begins with `&#`). Returns the
/// character and the length of the reference.
fn decode_numeric_reference(text: &str) -> Option<(char, usize)> {
    let end = text
        .char_indices()
        .take(MAX_NUMERIC_REFERENCE_LEN)
        .find(|(_, ch)| *ch == ';')
        .map(|(index, _)| index)?;

    let digits = &text[2..end];
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    if code > 0xFF {
        return None;
    }
    char::from_u32(code).map(|ch| (ch, end + 1))
}
