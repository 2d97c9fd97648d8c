//! A small tag scanner over raw response text.
//!
//! Elements are matched by local name so any namespace prefix (or none) is accepted. The
//! scanner is forgiving: a `>` inside a quoted attribute value does not end a tag, but a
//! stray quote that never closes falls back to the first `>`. A missing end tag extends the
//! element to the end of the document, and attribute values without a closing quote run to
//! the end of the tag.

use std::borrow::Cow;

use crate::escape::unescape;

/// A located element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Element<'a> {
    /// Raw attribute text of the start tag.
    pub attrs: &'a str,
    /// Raw text between the start and end tags.
    pub content: &'a str,
    /// Offset just past the element.
    pub end: usize,
}

#[derive(Debug, Clone, Copy)]
struct Tag<'a> {
    start: usize,
    name: &'a str,
    attrs: &'a str,
    end: usize,
    closing: bool,
    self_closing: bool,
}

/// Finds the next tag at or after `from`, skipping comments, CDATA sections and
/// processing instructions.
fn next_tag(doc: &str, mut from: usize) -> Option<Tag<'_>> {
    loop {
        let start = from + doc.get(from..)?.find('<')?;
        let rest = &doc[start..];

        let skip_to = if rest.starts_with("<!--") {
            Some("-->")
        } else if rest.starts_with("<![CDATA[") {
            Some("]]>")
        } else if rest.starts_with("<?") || rest.starts_with("<!") {
            Some(">")
        } else {
            None
        };
        if let Some(terminator) = skip_to {
            from = start + rest.find(terminator)? + terminator.len();
            continue;
        }

        let gt = start + tag_end(rest)?;
        let inner = &doc[start + 1..gt];
        let (closing, inner) = match inner.strip_prefix('/') {
            Some(inner) => (true, inner),
            None => (false, inner),
        };
        let (self_closing, inner) = match inner.strip_suffix('/') {
            Some(inner) => (true, inner),
            None => (false, inner),
        };
        let name_len = inner
            .find(|ch: char| ch.is_whitespace() || ch == '/')
            .unwrap_or(inner.len());

        return Some(Tag {
            start,
            name: &inner[..name_len],
            attrs: inner[name_len..].trim(),
            end: gt + 1,
            closing,
            self_closing,
        });
    }
}

/// Offset of the `>` closing the tag at the start of `rest`. A quote opens a quoted span
/// only right after `=`, so a stray quote left by a broken attribute is taken literally.
fn tag_end(rest: &str) -> Option<usize> {
    let mut quote = None;
    let mut after_equals = false;
    for (index, ch) in rest.char_indices() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => {}
            None => match ch {
                '>' => return Some(index),
                '"' | '\'' if after_equals => quote = Some(ch),
                _ => {}
            },
        }
        if quote.is_none() && !ch.is_whitespace() {
            after_equals = ch == '=';
        }
    }
    // unterminated quote
    rest.find('>')
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Finds the first element named `local` (ignoring any prefix) at or after `from`.
pub(crate) fn find_element<'a>(doc: &'a str, local: &str, from: usize) -> Option<Element<'a>> {
    let mut position = from;
    let open = loop {
        let tag = next_tag(doc, position)?;
        if !tag.closing && local_name(tag.name) == local {
            break tag;
        }
        position = tag.end;
    };

    if open.self_closing {
        return Some(Element {
            attrs: open.attrs,
            content: "",
            end: open.end,
        });
    }

    let mut depth = 0usize;
    position = open.end;
    while let Some(tag) = next_tag(doc, position) {
        if local_name(tag.name) == local && !tag.self_closing {
            if tag.closing {
                if depth == 0 {
                    return Some(Element {
                        attrs: open.attrs,
                        content: &doc[open.end..tag.start],
                        end: tag.end,
                    });
                }
                depth -= 1;
            } else {
                depth += 1;
            }
        }
        position = tag.end;
    }

    Some(Element {
        attrs: open.attrs,
        content: &doc[open.end..],
        end: doc.len(),
    })
}

/// Iterates over the elements named `local`, in document order. Elements nested inside a
/// match are not visited separately.
pub(crate) fn elements<'a>(
    doc: &'a str,
    local: &'a str,
) -> impl Iterator<Item = Element<'a>> + 'a {
    let mut position = 0;
    std::iter::from_fn(move || {
        let element = find_element(doc, local, position)?;
        position = element.end;
        Some(element)
    })
}

/// Returns the raw value of the attribute named `local` (ignoring any prefix). Namespace
/// declarations are never matched.
pub(crate) fn attribute<'a>(attrs: &'a str, local: &str) -> Option<&'a str> {
    let mut rest = attrs.trim_start();
    while !rest.is_empty() {
        let name_len = rest
            .find(|ch: char| ch == '=' || ch.is_whitespace())
            .unwrap_or(rest.len());
        let name = &rest[..name_len];
        rest = rest[name_len..].trim_start();

        let Some(after_equals) = rest.strip_prefix('=') else {
            // attribute without a value
            continue;
        };
        rest = after_equals.trim_start();

        let value = match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &rest[1..];
                let len = body.find(quote).unwrap_or(body.len());
                rest = body.get(len + 1..).unwrap_or("");
                &body[..len]
            }
            _ => {
                let len = rest.find(char::is_whitespace).unwrap_or(rest.len());
                let value = &rest[..len];
                rest = &rest[len..];
                value
            }
        };
        rest = rest.trim_start();

        if !name.starts_with("xmlns") && local_name(name) == local {
            return Some(value);
        }
    }
    None
}

/// Text content of an element, whitespace included: a CDATA section is taken literally,
/// everything else is unescaped.
pub(crate) fn text(content: &str) -> Cow<'_, str> {
    match content
        .trim()
        .strip_prefix("<![CDATA[")
        .and_then(|inner| inner.strip_suffix("]]>"))
    {
        Some(inner) => Cow::Borrowed(inner),
        None => unescape(content),
    }
}

/// Text content with surrounding whitespace removed, for diagnostics.
pub(crate) fn trimmed_text(content: &str) -> Cow<'_, str> {
    match text(content.trim()) {
        Cow::Borrowed(text) => Cow::Borrowed(text.trim()),
        Cow::Owned(text) => Cow::Owned(text.trim().to_string()),
    }
}
