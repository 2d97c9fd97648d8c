//! Translation of RFC 2254 filter strings into DSML filter elements.
//!
//! The translator walks the filter one token at a time. Every `(` pushes the tag that the
//! matching `)` has to emit: a closing `and`/`or`/`not` tag for boolean groups, or an empty
//! marker for simple assertions, which are written out as one complete element. The stack
//! is the whole parse state, so nesting depth costs heap, not call stack.
//!
//! ```
//! use dsml_directory::filter;
//!
//! let xml = filter::translate_to_string("(&(objectClass=person)(cn=Fred*))").unwrap();
//! assert!(xml.starts_with("<dsml:and>"));
//! assert!(xml.contains("<dsml:initial>Fred</dsml:initial>"));
//! ```

use dsml_core::{Error, Result};

use crate::attributes::{AttributeValue, Attributes};
use crate::escape::escape;

const INDENT: &str = "  ";

/// Appends the DSML form of `filter` to `out`.
///
/// A filter without surrounding parentheses (`cn=Fred`) is accepted as a single assertion.
///
/// # Errors
///
/// Returns [`Error::MalformedFilter`] for empty or unbalanced filters and invalid
/// assertions, and [`Error::Unsupported`] for extensible match assertions.
pub fn translate(filter: &str, out: &mut String) -> Result<()> {
    translate_indented(filter, 0, out)
}

/// Like [`translate`], but returns the fragment as a new string.
///
/// # Errors
///
/// See [`translate`].
pub fn translate_to_string(filter: &str) -> Result<String> {
    let mut out = String::new();
    translate(filter, &mut out)?;
    Ok(out)
}

/// Like [`translate`], with every line indented by `depth` levels. On error `out` is left
/// as it was.
///
/// # Errors
///
/// See [`translate`].
pub fn translate_indented(filter: &str, depth: usize, out: &mut String) -> Result<()> {
    let start = out.len();
    let result = translate_filter(filter, depth, out);
    if result.is_err() {
        out.truncate(start);
    }
    result
}

fn translate_filter(filter: &str, depth: usize, out: &mut String) -> Result<()> {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        return Err(Error::MalformedFilter("filter is empty".to_string()));
    }

    let wrapped;
    let filter = if trimmed.starts_with('(') {
        trimmed
    } else {
        wrapped = format!("({trimmed})");
        &wrapped
    };

    let mut closers: Vec<&'static str> = Vec::new();
    let mut complete = false;
    let mut tokens = Tokens::new(filter);

    while let Some(token) = tokens.next() {
        match token {
            "(" => {
                if complete {
                    return Err(malformed(filter, "more than one top-level filter"));
                }
                let Some(item) = tokens.next() else {
                    return Err(malformed(filter, "unbalanced parentheses"));
                };
                let level = depth + closers.len();
                match item.trim() {
                    "&" => {
                        line(out, level, "<dsml:and>");
                        closers.push("</dsml:and>");
                    }
                    "|" => {
                        line(out, level, "<dsml:or>");
                        closers.push("</dsml:or>");
                    }
                    "!" => {
                        line(out, level, "<dsml:not>");
                        closers.push("</dsml:not>");
                    }
                    "(" | ")" => {
                        return Err(malformed(
                            filter,
                            "expected an operator or assertion after '('",
                        ));
                    }
                    _ => {
                        translate_assertion(item, level, out)?;
                        closers.push("");
                    }
                }
            }
            ")" => {
                let Some(closer) = closers.pop() else {
                    return Err(malformed(filter, "unbalanced parentheses"));
                };
                if !closer.is_empty() {
                    line(out, depth + closers.len(), closer);
                }
                complete = closers.is_empty();
            }
            text => {
                return Err(malformed(
                    filter,
                    &format!("unexpected text `{text}` outside parentheses"),
                ));
            }
        }
    }

    if !closers.is_empty() || !complete {
        return Err(malformed(filter, "unbalanced parentheses"));
    }
    Ok(())
}

/// Splits a filter into `(`, `)` and the text between them. Whitespace between
/// parentheses is dropped.
struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    fn new(filter: &'a str) -> Self {
        Self { rest: filter }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            if self.rest.is_empty() {
                return None;
            }
            let end = match self.rest.find(['(', ')']) {
                Some(0) => 1,
                Some(index) => index,
                None => self.rest.len(),
            };
            let (token, rest) = self.rest.split_at(end);
            self.rest = rest;
            if !token.trim().is_empty() {
                return Some(token);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    Equality,
    LessOrEqual,
    GreaterOrEqual,
    Approximate,
}

impl MatchKind {
    const fn element(self) -> &'static str {
        match self {
            Self::Equality => "equalityMatch",
            Self::LessOrEqual => "lessOrEqual",
            Self::GreaterOrEqual => "greaterOrEqual",
            Self::Approximate => "approxMatch",
        }
    }
}

fn translate_assertion(assertion: &str, level: usize, out: &mut String) -> Result<()> {
    let Some(equals) = assertion.find('=') else {
        return Err(malformed(assertion, "assertion has no '=' operator"));
    };
    if equals == 0 || equals == assertion.len() - 1 {
        return Err(malformed(
            assertion,
            "'=' cannot be the first or last character of an assertion",
        ));
    }

    let (name_end, kind) = match assertion.as_bytes()[equals - 1] {
        b'<' => (equals - 1, MatchKind::LessOrEqual),
        b'>' => (equals - 1, MatchKind::GreaterOrEqual),
        b'~' => (equals - 1, MatchKind::Approximate),
        _ => (equals, MatchKind::Equality),
    };
    let attribute = assertion[..name_end].trim();
    if attribute.is_empty() {
        return Err(malformed(assertion, "assertion has no attribute"));
    }
    if attribute.contains(':') {
        return Err(Error::Unsupported(format!(
            "extensible match filters are not supported: ({assertion})"
        )));
    }
    let name = escape(attribute);
    let value = &assertion[equals + 1..];

    if kind == MatchKind::Equality && value.contains('*') {
        if value.chars().all(|ch| ch == '*') {
            line(out, level, &format!("<dsml:present name=\"{name}\"/>"));
            return Ok(());
        }
        return translate_substrings(assertion, &name, value, level, out);
    }

    let value = decode_value(assertion, value)?;
    let element = kind.element();
    line(out, level, &format!("<dsml:{element} name=\"{name}\">"));
    line(
        out,
        level + 1,
        &format!("<dsml:value>{}</dsml:value>", escape(&value)),
    );
    line(out, level, &format!("</dsml:{element}>"));
    Ok(())
}

fn translate_substrings(
    assertion: &str,
    name: &str,
    value: &str,
    level: usize,
    out: &mut String,
) -> Result<()> {
    let pieces: Vec<&str> = value.split('*').collect();
    let last = pieces.len() - 1;

    line(out, level, &format!("<dsml:substrings name=\"{name}\">"));
    for (index, piece) in pieces.iter().enumerate() {
        if piece.is_empty() {
            continue;
        }
        let element = match index {
            0 => "initial",
            i if i == last => "final",
            _ => "any",
        };
        let decoded = decode_value(assertion, piece)?;
        line(
            out,
            level + 1,
            &format!("<dsml:{element}>{}</dsml:{element}>", escape(&decoded)),
        );
    }
    line(out, level, "</dsml:substrings>");
    Ok(())
}

/// Decodes RFC 2254 `\XX` escapes. A backslash not followed by two hex digits is kept.
fn decode_value(assertion: &str, value: &str) -> Result<String> {
    if !value.contains('\\') {
        return Ok(value.to_string());
    }

    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'\\' {
            let byte = value
                .get(index + 1..index + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = byte {
                decoded.push(byte);
                index += 3;
                continue;
            }
        }
        decoded.push(bytes[index]);
        index += 1;
    }

    String::from_utf8(decoded)
        .map_err(|_| malformed(assertion, "escaped value is not valid UTF-8"))
}

pub(crate) fn line(out: &mut String, level: usize, text: &str) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
    out.push_str(text);
    out.push('\n');
}

fn malformed(filter: &str, reason: &str) -> Error {
    Error::MalformedFilter(format!("{reason}: {filter}"))
}

/// Escapes a value for use inside a filter assertion (RFC 2254 section 4).
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// An argument substituted into a filter expression by [`format_filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterArg {
    /// Text, escaped before substitution.
    Text(String),
    /// Raw bytes. Not supported in filters.
    Binary(Vec<u8>),
}

impl From<&str> for FilterArg {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterArg {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for FilterArg {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

/// Replaces each `{n}` in `expression` with the escaped `n`-th argument.
///
/// # Errors
///
/// Returns [`Error::Unsupported`] for binary arguments, [`Error::InvalidRequest`] for a
/// placeholder without a matching argument, and [`Error::MalformedFilter`] for an
/// unterminated or non-numeric placeholder.
pub fn format_filter(expression: &str, args: &[FilterArg]) -> Result<String> {
    let mut out = String::with_capacity(expression.len());
    let mut rest = expression;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let Some(close) = rest[open..].find('}').map(|close| open + close) else {
            return Err(malformed(expression, "unterminated filter argument"));
        };
        let position: usize = rest[open + 1..close]
            .trim()
            .parse()
            .map_err(|_| malformed(expression, "filter argument index is not a number"))?;
        match args.get(position) {
            Some(FilterArg::Text(text)) => out.push_str(&escape_filter_value(text)),
            Some(FilterArg::Binary(_)) => {
                return Err(Error::Unsupported(
                    "binary filter arguments are not supported".to_string(),
                ));
            }
            None => {
                return Err(Error::InvalidRequest(format!(
                    "filter argument {{{position}}} has no value ({} given)",
                    args.len()
                )));
            }
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Builds a filter matching entries that carry every attribute value in `matching`.
///
/// An attribute without values only has to be present. An empty set matches any entry.
///
/// # Errors
///
/// Returns [`Error::Unsupported`] if a value is binary.
pub fn matching_filter(matching: &Attributes) -> Result<String> {
    let mut assertions = Vec::new();
    for attribute in matching {
        if attribute.is_empty() {
            assertions.push(format!("({}=*)", attribute.id()));
            continue;
        }
        for value in attribute.values() {
            match value {
                AttributeValue::Text(text) => {
                    let value = escape_filter_value(text);
                    assertions.push(format!("({}={value})", attribute.id()));
                }
                AttributeValue::Binary(_) => {
                    return Err(Error::Unsupported(format!(
                        "binary values cannot be matched (attribute {})",
                        attribute.id()
                    )));
                }
            }
        }
    }

    Ok(match assertions.len() {
        0 => "(objectClass=*)".to_string(),
        1 => assertions.remove(0),
        _ => {
            let mut filter = String::from("(&");
            for assertion in &assertions {
                filter.push_str(assertion);
            }
            filter.push(')');
            filter
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attribute;

    fn compact(xml: &str) -> String {
        xml.lines().map(str::trim).collect()
    }

    fn translated(filter: &str) -> String {
        compact(&translate_to_string(filter).unwrap())
    }

    #[test]
    fn equality_match() {
        assert_eq!(
            translated("(cn=fred)"),
            "<dsml:equalityMatch name=\"cn\"><dsml:value>fred</dsml:value></dsml:equalityMatch>"
        );
    }

    #[test]
    fn output_is_indented_by_depth() {
        let xml = translate_to_string("(&(cn=fred))").unwrap();
        assert_eq!(
            xml,
            "<dsml:and>\
             \n  <dsml:equalityMatch name=\"cn\">\
             \n    <dsml:value>fred</dsml:value>\
             \n  </dsml:equalityMatch>\
             \n</dsml:and>\n"
        );
    }

    #[test]
    fn present_match() {
        assert_eq!(translated("(objectClass=*)"), "<dsml:present name=\"objectClass\"/>");
    }

    #[test]
    fn substrings_with_only_any() {
        assert_eq!(
            translated("(cn=*a*b*c*)"),
            "<dsml:substrings name=\"cn\"><dsml:any>a</dsml:any><dsml:any>b</dsml:any>\
             <dsml:any>c</dsml:any></dsml:substrings>"
        );
    }

    #[test]
    fn substrings_with_initial_and_final() {
        assert_eq!(
            translated("(cn=Fr*d*y)"),
            "<dsml:substrings name=\"cn\"><dsml:initial>Fr</dsml:initial><dsml:any>d</dsml:any>\
             <dsml:final>y</dsml:final></dsml:substrings>"
        );
        assert_eq!(
            translated("(cn=Fred*)"),
            "<dsml:substrings name=\"cn\"><dsml:initial>Fred</dsml:initial></dsml:substrings>"
        );
        assert_eq!(
            translated("(cn=**red)"),
            "<dsml:substrings name=\"cn\"><dsml:final>red</dsml:final></dsml:substrings>"
        );
    }

    #[test]
    fn nested_boolean_filter() {
        assert_eq!(
            translated("(&(!(sn<=Le*))(cn~=Crai))"),
            "<dsml:and><dsml:not><dsml:lessOrEqual name=\"sn\"><dsml:value>Le*</dsml:value>\
             </dsml:lessOrEqual></dsml:not><dsml:approxMatch name=\"cn\">\
             <dsml:value>Crai</dsml:value></dsml:approxMatch></dsml:and>"
        );
    }

    #[test]
    fn or_with_greater_or_equal() {
        assert_eq!(
            translated("(|(uidNumber>=1000) (cn=x))"),
            "<dsml:or><dsml:greaterOrEqual name=\"uidNumber\"><dsml:value>1000</dsml:value>\
             </dsml:greaterOrEqual><dsml:equalityMatch name=\"cn\"><dsml:value>x</dsml:value>\
             </dsml:equalityMatch></dsml:or>"
        );
    }

    #[test]
    fn values_are_xml_escaped() {
        assert_eq!(
            translated("(description=Tom & \"Jerry\" <3)"),
            "<dsml:equalityMatch name=\"description\"><dsml:value>Tom &amp; &quot;Jerry&quot; \
             &lt;3</dsml:value></dsml:equalityMatch>"
        );
    }

    #[test]
    fn rfc2254_escapes_are_decoded() {
        assert_eq!(
            translated("(cn=a\\2ab\\28c\\29)"),
            "<dsml:equalityMatch name=\"cn\"><dsml:value>a*b(c)</dsml:value></dsml:equalityMatch>"
        );
        assert_eq!(
            translated("(cn=\\2a*x)"),
            "<dsml:substrings name=\"cn\"><dsml:initial>*</dsml:initial>\
             <dsml:final>x</dsml:final></dsml:substrings>"
        );
    }

    #[test]
    fn escapes_are_decoded_for_every_match_kind() {
        assert_eq!(
            translated("(sn>=a\\2ab)"),
            "<dsml:greaterOrEqual name=\"sn\"><dsml:value>a*b</dsml:value></dsml:greaterOrEqual>"
        );
        assert_eq!(
            translated("(sn<=\\28x\\29)"),
            "<dsml:lessOrEqual name=\"sn\"><dsml:value>(x)</dsml:value></dsml:lessOrEqual>"
        );
        assert_eq!(
            translated("(cn~=Cra\\5ci)"),
            "<dsml:approxMatch name=\"cn\"><dsml:value>Cra\\i</dsml:value></dsml:approxMatch>"
        );
    }

    #[test]
    fn bare_filter_is_wrapped() {
        assert_eq!(translated("cn=fred"), translated("(cn=fred)"));
    }

    #[test]
    fn unbalanced_filters_are_rejected() {
        for filter in ["(cn=fred", "(cn=fred))", "(&(cn=fred)", "((cn=fred))", "(", ")"] {
            let err = translate_to_string(filter).unwrap_err();
            assert!(matches!(err, Error::MalformedFilter(_)), "{filter}: {err:?}");
        }
    }

    #[test]
    fn failed_translation_leaves_output_untouched() {
        let mut out = String::new();
        assert!(translate("(cn=fred", &mut out).is_err());
        assert!(out.is_empty());

        assert!(translate("(&(cn=a)(sn=b)", &mut out).is_err());
        assert!(out.is_empty());

        out.push_str("<dsml:filter>\n");
        assert!(translate_indented("(|(cn=a)(sn:dn:=b))", 1, &mut out).is_err());
        assert_eq!(out, "<dsml:filter>\n");
    }

    #[test]
    fn invalid_assertions_are_rejected() {
        let filters = [
            "", "   ", "(cnfred)", "(=fred)", "(cn=)", "(<=x)", "(cn=a)(sn=b)", "(cn=a)x",
        ];
        for filter in filters {
            let err = translate_to_string(filter).unwrap_err();
            assert!(matches!(err, Error::MalformedFilter(_)), "{filter}: {err:?}");
        }
    }

    #[test]
    fn extensible_match_is_unsupported() {
        let err = translate_to_string("(cn:dn:=fred)").unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn deep_nesting_uses_no_recursion() {
        let depth = 1_000;
        let filter = format!("{}(cn=x){}", "(!".repeat(depth), ")".repeat(depth));
        let xml = translate_to_string(&filter).unwrap();
        assert_eq!(xml.matches("<dsml:not>").count(), depth);
        assert_eq!(xml.matches("</dsml:not>").count(), depth);
    }

    #[test]
    fn format_filter_escapes_arguments() {
        let args = [FilterArg::from("a*b"), FilterArg::from("(x)")];
        let filter = format_filter("(&(uid={0})(o={1}))", &args).unwrap();
        assert_eq!(filter, "(&(uid=a\\2ab)(o=\\28x\\29))");
    }

    #[test]
    fn formatted_ordering_filter_sends_the_argument_verbatim() {
        let filter = format_filter("(uidNumber<={0})", &[FilterArg::from("1*")]).unwrap();
        assert_eq!(filter, "(uidNumber<=1\\2a)");
        assert_eq!(
            translated(&filter),
            "<dsml:lessOrEqual name=\"uidNumber\"><dsml:value>1*</dsml:value></dsml:lessOrEqual>"
        );
    }

    #[test]
    fn format_filter_rejects_bad_arguments() {
        let err = format_filter("(uid={0})", &[FilterArg::Binary(vec![1, 2])]).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));

        let err = format_filter("(uid={1})", &[FilterArg::from("a")]).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let err = format_filter("(uid={x})", &[]).unwrap_err();
        assert!(matches!(err, Error::MalformedFilter(_)));
    }

    #[test]
    fn matching_filter_from_attributes() {
        let mut attributes = Attributes::new();
        attributes.add_value("objectClass", "person");
        attributes.put(Attribute::new("mail"));
        assert_eq!(
            matching_filter(&attributes).unwrap(),
            "(&(objectClass=person)(mail=*))"
        );

        assert_eq!(matching_filter(&Attributes::new()).unwrap(), "(objectClass=*)");

        let mut single = Attributes::new();
        single.add_value("cn", "a*");
        assert_eq!(matching_filter(&single).unwrap(), "(cn=a\\2a)");

        let mut binary = Attributes::new();
        binary.add_value("jpegPhoto", vec![0xff_u8, 0xd8]);
        assert!(matches!(
            matching_filter(&binary).unwrap_err(),
            Error::Unsupported(_)
        ));
    }
}
