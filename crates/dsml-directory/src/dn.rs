//! Directory names: parsing `cn=Fred,o=Acme` into ordered components and back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use dsml_core::Error as CoreError;

/// Errors that can occur when parsing a directory name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// The name was empty.
    #[error("directory name cannot be empty")]
    Empty,
    /// A component of the name was invalid.
    #[error("invalid name component: {0}")]
    InvalidComponent(String),
    /// A component was missing the attribute type to the left of the `=`.
    #[error("name component missing attribute type: {0}")]
    MissingAttribute(String),
    /// A component was missing the value to the right of the `=`.
    #[error("name component missing value for attribute {0}")]
    MissingValue(String),
    /// The name ended with an escape character.
    #[error("name contains an unterminated escape sequence")]
    UnterminatedEscape,
    /// A `\XX` escape decoded to bytes that are not UTF-8.
    #[error("name contains escaped bytes that are not valid UTF-8: {0}")]
    InvalidEscape(String),
}

impl From<NameError> for CoreError {
    fn from(err: NameError) -> Self {
        CoreError::InvalidRequest(err.to_string())
    }
}

/// One `type=value` pair inside a relative name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ava {
    attribute: String,
    value: String,
}

impl Ava {
    /// Create an attribute/value pair. The value is stored unescaped.
    #[must_use]
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Attribute type (e.g. `cn`).
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Unescaped attribute value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    fn eq_ignore_case(&self, other: &Self) -> bool {
        self.attribute.eq_ignore_ascii_case(&other.attribute)
            && self.value.eq_ignore_ascii_case(&other.value)
    }
}

/// A relative name: one naming component, possibly multi-valued (`cn=Fred+uid=12`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rdn {
    avas: Vec<Ava>,
}

impl Rdn {
    /// Single-valued relative name.
    #[must_use]
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            avas: vec![Ava::new(attribute, value)],
        }
    }

    /// Parses a single relative name such as `cn=Fred` or `cn=Fred+uid=12`.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] for empty input, a name with more than one component, or
    /// invalid syntax.
    pub fn parse(input: &str) -> Result<Self, NameError> {
        let name = Name::parse(input)?;
        match name.rdns.len() {
            1 => Ok(name.rdns.into_iter().next().ok_or(NameError::Empty)?),
            _ => Err(NameError::InvalidComponent(input.to_string())),
        }
    }

    /// The attribute/value pairs of this component, in order.
    #[must_use]
    pub fn avas(&self) -> &[Ava] {
        &self.avas
    }

    /// Value of the first pair (the naming value of a single-valued RDN).
    #[must_use]
    pub fn value(&self) -> &str {
        self.avas.first().map_or("", Ava::value)
    }

    fn eq_ignore_case(&self, other: &Self) -> bool {
        self.avas.len() == other.avas.len()
            && self
                .avas
                .iter()
                .zip(&other.avas)
                .all(|(a, b)| a.eq_ignore_case(b))
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, ava) in self.avas.iter().enumerate() {
            if index > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}={}", ava.attribute, escape_value(&ava.value))?;
        }
        Ok(())
    }
}

/// A directory name: an ordered sequence of relative names, leaf first.
///
/// The canonical string form is kept alongside the parsed components so it can be embedded
/// in requests without re-rendering. The empty (root) name is only meaningful as a search
/// base.
///
/// Serialized as its canonical string; deserializing goes through [`Name::parse`], with the
/// empty string standing for the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name {
    raw: String,
    rdns: Vec<Rdn>,
}

impl Name {
    /// Parses a name from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the name is empty or contains invalid syntax.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, NameError> {
        let raw = trim_unescaped(input.as_ref());
        if raw.is_empty() {
            return Err(NameError::Empty);
        }

        let mut rdns = Vec::new();
        for component in split_unescaped(raw, &[',', ';'])? {
            let mut avas = Vec::new();
            for part in split_unescaped(component, &['+'])? {
                avas.push(parse_ava(part)?);
            }
            rdns.push(Rdn { avas });
        }

        Ok(Self::from_rdns(rdns))
    }

    /// The empty name addressing the root of the directory.
    #[must_use]
    pub fn root() -> Self {
        Self {
            raw: String::new(),
            rdns: Vec::new(),
        }
    }

    fn from_rdns(rdns: Vec<Rdn>) -> Self {
        let raw = rdns
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Self { raw, rdns }
    }

    /// Returns true for the empty root name.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.rdns.is_empty()
    }

    /// Canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Relative names, leaf first.
    #[must_use]
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// Number of relative names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    /// Returns true for the root name (no components).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// The leaf relative name.
    #[must_use]
    pub fn rdn(&self) -> Option<&Rdn> {
        self.rdns.first()
    }

    /// The name of the parent entry; `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Name> {
        if self.is_root() {
            return None;
        }
        Some(Self::from_rdns(self.rdns[1..].to_vec()))
    }

    /// Looks up the value of the first pair whose attribute matches (case-insensitive).
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.rdns
            .iter()
            .flat_map(|rdn| rdn.avas.iter())
            .find(|ava| ava.attribute.eq_ignore_ascii_case(attribute))
            .map(Ava::value)
    }

    /// Returns true if `suffix` names this entry or one of its ancestors.
    #[must_use]
    pub fn ends_with(&self, suffix: &Name) -> bool {
        suffix.len() <= self.len()
            && self.rdns[self.len() - suffix.len()..]
                .iter()
                .zip(&suffix.rdns)
                .all(|(a, b)| a.eq_ignore_case(b))
    }

    /// Compares two names component-wise, ignoring ASCII case.
    #[must_use]
    pub fn eq_ignore_case(&self, other: &Name) -> bool {
        self.len() == other.len() && self.ends_with(other)
    }

    /// The part of this name below `base`, or `None` if `base` is not a suffix.
    #[must_use]
    pub fn relative_to(&self, base: &Name) -> Option<Name> {
        self.ends_with(base)
            .then(|| Self::from_rdns(self.rdns[..self.len() - base.len()].to_vec()))
    }

    /// Creates a child name by prefixing the provided relative name.
    #[must_use]
    pub fn child(&self, rdn: Rdn) -> Self {
        let mut rdns = Vec::with_capacity(self.len() + 1);
        rdns.push(rdn);
        rdns.extend(self.rdns.iter().cloned());
        Self::from_rdns(rdns)
    }

    /// Appends `suffix` below this name (`uid=12` joined with `o=Acme` is `uid=12,o=Acme`).
    #[must_use]
    pub fn join(mut self, suffix: &Name) -> Self {
        self.rdns.extend(suffix.rdns.iter().cloned());
        Self::from_rdns(self.rdns)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Name {
    type Error = NameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Name {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Ok(Self::root());
        }
        Self::parse(value)
    }
}

impl From<Name> for String {
    fn from(value: Name) -> Self {
        value.raw
    }
}

/// Splits on any of `delimiters` that is not preceded by a backslash. Escapes are kept in
/// the returned parts so values can be unescaped once, later.
fn split_unescaped<'a>(input: &'a str, delimiters: &[char]) -> Result<Vec<&'a str>, NameError> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escape = false;

    for (index, ch) in input.char_indices() {
        if escape {
            escape = false;
        } else if ch == '\\' {
            escape = true;
        } else if delimiters.contains(&ch) {
            parts.push(trim_unescaped(&input[start..index]));
            start = index + ch.len_utf8();
        }
    }

    if escape {
        return Err(NameError::UnterminatedEscape);
    }

    parts.push(trim_unescaped(&input[start..]));
    if parts.iter().any(|part| part.is_empty()) {
        return Err(NameError::InvalidComponent(input.to_string()));
    }
    Ok(parts)
}

/// Trims surrounding whitespace, keeping a trailing space that is escaped (`cn=Fred\ `).
fn trim_unescaped(part: &str) -> &str {
    let start = part.len() - part.trim_start().len();
    let trimmed = part.trim();
    let end = start + trimmed.len();
    let trailing_backslashes = trimmed.bytes().rev().take_while(|b| *b == b'\\').count();
    if trailing_backslashes % 2 == 1 {
        if let Some(ch) = part[end..].chars().next() {
            return &part[start..end + ch.len_utf8()];
        }
    }
    trimmed
}

fn parse_ava(component: &str) -> Result<Ava, NameError> {
    let (attribute, value) = component
        .split_once('=')
        .ok_or_else(|| NameError::InvalidComponent(component.to_string()))?;
    let attribute = attribute.trim();
    let value = value.trim_start();

    if attribute.is_empty() {
        return Err(NameError::MissingAttribute(component.to_string()));
    }
    if value.is_empty() {
        return Err(NameError::MissingValue(attribute.to_string()));
    }

    Ok(Ava::new(attribute, unescape_value(value)?))
}

/// Resolves `\c` and `\XX` escapes (RFC 4514).
fn unescape_value(value: &str) -> Result<String, NameError> {
    if !value.contains('\\') {
        return Ok(value.to_string());
    }

    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] != b'\\' {
            decoded.push(bytes[index]);
            index += 1;
            continue;
        }

        let hex = bytes
            .get(index + 1..index + 3)
            .and_then(|pair| std::str::from_utf8(pair).ok())
            .and_then(|pair| u8::from_str_radix(pair, 16).ok());
        match (hex, bytes.get(index + 1)) {
            (Some(byte), _) => {
                decoded.push(byte);
                index += 3;
            }
            (None, Some(&next)) => {
                decoded.push(next);
                index += 2;
            }
            (None, None) => return Err(NameError::UnterminatedEscape),
        }
    }

    String::from_utf8(decoded).map_err(|_| NameError::InvalidEscape(value.to_string()))
}

fn escape_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());

    for (index, ch) in value.chars().enumerate() {
        let needs_escape = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (index == 0 && (ch == ' ' || ch == '#'))
            || (index == last && ch == ' ');

        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(ch);
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_the_canonical_string() {
        let name = Name::parse("CN = Fred\\, Jr ,o=Acme").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"CN=Fred\\\\, Jr,o=Acme\"");
        assert_eq!(serde_json::from_str::<Name>(&json).unwrap(), name);

        assert_eq!(serde_json::from_str::<Name>("\"\"").unwrap(), Name::root());
        assert!(serde_json::from_str::<Name>("\"cn=\"").is_err());
        assert!(serde_json::from_str::<Name>(r#"{"raw":"cn=a","rdns":[]}"#).is_err());
    }

    #[test]
    fn parse_simple_name() {
        let name = Name::parse("cn=Fred,ou=People,o=Acme").unwrap();
        assert_eq!(name.len(), 3);
        assert_eq!(name.get("cn"), Some("Fred"));
        assert_eq!(name.get("OU"), Some("People"));
        assert_eq!(name.to_string(), "cn=Fred,ou=People,o=Acme");
    }

    #[test]
    fn parse_normalizes_spacing() {
        let name = Name::parse(" cn = Fred , o=Acme ").unwrap();
        assert_eq!(name.as_str(), "cn=Fred,o=Acme");
    }

    #[test]
    fn parse_name_with_escapes() {
        let name = Name::parse("cn=Smith\\, John,o=Acme").unwrap();
        assert_eq!(name.get("cn"), Some("Smith, John"));
        assert_eq!(name.as_str(), "cn=Smith\\, John,o=Acme");

        let name = Name::parse("cn=Smith\\2C John,o=Acme").unwrap();
        assert_eq!(name.get("cn"), Some("Smith, John"));

        let name = Name::parse("cn=back\\\\slash,o=Acme").unwrap();
        assert_eq!(name.get("cn"), Some("back\\slash"));
        assert_eq!(name.as_str(), "cn=back\\\\slash,o=Acme");
    }

    #[test]
    fn parse_multi_valued_rdn() {
        let name = Name::parse("cn=Fred+uid=12,o=Acme").unwrap();
        assert_eq!(name.len(), 2);
        assert_eq!(name.rdn().unwrap().avas().len(), 2);
        assert_eq!(name.get("uid"), Some("12"));
        assert_eq!(name.as_str(), "cn=Fred+uid=12,o=Acme");
    }

    #[test]
    fn parse_errors() {
        assert_eq!(Name::parse("  ").unwrap_err(), NameError::Empty);
        assert!(matches!(
            Name::parse("cn=Fred,").unwrap_err(),
            NameError::InvalidComponent(_)
        ));
        assert!(matches!(
            Name::parse("=Fred").unwrap_err(),
            NameError::MissingAttribute(_)
        ));
        assert!(matches!(
            Name::parse("cn=").unwrap_err(),
            NameError::MissingValue(_)
        ));
        assert_eq!(
            Name::parse("cn=Fred\\").unwrap_err(),
            NameError::UnterminatedEscape
        );
    }

    #[test]
    fn parent_and_child() {
        let name = Name::parse("cn=Fred,ou=People,o=Acme").unwrap();
        let parent = name.parent().unwrap();
        assert_eq!(parent.as_str(), "ou=People,o=Acme");
        assert_eq!(parent.child(Rdn::new("cn", "Fred")), name);
        assert!(Name::parse("o=Acme").unwrap().parent().unwrap().is_root());
        assert!(Name::root().parent().is_none());
    }

    #[test]
    fn suffix_checks_ignore_case() {
        let name = Name::parse("cn=Fred,ou=People,o=Acme").unwrap();
        let base = Name::parse("OU=people,O=ACME").unwrap();
        assert!(name.ends_with(&base));
        assert!(name.ends_with(&Name::root()));
        assert_eq!(name.relative_to(&base).unwrap().as_str(), "cn=Fred");
        assert!(name
            .relative_to(&Name::parse("o=Other").unwrap())
            .is_none());
        assert!(base.eq_ignore_case(&Name::parse("ou=People,o=Acme").unwrap()));
    }

    #[test]
    fn join_appends_suffix() {
        let base = Name::parse("ou=People,o=Acme").unwrap();
        let full = Name::parse("uid=12").unwrap().join(&base);
        assert_eq!(full.as_str(), "uid=12,ou=People,o=Acme");
    }

    #[test]
    fn rdn_parse() {
        let rdn = Rdn::parse("cn=Frederick").unwrap();
        assert_eq!(rdn.value(), "Frederick");
        assert_eq!(rdn.to_string(), "cn=Frederick");
        assert!(Rdn::parse("cn=Fred,o=Acme").is_err());
    }

    #[test]
    fn values_that_need_escaping_round_trip() {
        let name = Name::root().child(Rdn::new("cn", " #Fred <the> Builder "));
        let reparsed = Name::parse(name.as_str()).unwrap();
        assert_eq!(reparsed.get("cn"), Some(" #Fred <the> Builder "));
    }
}
