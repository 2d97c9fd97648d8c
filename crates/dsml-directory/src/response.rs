//! Parsing of DSML batch responses.
//!
//! Responses are scanned, not parsed as XML: the parser looks for the elements it needs by
//! local name and ignores everything else, which keeps it working against servers that use
//! unusual namespace prefixes or send slightly broken documents.
//!
//! Every parse function first runs [`check_errors`]. A DSML `errorResponse` wins over a SOAP
//! fault, which wins over the LDAP result code.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dsml_core::{Error, Result};
use tracing::trace;

use crate::attributes::{AttributeValue, Attributes};
use crate::dn::Name;
use crate::escape::unescape;
use crate::scan::{attribute, elements, find_element, text, trimmed_text, Element};
use crate::search::SearchResult;

/// Raises the error reported by a response, if any.
///
/// # Errors
///
/// - [`Error::Dsml`] for an `errorResponse` element or a SOAP fault
/// - [`Error::MalformedResponse`] if the result code is missing or not numeric
/// - [`Error::Directory`] for a non-zero result code
pub fn check_errors(xml: &str) -> Result<()> {
    if let Some(error) = find_element(xml, "errorResponse", 0) {
        return Err(Error::Dsml {
            kind: attribute(error.attrs, "type")
                .map_or_else(|| "unknown".to_string(), |kind| unescape(kind).into_owned()),
            message: child_text(error.content, "message"),
            detail: child_text(error.content, "detail"),
        });
    }

    if let Some(fault) = find_element(xml, "Fault", 0) {
        return Err(Error::Dsml {
            kind: child_text(fault.content, "faultcode")
                .unwrap_or_else(|| "soapFault".to_string()),
            message: child_text(fault.content, "faultstring"),
            detail: child_text(fault.content, "detail"),
        });
    }

    let code = find_element(xml, "resultCode", 0)
        .and_then(|element| attribute(element.attrs, "code"))
        .ok_or_else(|| Error::MalformedResponse("can't find result code".to_string()))?;
    let code: u32 = code
        .trim()
        .parse()
        .map_err(|_| Error::MalformedResponse(format!("can't parse result code `{code}`")))?;
    if code == 0 {
        return Ok(());
    }

    let description = find_element(xml, "resultCode", 0)
        .and_then(|element| attribute(element.attrs, "descr"))
        .map(|descr| unescape(descr).into_owned());
    Err(Error::Directory {
        code,
        description,
        message: child_text(xml, "errorMessage"),
    })
}

/// Parses the response to an add request.
///
/// # Errors
///
/// See [`check_errors`]; also [`Error::MalformedResponse`] if there is no `addResponse`.
pub fn parse_add_response(xml: &str) -> Result<()> {
    expect_marker(xml, &["addResponse"])
}

/// Parses the response to a delete request.
///
/// # Errors
///
/// See [`check_errors`]; also [`Error::MalformedResponse`] if there is no `delResponse`.
pub fn parse_delete_response(xml: &str) -> Result<()> {
    expect_marker(xml, &["delResponse"])
}

/// Parses the response to a modify request.
///
/// # Errors
///
/// See [`check_errors`]; also [`Error::MalformedResponse`] if there is no
/// `modifyResponse`.
pub fn parse_modify_response(xml: &str) -> Result<()> {
    expect_marker(xml, &["modifyResponse"])
}

/// Parses the response to a rename request.
///
/// # Errors
///
/// See [`check_errors`]; also [`Error::MalformedResponse`] if there is no
/// `modDNResponse`.
pub fn parse_rename_response(xml: &str) -> Result<()> {
    expect_marker(xml, &["modDNResponse"])
}

/// Parses the entries of a search response, in document order.
///
/// A result is marked absolute when its name ends with `base`.
///
/// # Errors
///
/// See [`check_errors`]; also [`Error::MalformedResponse`] for a response without a
/// search marker or with unreadable entries, and [`Error::Unsupported`] for values of a
/// type other than string or `base64Binary`.
pub fn parse_search_response(xml: &str, base: &Name) -> Result<Vec<SearchResult>> {
    expect_marker(xml, &["searchResponse", "searchResultDone"])?;

    let results = elements(xml, "searchResultEntry")
        .map(|entry| parse_entry(&entry, base))
        .collect::<Result<Vec<_>>>()?;
    trace!("parsed {} search result entries", results.len());
    Ok(results)
}

fn expect_marker(xml: &str, markers: &[&str]) -> Result<()> {
    check_errors(xml)?;
    if markers
        .iter()
        .any(|marker| find_element(xml, marker, 0).is_some())
    {
        Ok(())
    } else {
        Err(Error::MalformedResponse(format!(
            "unexpected response shape: no {} element",
            markers.join(" or ")
        )))
    }
}

fn parse_entry(entry: &Element<'_>, base: &Name) -> Result<SearchResult> {
    let dn = attribute(entry.attrs, "dn").unwrap_or_default();
    let dn = unescape(strip_request_id(dn));
    let dn = dn.trim();
    let name = if dn.is_empty() {
        Name::root()
    } else {
        Name::parse(dn).map_err(|err| {
            Error::MalformedResponse(format!("invalid entry name `{dn}`: {err}"))
        })?
    };

    let mut attributes = Attributes::new();
    for attr in elements(entry.content, "attr") {
        let id = attribute(attr.attrs, "name").ok_or_else(|| {
            Error::MalformedResponse(format!("attribute without a name in entry `{dn}`"))
        })?;
        let target = attributes.get_or_insert(&unescape(id));
        for value in elements(attr.content, "value") {
            target.push(parse_value(&value)?);
        }
    }

    let absolute = name.ends_with(base);
    Ok(SearchResult {
        name,
        attributes,
        absolute,
    })
}

fn parse_value(value: &Element<'_>) -> Result<AttributeValue> {
    let kind = attribute(value.attrs, "type")
        .map(|kind| kind.rsplit(':').next().unwrap_or(kind));
    match kind {
        None | Some("string") => Ok(AttributeValue::Text(text(value.content).into_owned())),
        Some("base64Binary") => {
            let encoded: String = value
                .content
                .chars()
                .filter(|ch| !ch.is_whitespace())
                .collect();
            Ok(AttributeValue::Binary(STANDARD.decode(encoded)?))
        }
        Some(other) => Err(Error::Unsupported(format!(
            "attribute values of type `{other}` are not supported"
        ))),
    }
}

/// Some servers emit the entry's `requestID` inside the quoted `dn` value
/// (`dn="cn=Fred,o=Acme requestID="2"`). Cuts the value at that attribute.
fn strip_request_id(dn: &str) -> &str {
    let mut from = 0;
    while let Some(offset) = dn[from..].find("requestID=") {
        let position = from + offset;
        let preceded_by_boundary = dn[..position]
            .chars()
            .next_back()
            .is_some_and(|ch| ch.is_whitespace() || ch == '"');
        if preceded_by_boundary {
            return dn[..position].trim_end_matches(|ch: char| ch.is_whitespace() || ch == '"');
        }
        from = position + "requestID=".len();
    }
    dn
}

fn child_text(doc: &str, local: &str) -> Option<String> {
    find_element(doc, local, 0)
        .map(|element| trimmed_text(element.content).into_owned())
        .filter(|text| !text.is_empty())
}
