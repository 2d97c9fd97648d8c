//! SOAP/DSML request documents, one builder per operation.
//!
//! Every document is a single-operation `batchRequest` inside a SOAP 1.1 body. Requests
//! carry no request ids, so the same arguments always produce the same bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dsml_core::Result;

use crate::attributes::{Attribute, AttributeValue, Attributes, ModificationItem};
use crate::dn::{Name, Rdn};
use crate::escape::escape;
use crate::filter::{self, line};
use crate::search::{DerefAliases, SearchControls};

/// SOAP 1.1 envelope namespace.
pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// DSMLv2 core namespace.
pub const DSML_NS: &str = "urn:oasis:names:tc:DSML:2:0:core";

const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Indentation level of the operation element inside the envelope.
const OPERATION_LEVEL: usize = 3;

/// Attribute list meaning "no attributes" (RFC 4511 section 4.5.1.8).
const NO_ATTRIBUTES: &str = "1.1";

/// Builds a `searchRequest`.
///
/// `controls.deref_aliases` falls back to [`DerefAliases::Searching`] when unset.
///
/// # Errors
///
/// Returns the filter translation error if `filter` is malformed or unsupported.
pub fn search_request(base: &Name, filter: &str, controls: &SearchControls) -> Result<String> {
    let mut out = envelope_start();
    let level = OPERATION_LEVEL;

    line(
        &mut out,
        level,
        &format!(
            "<dsml:searchRequest dn=\"{}\" scope=\"{}\" derefAliases=\"{}\" \
             sizeLimit=\"{}\" timeLimit=\"{}\" typesOnly=\"{}\">",
            escape(base.as_str()),
            controls.scope.dsml_name(),
            controls.deref_aliases_or(DerefAliases::Searching).dsml_name(),
            controls.size_limit,
            controls.time_limit,
            controls.types_only,
        ),
    );
    line(&mut out, level + 1, "<dsml:filter>");
    filter::translate_indented(filter, level + 2, &mut out)?;
    line(&mut out, level + 1, "</dsml:filter>");

    if let Some(attributes) = &controls.return_attributes {
        line(&mut out, level + 1, "<dsml:attributes>");
        if attributes.is_empty() {
            line(
                &mut out,
                level + 2,
                &format!("<dsml:attribute name=\"{NO_ATTRIBUTES}\"/>"),
            );
        }
        for attribute in attributes {
            line(
                &mut out,
                level + 2,
                &format!("<dsml:attribute name=\"{}\"/>", escape(attribute)),
            );
        }
        line(&mut out, level + 1, "</dsml:attributes>");
    }

    line(&mut out, level, "</dsml:searchRequest>");
    Ok(envelope_end(out))
}

/// Builds an `addRequest` carrying every attribute of the new entry.
#[must_use]
pub fn add_request(name: &Name, attributes: &Attributes) -> String {
    let mut out = envelope_start();
    let level = OPERATION_LEVEL;

    line(
        &mut out,
        level,
        &format!("<dsml:addRequest dn=\"{}\">", escape(name.as_str())),
    );
    for attribute in attributes {
        write_attribute(&mut out, level + 1, "attr", attribute, "");
    }
    line(&mut out, level, "</dsml:addRequest>");
    envelope_end(out)
}

/// Builds a `delRequest`.
#[must_use]
pub fn delete_request(name: &Name) -> String {
    let mut out = envelope_start();
    line(
        &mut out,
        OPERATION_LEVEL,
        &format!("<dsml:delRequest dn=\"{}\"/>", escape(name.as_str())),
    );
    envelope_end(out)
}

/// Builds a `modifyRequest` with one `modification` per item, in order.
#[must_use]
pub fn modify_request(name: &Name, items: &[ModificationItem]) -> String {
    let mut out = envelope_start();
    let level = OPERATION_LEVEL;

    line(
        &mut out,
        level,
        &format!("<dsml:modifyRequest dn=\"{}\">", escape(name.as_str())),
    );
    for item in items {
        let operation = format!(" operation=\"{}\"", item.operation.dsml_name());
        write_attribute(&mut out, level + 1, "modification", &item.attribute, &operation);
    }
    line(&mut out, level, "</dsml:modifyRequest>");
    envelope_end(out)
}

/// Builds a `modDNRequest`. `new_superior` moves the entry below another parent.
#[must_use]
pub fn rename_request(
    name: &Name,
    new_rdn: &Rdn,
    delete_old_rdn: bool,
    new_superior: Option<&Name>,
) -> String {
    let mut out = envelope_start();
    let superior = new_superior
        .map(|parent| format!(" newSuperior=\"{}\"", escape(parent.as_str())))
        .unwrap_or_default();

    line(
        &mut out,
        OPERATION_LEVEL,
        &format!(
            "<dsml:modDNRequest dn=\"{}\" newrdn=\"{}\" \
             deleteoldrdn=\"{delete_old_rdn}\"{superior}/>",
            escape(name.as_str()),
            escape(&new_rdn.to_string()),
        ),
    );
    envelope_end(out)
}

fn write_attribute(
    out: &mut String,
    level: usize,
    element: &str,
    attribute: &Attribute,
    extra: &str,
) {
    let open = format!("<dsml:{element} name=\"{}\"{extra}", escape(attribute.id()));
    if attribute.is_empty() {
        line(out, level, &format!("{open}/>"));
        return;
    }

    line(out, level, &format!("{open}>"));
    for value in attribute.values() {
        match value {
            AttributeValue::Text(text) => {
                line(out, level + 1, &format!("<dsml:value>{}</dsml:value>", escape(text)));
            }
            AttributeValue::Binary(bytes) => line(
                out,
                level + 1,
                &format!(
                    "<dsml:value xsi:type=\"xsd:base64Binary\">{}</dsml:value>",
                    STANDARD.encode(bytes)
                ),
            ),
        }
    }
    line(out, level, &format!("</dsml:{element}>"));
}

fn envelope_start() -> String {
    let mut out = String::with_capacity(1024);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    line(
        &mut out,
        0,
        &format!("<soap-env:Envelope xmlns:soap-env=\"{SOAP_ENVELOPE_NS}\">"),
    );
    line(&mut out, 1, "<soap-env:Body>");
    line(
        &mut out,
        2,
        &format!(
            "<dsml:batchRequest xmlns:dsml=\"{DSML_NS}\" xmlns:xsd=\"{XSD_NS}\" \
             xmlns:xsi=\"{XSI_NS}\">"
        ),
    );
    out
}

fn envelope_end(mut out: String) -> String {
    line(&mut out, 2, "</dsml:batchRequest>");
    line(&mut out, 1, "</soap-env:Body>");
    line(&mut out, 0, "</soap-env:Envelope>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchScope;
    use dsml_core::Error;

    fn name(text: &str) -> Name {
        Name::parse(text).unwrap()
    }

    fn compact(xml: &str) -> String {
        xml.lines().map(str::trim).collect()
    }

    fn body(xml: &str) -> String {
        let compact = compact(xml);
        let start = compact.find("<dsml:batchRequest").unwrap();
        let start = start + compact[start..].find('>').unwrap() + 1;
        let end = compact.find("</dsml:batchRequest>").unwrap();
        compact[start..end].to_string()
    }

    #[test]
    fn envelope_wraps_every_operation() {
        let xml = delete_request(&name("cn=Fred,o=Acme"));
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<soap-env:Envelope"));
        assert!(xml.contains("<soap-env:Body>"));
        assert!(xml.contains("xmlns:dsml=\"urn:oasis:names:tc:DSML:2:0:core\""));
        assert!(xml.ends_with("</soap-env:Envelope>\n"));
    }

    #[test]
    fn delete_request_is_deterministic() {
        let target = name("cn=Fred,o=Acme");
        assert_eq!(delete_request(&target), delete_request(&target));
        assert_eq!(
            body(&delete_request(&target)),
            "<dsml:delRequest dn=\"cn=Fred,o=Acme\"/>"
        );
    }

    #[test]
    fn names_are_escaped() {
        let xml = delete_request(&name("cn=Tom & Jerry,o=\"Acme\""));
        assert_eq!(
            body(&xml),
            "<dsml:delRequest dn=\"cn=Tom &amp; Jerry,o=\\&quot;Acme\\&quot;\"/>"
        );
    }

    #[test]
    fn search_request_with_attributes() {
        let controls = SearchControls::new()
            .with_scope(SearchScope::Subtree)
            .with_deref_aliases(DerefAliases::Always)
            .with_size_limit(50)
            .with_time_limit(10)
            .with_return_attributes(["cn", "mail"]);
        let xml = search_request(&name("o=Acme"), "(cn=fred)", &controls).unwrap();

        assert_eq!(
            body(&xml),
            "<dsml:searchRequest dn=\"o=Acme\" scope=\"wholeSubtree\" derefAliases=\"derefAlways\" \
             sizeLimit=\"50\" timeLimit=\"10\" typesOnly=\"false\"><dsml:filter>\
             <dsml:equalityMatch name=\"cn\"><dsml:value>fred</dsml:value></dsml:equalityMatch>\
             </dsml:filter><dsml:attributes><dsml:attribute name=\"cn\"/>\
             <dsml:attribute name=\"mail\"/></dsml:attributes></dsml:searchRequest>"
        );
    }

    #[test]
    fn search_request_defaults() {
        let controls = SearchControls::new();
        let xml = search_request(&Name::root(), "(objectClass=*)", &controls).unwrap();
        let body = body(&xml);
        assert!(body.starts_with(
            "<dsml:searchRequest dn=\"\" scope=\"singleLevel\" derefAliases=\"derefInSearching\""
        ));
        assert!(!body.contains("<dsml:attributes>"));
    }

    #[test]
    fn search_request_without_attributes_asks_for_none() {
        let controls = SearchControls::new().with_return_attributes(Vec::<String>::new());
        let xml = search_request(&name("o=Acme"), "(objectClass=*)", &controls).unwrap();
        assert!(compact(&xml)
            .contains("<dsml:attributes><dsml:attribute name=\"1.1\"/></dsml:attributes>"));
    }

    #[test]
    fn search_request_filter_is_indented_inside_filter_element() {
        let xml = search_request(&name("o=Acme"), "(cn=fred)", &SearchControls::new()).unwrap();
        assert!(xml.contains(
            "\n        <dsml:filter>\n          <dsml:equalityMatch name=\"cn\">\n"
        ));
    }

    #[test]
    fn search_request_rejects_malformed_filter() {
        let controls = SearchControls::new();
        let err = search_request(&name("o=Acme"), "(cn=fred", &controls).unwrap_err();
        assert!(matches!(err, Error::MalformedFilter(_)));
    }

    #[test]
    fn add_request_preserves_value_order_and_encodes_binary() {
        let mut attributes = Attributes::new();
        attributes.add_value("objectClass", "top");
        attributes.add_value("objectClass", "person");
        attributes.add_value("cn", "Fred <the> Builder");
        attributes.add_value("userCertificate", vec![0x01_u8, 0x02, 0x03]);

        let xml = add_request(&name("cn=Fred,o=Acme"), &attributes);
        assert_eq!(
            body(&xml),
            "<dsml:addRequest dn=\"cn=Fred,o=Acme\"><dsml:attr name=\"objectClass\">\
             <dsml:value>top</dsml:value><dsml:value>person</dsml:value></dsml:attr>\
             <dsml:attr name=\"cn\"><dsml:value>Fred &lt;the&gt; Builder</dsml:value></dsml:attr>\
             <dsml:attr name=\"userCertificate\">\
             <dsml:value xsi:type=\"xsd:base64Binary\">AQID</dsml:value></dsml:attr>\
             </dsml:addRequest>"
        );
    }

    #[test]
    fn modify_request_operations() {
        let items = [
            ModificationItem::add(Attribute::with_values("mail", ["fred@acme.com"])),
            ModificationItem::replace(Attribute::with_values("sn", ["Bloggs", "Blogs"])),
            ModificationItem::remove(Attribute::new("description")),
        ];
        let xml = modify_request(&name("cn=Fred,o=Acme"), &items);
        assert_eq!(
            body(&xml),
            "<dsml:modifyRequest dn=\"cn=Fred,o=Acme\">\
             <dsml:modification name=\"mail\" operation=\"add\">\
             <dsml:value>fred@acme.com</dsml:value>\
             </dsml:modification><dsml:modification name=\"sn\" operation=\"replace\">\
             <dsml:value>Bloggs</dsml:value><dsml:value>Blogs</dsml:value></dsml:modification>\
             <dsml:modification name=\"description\" operation=\"delete\"/></dsml:modifyRequest>"
        );
    }

    #[test]
    fn rename_request_flags() {
        let xml = rename_request(&name("cn=Fred,o=Acme"), &Rdn::new("cn", "Freddy"), true, None);
        assert_eq!(
            body(&xml),
            "<dsml:modDNRequest dn=\"cn=Fred,o=Acme\" newrdn=\"cn=Freddy\" deleteoldrdn=\"true\"/>"
        );

        let xml = rename_request(
            &name("cn=Fred,o=Acme"),
            &Rdn::new("cn", "Fred"),
            false,
            Some(&name("ou=Staff,o=Acme")),
        );
        assert_eq!(
            body(&xml),
            "<dsml:modDNRequest dn=\"cn=Fred,o=Acme\" newrdn=\"cn=Fred\" deleteoldrdn=\"false\" \
             newSuperior=\"ou=Staff,o=Acme\"/>"
        );
    }
}
