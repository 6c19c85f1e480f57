//! ebXML registry response helpers shared by the XCA query and retrieve readers.

use crate::xml::XmlElement;
use crate::{IheError, IheResult};
use fhir::{Issue, IssueSeverity};
use hie_types::local_code;

pub(crate) const SUCCESS_STATUS: &str = "Success";
pub(crate) const PARTIAL_SUCCESS_STATUS: &str = "PartialSuccess";

/// The response `status` with any namespace before the final `:` removed.
pub(crate) fn status(response: &XmlElement) -> Option<&str> {
    response.attr("status").map(local_code)
}

pub(crate) fn is_success_status(status: Option<&str>) -> bool {
    matches!(status, Some(SUCCESS_STATUS | PARTIAL_SUCCESS_STATUS))
}

/// The `RegistryErrorList` element, if the response has one.
pub(crate) fn error_list(response: &XmlElement) -> Option<&XmlElement> {
    response.child("RegistryErrorList")
}

/// Maps every `RegistryError` in a list to an issue, preserving order.
///
/// An entry without `errorCode` keeps its text under an empty code. An entry with neither is
/// skipped. Fails only when the list has entries and none of them could be read.
pub(crate) fn map_error_list(list: &XmlElement) -> IheResult<Vec<Issue>> {
    let mut entries = 0usize;
    let mut issues = Vec::new();
    for entry in list.children("RegistryError") {
        entries += 1;
        match map_registry_error(entry) {
            Some(issue) => issues.push(issue),
            None => tracing::warn!("skipping RegistryError with no errorCode and no text"),
        }
    }

    if entries > 0 && issues.is_empty() {
        return Err(IheError::MalformedEntry(format!(
            "none of {entries} RegistryError entries has an errorCode or text"
        )));
    }
    Ok(issues)
}

fn map_registry_error(entry: &XmlElement) -> Option<Issue> {
    let code = entry.attr_non_empty("errorCode");
    let text = entry.attr_non_empty("codeContext").or_else(|| entry.text());
    if code.is_none() && text.is_none() {
        return None;
    }
    let severity = entry
        .attr_non_empty("severity")
        .map(IssueSeverity::from_wire)
        .unwrap_or(IssueSeverity::Error);
    Some(Issue::new(severity, code.unwrap_or_default(), text.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEVERITY_ERROR: &str = "urn:oasis:names:tc:ebxml-regrep:ErrorSeverityType:Error";
    const SEVERITY_WARNING: &str = "urn:oasis:names:tc:ebxml-regrep:ErrorSeverityType:Warning";

    fn parse(xml: &str) -> XmlElement {
        XmlElement::parse(xml).expect("fixture parses")
    }

    #[test]
    fn status_keeps_text_after_final_colon() {
        let response = parse(
            r#"<AdhocQueryResponse status="urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:PartialSuccess"/>"#,
        );
        assert_eq!(status(&response), Some("PartialSuccess"));
        assert!(is_success_status(status(&response)));

        let response = parse(r#"<AdhocQueryResponse status="Failure"/>"#);
        assert!(!is_success_status(status(&response)));
        assert!(!is_success_status(None));
    }

    #[test]
    fn maps_single_and_multiple_registry_errors_in_order() {
        let list = parse(&format!(
            r#"<RegistryErrorList>
                 <RegistryError errorCode="XDSRegistryError" codeContext="first" severity="{SEVERITY_ERROR}"/>
                 <RegistryError errorCode="XDSRegistryBusy" severity="{SEVERITY_WARNING}">second</RegistryError>
               </RegistryErrorList>"#
        ));
        let issues = map_error_list(&list).expect("maps");
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].code, "XDSRegistryError");
        assert_eq!(issues[0].text(), "first");
        assert_eq!(issues[0].severity, IssueSeverity::Error);
        assert_eq!(issues[1].code, "XDSRegistryBusy");
        assert_eq!(issues[1].text(), "second");
        assert_eq!(issues[1].severity, IssueSeverity::Warning);

        let list =
            parse(r#"<RegistryErrorList><RegistryError errorCode="X"/></RegistryErrorList>"#);
        let issues = map_error_list(&list).expect("maps");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Error);
        assert_eq!(issues[0].text(), "");
    }

    #[test]
    fn entry_without_error_code_keeps_its_siblings() {
        let list = parse(
            r#"<RegistryErrorList>
                 <RegistryError errorCode="XDSUnknownPatientId" codeContext="not known"/>
                 <RegistryError codeContext="no code"/>
                 <RegistryError/>
               </RegistryErrorList>"#,
        );
        let issues = map_error_list(&list).expect("maps");
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].code, "XDSUnknownPatientId");
        assert_eq!(issues[1].code, "");
        assert_eq!(issues[1].text(), "no code");
        assert_eq!(issues[1].severity, IssueSeverity::Error);
    }

    #[test]
    fn list_with_no_readable_entry_fails() {
        let list = parse("<RegistryErrorList><RegistryError/><RegistryError/></RegistryErrorList>");
        let err = map_error_list(&list).expect_err("unreadable list");
        match err {
            IheError::MalformedEntry(msg) => assert!(msg.contains("errorCode"), "{msg}"),
            other => panic!("expected MalformedEntry, got {other:?}"),
        }
    }

    #[test]
    fn empty_error_list_maps_to_no_issues() {
        let list = parse("<RegistryErrorList/>");
        assert!(map_error_list(&list).expect("maps").is_empty());
    }
}
