//! ITI-55 Cross Gateway Patient Discovery reply reader.

use crate::response::PatientMatch;
use crate::xml::XmlElement;
use crate::{IheError, IheResult};
use fhir::{
    AdministrativeGender, ContactPoint, ExternalGatewayPatient, HumanName, Issue, PatientAddress,
    PatientResource, PersonalIdentifier,
};

pub(crate) const RESPONSE_ELEMENT: &str = "PRPA_IN201306UV02";

const APPLICATION_ACCEPT: &str = "AA";
const QUERY_OK: &str = "OK";
const QUERY_NOT_FOUND: &str = "NF";

/// What an XCPD reply says about the patient.
#[derive(Debug)]
pub(crate) enum Discovery {
    Match(PatientMatch),
    /// Accepted, but the gateway holds no record for the patient.
    NoMatch { query_response_code: String },
    Rejected(Vec<Issue>),
}

/// Reads the discovery decision out of a parsed reply.
///
/// # Errors
///
/// Returns [`IheError::Schema`] when the envelope, acknowledgement code, query response code or
/// (for a match) the patient id is missing.
pub(crate) fn read(root: &XmlElement) -> IheResult<Discovery> {
    let message = root
        .find(RESPONSE_ELEMENT)
        .ok_or_else(|| IheError::Schema(format!("reply has no {RESPONSE_ELEMENT} element")))?;

    let acknowledgement = message.child("acknowledgement");
    let ack = acknowledgement
        .and_then(|a| a.child("typeCode"))
        .and_then(|t| t.attr_non_empty("code"))
        .ok_or_else(|| IheError::Schema("acknowledgement has no typeCode".into()))?;
    let control_act = message.child("controlActProcess");
    let query_response_code = control_act
        .and_then(|c| c.path(&["queryAck", "queryResponseCode"]))
        .and_then(|q| q.attr_non_empty("code"))
        .ok_or_else(|| IheError::Schema("queryAck has no queryResponseCode".into()))?;

    match (ack, query_response_code) {
        (APPLICATION_ACCEPT, QUERY_OK) => {
            let patient = control_act
                .and_then(|c| {
                    c.path(&["subject", "registrationEvent", "subject1", "patient"])
                })
                .ok_or_else(|| IheError::Schema("match reply has no subject patient".into()))?;
            Ok(Discovery::Match(patient_match(patient)?))
        }
        (APPLICATION_ACCEPT, QUERY_NOT_FOUND) => Ok(Discovery::NoMatch {
            query_response_code: query_response_code.to_string(),
        }),
        _ => {
            let mut issues: Vec<Issue> = acknowledgement
                .into_iter()
                .flat_map(|a| a.children("acknowledgementDetail"))
                .map(|detail| {
                    let code = detail
                        .child("code")
                        .and_then(|c| c.attr_non_empty("code"))
                        .unwrap_or(query_response_code);
                    let text = detail.child("text").and_then(XmlElement::text).unwrap_or_default();
                    Issue::error(code, text)
                })
                .collect();
            if issues.is_empty() {
                issues.push(Issue::error(
                    query_response_code,
                    format!("acknowledgement {ack}, query response {query_response_code}"),
                ));
            }
            Ok(Discovery::Rejected(issues))
        }
    }
}

fn patient_match(patient: &XmlElement) -> IheResult<PatientMatch> {
    let id = patient
        .child("id")
        .ok_or_else(|| IheError::Schema("matched patient has no id".into()))?;
    let external_gateway_patient = ExternalGatewayPatient {
        id: id
            .attr_non_empty("extension")
            .ok_or_else(|| IheError::Schema("matched patient id has no extension".into()))?
            .to_string(),
        system: id
            .attr_non_empty("root")
            .ok_or_else(|| IheError::Schema("matched patient id has no root".into()))?
            .to_string(),
    };

    let patient_resource = match patient.child("patientPerson") {
        Some(person) => patient_resource(person),
        None => PatientResource::default(),
    };

    Ok(PatientMatch {
        external_gateway_patient,
        patient_resource,
    })
}

fn owned_text(element: &XmlElement, name: &str) -> Option<String> {
    element
        .child(name)
        .and_then(XmlElement::text)
        .map(str::to_string)
}

fn patient_resource(person: &XmlElement) -> PatientResource {
    let name = person
        .children("name")
        .map(|name| HumanName {
            given: name
                .children("given")
                .filter_map(XmlElement::text)
                .map(str::to_string)
                .collect(),
            family: owned_text(name, "family"),
        })
        .collect();

    let address = person
        .children("addr")
        .map(|addr| PatientAddress {
            line: addr
                .children("streetAddressLine")
                .filter_map(XmlElement::text)
                .map(str::to_string)
                .collect(),
            city: owned_text(addr, "city"),
            state: owned_text(addr, "state"),
            postal_code: owned_text(addr, "postalCode"),
            country: owned_text(addr, "country"),
        })
        .filter(PatientAddress::is_locatable)
        .collect();

    let telecom = person
        .children("telecom")
        .filter_map(|t| {
            let system = t.attr_non_empty("use").map(str::to_string);
            let value = t.attr_non_empty("value").map(str::to_string);
            (system.is_some() || value.is_some()).then_some(ContactPoint { system, value })
        })
        .collect();

    let identifier = person
        .children("asOtherIDs")
        .flat_map(|other| other.children("id"))
        .filter_map(|id| {
            let value = id.attr_non_empty("extension").map(str::to_string);
            let system = id.attr_non_empty("root").map(str::to_string);
            (value.is_some() || system.is_some()).then_some(PersonalIdentifier { value, system })
        })
        .collect();

    PatientResource {
        name,
        gender: person
            .child("administrativeGenderCode")
            .and_then(|g| g.attr_non_empty("code"))
            .map(AdministrativeGender::from_hl7),
        birth_date: person
            .child("birthTime")
            .and_then(|b| b.attr_non_empty("value"))
            .map(str::to_string),
        address,
        telecom,
        identifier,
    }
}
