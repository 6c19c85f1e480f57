//! Inputs to normalization: who was asked, what was asked, and what came back.

use crate::{IheError, IheResult};
use chrono::{DateTime, Utc};
use hie_types::Oid;
use serde::{Deserialize, Serialize};

/// One remote participant, referenced by value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    pub url: String,
    /// XCPD gateways are addressed by `oid`, XCA gateways by `homeCommunityId`.
    #[serde(alias = "oid")]
    pub home_community_id: Oid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Gateway {
    pub fn new(url: impl Into<String>, home_community_id: Oid) -> Self {
        Self {
            url: url.into(),
            home_community_id,
            id: None,
        }
    }
}

/// The end-user request a reply answers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundRequest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// What the transport layer handed back for one gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyBody {
    /// Raw SOAP/XML text.
    Xml(String),
    /// The call failed before any XML arrived.
    TransportError { error: String },
}

impl ReplyBody {
    /// Reads the JSON shape the transport client emits: a string of XML, or `{"error": "..."}`.
    ///
    /// # Errors
    ///
    /// Returns [`IheError::InvalidInput`] for any other value. That is a caller bug, not a
    /// gateway problem.
    pub fn from_json(value: serde_json::Value) -> IheResult<Self> {
        match value {
            serde_json::Value::String(xml) => Ok(Self::Xml(xml)),
            serde_json::Value::Object(mut map) => match map.remove("error") {
                Some(serde_json::Value::String(error)) => Ok(Self::TransportError { error }),
                _ => Err(IheError::InvalidInput(
                    "transport error object must carry a string `error` field".into(),
                )),
            },
            other => Err(IheError::InvalidInput(format!(
                "reply must be an XML string or an error object, got {other}"
            ))),
        }
    }
}

/// A reply body stamped with the time it was received.
///
/// The timestamp comes from the transport layer so normalizing the same reply twice gives the
/// same result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayReply {
    pub body: ReplyBody,
    pub received_at: DateTime<Utc>,
}

impl GatewayReply {
    pub fn xml(xml: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            body: ReplyBody::Xml(xml.into()),
            received_at,
        }
    }

    pub fn transport_error(error: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            body: ReplyBody::TransportError {
                error: error.into(),
            },
            received_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reply_body_from_json_accepts_xml_and_error_object() {
        let body = ReplyBody::from_json(json!("<Envelope/>")).expect("xml string");
        assert_eq!(body, ReplyBody::Xml("<Envelope/>".into()));

        let body = ReplyBody::from_json(json!({"error": "ETIMEDOUT"})).expect("error object");
        assert_eq!(
            body,
            ReplyBody::TransportError {
                error: "ETIMEDOUT".into()
            }
        );
    }

    #[test]
    fn reply_body_from_json_rejects_other_shapes() {
        for value in [json!(42), json!(null), json!({"message": "x"}), json!({"error": 5})] {
            let err = ReplyBody::from_json(value).expect_err("contract violation");
            match err {
                IheError::InvalidInput(_) => {}
                other => panic!("expected InvalidInput, got {other:?}"),
            }
        }
    }

    #[test]
    fn gateway_accepts_oid_or_home_community_id() {
        let xcpd: Gateway = serde_json::from_value(json!({
            "url": "https://xcpd.example.org",
            "oid": "urn:oid:1.2.3"
        }))
        .expect("xcpd gateway");
        let xca: Gateway = serde_json::from_value(json!({
            "url": "https://xcpd.example.org",
            "homeCommunityId": "1.2.3"
        }))
        .expect("xca gateway");

        assert_eq!(xcpd, xca);
        assert_eq!(xcpd.home_community_id.as_str(), "1.2.3");
    }
}
