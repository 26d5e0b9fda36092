//! # Log Payload Codec
//!
//! Two payload forms carry the four record fields:
//!
//! - **Json** (default): `{"source_address":..,"query_target":..,"record_kind":..,"observed_at":..}`
//! - **Delimited**: `IP: <ip>, Domain: <target>, QueryType: <kind>, Timestamp: <secs>`
//!
//! The decoder accepts both, picking JSON when the payload starts with `{`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::entities::RequestRecord;
use crate::errors::{Classify, ErrorClass};

const IP_PREFIX: &str = "IP:";
const DOMAIN_PREFIX: &str = "Domain:";
const QUERY_TYPE_PREFIX: &str = "QueryType:";
const TIMESTAMP_PREFIX: &str = "Timestamp:";

/// Errors from encoding or decoding a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid JSON payload: {0}")]
    Json(String),

    #[error("delimited payload is missing field {0}")]
    MissingField(&'static str),

    #[error("invalid timestamp in payload: {0}")]
    InvalidTimestamp(String),

    /// A field contains the delimiter and cannot be encoded losslessly.
    #[error("field {0} cannot be carried in the delimited format")]
    Unrepresentable(&'static str),

    #[error("unknown payload format: {0}")]
    UnknownFormat(String),
}

impl Classify for CodecError {
    fn class(&self) -> ErrorClass {
        ErrorClass::MalformedInput
    }
}

/// Payload format used by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    Json,
    Delimited,
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadFormat::Json => f.write_str("json"),
            PayloadFormat::Delimited => f.write_str("delimited"),
        }
    }
}

impl FromStr for PayloadFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(PayloadFormat::Json),
            "delimited" | "text" => Ok(PayloadFormat::Delimited),
            other => Err(CodecError::UnknownFormat(other.to_string())),
        }
    }
}

/// Encode a record into a log payload.
pub fn encode_record(record: &RequestRecord, format: PayloadFormat) -> Result<Vec<u8>, CodecError> {
    match format {
        PayloadFormat::Json => {
            serde_json::to_vec(record).map_err(|e| CodecError::Json(e.to_string()))
        }
        PayloadFormat::Delimited => {
            for (name, value) in [
                ("source_address", &record.source_address),
                ("query_target", &record.query_target),
                ("record_kind", &record.record_kind),
            ] {
                if value.contains(',') {
                    return Err(CodecError::Unrepresentable(name));
                }
            }
            Ok(format!(
                "{} {}, {} {}, {} {}, {} {}",
                IP_PREFIX,
                record.source_address,
                DOMAIN_PREFIX,
                record.query_target,
                QUERY_TYPE_PREFIX,
                record.record_kind,
                TIMESTAMP_PREFIX,
                record.observed_at
            )
            .into_bytes())
        }
    }
}

/// Decode a log payload in either supported format.
pub fn decode_record(payload: &[u8]) -> Result<RequestRecord, CodecError> {
    let text = std::str::from_utf8(payload).map_err(|_| CodecError::InvalidUtf8)?;
    let trimmed = text.trim_start();

    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).map_err(|e| CodecError::Json(e.to_string()));
    }

    decode_delimited(trimmed)
}

fn decode_delimited(text: &str) -> Result<RequestRecord, CodecError> {
    let mut source_address = None;
    let mut query_target = None;
    let mut record_kind = None;
    let mut observed_at = None;

    for part in text.split(',') {
        let part = part.trim();
        if let Some(v) = part.strip_prefix(IP_PREFIX) {
            source_address = Some(v.trim().to_string());
        } else if let Some(v) = part.strip_prefix(DOMAIN_PREFIX) {
            query_target = Some(v.trim().to_string());
        } else if let Some(v) = part.strip_prefix(QUERY_TYPE_PREFIX) {
            record_kind = Some(v.trim().to_string());
        } else if let Some(v) = part.strip_prefix(TIMESTAMP_PREFIX) {
            let v = v.trim();
            observed_at = Some(
                v.parse::<i64>()
                    .map_err(|_| CodecError::InvalidTimestamp(v.to_string()))?,
            );
        }
    }

    Ok(RequestRecord {
        source_address: source_address
            .filter(|s| !s.is_empty())
            .ok_or(CodecError::MissingField("IP"))?,
        query_target: query_target
            .filter(|s| !s.is_empty())
            .ok_or(CodecError::MissingField("Domain"))?,
        record_kind: record_kind
            .filter(|s| !s.is_empty())
            .ok_or(CodecError::MissingField("QueryType"))?,
        observed_at: observed_at.ok_or(CodecError::MissingField("Timestamp"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RequestRecord {
        RequestRecord::new("192.168.1.70", "api.mywebsite.com", "AAAA", 1_718_000_000)
    }

    #[test]
    fn test_json_payload_decodes() {
        let payload = encode_record(&sample(), PayloadFormat::Json).unwrap();
        assert_eq!(payload[0], b'{');
        assert_eq!(decode_record(&payload).unwrap(), sample());
    }

    #[test]
    fn test_delimited_layout() {
        let payload = encode_record(&sample(), PayloadFormat::Delimited).unwrap();
        assert_eq!(
            String::from_utf8(payload).unwrap(),
            "IP: 192.168.1.70, Domain: api.mywebsite.com, QueryType: AAAA, Timestamp: 1718000000"
        );
    }

    #[test]
    fn test_decode_original_producer_text() {
        let text = b"IP: 10.0.0.70, Domain: cdn.mywebsite.com, QueryType: A, Timestamp: 1700000000";
        let record = decode_record(text).unwrap();
        assert_eq!(record.source_address, "10.0.0.70");
        assert_eq!(record.query_target, "cdn.mywebsite.com");
        assert_eq!(record.record_kind, "A");
        assert_eq!(record.observed_at, 1_700_000_000);
    }

    #[test]
    fn test_delimited_missing_field() {
        let err = decode_record(b"IP: 10.0.0.1, Domain: a.com, Timestamp: 1").unwrap_err();
        assert_eq!(err, CodecError::MissingField("QueryType"));

        let err = decode_record(b"Hello Go!").unwrap_err();
        assert_eq!(err, CodecError::MissingField("IP"));
    }

    #[test]
    fn test_delimited_bad_timestamp() {
        let err = decode_record(b"IP: 1.2.3.4, Domain: a, QueryType: A, Timestamp: soon").unwrap_err();
        assert!(matches!(err, CodecError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_unrepresentable_field() {
        let record = RequestRecord::new("1.2.3.4", "a.com,b.com", "A", 1);
        assert_eq!(
            encode_record(&record, PayloadFormat::Delimited),
            Err(CodecError::Unrepresentable("query_target"))
        );
        assert!(encode_record(&record, PayloadFormat::Json).is_ok());
    }

    #[test]
    fn test_invalid_utf8() {
        assert_eq!(decode_record(&[0xff, 0xfe]), Err(CodecError::InvalidUtf8));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<PayloadFormat>().unwrap(), PayloadFormat::Json);
        assert_eq!("delimited".parse::<PayloadFormat>().unwrap(), PayloadFormat::Delimited);
        assert!("avro".parse::<PayloadFormat>().is_err());
    }
}
