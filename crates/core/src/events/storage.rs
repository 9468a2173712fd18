//! Object-storage notification parsing.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{EventError, ObjectCreatedEvent};

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "Records")]
    records: Vec<EnvelopeRecord>,
}

#[derive(Deserialize)]
struct EnvelopeRecord {
    #[serde(rename = "eventName", default)]
    event_name: Option<String>,
    #[serde(rename = "eventTime", default)]
    event_time: Option<DateTime<Utc>>,
    s3: S3Entity,
}

#[derive(Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Deserialize)]
struct S3Object {
    key: String,
}

/// Parse a storage notification into object-created events.
///
/// Accepts the flat `{bucket, object_key, event_time?}` form or a `Records`
/// envelope. Envelope keys are URL-encoded (`+` for space) and are decoded
/// here. Envelope records for non-create events are dropped, and so are
/// individual records that fail validation; the rest of the batch survives.
pub fn parse_storage_notification(payload: &Value) -> Result<Vec<ObjectCreatedEvent>, EventError> {
    if payload.get("Records").is_some() {
        let envelope: Envelope = serde_json::from_value(payload.clone())
            .map_err(|e| EventError::Malformed(e.to_string()))?;

        let mut events = Vec::with_capacity(envelope.records.len());
        for record in envelope.records {
            if let Some(name) = record.event_name.as_deref() {
                if !name.starts_with("ObjectCreated") {
                    continue;
                }
            }
            let parsed = decode_key(&record.s3.object.key).and_then(|object_key| {
                let event = ObjectCreatedEvent {
                    bucket: record.s3.bucket.name.clone(),
                    object_key,
                    event_time: record.event_time,
                };
                event.validate().map(|()| event)
            });
            match parsed {
                Ok(event) => events.push(event),
                Err(e) => warn!(
                    bucket = %record.s3.bucket.name,
                    object_key = %record.s3.object.key,
                    "Dropping invalid storage notification record: {}",
                    e
                ),
            }
        }
        return Ok(events);
    }

    let event: ObjectCreatedEvent = serde_json::from_value(payload.clone())
        .map_err(|e| EventError::Malformed(e.to_string()))?;
    event.validate()?;
    Ok(vec![event])
}

fn decode_key(raw: &str) -> Result<String, EventError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| EventError::Malformed(format!("object key is not valid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_flat_payload() {
        let payload = json!({"bucket": "data", "object_key": "input/data/training/file.csv"});
        let events = parse_storage_notification(&payload).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].bucket, "data");
        assert_eq!(events[0].object_key, "input/data/training/file.csv");
        assert!(events[0].event_time.is_none());
    }

    #[test]
    fn test_parse_flat_payload_with_time() {
        let payload = json!({
            "bucket": "data",
            "object_key": "input/data/a.csv",
            "event_time": "2024-05-01T10:00:00Z"
        });
        let events = parse_storage_notification(&payload).unwrap();
        assert!(events[0].event_time.is_some());
    }

    #[test]
    fn test_parse_envelope_decodes_keys() {
        let payload = json!({
            "Records": [
                {
                    "eventName": "ObjectCreated:Put",
                    "eventTime": "2024-05-01T10:00:00.000Z",
                    "s3": {
                        "bucket": {"name": "data"},
                        "object": {"key": "input/data/training/my+file%281%29.csv"}
                    }
                },
                {
                    "eventName": "ObjectCreated:Copy",
                    "s3": {
                        "bucket": {"name": "data"},
                        "object": {"key": "input/data/validation/v.csv"}
                    }
                }
            ]
        });
        let events = parse_storage_notification(&payload).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].object_key, "input/data/training/my file(1).csv");
        assert!(events[0].event_time.is_some());
        assert_eq!(events[1].object_key, "input/data/validation/v.csv");
    }

    #[test]
    fn test_parse_envelope_skips_non_create_records() {
        let payload = json!({
            "Records": [{
                "eventName": "ObjectRemoved:Delete",
                "s3": {"bucket": {"name": "data"}, "object": {"key": "input/data/x.csv"}}
            }]
        });
        assert!(parse_storage_notification(&payload).unwrap().is_empty());
    }

    #[test]
    fn test_parse_missing_key_is_malformed() {
        let payload = json!({"bucket": "data"});
        assert!(matches!(
            parse_storage_notification(&payload),
            Err(EventError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_empty_bucket_rejected() {
        let payload = json!({"bucket": "", "object_key": "input/data/x.csv"});
        assert_eq!(
            parse_storage_notification(&payload),
            Err(EventError::MissingField("bucket"))
        );
    }

    #[test]
    fn test_parse_envelope_drops_only_the_invalid_record() {
        let payload = json!({
            "Records": [
                {
                    "eventName": "ObjectCreated:Put",
                    "s3": {"bucket": {"name": ""}, "object": {"key": "input/data/a.csv"}}
                },
                {
                    "eventName": "ObjectCreated:Put",
                    "s3": {"bucket": {"name": "data"}, "object": {"key": "input/data/b.csv"}}
                }
            ]
        });
        let events = parse_storage_notification(&payload).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].object_key, "input/data/b.csv");
    }

    #[test]
    fn test_parse_envelope_missing_s3_is_malformed() {
        let payload = json!({"Records": [{"eventName": "ObjectCreated:Put"}]});
        assert!(matches!(
            parse_storage_notification(&payload),
            Err(EventError::Malformed(_))
        ));
    }
}
