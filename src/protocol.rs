use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::namespace::{Method, Namespace};
use crate::types::Channel;
use crate::{Error, Result};

pub const DEFAULT_FROM: &str = "meross_lan";
pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub message_id: String,
    pub namespace: String,
    pub method: Method,
    #[serde(default)]
    pub payload_version: u32,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub timestamp_ms: i64,
    #[serde(default)]
    pub sign: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_src: Option<String>,
}

impl Header {
    /// The namespace as a known registry entry.
    pub fn known_namespace(&self) -> Option<Namespace> {
        Namespace::from_name(&self.namespace)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub header: Header,
    #[serde(default)]
    pub payload: Value,
}

/// `md5(message_id + key + timestamp)` as lowercase hex.
pub fn compute_sign(message_id: &str, key: &str, timestamp: i64) -> String {
    let digest = md5::compute(format!("{message_id}{key}{timestamp}").as_bytes());
    format!("{digest:x}")
}

pub fn check_sign(header: &Header, key: &str) -> bool {
    compute_sign(&header.message_id, key, header.timestamp) == header.sign
}

pub fn build_request(
    namespace: Namespace,
    method: Method,
    payload: Value,
    key: &str,
    from: &str,
) -> Message {
    let now = Utc::now();
    let message_id = Uuid::new_v4().simple().to_string();
    let timestamp = now.timestamp();
    Message {
        header: Header {
            sign: compute_sign(&message_id, key, timestamp),
            message_id,
            namespace: namespace.name().to_string(),
            method,
            payload_version: PAYLOAD_VERSION,
            from: from.to_string(),
            timestamp,
            timestamp_ms: now.timestamp_subsec_millis().into(),
            trigger_src: None,
        },
        payload,
    }
}

pub fn parse_message(body: &str) -> Result<Message> {
    serde_json::from_str(body).map_err(|e| Error::Protocol(format!("undecodable message: {e}")))
}

/// Finds the element of a list whose `key` field equals `value`.
pub fn get_element_by_key<'a>(list: &'a Value, key: &str, value: &Value) -> Option<&'a Value> {
    list.as_array()?
        .iter()
        .find(|item| item.get(key) == Some(value))
}

/// Request payload for a GET on `namespace`.
pub fn get_payload(namespace: Namespace) -> Value {
    match namespace {
        Namespace::SystemAll | Namespace::SystemAbility | Namespace::DiffuserSensor => json!({}),
        Namespace::SensorLatest | Namespace::SensorLatestX => {
            json!({ namespace.key(): [{ "channel": 0 }] })
        }
        _ => json!({ namespace.key(): [] }),
    }
}

pub fn onoff_payload(namespace: Namespace, channel: &Channel, onoff: bool) -> Value {
    let item = json!({
        "channel": channel.to_value(),
        "onoff": i32::from(onoff),
    });
    match namespace {
        Namespace::DiffuserLight | Namespace::ThermostatMode => json!({ namespace.key(): [item] }),
        _ => json!({ namespace.key(): item }),
    }
}

pub fn mode_payload(channel: &Channel, mode: i64) -> Value {
    json!({
        "mode": [{
            "channel": channel.to_value(),
            "mode": mode
        }]
    })
}

pub fn spray_payload(channel: &Channel, mode: i64) -> Value {
    json!({
        "spray": [{
            "channel": channel.to_value(),
            "mode": mode
        }]
    })
}

/// Mp3 commands carry one field per request: `mute`, `song` or `volume`.
pub fn mp3_payload(channel: &Channel, key: &str, value: Value) -> Value {
    let mut item = Map::new();
    item.insert("channel".to_string(), channel.to_value());
    item.insert(key.to_string(), value);
    json!({ "mp3": item })
}
