//! Store key layout and record encoding.
//!
//! Each record is stored as a field map whose values are JSON documents, so
//! individual fields can be rewritten without touching the rest.

use crate::registry::domain::{AgentId, AgentType, Capability};
use crate::registry::ports::FieldMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde::ser::Error as _;
use serde_json::{Map, Value};

pub(super) fn metadata_key(id: &AgentId) -> String {
    format!("agent:{id}:metadata")
}

pub(super) fn health_key(id: &AgentId) -> String {
    format!("agent:{id}:health")
}

pub(super) fn stats_key(id: &AgentId) -> String {
    format!("agent:{id}:stats")
}

pub(super) fn type_index_key(agent_type: AgentType) -> String {
    format!("index:type:{agent_type}")
}

pub(super) fn capability_index_key(capability: &Capability) -> String {
    format!("index:capability:{capability}")
}

pub(super) fn encode<T: Serialize>(record: &T) -> Result<FieldMap, serde_json::Error> {
    let Value::Object(object) = serde_json::to_value(record)? else {
        return Err(serde_json::Error::custom("record must encode to an object"));
    };
    Ok(object
        .into_iter()
        .map(|(field, value)| (field, value.to_string()))
        .collect())
}

pub(super) fn encode_field<T: Serialize>(
    field: &str,
    value: &T,
) -> Result<FieldMap, serde_json::Error> {
    Ok(FieldMap::from([(
        field.to_owned(),
        serde_json::to_string(value)?,
    )]))
}

pub(super) fn decode<T: DeserializeOwned>(fields: &FieldMap) -> Result<T, serde_json::Error> {
    let object = fields
        .iter()
        .map(|(field, raw)| Ok((field.clone(), serde_json::from_str::<Value>(raw)?)))
        .collect::<Result<Map<String, Value>, serde_json::Error>>()?;
    serde_json::from_value(Value::Object(object))
}
