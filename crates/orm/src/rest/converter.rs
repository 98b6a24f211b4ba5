//! Payload encodings for the REST session

use serde_json::Value as JsonValue;
use tessera_core::MessageType;
use url::form_urlencoded;

use super::model_map::RestfulModelMap;
use crate::error::OrmResult;

/// Encodes model maps into request bodies and decodes response bodies
pub trait MessageConverter: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn encode(&self, map: &RestfulModelMap) -> OrmResult<String>;

    fn decode(&self, body: &str) -> OrmResult<RestfulModelMap>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl MessageConverter for JsonConverter {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self, map: &RestfulModelMap) -> OrmResult<String> {
        Ok(serde_json::to_string(&map.to_json())?)
    }

    fn decode(&self, body: &str) -> OrmResult<RestfulModelMap> {
        RestfulModelMap::from_json(serde_json::from_str(body)?)
    }
}

/// `application/x-www-form-urlencoded` pairs. Every decoded value is a
/// string; the type adapters parse it back into the field's type.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameValueConverter;

impl MessageConverter for NameValueConverter {
    fn content_type(&self) -> &'static str {
        "application/x-www-form-urlencoded"
    }

    fn encode(&self, map: &RestfulModelMap) -> OrmResult<String> {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in map.iter() {
            match value {
                JsonValue::Null => {}
                JsonValue::String(s) => {
                    serializer.append_pair(name, s);
                }
                other => {
                    serializer.append_pair(name, &other.to_string());
                }
            }
        }
        Ok(serializer.finish())
    }

    fn decode(&self, body: &str) -> OrmResult<RestfulModelMap> {
        Ok(form_urlencoded::parse(body.trim().as_bytes())
            .map(|(name, value)| (name.into_owned(), JsonValue::String(value.into_owned())))
            .collect())
    }
}

/// Converter for a configured message type
pub fn converter_for(message_type: MessageType) -> Box<dyn MessageConverter> {
    match message_type {
        MessageType::Json => Box::new(JsonConverter),
        MessageType::NameValue => Box::new(NameValueConverter),
    }
}
