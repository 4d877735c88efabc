use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::MoodleError;

/// The three shapes a Moodle web-service response can take.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Array(Vec<Value>),
    Wrapped(Map<String, Value>),
    Error { exception: String, message: String },
}

#[derive(Debug, Default, Deserialize)]
struct Fault {
    #[serde(default)]
    exception: String,
    #[serde(default)]
    message: String,
}

impl Envelope {
    pub fn parse(body: &str) -> Result<Self, MoodleError> {
        if body.contains("\"exception\"") {
            let fault = serde_json::from_str::<Fault>(body).unwrap_or_default();
            return Ok(Envelope::Error {
                exception: fault.exception,
                message: fault.message,
            });
        }

        match serde_json::from_str::<Value>(body)? {
            Value::Array(items) => Ok(Envelope::Array(items)),
            Value::Object(map) => Ok(Envelope::Wrapped(map)),
            other => Err(MoodleError::UnexpectedShape(format!(
                "expected array or object, got {}",
                other
            ))),
        }
    }

    /// Deserializes the listed records. A wrapped response yields the array
    /// under `field`; a missing or null field is an empty list.
    pub fn into_items<T: DeserializeOwned>(self, field: &str) -> Result<Vec<T>, MoodleError> {
        self.into_optional_items(field).map(Option::unwrap_or_default)
    }

    /// Like `into_items`, but a wrapped response without `field` (or with a
    /// null one) is `None` rather than an empty list.
    pub fn into_optional_items<T: DeserializeOwned>(
        self,
        field: &str,
    ) -> Result<Option<Vec<T>>, MoodleError> {
        let items = match self {
            Envelope::Array(items) => items,
            Envelope::Wrapped(mut map) => match map.remove(field) {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => return Ok(None),
                Some(other) => {
                    return Err(MoodleError::UnexpectedShape(format!(
                        "field `{}` is not an array: {}",
                        field, other
                    )));
                }
            },
            Envelope::Error { exception, message } => {
                return Err(MoodleError::Api { exception, message });
            }
        };

        items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map(Some)
            .map_err(MoodleError::from)
    }
}
