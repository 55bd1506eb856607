//! Task descriptors and the strict parser for plan replies.
//!
//! A plan is a JSON array of objects. Each object must carry a non-empty
//! string `title`; `description` (string), `day` (non-negative integer) and
//! the category lists `exercises`, `topics` and `activities` (arrays) are
//! optional. Anything else in the object is ignored. A reply that does not
//! match is rejected whole.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Category lists carried through as opaque metadata.
const METADATA_KEYS: [&str; 3] = ["exercises", "topics", "activities"];

/// One planned unit of work, before it is given a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Offset in days from the goal's start. `None` means "use the
    /// descriptor's position in the list".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Category lists (exercises, topics, activities) keyed by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Why a plan reply was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("reply has no message content")]
    MissingContent,

    #[error("reply is not valid JSON: {0}")]
    NotJson(String),

    #[error("plan must be a JSON array")]
    NotArray,

    #[error("plan contains no tasks")]
    Empty,

    #[error("task {index} is not a JSON object")]
    NotObject { index: usize },

    #[error("task {index} has no non-empty string title")]
    MissingTitle { index: usize },

    #[error("task {index} field {field:?} must be {expected}")]
    InvalidField {
        index: usize,
        field: &'static str,
        expected: &'static str,
    },
}

/// Remove Markdown code fences (```` ```json ```` and ```` ``` ````) and
/// surrounding whitespace.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json\n", "")
        .replace("```json", "")
        .replace("```\n", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Strip fences from model output and parse it into descriptors.
pub fn parse_plan_reply(text: &str) -> Result<Vec<TaskDescriptor>, DescriptorError> {
    let cleaned = strip_code_fences(text);
    let value: Value =
        serde_json::from_str(&cleaned).map_err(|e| DescriptorError::NotJson(e.to_string()))?;
    descriptors_from_value(&value)
}

/// Validate an already-decoded JSON value as a plan.
pub fn descriptors_from_value(value: &Value) -> Result<Vec<TaskDescriptor>, DescriptorError> {
    let items = value.as_array().ok_or(DescriptorError::NotArray)?;
    if items.is_empty() {
        return Err(DescriptorError::Empty);
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| descriptor_from_object(index, item))
        .collect()
}

fn descriptor_from_object(index: usize, item: &Value) -> Result<TaskDescriptor, DescriptorError> {
    let obj = item.as_object().ok_or(DescriptorError::NotObject { index })?;

    let title = match obj.get("title") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => return Err(DescriptorError::MissingTitle { index }),
    };

    let description = match obj.get("description") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(DescriptorError::InvalidField {
                index,
                field: "description",
                expected: "a string",
            });
        }
    };

    let day = match obj.get("day") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let n = v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or(DescriptorError::InvalidField {
                    index,
                    field: "day",
                    expected: "a non-negative integer",
                })?;
            Some(n)
        }
    };

    let mut metadata = Map::new();
    for key in METADATA_KEYS {
        match obj.get(key) {
            None | Some(Value::Null) => {}
            Some(v @ Value::Array(_)) => {
                metadata.insert(key.to_string(), v.clone());
            }
            Some(_) => {
                return Err(DescriptorError::InvalidField {
                    index,
                    field: key,
                    expected: "an array",
                });
            }
        }
    }

    Ok(TaskDescriptor {
        day,
        title,
        description,
        metadata: (!metadata.is_empty()).then_some(Value::Object(metadata)),
    })
}
