use serde::Serialize;

use crate::types::attributes::{AttributeMap, AttributeValue};

/// Node/ECU defined in the matrix.
#[derive(Default, Clone, PartialEq, Debug, Serialize)]
pub struct Ecu {
    /// ECU name, unique within the matrix.
    pub name: String,
    /// Associated comment
    pub comment: String,

    // --- Attributes ---
    pub attributes: AttributeMap,
}

impl Ecu {
    pub fn new(name: &str) -> Self {
        Ecu {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    pub fn with_attribute(mut self, key: &str, value: AttributeValue) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }
}
