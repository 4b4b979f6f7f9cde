use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange-qualified instrument code, e.g. `sh.600036`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::InstrumentId;

    #[test]
    fn serializes_as_plain_code() {
        let id = InstrumentId::from("sh.600036");
        assert_eq!(id.to_string(), "sh.600036");
        assert_eq!(
            serde_json::to_string(&id).expect("json"),
            "\"sh.600036\""
        );
    }
}
