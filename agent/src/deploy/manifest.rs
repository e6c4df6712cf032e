//! Application manifest extraction

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::ManifestError;

/// Key holding the schedule declarations
pub const SCHEDULES_KEY: &str = "schedules";

/// A parsed manifest: the raw JSON object, kept as written
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    document: Map<String, Value>,
}

/// Events raised on each run of a schedule
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduleDeclaration {
    pub events: Vec<String>,
}

impl Manifest {
    /// Parse manifest text. The top level must be a JSON object.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ManifestError::Invalid(e.to_string()))?;
        match value {
            Value::Object(document) => Ok(Self { document }),
            other => Err(ManifestError::Invalid(format!(
                "expected an object, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// Declared schedules keyed by cron expression. A missing or null
    /// `schedules` entry yields an empty map.
    pub fn schedules(&self) -> Result<BTreeMap<String, ScheduleDeclaration>, ManifestError> {
        match self.document.get(SCHEDULES_KEY) {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ManifestError::Invalid(format!("{}: {}", SCHEDULES_KEY, e))),
        }
    }

    /// The document as stored on the application record
    pub fn to_value(&self) -> Value {
        Value::Object(self.document.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.document)
    }
}

/// Read and parse `<release_root>/<file_name>`
pub async fn extract_manifest(
    release_root: &Path,
    file_name: &str,
) -> Result<Manifest, ManifestError> {
    let path = release_root.join(file_name);
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ManifestError::NotFound(file_name.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            return Err(ManifestError::Invalid(format!("{} is not UTF-8", file_name)))
        }
        Err(e) => return Err(e.into()),
    };
    Manifest::parse(&text)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
