use std::{collections::HashMap, error::Error, fmt::Display};

use tinyjson::{InnerAsRef, JsonParseError, JsonValue};

/// Largest offset we accept from JSON: 2^53, past which JSON numbers (f64) stop representing every integer.
pub const MAX_OFFSET: u64 = 1 << 53;

const SETTINGS_VERSION: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignSettings {
    /// How many pixels each button press moves the image by.
    pub offset: usize,
}

impl Default for AlignSettings {
    fn default() -> Self {
        Self { offset: 1 }
    }
}

#[derive(Debug)]
pub enum ParseSettingsError {
    InvalidJSON(JsonParseError),
    MissingField { field: &'static str },
    UnsupportedVersion { version: f64 },
    InvalidSettingType { key: String, expected: &'static str },
    InvalidValue { key: &'static str, value: f64 },
}

impl Display for ParseSettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseSettingsError::InvalidJSON(e) => e.fmt(f),
            ParseSettingsError::MissingField { field } => {
                write!(f, "Missing field: {}", field)
            }
            ParseSettingsError::UnsupportedVersion { version } => {
                write!(f, "Unsupported version: {}", version)
            }
            ParseSettingsError::InvalidSettingType { key, expected } => {
                write!(f, "Setting {} is not a(n) {}", key, expected)
            }
            ParseSettingsError::InvalidValue { key, value } => {
                write!(f, "Setting {} has an out-of-range value: {}", key, value)
            }
        }
    }
}

impl Error for ParseSettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseSettingsError::InvalidJSON(e) => Some(e),
            _ => None,
        }
    }
}

impl From<JsonParseError> for ParseSettingsError {
    fn from(err: JsonParseError) -> Self {
        Self::InvalidJSON(err)
    }
}

/// Convenience trait for asserting the "shape" of the JSON we're parsing is what we expect.
trait GetAndExpect {
    fn get_and_expect<T: InnerAsRef + Clone>(
        &self,
        key: &str,
    ) -> Result<Option<T>, ParseSettingsError>;
}

impl GetAndExpect for HashMap<String, JsonValue> {
    fn get_and_expect<T: InnerAsRef + Clone>(
        &self,
        key: &str,
    ) -> Result<Option<T>, ParseSettingsError> {
        self.get(key)
            .map(|v| {
                v.get::<T>()
                    .cloned()
                    .ok_or_else(|| ParseSettingsError::InvalidSettingType {
                        key: key.to_owned(),
                        expected: std::any::type_name::<T>(),
                    })
            })
            .transpose()
    }
}

impl AlignSettings {
    /// Parse settings from a JSON preset. Fields that are absent keep their default values.
    pub fn from_json(json: &str) -> Result<Self, ParseSettingsError> {
        let parsed = json.parse::<JsonValue>()?;

        let parsed_map = parsed.get::<HashMap<_, _>>().ok_or_else(|| {
            ParseSettingsError::InvalidSettingType {
                key: "<root>".to_string(),
                expected: "object",
            }
        })?;

        let version = parsed_map
            .get_and_expect::<f64>("version")?
            .ok_or(ParseSettingsError::MissingField { field: "version" })?;
        if version != SETTINGS_VERSION {
            return Err(ParseSettingsError::UnsupportedVersion { version });
        }

        let mut settings = Self::default();
        if let Some(offset) = parsed_map.get_and_expect::<f64>("offset")? {
            if offset < 0.0
                || offset.fract() != 0.0
                || offset > MAX_OFFSET as f64
                || offset > usize::MAX as f64
            {
                return Err(ParseSettingsError::InvalidValue {
                    key: "offset",
                    value: offset,
                });
            }
            settings.offset = offset as usize;
        }

        Ok(settings)
    }

    pub fn to_json(&self) -> JsonValue {
        let mut dst_map = HashMap::<String, JsonValue>::new();
        dst_map.insert("offset".to_string(), JsonValue::Number(self.offset as f64));
        dst_map.insert("version".to_string(), JsonValue::Number(SETTINGS_VERSION));

        JsonValue::Object(dst_map)
    }
}
