//! The scan command opening every session

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::options::ScanOptions;

/// Session-opening command
///
/// ```text
/// {"scan": true, "options": {"resolution": 400}}
/// ```
///
/// Both keys are optional on the wire. A command lacking either one is a
/// no-op; unknown top-level keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
}

impl ScanCommand {
    /// Command requesting a scan with the given option overrides
    pub fn scan(options: Map<String, Value>) -> Self {
        Self {
            scan: Some(true),
            options: Some(options),
        }
    }

    /// Decode from a JSON message payload
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedCommand`] if the payload is not a
    /// JSON object of the expected shape.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Encode as a JSON message payload
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Resolve the options to scan with, or `None` if no scan was requested
    ///
    /// # Examples
    ///
    /// ```
    /// use scanlink_core::{ScanCommand, ScanOptions};
    ///
    /// let command = ScanCommand::from_payload(br#"{"scan": true, "options": {}}"#).unwrap();
    /// let options = command.resolve(&ScanOptions::default()).unwrap();
    /// assert!(options.is_some());
    ///
    /// let noop = ScanCommand::from_payload(br#"{"scan": true}"#).unwrap();
    /// assert!(noop.resolve(&ScanOptions::default()).unwrap().is_none());
    /// ```
    pub fn resolve(&self, defaults: &ScanOptions) -> Result<Option<ScanOptions>> {
        match (self.scan, &self.options) {
            (Some(true), Some(overrides)) => defaults.merged(overrides).map(Some),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_roundtrip_payload() {
        let mut overrides = Map::new();
        overrides.insert("resolution".into(), json!(400));

        let command = ScanCommand::scan(overrides);
        let payload = command.to_payload().unwrap();
        let decoded = ScanCommand::from_payload(&payload).unwrap();

        assert_eq!(decoded, command);
    }

    #[test]
    fn test_resolve_merges_over_defaults() {
        let command =
            ScanCommand::from_payload(br#"{"scan": true, "options": {"resolution": 400}}"#).unwrap();
        let options = command.resolve(&ScanOptions::default()).unwrap().unwrap();

        assert_eq!(options.resolution, 400);
        assert_eq!(options.blank_skip, 15.0);
    }

    #[test]
    fn test_missing_keys_are_noop() {
        for payload in [
            &br#"{}"#[..],
            &br#"{"options": {}}"#[..],
            &br#"{"scan": true}"#[..],
            &br#"{"scan": false, "options": {}}"#[..],
        ] {
            let command = ScanCommand::from_payload(payload).unwrap();
            assert_eq!(command.resolve(&ScanOptions::default()).unwrap(), None);
        }
    }

    #[test]
    fn test_unknown_fields_tolerated() {
        let command =
            ScanCommand::from_payload(br#"{"scan": true, "options": {}, "client": "oled"}"#).unwrap();
        assert_eq!(command.scan, Some(true));
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(
            ScanCommand::from_payload(b"scan please"),
            Err(Error::MalformedCommand(_))
        ));
        assert!(ScanCommand::from_payload(br#"{"scan": "yes"}"#).is_err());
        assert!(ScanCommand::from_payload(br#"[1, 2]"#).is_err());
    }

    #[test]
    fn test_invalid_option_value() {
        let command =
            ScanCommand::from_payload(br#"{"scan": true, "options": {"resolution": 9000}}"#).unwrap();
        assert!(matches!(
            command.resolve(&ScanOptions::default()),
            Err(Error::InvalidOption { .. })
        ));
    }
}
