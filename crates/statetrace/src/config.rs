//! Analyzer configuration.

use serde::Deserialize;

/// Run configuration for the two-pass analyzer.
///
/// Both encodings are opt-in; with neither enabled the analyzer skips
/// classification entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Emit the binary record stream.
    pub raw: bool,
    /// Emit the human-readable record stream.
    pub txt: bool,
    /// First frame (inclusive) to analyze; earlier frames are replayed but
    /// not classified.
    pub start_frame: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encodings_default_off() {
        let config = Config::default();
        assert!(!config.raw);
        assert!(!config.txt);
        assert_eq!(config.start_frame, 0);
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let config: Config = serde_json::from_str(r#"{ "raw": true, "start_frame": 30 }"#).unwrap();
        assert_eq!(
            config,
            Config {
                raw: true,
                txt: false,
                start_frame: 30
            }
        );
    }
}
