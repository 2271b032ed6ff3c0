//! Supported tag families and the decoder constructor table.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::decoder::{DecodeError, TagDecoder};

/// Closed set of supported tag families.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TagFamily {
    #[default]
    Tag36h11,
    Tag36h10,
    Tag25h9,
    Tag25h7,
    Tag16h5,
}

impl TagFamily {
    pub const ALL: [TagFamily; 5] = [
        TagFamily::Tag36h11,
        TagFamily::Tag36h10,
        TagFamily::Tag25h9,
        TagFamily::Tag25h7,
        TagFamily::Tag16h5,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TagFamily::Tag36h11 => "tag36h11",
            TagFamily::Tag36h10 => "tag36h10",
            TagFamily::Tag25h9 => "tag25h9",
            TagFamily::Tag25h7 => "tag25h7",
            TagFamily::Tag16h5 => "tag16h5",
        }
    }

    /// Payload bits per tag.
    pub fn bits(self) -> u32 {
        match self {
            TagFamily::Tag36h11 | TagFamily::Tag36h10 => 36,
            TagFamily::Tag25h9 | TagFamily::Tag25h7 => 25,
            TagFamily::Tag16h5 => 16,
        }
    }

    /// Minimum Hamming distance between two codes of the family.
    pub fn min_hamming(self) -> u32 {
        match self {
            TagFamily::Tag36h11 => 11,
            TagFamily::Tag36h10 => 10,
            TagFamily::Tag25h9 => 9,
            TagFamily::Tag25h7 => 7,
            TagFamily::Tag16h5 => 5,
        }
    }
}

impl fmt::Display for TagFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TagFamily {
    type Err = ConfigError;

    /// Accepts both `tag36h11` and the short `36h11` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let short = trimmed.strip_prefix("tag").unwrap_or(trimmed);
        TagFamily::ALL
            .into_iter()
            .find(|f| &f.name()[3..] == short)
            .ok_or_else(|| ConfigError::UnknownFamily(s.to_string()))
    }
}

impl TryFrom<String> for TagFamily {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TagFamily> for String {
    fn from(f: TagFamily) -> Self {
        f.name().to_string()
    }
}

/// Tuning handed verbatim to the decoder constructor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderSettings {
    /// Width of the black border in bits.
    pub border: u32,
    pub threads: usize,
    /// Input decimation factor for quad detection.
    pub decimate: f64,
    /// Gaussian blur sigma; zero disables.
    pub blur: f64,
    pub refine_edges: bool,
    pub refine_decode: bool,
    pub refine_pose: bool,
    pub debug: bool,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            border: 1,
            threads: 4,
            decimate: 1.0,
            blur: 0.0,
            refine_edges: true,
            refine_decode: false,
            refine_pose: false,
            debug: false,
        }
    }
}

/// Builds a decoder for one family. The decoder owns its native resources
/// and releases them on drop.
pub type DecoderConstructor =
    fn(TagFamily, &DecoderSettings) -> Result<Box<dyn TagDecoder + Send>, DecodeError>;

/// Family -> decoder constructor, resolved once when a pipeline is built.
#[derive(Clone, Debug, Default)]
pub struct DecoderTable {
    constructors: HashMap<TagFamily, DecoderConstructor>,
}

impl DecoderTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, family: TagFamily, constructor: DecoderConstructor) -> &mut Self {
        self.constructors.insert(family, constructor);
        self
    }

    /// Register one constructor for every family.
    pub fn register_all(&mut self, constructor: DecoderConstructor) -> &mut Self {
        for family in TagFamily::ALL {
            self.register(family, constructor);
        }
        self
    }

    pub fn supports(&self, family: TagFamily) -> bool {
        self.constructors.contains_key(&family)
    }

    pub fn build(
        &self,
        family: TagFamily,
        settings: &DecoderSettings,
    ) -> Result<Box<dyn TagDecoder + Send>, ConfigError> {
        let constructor = self
            .constructors
            .get(&family)
            .ok_or(ConfigError::UnsupportedFamily(family))?;
        constructor(family, settings).map_err(ConfigError::DecoderInit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::ReplayDecoder;

    #[test]
    fn family_names_round_trip() {
        for family in TagFamily::ALL {
            assert_eq!(family.name().parse::<TagFamily>().expect("parse"), family);
        }
        assert_eq!("25h7".parse::<TagFamily>().expect("short"), TagFamily::Tag25h7);
    }

    #[test]
    fn unknown_family_is_a_config_error() {
        assert!(matches!(
            "tag99h1".parse::<TagFamily>(),
            Err(ConfigError::UnknownFamily(name)) if name == "tag99h1"
        ));
        assert!(serde_json::from_str::<TagFamily>("\"circle21h7\"").is_err());
    }

    #[test]
    fn family_serializes_as_name() {
        let json = serde_json::to_string(&TagFamily::Tag16h5).expect("json");
        assert_eq!(json, "\"tag16h5\"");
        assert_eq!(TagFamily::Tag16h5.bits(), 16);
        assert_eq!(TagFamily::Tag16h5.min_hamming(), 5);
    }

    #[test]
    fn decoder_settings_defaults_fill_missing_fields() {
        let settings: DecoderSettings =
            serde_json::from_str(r#"{ "threads": 2, "blur": 0.8 }"#).expect("json");
        assert_eq!(settings.threads, 2);
        assert_eq!(settings.border, 1);
        assert!(settings.refine_edges);
        assert!(!settings.refine_pose);
    }

    #[test]
    fn table_rejects_unregistered_family() {
        let mut table = DecoderTable::new();
        table.register(TagFamily::Tag36h11, ReplayDecoder::boxed);

        let decoder = table
            .build(TagFamily::Tag36h11, &DecoderSettings::default())
            .expect("registered");
        assert_eq!(decoder.family(), TagFamily::Tag36h11);

        assert!(matches!(
            table.build(TagFamily::Tag16h5, &DecoderSettings::default()),
            Err(ConfigError::UnsupportedFamily(TagFamily::Tag16h5))
        ));
    }
}
