//! Sound definition table
//!
//! Only used to check that animation sound effects reference something the
//! host can play. Playback itself is up to the host.

use crate::error::Result;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SoundDefinition {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sounds: Vec<SoundEntry>,
}

/// A sound file, either as a bare path or with playback settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SoundEntry {
    Path(String),
    Detailed {
        name: String,
        #[serde(default = "one")]
        volume: f32,
        #[serde(default = "one")]
        pitch: f32,
    },
}

fn one() -> f32 {
    1.0
}

impl SoundEntry {
    pub fn path(&self) -> &str {
        match self {
            SoundEntry::Path(name) | SoundEntry::Detailed { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SoundDefinitions {
    #[serde(default)]
    pub format_version: Option<String>,
    #[serde(default)]
    pub sound_definitions: BTreeMap<String, SoundDefinition>,
}

impl SoundDefinitions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sound_definitions.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&SoundDefinition> {
        self.sound_definitions.get(name)
    }

    pub fn len(&self) -> usize {
        self.sound_definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sound_definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sound_definitions() {
        let json = r#"{
            "format_version": "1.14.0",
            "sound_definitions": {
                "wings.flap": { "category": "player", "sounds": ["sounds/flap1", { "name": "sounds/flap2", "pitch": 1.2 }] }
            }
        }"#;
        let sounds = SoundDefinitions::from_json(json).unwrap();
        assert!(sounds.contains("wings.flap"));
        assert!(!sounds.contains("wings.fold"));
        let flap = sounds.get("wings.flap").unwrap();
        assert_eq!(flap.sounds[1].path(), "sounds/flap2");
        assert!(matches!(flap.sounds[1], SoundEntry::Detailed { volume, .. } if volume == 1.0));
    }
}
