//! JSON detector configuration.
//!
//! The tag sections are kept as raw JSON and parsed one at a time so a broken
//! `tag_bundles` list does not take the standalone tags down with it.

use std::fs;
use std::path::Path;

use log::{error, info, warn};
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tagpose_pnp::{IterativePnpParams, PnpError};

use crate::decoder::DecodeError;
use crate::detection::TagId;
use crate::family::{DecoderSettings, TagFamily};
use crate::registry::{
    BundleMember, RegistryError, StandaloneTagDescription, TagBundleDescription, TagRegistry,
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("malformed {section} section: {source}")]
    MalformedSection {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("unknown tag family {0:?}")]
    UnknownFamily(String),

    #[error("no decoder registered for tag family {0}")]
    UnsupportedFamily(TagFamily),

    #[error("decoder construction failed: {0}")]
    DecoderInit(#[source] DecodeError),

    #[error("solver section: {0}")]
    InvalidSolver(#[source] PnpError),
}

pub const STANDALONE_SECTION: &str = "standalone_tags";
pub const BUNDLE_SECTION: &str = "tag_bundles";

fn default_one() -> f64 {
    1.0
}

/// `standalone_tags` entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StandaloneTagEntry {
    pub id: TagId,
    pub size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One member of a `tag_bundles[].layout` list: member pose in the bundle
/// frame as position plus (not necessarily normalized) quaternion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleMemberEntry {
    pub id: TagId,
    pub size: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "default_one")]
    pub qw: f64,
    #[serde(default)]
    pub qx: f64,
    #[serde(default)]
    pub qy: f64,
    #[serde(default)]
    pub qz: f64,
}

impl BundleMemberEntry {
    /// Member at `(x, y, z)` with identity orientation.
    pub fn at(id: TagId, size: f64, x: f64, y: f64, z: f64) -> Self {
        Self {
            id,
            size,
            x,
            y,
            z,
            qw: 1.0,
            qx: 0.0,
            qy: 0.0,
            qz: 0.0,
        }
    }

    fn to_member(&self, bundle: &str) -> Result<BundleMember, RegistryError> {
        let invalid = |reason| RegistryError::InvalidMemberPose {
            bundle: bundle.to_string(),
            id: self.id,
            reason,
        };
        let q = Quaternion::new(self.qw, self.qx, self.qy, self.qz);
        if !q.coords.iter().all(|v| v.is_finite()) {
            return Err(invalid("non-finite quaternion"));
        }
        let rotation = UnitQuaternion::try_new(q, 1e-12).ok_or_else(|| invalid("zero quaternion"))?;
        Ok(BundleMember {
            id: self.id,
            size: self.size,
            offset: Isometry3::from_parts(
                Translation3::from(Vector3::new(self.x, self.y, self.z)),
                rotation,
            ),
        })
    }
}

/// `tag_bundles` entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagBundleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub layout: Vec<BundleMemberEntry>,
}

/// Result of building a registry: whatever loaded, plus the per-section errors.
#[derive(Debug)]
pub struct RegistryLoad {
    pub registry: TagRegistry,
    pub errors: Vec<ConfigError>,
}

impl RegistryLoad {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Top-level detector configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub tag_family: TagFamily,
    pub decoder: DecoderSettings,
    /// Broadcast one camera -> tag transform per detection.
    pub publish_tf: bool,
    pub camera_frame: String,
    pub unknown_tag_warn_interval_s: f64,
    pub solver: IterativePnpParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standalone_tags: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_bundles: Option<serde_json::Value>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            tag_family: TagFamily::default(),
            decoder: DecoderSettings::default(),
            publish_tf: false,
            camera_frame: "camera".to_string(),
            unknown_tag_warn_interval_s: 10.0,
            solver: IterativePnpParams::default(),
            standalone_tags: None,
            tag_bundles: None,
        }
    }
}

impl DetectorConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse a JSON config. Solver parameters are checked here so a bad
    /// `solver` section fails at load time instead of on every frame.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.solver.validate().map_err(ConfigError::InvalidSolver)?;
        Ok(config)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn set_standalone_tags(&mut self, tags: &[StandaloneTagEntry]) -> Result<(), ConfigError> {
        self.standalone_tags = Some(serde_json::to_value(tags)?);
        Ok(())
    }

    pub fn set_tag_bundles(&mut self, bundles: &[TagBundleEntry]) -> Result<(), ConfigError> {
        self.tag_bundles = Some(serde_json::to_value(bundles)?);
        Ok(())
    }

    /// Parse the standalone section. `Ok(None)` when it is absent.
    pub fn parse_standalone_tags(
        &self,
    ) -> Result<Option<Vec<StandaloneTagDescription>>, ConfigError> {
        let Some(value) = &self.standalone_tags else {
            return Ok(None);
        };
        let entries: Vec<StandaloneTagEntry> = Vec::deserialize(value).map_err(|source| {
            ConfigError::MalformedSection {
                section: STANDALONE_SECTION,
                source,
            }
        })?;
        let tags = entries
            .into_iter()
            .map(|e| StandaloneTagDescription::new(e.id, e.size, e.name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(tags))
    }

    /// Parse the bundle section. `Ok(None)` when it is absent.
    pub fn parse_tag_bundles(&self) -> Result<Option<Vec<TagBundleDescription>>, ConfigError> {
        let Some(value) = &self.tag_bundles else {
            return Ok(None);
        };
        let entries: Vec<TagBundleEntry> =
            Vec::deserialize(value).map_err(|source| ConfigError::MalformedSection {
                section: BUNDLE_SECTION,
                source,
            })?;
        let mut bundles = Vec::with_capacity(entries.len());
        for (i, entry) in entries.into_iter().enumerate() {
            let name = entry.name.unwrap_or_else(|| format!("bundle_{i}"));
            let members = entry
                .layout
                .iter()
                .map(|m| m.to_member(&name))
                .collect::<Result<Vec<_>, _>>()?;
            bundles.push(TagBundleDescription::new(name, members)?);
        }
        Ok(Some(bundles))
    }

    /// Build the registry section by section. A failing section is left
    /// empty and its error is logged and returned alongside the registry.
    pub fn build_registry(&self) -> RegistryLoad {
        let mut registry = TagRegistry::default();
        let mut errors = Vec::new();

        let standalone = self
            .parse_standalone_tags()
            .and_then(|tags| match tags {
                Some(tags) => {
                    let count = tags.len();
                    registry.set_standalone(tags)?;
                    info!("loaded {count} standalone tag(s)");
                    Ok(())
                }
                None => {
                    warn!("no standalone tags specified");
                    Ok(())
                }
            });
        if let Err(e) = standalone {
            error!("could not load {STANDALONE_SECTION}: {e}");
            errors.push(e);
        }

        let bundles = self.parse_tag_bundles().and_then(|bundles| match bundles {
            Some(bundles) => {
                let count = bundles.len();
                registry.set_bundles(bundles)?;
                info!("loaded {count} tag bundle(s)");
                Ok(())
            }
            None => {
                warn!("no tag bundles specified");
                Ok(())
            }
        });
        if let Err(e) = bundles {
            error!("could not load {BUNDLE_SECTION}: {e}");
            errors.push(e);
        }

        RegistryLoad { registry, errors }
    }
}
