//! Static tag descriptions: standalone tags and rigid bundles.
//!
//! The registry is built once at startup and is read-only afterwards; share
//! it between pipelines through an `Arc`.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::warn;
use nalgebra::Isometry3;

use crate::detection::TagId;

/// Validation failures while assembling the registry.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("tag {id}: size must be positive and finite, got {size}")]
    InvalidTagSize { id: TagId, size: f64 },

    #[error("duplicate standalone tag id {id}")]
    DuplicateStandaloneId { id: TagId },

    #[error("bundle {bundle}: member list is empty")]
    EmptyBundle { bundle: String },

    #[error("bundle {bundle}, member {id}: size must be positive and finite, got {size}")]
    InvalidMemberSize { bundle: String, id: TagId, size: f64 },

    #[error("bundle {bundle}, member {id}: invalid pose ({reason})")]
    InvalidMemberPose {
        bundle: String,
        id: TagId,
        reason: &'static str,
    },

    #[error("bundle {bundle}: member id {id} listed more than once")]
    DuplicateMemberId { bundle: String, id: TagId },

    #[error("bundle name {name} is used more than once")]
    DuplicateBundleName { name: String },

    #[error(
        "tag {id}: standalone size {standalone_size} does not match size {member_size} in bundle {bundle}"
    )]
    SizeMismatch {
        id: TagId,
        standalone_size: f64,
        bundle: String,
        member_size: f64,
    },
}

fn valid_size(size: f64) -> bool {
    size.is_finite() && size > 0.0
}

fn sizes_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().max(b.abs())
}

/// A tag whose pose is estimated on its own.
#[derive(Clone, Debug, PartialEq)]
pub struct StandaloneTagDescription {
    pub id: TagId,
    /// Edge length of the black square, meters.
    pub size: f64,
    pub frame_name: String,
}

impl StandaloneTagDescription {
    /// Validate the size; a missing name becomes `tag_<id>`.
    pub fn new(id: TagId, size: f64, frame_name: Option<String>) -> Result<Self, RegistryError> {
        if !valid_size(size) {
            return Err(RegistryError::InvalidTagSize { id, size });
        }
        Ok(Self {
            id,
            size,
            frame_name: frame_name.unwrap_or_else(|| format!("tag_{id}")),
        })
    }
}

/// One tag of a bundle, placed by `offset` (member frame -> bundle frame).
#[derive(Clone, Debug, PartialEq)]
pub struct BundleMember {
    pub id: TagId,
    pub size: f64,
    pub offset: Isometry3<f64>,
}

/// A rigid assembly of tags solved as one object.
#[derive(Clone, Debug, PartialEq)]
pub struct TagBundleDescription {
    name: String,
    members: Vec<BundleMember>,
    index: HashMap<TagId, usize>,
}

impl TagBundleDescription {
    pub fn new(name: impl Into<String>, members: Vec<BundleMember>) -> Result<Self, RegistryError> {
        let name = name.into();
        if members.is_empty() {
            return Err(RegistryError::EmptyBundle { bundle: name });
        }
        let mut index = HashMap::with_capacity(members.len());
        for (i, m) in members.iter().enumerate() {
            if !valid_size(m.size) {
                return Err(RegistryError::InvalidMemberSize {
                    bundle: name,
                    id: m.id,
                    size: m.size,
                });
            }
            let finite = m.offset.translation.vector.iter().all(|v| v.is_finite())
                && m.offset.rotation.coords.iter().all(|v| v.is_finite());
            if !finite {
                return Err(RegistryError::InvalidMemberPose {
                    bundle: name,
                    id: m.id,
                    reason: "non-finite offset",
                });
            }
            if index.insert(m.id, i).is_some() {
                return Err(RegistryError::DuplicateMemberId {
                    bundle: name,
                    id: m.id,
                });
            }
        }
        Ok(Self {
            name,
            members,
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members in configuration order.
    pub fn members(&self) -> &[BundleMember] {
        &self.members
    }

    pub fn member(&self, id: TagId) -> Option<&BundleMember> {
        self.index.get(&id).map(|&i| &self.members[i])
    }

    pub fn contains(&self, id: TagId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn member_ids(&self) -> Vec<TagId> {
        self.members.iter().map(|m| m.id).collect()
    }

    pub fn member_sizes(&self) -> Vec<f64> {
        self.members.iter().map(|m| m.size).collect()
    }
}

/// A bundle that contains a given tag, with that tag's member entry.
#[derive(Clone, Copy, Debug)]
pub struct BundleMembership<'a> {
    /// Position of the bundle in configuration order.
    pub bundle_index: usize,
    pub bundle: &'a TagBundleDescription,
    pub member: &'a BundleMember,
}

#[derive(Clone, Debug, Default)]
pub struct TagRegistry {
    standalone: BTreeMap<TagId, StandaloneTagDescription>,
    bundles: Vec<TagBundleDescription>,
    membership: HashMap<TagId, Vec<usize>>,
}

impl TagRegistry {
    pub fn new(
        standalone: Vec<StandaloneTagDescription>,
        bundles: Vec<TagBundleDescription>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        registry.set_standalone(standalone)?;
        registry.set_bundles(bundles)?;
        Ok(registry)
    }

    /// Replace the standalone tags. On error the registry is unchanged.
    pub fn set_standalone(
        &mut self,
        tags: Vec<StandaloneTagDescription>,
    ) -> Result<(), RegistryError> {
        let mut map = BTreeMap::new();
        for tag in tags {
            if !valid_size(tag.size) {
                return Err(RegistryError::InvalidTagSize {
                    id: tag.id,
                    size: tag.size,
                });
            }
            self.check_size_against_bundles(tag.id, tag.size)?;
            if map.contains_key(&tag.id) {
                return Err(RegistryError::DuplicateStandaloneId { id: tag.id });
            }
            map.insert(tag.id, tag);
        }
        self.standalone = map;
        Ok(())
    }

    /// Replace the bundles. On error the registry is unchanged.
    pub fn set_bundles(&mut self, bundles: Vec<TagBundleDescription>) -> Result<(), RegistryError> {
        let mut names: HashSet<String> = HashSet::with_capacity(bundles.len());
        let mut membership: HashMap<TagId, Vec<usize>> = HashMap::new();
        for (bi, bundle) in bundles.iter().enumerate() {
            if !names.insert(bundle.name.clone()) {
                return Err(RegistryError::DuplicateBundleName {
                    name: bundle.name.clone(),
                });
            }
            for m in &bundle.members {
                if let Some(tag) = self.standalone.get(&m.id) {
                    if !sizes_match(tag.size, m.size) {
                        return Err(RegistryError::SizeMismatch {
                            id: m.id,
                            standalone_size: tag.size,
                            bundle: bundle.name.clone(),
                            member_size: m.size,
                        });
                    }
                }
                membership.entry(m.id).or_default().push(bi);
            }
        }

        let mut shared: Vec<_> = membership.iter().filter(|(_, b)| b.len() > 1).collect();
        shared.sort_by_key(|(id, _)| **id);
        for (id, owners) in shared {
            let names: Vec<&str> = owners.iter().map(|&i| bundles[i].name.as_str()).collect();
            warn!(
                "tag {id} is a member of several bundles ({}); its detections feed all of them",
                names.join(", ")
            );
        }

        self.bundles = bundles;
        self.membership = membership;
        Ok(())
    }

    fn check_size_against_bundles(&self, id: TagId, size: f64) -> Result<(), RegistryError> {
        for m in self.bundles_containing(id) {
            if !sizes_match(size, m.member.size) {
                return Err(RegistryError::SizeMismatch {
                    id,
                    standalone_size: size,
                    bundle: m.bundle.name.clone(),
                    member_size: m.member.size,
                });
            }
        }
        Ok(())
    }

    pub fn lookup_standalone(&self, id: TagId) -> Option<&StandaloneTagDescription> {
        self.standalone.get(&id)
    }

    /// Bundles listing `id` as a member, in configuration order.
    pub fn bundles_containing(&self, id: TagId) -> impl Iterator<Item = BundleMembership<'_>> {
        self.membership
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(move |&bi| {
                let bundle = self.bundles.get(bi)?;
                Some(BundleMembership {
                    bundle_index: bi,
                    bundle,
                    member: bundle.member(id)?,
                })
            })
    }

    /// Standalone tags in ascending id order.
    pub fn standalone_tags(&self) -> impl Iterator<Item = &StandaloneTagDescription> {
        self.standalone.values()
    }

    pub fn bundles(&self) -> &[TagBundleDescription] {
        &self.bundles
    }

    pub fn is_empty(&self) -> bool {
        self.standalone.is_empty() && self.bundles.is_empty()
    }
}
