use pkg_types::limit_range::LimitRange;
use pkg_types::meta::{ObjectKey, Resource};
use pkg_types::namespace::Namespace;
use pkg_types::quota::ResourceQuota;
use pkg_types::rbac::RoleBinding;
use serde::Serialize;
use std::fmt;

/// What to do when a derived object already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Leave the existing object untouched.
    CreateOnly,
    /// Replace it with the desired state on every pass, carrying the
    /// observed resource version.
    Overwrite,
}

/// A kind of object derived from an Environment.
//
// Namespace and LimitRange are never updated while ResourceQuota and
// RoleBinding always are. Whether that asymmetry is intended is an open
// question; it is kept as observed behaviour.
pub trait ChildResource: Resource {
    const UPDATE_POLICY: UpdatePolicy;
}

impl ChildResource for Namespace {
    const UPDATE_POLICY: UpdatePolicy = UpdatePolicy::CreateOnly;
}

impl ChildResource for ResourceQuota {
    const UPDATE_POLICY: UpdatePolicy = UpdatePolicy::Overwrite;
}

impl ChildResource for LimitRange {
    const UPDATE_POLICY: UpdatePolicy = UpdatePolicy::CreateOnly;
}

impl ChildResource for RoleBinding {
    const UPDATE_POLICY: UpdatePolicy = UpdatePolicy::Overwrite;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepOutcome {
    Created,
    /// An update was issued (the store may have found nothing to change).
    Updated,
    /// The object exists and its kind is create-only.
    Unchanged,
    /// A create-only object left by an earlier Environment of the same name
    /// now points at the current one; its content is untouched.
    Adopted,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Created => write!(f, "created"),
            StepOutcome::Updated => write!(f, "updated"),
            StepOutcome::Unchanged => write!(f, "unchanged"),
            StepOutcome::Adopted => write!(f, "adopted"),
        }
    }
}

/// Result of ensuring one derived object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub kind: &'static str,
    pub key: ObjectKey,
    pub outcome: StepOutcome,
}
