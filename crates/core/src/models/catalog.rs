//! Reference data consumed by the allocator

use serde::{Deserialize, Serialize};

use super::ResourceCategory;

pub type ResourceId = i64;

/// A physical bookable room or studio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub category: ResourceCategory,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// One row of the type-compatibility mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compatibility {
    pub shoot_type: String,
    pub resource_id: ResourceId,
    #[serde(default)]
    pub primary: bool,
}

/// Requester directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_true() -> bool {
    true
}
