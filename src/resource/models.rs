use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TagError;
use crate::tags::TagSet;

/// The lookup key for a resource. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    subscription_id: String,
    resource_group: String,
    resource_name: String,
    resource_type: Option<String>,
}

impl ResourceIdentity {
    /// All three fields are required and stored trimmed, whichever path
    /// (flags, prompt or batch row) supplied them.
    pub fn new(
        subscription_id: &str,
        resource_group: &str,
        resource_name: &str,
    ) -> Result<Self, TagError> {
        for (field, value) in [
            ("subscription id", subscription_id),
            ("resource group", resource_group),
            ("resource name", resource_name),
        ] {
            if value.trim().is_empty() {
                return Err(TagError::InvalidInput(format!("{} must not be empty", field)));
            }
        }

        Ok(Self {
            subscription_id: subscription_id.trim().to_string(),
            resource_group: resource_group.trim().to_string(),
            resource_name: resource_name.trim().to_string(),
            resource_type: None,
        })
    }

    /// Narrow the lookup to an exact provider-qualified type
    /// (e.g. `Microsoft.Storage/storageAccounts`). Blank means "any type".
    pub fn with_type(mut self, resource_type: Option<&str>) -> Self {
        self.resource_type = resource_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        self
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    /// Key used to serialize operations against the same resource. The type
    /// filter is left out so typed and untyped requests for one name collide.
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.subscription_id, self.resource_group, self.resource_name
        )
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.resource_name)?;
        if let Some(t) = &self.resource_type {
            write!(f, " of type '{}'", t)?;
        }
        write!(
            f,
            " in resource group '{}' (subscription '{}')",
            self.resource_group, self.subscription_id
        )
    }
}

/// A provider-side resource snapshot, as returned by a generic resource
/// listing. Carries everything needed to send an update back without
/// dropping unrelated fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: TagSet,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub properties: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<serde_json::Value>,
}

impl ResourceState {
    pub fn new(id: &str, name: &str, resource_type: &str, location: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            resource_type: resource_type.to_string(),
            location: location.to_string(),
            tags: TagSet::new(),
            properties: serde_json::Value::Null,
            sku: None,
        }
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    /// Whether this entry satisfies a lookup: exact name, and exact type when
    /// the identity names one.
    pub fn matches(&self, identity: &ResourceIdentity) -> bool {
        self.name == identity.resource_name()
            && identity
                .resource_type()
                .map(|t| t == self.resource_type)
                .unwrap_or(true)
    }
}

/// ARM returns `"tags": null` for untagged resources.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
