pub mod api_version;
pub mod policy;

use std::fmt;

pub use api_version::{split_resource_type, ApiVersionResolver};
pub use policy::{FirstListed, StableFirst, VersionPolicy};

/// An API version token, scoped to the provider type it was resolved for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiVersion {
    namespace: String,
    type_name: String,
    version: String,
}

impl ApiVersion {
    pub fn new(namespace: &str, type_name: &str, version: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            type_name: type_name.to_string(),
            version: version.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.version
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.version)
    }
}
