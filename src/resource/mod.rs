pub mod locator;
pub mod models;

pub use locator::ResourceLocator;
pub use models::{ResourceIdentity, ResourceState};
