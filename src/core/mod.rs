pub mod discovery;
pub mod extension;
pub mod policy;
pub mod registry;

pub use discovery::ComponentDiscoverer;
pub use extension::{ExtensionError, ExtensionHooks, HttpGatewayExtension};
pub use policy::RoutePolicyMatcher;
pub use registry::ComponentRegistry;
