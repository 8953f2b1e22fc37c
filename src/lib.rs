// Campus - schema-per-tenant provisioning for multi-school deployments
//
// This library re-exports the tenancy engine and the logging facade so
// applications can depend on a single crate.

// Re-export the tenancy engine
pub use campus_tenancy::*;

// Re-export the logging facade
pub use campus_log;
pub use campus_log::{debug, error, info, trace, warn};

// Prelude for common imports
pub mod prelude {
    pub use campus_tenancy::prelude::*;
}
