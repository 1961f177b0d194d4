//! # Configuration
//!
//! Two sources:
//!
//! 1. **Site values** (`.env`)
//!    - Domain name, hosted zone, GitHub coordinates, connection ARN
//!    - Read by the template generators
//!
//! 2. **Deploy settings** (`siteform.yaml`, optional)
//!    - Stack names, regions, polling cadence, output directory
//!    - Read by the deployer

mod env;
mod settings;

pub use env::{EnvKey, SiteEnv};
pub use settings::DeploySettings;
