//! runnergrid-config — configuration for the runnergrid autoscaler.
//!
//! The configuration file is YAML. Besides the fixed `autoscaler` and
//! `gitlab` sections, every remaining top-level key is treated as a cloud
//! provider block (`aws`, `azure`, …) carrying a default region and the
//! list of Auto Scaling Groups that provider manages:
//!
//! ```yaml
//! autoscaler:
//!   check-interval: 30
//! aws:
//!   region: eu-central-1
//!   asg-names:
//!     - name: ci-workers-amd64
//!       tags: [amd64, docker]
//!       max-asg-capacity: 10
//!       scale-to-zero: true
//! gitlab:
//!   token: glpat-...
//!   group: my-group
//!   exclude-projects: [sandbox]
//! ```

mod error;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use types::{AsgConfig, AutoscalerConfig, Config, GitlabConfig, ProviderConfig};

use std::path::Path;

/// Load and parse a configuration file.
///
/// Parsing alone does not guarantee a usable configuration; call
/// [`Config::validate`] before acting on the result.
pub fn load(path: &Path) -> ConfigResult<Config> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}
