//! Organization / project / environment scope.

use serde::{Deserialize, Serialize};

use crate::core::validation;
use crate::error::Result;

/// Where a set of secrets lives. One environment key per scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub org: String,
    pub project: String,
    pub env: String,
}

impl Scope {
    /// # Errors
    ///
    /// Returns `ValidationError` if any identifier is empty or contains a
    /// separator (`/` or `:`).
    pub fn new(org: &str, project: &str, env: &str) -> Result<Self> {
        validation::validate_identifier("organization id", org)?;
        validation::validate_identifier("project id", project)?;
        validation::validate_identifier("environment name", env)?;
        Ok(Self {
            org: org.to_string(),
            project: project.to_string(),
            env: env.to_string(),
        })
    }

    /// Identifier deployment tokens are bound to.
    pub fn environment_id(&self) -> String {
        format!("{}/{}", self.project, self.env)
    }

    /// Secret-store name of the cached environment key.
    pub fn cache_key(&self) -> String {
        format!("env:{}:{}:kek", self.project, self.env)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.org, self.project, self.env)
    }
}
