//! Cluster configuration

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ClusterError;

/// Role of this instance. Exactly one instance in a deployment is primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceRole {
    #[default]
    Primary,
    Secondary,
}

impl InstanceRole {
    pub fn is_primary(&self) -> bool {
        matches!(self, InstanceRole::Primary)
    }
}

impl fmt::Display for InstanceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceRole::Primary => write!(f, "primary"),
            InstanceRole::Secondary => write!(f, "secondary"),
        }
    }
}

impl FromStr for InstanceRole {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" => Ok(InstanceRole::Primary),
            "secondary" => Ok(InstanceRole::Secondary),
            other => Err(ClusterError::Config(format!("unknown role: {}", other))),
        }
    }
}

/// Cluster configuration
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub role: InstanceRole,
    /// Workers per tier
    pub workers: usize,
    /// Shared REST listener address
    pub rest_addr: String,
    /// Realtime gateway listener address
    pub realtime_addr: String,
    /// Host realtime workers bind their own ports on
    pub worker_host: String,
    /// Where the primary writes the root credential on first bootstrap
    pub credential_path: PathBuf,
    pub enable_cors: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            role: InstanceRole::Primary,
            workers: num_cpus::get(),
            rest_addr: "0.0.0.0:3000".to_string(),
            realtime_addr: "0.0.0.0:3001".to_string(),
            worker_host: "127.0.0.1".to_string(),
            credential_path: PathBuf::from("docket-root.json"),
            enable_cors: true,
        }
    }
}

impl ClusterConfig {
    /// Worker count, never zero
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("primary".parse::<InstanceRole>().unwrap(), InstanceRole::Primary);
        assert_eq!("Secondary".parse::<InstanceRole>().unwrap(), InstanceRole::Secondary);
        assert!("leader".parse::<InstanceRole>().is_err());
    }

    #[test]
    fn test_worker_count_floor() {
        let config = ClusterConfig {
            workers: 0,
            ..ClusterConfig::default()
        };
        assert_eq!(config.worker_count(), 1);
        assert!(ClusterConfig::default().worker_count() >= 1);
    }
}
