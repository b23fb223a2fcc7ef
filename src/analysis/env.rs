//! Environment lookup for analysed series

use crate::series::Labels;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Deployment environment and service a host belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvInfo {
    pub env: String,
    pub service: String,
}

impl EnvInfo {
    pub fn new(env: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            service: service.into(),
        }
    }
}

/// Resolve a series' environment from its `instance` label
///
/// Tries the full instance (`10.0.0.1:9100`) first, then the host part
/// before the port. Unknown hosts report env `unknown` with the instance
/// as the service name.
pub fn resolve_env(labels: &Labels, hosts: &HashMap<String, EnvInfo>) -> EnvInfo {
    let instance = labels.get("instance").map(String::as_str).unwrap_or("");

    if let Some(info) = hosts.get(instance) {
        return info.clone();
    }

    let host = instance.split(':').next().unwrap_or(instance);
    if let Some(info) = hosts.get(host) {
        return info.clone();
    }

    EnvInfo::new("unknown", instance)
}
