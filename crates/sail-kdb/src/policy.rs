//! Per-function chunking and retry policies

use std::collections::HashMap;

use crate::config::KdbConfig;

/// How calls to one remote function are split and retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionPolicy {
    /// Keyword arguments eligible for halving, tried in this order
    pub chunk_dims: Vec<String>,

    /// Number of re-attempts allowed after the first failure
    pub max_retries: u32,
}

impl FunctionPolicy {
    pub fn new<I, S>(chunk_dims: I, max_retries: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunk_dims: chunk_dims.into_iter().map(Into::into).collect(),
            max_retries,
        }
    }

    /// Policy with no chunk dimensions
    pub fn retry_only(max_retries: u32) -> Self {
        Self {
            chunk_dims: Vec::new(),
            max_retries,
        }
    }
}

/// Read-only table from function name to policy.
///
/// Built once; share it behind an `Arc` rather than mutating it.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    policies: HashMap<String, FunctionPolicy>,
    default_policy: FunctionPolicy,
}

impl PolicyRegistry {
    pub fn new(policies: HashMap<String, FunctionPolicy>, default_max_retries: u32) -> Self {
        Self {
            policies,
            default_policy: FunctionPolicy::retry_only(default_max_retries),
        }
    }

    /// Build the registry from client configuration
    pub fn from_config(config: &KdbConfig) -> Self {
        let default_max_retries = config.retry.default_max_retries;
        let policies = config
            .functions
            .iter()
            .map(|(name, function)| {
                let policy = FunctionPolicy {
                    chunk_dims: function.chunk_dims.clone(),
                    max_retries: function.max_retries.unwrap_or(default_max_retries),
                };
                (name.clone(), policy)
            })
            .collect();

        Self::new(policies, default_max_retries)
    }

    /// Policy for `function`, or the default policy when it has no entry
    pub fn resolve(&self, function: &str) -> &FunctionPolicy {
        self.policies.get(function).unwrap_or(&self.default_policy)
    }

    pub fn default_policy(&self) -> &FunctionPolicy {
        &self.default_policy
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
