//! Domain registry: immutable lookup from request origin to domain policy.

use thiserror::Error;
use warden_common::DomainPolicy;

/// Structural configuration problems detected at startup
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("domain entry #{0} has an empty name")]
    EmptyName(usize),

    #[error("domain {name}: score threshold {threshold} is outside [0, 1]")]
    ThresholdOutOfRange { name: String, threshold: f64 },
}

/// Registered domains in configuration order
///
/// Built once at startup and shared read-only between requests.
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    policies: Vec<DomainPolicy>,
}

impl DomainRegistry {
    /// Build the registry, rejecting entries that could never match sensibly
    pub fn new(policies: Vec<DomainPolicy>) -> Result<Self, RegistryError> {
        for (idx, policy) in policies.iter().enumerate() {
            // An empty name is a suffix of every origin.
            if policy.name.trim().is_empty() {
                return Err(RegistryError::EmptyName(idx));
            }

            if let Some(threshold) = policy.score_threshold {
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(RegistryError::ThresholdOutOfRange {
                        name: policy.name.clone(),
                        threshold,
                    });
                }
            }

            if policies[..idx].iter().any(|p| p.name == policy.name) {
                tracing::warn!(
                    domain = %policy.name,
                    "Duplicate domain entry; the first registration takes precedence"
                );
            }
        }

        Ok(Self { policies })
    }

    /// First policy whose name is a suffix of `origin`
    pub fn find_policy(&self, origin: &str) -> Option<&DomainPolicy> {
        if origin.is_empty() {
            return None;
        }
        self.policies.iter().find(|p| origin.ends_with(&p.name))
    }

    /// Registered names, in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
