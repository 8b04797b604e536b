//! Stable resource naming and name validation
//!
//! Every declared resource is keyed by a name derived from the stack and a
//! logical name, so repeated builds against the same stack collide on the same
//! identities instead of producing duplicates.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CoreError, Result};

/// Maximum edit distance for "did you mean" suggestions
pub const MAX_SUGGESTION_DISTANCE: usize = 3;

/// DNS-1123 subdomain, as required for Kubernetes object names
static DNS_SUBDOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("valid regex")
});

/// Name prefix for all resources of one component within a stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackNames {
    prefix: String,
}

impl StackNames {
    /// Names for the `component` of `stack`, e.g. `dev` + `networking` -> `dev-networking`
    pub fn new(stack: &str, component: &str) -> Self {
        Self {
            prefix: format!("{}-{}", stack, component),
        }
    }

    /// The component name itself
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `<prefix>-<logical>`
    pub fn name(&self, logical: &str) -> String {
        format!("{}-{}", self.prefix, logical)
    }

    /// `<prefix>-<logical>-<index>`
    pub fn indexed(&self, logical: &str, index: usize) -> String {
        format!("{}-{}-{}", self.prefix, logical, index)
    }
}

/// Validate a Kubernetes object name (DNS-1123 subdomain, max 253 chars)
pub fn validate_object_name(resource: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CoreError::validation(resource, "name must not be empty"));
    }
    if name.len() > 253 {
        return Err(CoreError::validation(
            resource,
            format!("name '{}' exceeds 253 characters", name),
        ));
    }
    if !DNS_SUBDOMAIN.is_match(name) {
        return Err(CoreError::validation(
            resource,
            format!(
                "name '{}' must consist of lower case alphanumeric characters, '-' or '.'",
                name
            ),
        ));
    }
    Ok(())
}

/// Find the closest candidate to `input`, if any is close enough
pub fn closest_match<'a, I>(input: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .map(|candidate| (strsim::levenshtein(input, candidate), candidate))
        .filter(|(distance, _)| *distance > 0 && *distance <= MAX_SUGGESTION_DISTANCE)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_names() {
        let names = StackNames::new("dev", "networking");
        assert_eq!(names.prefix(), "dev-networking");
        assert_eq!(names.name("vpc"), "dev-networking-vpc");
        assert_eq!(names.indexed("public", 2), "dev-networking-public-2");
    }

    #[test]
    fn test_validate_object_name() {
        assert!(validate_object_name("namespace", "flux-system").is_ok());
        assert!(validate_object_name("namespace", "apps.example").is_ok());
        assert!(validate_object_name("namespace", "").is_err());
        assert!(validate_object_name("namespace", "Flux_System").is_err());
        assert!(validate_object_name("namespace", "-leading").is_err());
        assert!(validate_object_name("namespace", &"a".repeat(254)).is_err());
    }

    #[test]
    fn test_closest_match() {
        let candidates = ["dev", "staging", "prod"];
        assert_eq!(closest_match("stagin", candidates), Some("staging".to_string()));
        assert_eq!(closest_match("prd", candidates), Some("prod".to_string()));
        assert_eq!(closest_match("production-eu-west", candidates), None);
        assert_eq!(closest_match("dev", candidates), None);
    }
}
