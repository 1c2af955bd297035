//! Static per-field metadata for record types.
//!
//! Each record type describes, once, how changes to its fields take effect.
//! The table is captured when the type is registered and queried by field
//! name afterwards.

use std::collections::HashMap;

/// How a change to a field reaches the running system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatePolicy {
    /// Applied immediately by consumers subscribed to change events
    HotUpdate,
    /// Only takes effect after the owning component restarts
    RequiresRestart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCapability {
    pub field: &'static str,
    pub policy: UpdatePolicy,
    pub description: &'static str,
}

/// Lookup table from field name to [`FieldCapability`]
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    fields: HashMap<&'static str, FieldCapability>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field entry, replacing any previous one with the same name
    pub fn with(
        mut self,
        field: &'static str,
        policy: UpdatePolicy,
        description: &'static str,
    ) -> Self {
        self.fields.insert(
            field,
            FieldCapability {
                field,
                policy,
                description,
            },
        );
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldCapability> {
        self.fields.get(field)
    }

    /// Policy for `field`; unknown fields default to hot update
    pub fn policy(&self, field: &str) -> UpdatePolicy {
        self.get(field)
            .map(|c| c.policy)
            .unwrap_or(UpdatePolicy::HotUpdate)
    }

    /// Fields among `changed` whose change needs a restart
    pub fn restart_required<'a>(&self, changed: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        changed
            .into_iter()
            .filter(|f| self.policy(f) == UpdatePolicy::RequiresRestart)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_lookup() {
        let table = CapabilityTable::new()
            .with("baudRate", UpdatePolicy::RequiresRestart, "serial speed")
            .with("label", UpdatePolicy::HotUpdate, "display label");

        assert_eq!(table.policy("baudRate"), UpdatePolicy::RequiresRestart);
        assert_eq!(table.policy("label"), UpdatePolicy::HotUpdate);
        assert_eq!(table.policy("unknown"), UpdatePolicy::HotUpdate);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_restart_required_filters_fields() {
        let table = CapabilityTable::new().with("port", UpdatePolicy::RequiresRestart, "");
        assert_eq!(table.restart_required(["port", "name"]), vec!["port"]);
    }
}
