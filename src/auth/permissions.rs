use crate::error::LeaveError;
use crate::model::capability::Capability;
use crate::model::role::Role;
use crate::model::user::Caller;
use crate::store::{RecordStore, StoreError};
use std::collections::{HashMap, HashSet};
use strum::IntoEnumIterator;

/// Role -> capability table consulted on every gated operation.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGate {
    grants: HashMap<Role, HashSet<Capability>>,
}

impl PermissionGate {
    pub fn from_defaults() -> Self {
        Self::from_grants(
            Role::iter().flat_map(|role| role.default_capabilities().iter().map(move |cap| (role, *cap))),
        )
    }

    pub fn from_grants(grants: impl IntoIterator<Item = (Role, Capability)>) -> Self {
        let mut table: HashMap<Role, HashSet<Capability>> = HashMap::new();
        for (role, capability) in grants {
            table.entry(role).or_default().insert(capability);
        }
        Self { grants: table }
    }

    /// Loads the grants bootstrap wrote to the store.
    pub async fn load(store: &dyn RecordStore) -> Result<Self, StoreError> {
        Ok(Self::from_grants(store.role_grants().await?))
    }

    pub fn has_permission(&self, caller: &Caller, capability: Capability) -> bool {
        self.role_has(caller.role, capability)
    }

    pub fn role_has(&self, role: Role, capability: Capability) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|caps| caps.contains(&capability))
    }

    pub fn require(&self, caller: &Caller, capability: Capability) -> Result<(), LeaveError> {
        if self.has_permission(caller, capability) {
            return Ok(());
        }

        tracing::warn!(
            user_id = %caller.id,
            role = %caller.role,
            capability = %capability,
            needed = capability.description(),
            "capability check denied"
        );
        Err(LeaveError::Forbidden)
    }
}
