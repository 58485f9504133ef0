use crate::error::{AccessError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tributary_types::{Principal, RoleId};

/// Mapping of `(role, principal) -> bool` with `DEFAULT_ADMIN` gating all
/// grants and revocations. A single gate instance is shared by every
/// component of the engine.
pub struct RolesGate {
    grants: Arc<RwLock<HashMap<RoleId, HashSet<Principal>>>>,
}

impl RolesGate {
    /// Create a gate with `root_admin` holding `DEFAULT_ADMIN`. Without a
    /// seeded admin no role could ever be granted.
    pub fn new(root_admin: Principal) -> Self {
        let mut grants: HashMap<RoleId, HashSet<Principal>> = HashMap::new();
        grants
            .entry(RoleId::default_admin())
            .or_default()
            .insert(root_admin);

        Self {
            grants: Arc::new(RwLock::new(grants)),
        }
    }

    pub async fn has(&self, role: RoleId, principal: Principal) -> bool {
        let grants = self.grants.read().await;
        grants
            .get(&role)
            .map(|holders| holders.contains(&principal))
            .unwrap_or(false)
    }

    /// Fail with `MissingRole` unless `principal` holds `role`.
    pub async fn require(&self, role: RoleId, principal: Principal) -> Result<()> {
        if self.has(role, principal).await {
            Ok(())
        } else {
            Err(AccessError::MissingRole { role, principal })
        }
    }

    pub async fn grant(&self, caller: Principal, role: RoleId, principal: Principal) -> Result<()> {
        self.require(RoleId::default_admin(), caller).await?;

        let mut grants = self.grants.write().await;
        let inserted = grants.entry(role).or_default().insert(principal);
        if inserted {
            info!(%role, %principal, granted_by = %caller, "Role granted");
        }
        Ok(())
    }

    pub async fn revoke(&self, caller: Principal, role: RoleId, principal: Principal) -> Result<()> {
        self.require(RoleId::default_admin(), caller).await?;

        let mut grants = self.grants.write().await;
        if let Some(holders) = grants.get_mut(&role) {
            if holders.remove(&principal) {
                info!(%role, %principal, revoked_by = %caller, "Role revoked");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Principal {
        Principal::from_bytes([1; 20])
    }

    #[tokio::test]
    async fn test_root_admin_is_seeded() {
        let gate = RolesGate::new(admin());
        assert!(gate.has(RoleId::default_admin(), admin()).await);
    }

    #[tokio::test]
    async fn test_grant_requires_admin() {
        let gate = RolesGate::new(admin());
        let outsider = Principal::from_bytes([2; 20]);
        let target = Principal::from_bytes([3; 20]);

        let err = gate.grant(outsider, RoleId::arbiter(), target).await.unwrap_err();
        assert!(matches!(err, AccessError::MissingRole { .. }));

        gate.grant(admin(), RoleId::arbiter(), target).await.unwrap();
        assert!(gate.has(RoleId::arbiter(), target).await);
    }

    #[tokio::test]
    async fn test_revoke_removes_grant() {
        let gate = RolesGate::new(admin());
        let target = Principal::from_bytes([3; 20]);

        gate.grant(admin(), RoleId::pauser(), target).await.unwrap();
        gate.revoke(admin(), RoleId::pauser(), target).await.unwrap();
        assert!(!gate.has(RoleId::pauser(), target).await);

        assert!(gate.require(RoleId::pauser(), target).await.is_err());
    }
}
