use crate::error::{AccessError, Result};
use crate::roles::RolesGate;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use tributary_types::{EngineEvent, EventSink, Principal, RoleId};

/// Per-component pause switch toggled by `PAUSER`. Every mutating entry
/// point of the owning component calls `ensure_active` first.
pub struct PauseFlag {
    component: &'static str,
    paused: Arc<RwLock<bool>>,
    roles: Arc<RolesGate>,
    events: EventSink,
}

impl PauseFlag {
    pub fn new(component: &'static str, roles: Arc<RolesGate>, events: EventSink) -> Self {
        Self {
            component,
            paused: Arc::new(RwLock::new(false)),
            roles,
            events,
        }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub async fn is_paused(&self) -> bool {
        *self.paused.read().await
    }

    pub async fn ensure_active(&self) -> Result<()> {
        if *self.paused.read().await {
            Err(AccessError::Paused(self.component.to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn pause(&self, caller: Principal) -> Result<()> {
        self.roles.require(RoleId::pauser(), caller).await?;

        let mut paused = self.paused.write().await;
        if *paused {
            return Err(AccessError::Paused(self.component.to_string()));
        }
        *paused = true;
        drop(paused);

        warn!(component = self.component, by = %caller, "Component paused");
        self.events
            .emit(EngineEvent::Paused {
                component: self.component.to_string(),
                by: caller,
            })
            .await;
        Ok(())
    }

    pub async fn unpause(&self, caller: Principal) -> Result<()> {
        self.roles.require(RoleId::pauser(), caller).await?;

        let mut paused = self.paused.write().await;
        if !*paused {
            return Err(AccessError::NotPaused(self.component.to_string()));
        }
        *paused = false;
        drop(paused);

        warn!(component = self.component, by = %caller, "Component unpaused");
        self.events
            .emit(EngineEvent::Unpaused {
                component: self.component.to_string(),
                by: caller,
            })
            .await;
        Ok(())
    }
}
