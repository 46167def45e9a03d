use crate::auth::password::hash_password;
use crate::auth::permissions::PermissionGate;
use crate::config::SuperUserSeed;
use crate::model::role::Role;
use crate::model::user::NewUser;
use crate::store::{RecordStore, StoreError, USER_USERNAME};
use anyhow::{Context, anyhow};
use strum::IntoEnumIterator;

/// Writes the default role grants, makes sure the seed super user exists and
/// loads the permission gate. Safe to run on every start.
pub async fn run(store: &dyn RecordStore, seed: Option<&SuperUserSeed>) -> anyhow::Result<PermissionGate> {
    for role in Role::iter() {
        store
            .sync_role_grants(role, role.default_capabilities())
            .await
            .with_context(|| format!("syncing grants for role {role}"))?;
    }

    if let Some(seed) = seed {
        ensure_super_user(store, seed).await?;
    }

    let gate = PermissionGate::load(store)
        .await
        .context("loading role grants")?;
    tracing::info!("bootstrap complete");
    Ok(gate)
}

async fn ensure_super_user(store: &dyn RecordStore, seed: &SuperUserSeed) -> anyhow::Result<()> {
    if let Some(existing) = store.find_user_by_username(&seed.username).await? {
        if existing.role != Role::Super {
            tracing::warn!(
                username = %existing.username,
                role = %existing.role,
                "bootstrap super username belongs to a non-super account"
            );
        }
        return Ok(());
    }

    let password = hash_password(&seed.password).map_err(|e| anyhow!("hashing seed password: {e}"))?;
    let new_user = NewUser {
        username: seed.username.trim().to_string(),
        password,
        role: Role::Super,
    };

    match store.insert_user(new_user).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "seeded super user");
            Ok(())
        }
        // another instance seeded it first
        Err(StoreError::UniqueViolation(USER_USERNAME)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
