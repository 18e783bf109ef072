use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, QueryFilter, Set,
};

use crate::entities::{prelude::*, role, role_permission};
use crate::error::{SeedError, SeedResult};
use crate::loader::RoleDecl;
use crate::services::{Outcome, PermissionService, SyncCounts};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleSyncCounts {
    pub roles: SyncCounts,
    pub links: SyncCounts,
}

pub struct RoleService<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> RoleService<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Insert the role or fetch the existing one by name, returning its id.
    ///
    /// A declared id must agree with whatever the database already holds.
    pub async fn ensure_role(&self, decl: &RoleDecl) -> SeedResult<(i32, Outcome)> {
        if let Some(id) = decl.id {
            if let Some(owner) = Role::find_by_id(id).one(self.db).await? {
                if owner.name != decl.name {
                    return Err(SeedError::Integrity(format!(
                        "role id {} is already used by role '{}', not '{}'",
                        id, owner.name, decl.name
                    )));
                }
            }
        }

        let existing = Role::find()
            .filter(role::Column::Name.eq(decl.name.as_str()))
            .one(self.db)
            .await?;

        if let Some(existing) = existing {
            check_declared_id(decl, &existing)?;
            tracing::debug!("Role already exists: {} (id {})", existing.name, existing.id);
            return Ok((existing.id, Outcome::Unchanged));
        }

        let new_role = role::ActiveModel {
            id: match decl.id {
                Some(id) => Set(id),
                None => NotSet,
            },
            name: Set(decl.name.clone()),
            created_at: Set(Utc::now().into()),
        };

        // ON CONFLICT (name) DO UPDATE so RETURNING yields the row even if
        // the name appeared since the lookup above
        let role = Role::insert(new_role)
            .on_conflict(
                OnConflict::column(role::Column::Name)
                    .update_column(role::Column::Name)
                    .to_owned(),
            )
            .exec_with_returning(self.db)
            .await?;

        check_declared_id(decl, &role)?;
        tracing::info!("✅ Inserted role: {} (id {})", role.name, role.id);

        Ok((role.id, Outcome::Created))
    }

    /// Link a role to a permission unless the pair is already linked
    pub async fn ensure_link(&self, role_id: i32, permission_id: i32) -> SeedResult<Outcome> {
        let existing = RolePermission::find()
            .filter(role_permission::Column::RoleId.eq(role_id))
            .filter(role_permission::Column::PermissionId.eq(permission_id))
            .one(self.db)
            .await?;

        if existing.is_some() {
            return Ok(Outcome::Unchanged);
        }

        let link = role_permission::ActiveModel {
            role_id: Set(role_id),
            permission_id: Set(permission_id),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        link.insert(self.db).await?;

        Ok(Outcome::Created)
    }

    pub async fn sync_roles(
        &self,
        decls: &[RoleDecl],
        permissions: &PermissionService<'_, C>,
    ) -> SeedResult<RoleSyncCounts> {
        let mut counts = RoleSyncCounts::default();

        for decl in decls {
            let (role_id, outcome) = self.ensure_role(decl).await?;
            counts.roles.record(outcome);

            for grant in &decl.grants {
                let permission_id = permissions.resolve(grant).await.map_err(|e| match e {
                    SeedError::Integrity(message) => {
                        SeedError::Integrity(format!("role '{}': {}", decl.name, message))
                    }
                    other => other,
                })?;

                let outcome = self.ensure_link(role_id, permission_id).await?;
                if outcome == Outcome::Created {
                    tracing::info!("✅ Assigned {} to {}", grant, decl.name);
                }
                counts.links.record(outcome);
            }
        }

        tracing::info!(
            "Role sync complete: {} created, {} unchanged; {} link(s) created, {} unchanged",
            counts.roles.created,
            counts.roles.unchanged,
            counts.links.created,
            counts.links.unchanged
        );

        Ok(counts)
    }
}

fn check_declared_id(decl: &RoleDecl, role: &role::Model) -> SeedResult<()> {
    match decl.id {
        Some(id) if id != role.id => Err(SeedError::Integrity(format!(
            "role '{}' exists with id {}, declared as {}",
            role.name, role.id, id
        ))),
        _ => Ok(()),
    }
}
