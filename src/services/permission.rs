use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::entities::{permission, prelude::*};
use crate::error::{SeedError, SeedResult};
use crate::loader::{PermissionDecl, PermissionRef};
use crate::services::{Outcome, SyncCounts};

pub struct PermissionService<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> PermissionService<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Insert the permission unless a row with the same `(name, resource, method)` exists.
    /// Existing rows are never modified.
    pub async fn ensure_permission(&self, decl: &PermissionDecl) -> SeedResult<Outcome> {
        let new_permission = permission::ActiveModel {
            name: Set(decl.name.clone()),
            resource: Set(decl.resource.clone()),
            method: Set(decl.method.clone()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        let inserted = Permission::insert(new_permission)
            .on_conflict(
                OnConflict::columns([
                    permission::Column::Name,
                    permission::Column::Resource,
                    permission::Column::Method,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db)
            .await?;

        if inserted == 0 {
            tracing::debug!("Permission already exists: {} on {}", decl.name, decl.resource);
            Ok(Outcome::Unchanged)
        } else {
            tracing::info!("✅ Inserted permission: {} on {}", decl.name, decl.resource);
            Ok(Outcome::Created)
        }
    }

    pub async fn sync_permissions(&self, decls: &[PermissionDecl]) -> SeedResult<SyncCounts> {
        let mut counts = SyncCounts::default();
        for decl in decls {
            counts.record(self.ensure_permission(decl).await?);
        }

        tracing::info!(
            "Permission sync complete: {} created, {} unchanged",
            counts.created,
            counts.unchanged
        );

        Ok(counts)
    }

    /// Find the id of the single permission a role grant refers to.
    ///
    /// No match and more than one match are both integrity errors. A full key
    /// matches at most one row; a bare name can match several.
    pub async fn resolve(&self, reference: &PermissionRef) -> SeedResult<i32> {
        let query = match reference {
            PermissionRef::ByKey {
                name,
                resource,
                method,
            } => Permission::find()
                .filter(permission::Column::Name.eq(name.as_str()))
                .filter(permission::Column::Resource.eq(resource.as_str()))
                .filter(permission::Column::Method.eq(method.as_str())),
            PermissionRef::ByName(name) => {
                Permission::find().filter(permission::Column::Name.eq(name.as_str()))
            }
        };

        let matches = query
            .order_by_asc(permission::Column::Id)
            .limit(2)
            .all(self.db)
            .await?;

        match matches.as_slice() {
            [] => Err(SeedError::Integrity(format!(
                "permission '{}' does not exist",
                reference
            ))),
            [only] => Ok(only.id),
            _ => Err(SeedError::Integrity(format!(
                "permission '{}' matches more than one row",
                reference
            ))),
        }
    }
}
