use sea_orm::{ConnectionTrait, TransactionTrait};

use crate::config::Settings;
use crate::db;
use crate::error::SeedResult;
use crate::loader::SeedPlan;
use crate::services::{PermissionService, RoleService, SyncCounts};

/// Progress of a run. Any failure after `Connected` ends in `RolledBack`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncStage {
    #[default]
    NotStarted,
    Loaded,
    Connected,
    PermissionsSynced,
    RolesSynced,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub stage: SyncStage,
    pub dry_run: bool,
    pub permissions: SyncCounts,
    pub roles: SyncCounts,
    pub links: SyncCounts,
}

impl SyncReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    fn advance(&mut self, stage: SyncStage) {
        tracing::debug!(from = ?self.stage, to = ?stage, "sync stage");
        self.stage = stage;
    }

    pub fn rows_created(&self) -> usize {
        self.permissions.created + self.roles.created + self.links.created
    }
}

/// Load the definition file, connect, and reconcile everything in one transaction.
///
/// The connection is closed before returning, whether or not the run succeeded.
pub async fn run(settings: &Settings) -> SeedResult<SyncReport> {
    let mut report = SyncReport::new(settings.dry_run);

    let plan = SeedPlan::load(&settings.rbac_file)?;
    report.advance(SyncStage::Loaded);

    let conn = db::connect(&settings.database).await?;
    report.advance(SyncStage::Connected);

    let result = sync_plan(&conn, &plan, &mut report).await;

    if let Err(e) = conn.close().await {
        tracing::warn!("Failed to close database connection: {}", e);
    }

    result.map(|()| report)
}

/// Run [`reconcile`] inside a transaction that is committed on success and
/// rolled back on failure or when the report is a dry run.
pub async fn sync_plan<C>(db: &C, plan: &SeedPlan, report: &mut SyncReport) -> SeedResult<()>
where
    C: TransactionTrait,
{
    tracing::info!("🌱 Starting RBAC sync...");
    let txn = db.begin().await?;

    match reconcile(&txn, plan, report).await {
        Ok(()) if report.dry_run => {
            txn.rollback().await?;
            report.advance(SyncStage::RolledBack);
            tracing::info!(
                "Dry run: {} row(s) would be created, changes rolled back",
                report.rows_created()
            );
            Ok(())
        }
        Ok(()) => {
            txn.commit().await?;
            report.advance(SyncStage::Committed);
            Ok(())
        }
        Err(e) => {
            tracing::error!(stage = ?report.stage, "RBAC sync failed, rolling back: {}", e);
            if let Err(rollback_err) = txn.rollback().await {
                tracing::warn!("Rollback failed: {}", rollback_err);
            }
            report.advance(SyncStage::RolledBack);
            Err(e)
        }
    }
}

/// Permissions first, then roles and their links, all on the same connection
pub async fn reconcile<C>(db: &C, plan: &SeedPlan, report: &mut SyncReport) -> SeedResult<()>
where
    C: ConnectionTrait,
{
    let permissions = PermissionService::new(db);
    tracing::info!("Processing {} permission(s)...", plan.permissions.len());
    report.permissions = permissions.sync_permissions(&plan.permissions).await?;
    report.advance(SyncStage::PermissionsSynced);

    let roles = RoleService::new(db);
    tracing::info!("Processing {} role(s)...", plan.roles.len());
    let counts = roles.sync_roles(&plan.roles, &permissions).await?;
    report.roles = counts.roles;
    report.links = counts.links;
    report.advance(SyncStage::RolesSynced);

    Ok(())
}
