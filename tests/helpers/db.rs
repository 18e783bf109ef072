use migration::MigratorTrait;
use rbac_seed::entities::{permission, prelude::*, role, role_permission};
use sea_orm::{Database, DatabaseConnection, EntityTrait, QueryOrder};
use tempfile::NamedTempFile;

/// Test database with automatic cleanup
pub struct TestDb {
    connection: DatabaseConnection,
    url: String,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with the RBAC tables in place
    pub async fn new() -> Self {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let url = format!("sqlite://{}?mode=rwc", db_path);

        let connection = Database::connect(&url)
            .await
            .expect("Failed to connect to test database");

        migration::Migrator::up(&connection, None)
            .await
            .expect("Failed to run migrations");

        Self {
            connection,
            url,
            _temp_file: temp_file,
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Table contents without timestamps, ordered by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub permissions: Vec<(i32, String, String, String)>,
    pub roles: Vec<(i32, String)>,
    pub links: Vec<(i32, i32)>,
}

pub async fn snapshot(db: &DatabaseConnection) -> Snapshot {
    let permissions = Permission::find()
        .order_by_asc(permission::Column::Id)
        .all(db)
        .await
        .expect("Failed to read permissions")
        .into_iter()
        .map(|p| (p.id, p.name, p.resource, p.method))
        .collect();

    let roles = Role::find()
        .order_by_asc(role::Column::Id)
        .all(db)
        .await
        .expect("Failed to read roles")
        .into_iter()
        .map(|r| (r.id, r.name))
        .collect();

    let links = RolePermission::find()
        .order_by_asc(role_permission::Column::RoleId)
        .order_by_asc(role_permission::Column::PermissionId)
        .all(db)
        .await
        .expect("Failed to read role permissions")
        .into_iter()
        .map(|l| (l.role_id, l.permission_id))
        .collect();

    Snapshot {
        permissions,
        roles,
        links,
    }
}
