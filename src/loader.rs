//! Reads the declarative RBAC document and turns it into a [`SeedPlan`].
//!
//! Two document layouts are accepted and adapted into the same plan:
//!
//! ```yaml
//! # resource layout
//! resources:
//!   - path: /users
//!     methods: [{ name: read_users }]
//! roles:
//!   - name: admin
//!     permissions: [{ resource: /users, methods: [read_users] }]
//! ```
//!
//! ```yaml
//! # permission layout
//! permissions:
//!   - { name: read_users, resource: /users, method: [GET] }
//! roles:
//!   - { id: 1, name: admin, permissions: [read_users] }
//! ```
//!
//! A document carrying both `resources` and `permissions` is rejected rather
//! than merged.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::{SeedError, SeedResult};

/// Which layout the document was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    Resources,
    Permissions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDecl {
    pub name: String,
    pub resource: String,
    /// `''` or a JSON array of sorted, unique method names
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionRef {
    /// Exact `(name, resource, method)` key
    ByKey {
        name: String,
        resource: String,
        method: String,
    },
    /// Name only, for permissions the document does not declare itself
    ByName(String),
}

impl std::fmt::Display for PermissionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionRef::ByKey {
                name,
                resource,
                method,
            } if method.is_empty() => write!(f, "{} on {}", name, resource),
            PermissionRef::ByKey {
                name,
                resource,
                method,
            } => write!(f, "{} on {} {}", name, resource, method),
            PermissionRef::ByName(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDecl {
    /// Externally supplied identifier, permission layout only
    pub id: Option<i32>,
    pub name: String,
    pub grants: Vec<PermissionRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedPlan {
    shape: DocumentShape,
    pub permissions: Vec<PermissionDecl>,
    pub roles: Vec<RoleDecl>,
}

#[derive(Debug, Deserialize)]
struct ResourcesDocument {
    resources: Vec<ResourceEntry>,
    #[serde(default)]
    roles: Vec<ResourceRoleEntry>,
}

#[derive(Debug, Deserialize)]
struct ResourceEntry {
    path: String,
    #[serde(default)]
    methods: Vec<MethodEntry>,
}

#[derive(Debug, Deserialize)]
struct MethodEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResourceRoleEntry {
    name: String,
    #[serde(default)]
    permissions: Vec<ResourceGrant>,
}

#[derive(Debug, Deserialize)]
struct ResourceGrant {
    resource: String,
    #[serde(default)]
    methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PermissionsDocument {
    permissions: Vec<PermissionEntry>,
    #[serde(default)]
    roles: Vec<NamedRoleEntry>,
}

#[derive(Debug, Deserialize)]
struct PermissionEntry {
    name: String,
    resource: String,
    #[serde(default)]
    method: Option<MethodSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MethodSpec {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct NamedRoleEntry {
    #[serde(default)]
    id: Option<i32>,
    name: String,
    #[serde(default)]
    permissions: Vec<String>,
}

impl SeedPlan {
    /// Load and adapt a document from disk
    pub fn load(path: impl AsRef<Path>) -> SeedResult<Self> {
        let path = path.as_ref();
        tracing::info!("Loading RBAC definitions from {}", path.display());

        let content = fs::read_to_string(path).map_err(|e| SeedError::parse(path, e))?;
        Self::parse(&content, path)
    }

    pub fn from_yaml_str(content: &str) -> SeedResult<Self> {
        Self::parse(content, Path::new("<inline>"))
    }

    pub fn shape(&self) -> DocumentShape {
        self.shape
    }

    fn parse(content: &str, path: &Path) -> SeedResult<Self> {
        let document: Value =
            serde_yaml::from_str(content).map_err(|e| SeedError::parse(path, e))?;

        let Value::Mapping(ref top) = document else {
            return Err(SeedError::parse(path, "expected a mapping at the top level"));
        };

        let has_resources = top.contains_key("resources");
        let has_permissions = top.contains_key("permissions");

        let plan = match (has_resources, has_permissions) {
            (true, true) => {
                return Err(SeedError::parse(
                    path,
                    "document declares both `resources` and `permissions`; use one layout",
                ));
            }
            (false, false) => {
                return Err(SeedError::parse(
                    path,
                    "document declares neither `resources` nor `permissions`",
                ));
            }
            (true, false) => {
                let doc: ResourcesDocument =
                    serde_yaml::from_value(document).map_err(|e| SeedError::parse(path, e))?;
                Self::from_resources(doc)
            }
            (false, true) => {
                let doc: PermissionsDocument =
                    serde_yaml::from_value(document).map_err(|e| SeedError::parse(path, e))?;
                Self::from_permissions(doc, path)?
            }
        };

        tracing::info!(
            "Found {} permission(s) and {} role(s)",
            plan.permissions.len(),
            plan.roles.len()
        );

        Ok(plan)
    }

    fn from_resources(doc: ResourcesDocument) -> Self {
        let permissions = doc
            .resources
            .into_iter()
            .flat_map(|resource| {
                let path = resource.path;
                resource.methods.into_iter().map(move |method| PermissionDecl {
                    name: method.name,
                    resource: path.clone(),
                    method: String::new(),
                })
            })
            .collect();

        let roles = doc
            .roles
            .into_iter()
            .map(|role| RoleDecl {
                id: None,
                name: role.name,
                grants: role
                    .permissions
                    .into_iter()
                    .flat_map(|grant| {
                        let resource = grant.resource;
                        grant
                            .methods
                            .into_iter()
                            .map(move |name| PermissionRef::ByKey {
                                name,
                                resource: resource.clone(),
                                method: String::new(),
                            })
                    })
                    .collect(),
            })
            .collect();

        Self {
            shape: DocumentShape::Resources,
            permissions,
            roles,
        }
    }

    fn from_permissions(doc: PermissionsDocument, path: &Path) -> SeedResult<Self> {
        let permissions = doc
            .permissions
            .into_iter()
            .map(|entry| {
                let method =
                    canonical_method(entry.method).map_err(|e| SeedError::parse(path, e))?;
                Ok(PermissionDecl {
                    method,
                    name: entry.name,
                    resource: entry.resource,
                })
            })
            .collect::<SeedResult<Vec<_>>>()?;

        let roles = doc
            .roles
            .into_iter()
            .map(|role| RoleDecl {
                id: role.id,
                name: role.name,
                grants: role
                    .permissions
                    .into_iter()
                    .map(|name| grant_for(&permissions, name))
                    .collect(),
            })
            .collect();

        Ok(Self {
            shape: DocumentShape::Permissions,
            permissions,
            roles,
        })
    }
}

/// Pin a name-only grant to the document's own declaration of that name.
///
/// Names declared under more than one key, or not declared at all, stay
/// name-only and are resolved against the database.
fn grant_for(declared: &[PermissionDecl], name: String) -> PermissionRef {
    let keys: BTreeSet<(&str, &str)> = declared
        .iter()
        .filter(|decl| decl.name == name)
        .map(|decl| (decl.resource.as_str(), decl.method.as_str()))
        .collect();

    if keys.len() != 1 {
        return PermissionRef::ByName(name);
    }

    match keys.into_iter().next() {
        Some((resource, method)) => PermissionRef::ByKey {
            resource: resource.to_string(),
            method: method.to_string(),
            name,
        },
        None => PermissionRef::ByName(name),
    }
}

/// Method sets compare as sets, so the stored form is sorted and de-duplicated.
fn canonical_method(spec: Option<MethodSpec>) -> Result<String, serde_json::Error> {
    let methods: BTreeSet<String> = match spec {
        None => BTreeSet::new(),
        Some(MethodSpec::One(method)) => BTreeSet::from([method]),
        Some(MethodSpec::Many(methods)) => methods.into_iter().collect(),
    };

    if methods.is_empty() {
        return Ok(String::new());
    }

    serde_json::to_string(&methods)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn resource_layout_becomes_keyed_grants() {
        let plan = SeedPlan::from_yaml_str(
            r#"
resources:
  - path: /users
    methods:
      - name: read_users
      - name: write_users
roles:
  - name: admin
    permissions:
      - resource: /users
        methods: [read_users, write_users]
"#,
        )
        .unwrap();

        assert_eq!(plan.shape(), DocumentShape::Resources);
        assert_eq!(plan.permissions.len(), 2);
        assert_eq!(plan.permissions[0].resource, "/users");
        assert_eq!(plan.permissions[0].method, "");
        assert_eq!(
            plan.roles[0].grants[1],
            PermissionRef::ByKey {
                name: "write_users".into(),
                resource: "/users".into(),
                method: String::new(),
            }
        );
        assert_eq!(plan.roles[0].id, None);
    }

    #[test]
    fn permission_layout_normalises_method_sets() {
        let plan = SeedPlan::from_yaml_str(
            r#"
permissions:
  - { name: a, resource: /x, method: GET }
  - { name: b, resource: /x, method: [POST, GET, POST] }
  - { name: c, resource: /x }
roles:
  - { id: 7, name: ops, permissions: [a, b] }
"#,
        )
        .unwrap();

        assert_eq!(plan.shape(), DocumentShape::Permissions);
        assert_eq!(plan.permissions[0].method, r#"["GET"]"#);
        assert_eq!(plan.permissions[1].method, r#"["GET","POST"]"#);
        assert_eq!(plan.permissions[2].method, "");
        assert_eq!(plan.roles[0].id, Some(7));
        assert_eq!(
            plan.roles[0].grants,
            vec![
                PermissionRef::ByKey {
                    name: "a".into(),
                    resource: "/x".into(),
                    method: r#"["GET"]"#.into(),
                },
                PermissionRef::ByKey {
                    name: "b".into(),
                    resource: "/x".into(),
                    method: r#"["GET","POST"]"#.into(),
                },
            ]
        );
    }

    #[test]
    fn grants_by_name_stay_unpinned_when_ambiguous_or_undeclared() {
        let plan = SeedPlan::from_yaml_str(
            r#"
permissions:
  - { name: read, resource: /users, method: GET }
  - { name: read, resource: /users, method: GET }
  - { name: list, resource: /users, method: GET }
  - { name: list, resource: /reports, method: GET }
roles:
  - { name: viewer, permissions: [read, list, legacy] }
"#,
        )
        .unwrap();

        assert_eq!(
            plan.roles[0].grants,
            vec![
                PermissionRef::ByKey {
                    name: "read".into(),
                    resource: "/users".into(),
                    method: r#"["GET"]"#.into(),
                },
                PermissionRef::ByName("list".into()),
                PermissionRef::ByName("legacy".into()),
            ]
        );
    }

    #[test]
    fn roles_without_permissions_are_allowed() {
        let plan = SeedPlan::from_yaml_str("resources: []\nroles:\n  - name: guest\n").unwrap();
        assert!(plan.permissions.is_empty());
        assert!(plan.roles[0].grants.is_empty());
    }

    #[test]
    fn mixed_layouts_are_rejected() {
        let err = SeedPlan::from_yaml_str("resources: []\npermissions: []\n").unwrap_err();
        assert!(matches!(err, SeedError::Parse { .. }));
    }

    #[test]
    fn unknown_layout_is_rejected() {
        let err = SeedPlan::from_yaml_str("roles: []\n").unwrap_err();
        assert!(matches!(err, SeedError::Parse { .. }));

        let err = SeedPlan::from_yaml_str("- just\n- a list\n").unwrap_err();
        assert!(matches!(err, SeedError::Parse { .. }));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = SeedPlan::from_yaml_str("resources: [unclosed").unwrap_err();
        assert!(matches!(err, SeedError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let err = SeedPlan::load("/nonexistent/rbac_config.yaml").unwrap_err();
        match err {
            SeedError::Parse { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/rbac_config.yaml"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
