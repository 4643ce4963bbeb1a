//! RBAC demo setup: permissions, roles, groups and two accounts.
//!
//! Every object is looked up first and only created when missing, so the
//! command can be rerun against an already bootstrapped instance.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::infrahub::types::is_already_exists;
use crate::infrahub::{attr, find_id_by_name, list_nodes, rels, InfrahubApi};

/// Permission decision as Infrahub stores it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Deny,
    AllowDefault,
    AllowOther,
    AllowAll,
}

impl Decision {
    pub fn value(self) -> i64 {
        match self {
            Decision::Deny => 1,
            Decision::AllowDefault => 2,
            Decision::AllowOther => 4,
            Decision::AllowAll => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Deny => "deny",
            Decision::AllowDefault => "allow_default",
            Decision::AllowOther => "allow_other",
            Decision::AllowAll => "allow_all",
        }
    }

    /// Unknown names fall back to allow_all
    pub fn parse(s: &str) -> Self {
        match s {
            "deny" => Decision::Deny,
            "allow_default" => Decision::AllowDefault,
            "allow_other" => Decision::AllowOther,
            _ => Decision::AllowAll,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    Global {
        action: String,
        decision: Decision,
    },
    Object {
        namespace: String,
        name: String,
        action: String,
        decision: Decision,
    },
}

impl Permission {
    /// Parse `global:{action}:{decision}` or `object:{ns}:{name}:{action}:{decision}`
    pub fn parse(identifier: &str) -> Result<Self> {
        let parts: Vec<&str> = identifier.split(':').collect();
        match parts.as_slice() {
            ["global", action, decision] => Ok(Permission::Global {
                action: action.to_string(),
                decision: Decision::parse(decision),
            }),
            ["object", namespace, name, action, decision] => Ok(Permission::Object {
                namespace: namespace.to_string(),
                name: name.to_string(),
                action: action.to_string(),
                decision: Decision::parse(decision),
            }),
            _ => Err(anyhow!("Invalid permission identifier: {}", identifier)),
        }
    }

    pub fn identifier(&self) -> String {
        match self {
            Permission::Global { action, decision } => format!("global:{}:{}", action, decision.as_str()),
            Permission::Object {
                namespace,
                name,
                action,
                decision,
            } => format!("object:{}:{}:{}:{}", namespace, name, action, decision.as_str()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Permission::Global { .. } => "CoreGlobalPermission",
            Permission::Object { .. } => "CoreObjectPermission",
        }
    }

    fn lookup(&self) -> (String, Value) {
        match self {
            Permission::Global { action, decision } => (
                r#"query($action: String!, $decision: BigInt!) {
                    CoreGlobalPermission(action__value: $action, decision__value: $decision) {
                        edges { node { id identifier { value } } }
                    }
                }"#
                .to_string(),
                json!({ "action": action, "decision": decision.value() }),
            ),
            Permission::Object {
                namespace,
                name,
                action,
                decision,
            } => (
                r#"query($namespace: String!, $name: String!, $action: String!, $decision: BigInt!) {
                    CoreObjectPermission(namespace__value: $namespace, name__value: $name, action__value: $action, decision__value: $decision) {
                        edges { node { id identifier { value } } }
                    }
                }"#
                .to_string(),
                json!({ "namespace": namespace, "name": name, "action": action, "decision": decision.value() }),
            ),
        }
    }

    fn payload(&self) -> Value {
        match self {
            Permission::Global { action, decision } => json!({
                "action": attr(action),
                "decision": attr(decision.value()),
            }),
            Permission::Object {
                namespace,
                name,
                action,
                decision,
            } => json!({
                "namespace": attr(namespace),
                "name": attr(name),
                "action": attr(action),
                "decision": attr(decision.value()),
            }),
        }
    }
}

pub const PERMISSIONS: &[&str] = &[
    "object:*:*:view:allow_all",
    "object:*:*:create:deny",
    "object:*:*:update:deny",
    "object:*:*:delete:deny",
    "object:*:*:any:allow_all",
    "global:manage_schema:allow_all",
    "global:review_proposed_change:allow_all",
];

pub struct RoleSpec {
    pub name: &'static str,
    pub permissions: &'static [&'static str],
}

pub const ROLES: &[RoleSpec] = &[
    RoleSpec {
        name: "read-only-role",
        permissions: &[
            "object:*:*:view:allow_all",
            "object:*:*:create:deny",
            "object:*:*:update:deny",
            "object:*:*:delete:deny",
        ],
    },
    RoleSpec {
        name: "schema-reviewer-role",
        permissions: &[
            "global:manage_schema:allow_all",
            "global:review_proposed_change:allow_all",
            "object:*:*:any:allow_all",
        ],
    },
];

pub struct GroupSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub role: &'static str,
}

pub const GROUPS: &[GroupSpec] = &[
    GroupSpec {
        name: "read-only-users",
        description: "Users with read-only access to Infrahub",
        role: "read-only-role",
    },
    GroupSpec {
        name: "schema-reviewers",
        description: "Users who can manage schemas and review proposed changes",
        role: "schema-reviewer-role",
    },
];

pub struct AccountSpec {
    pub name: &'static str,
    pub password: &'static str,
    pub description: &'static str,
    pub group: &'static str,
}

// Demo credentials
pub const ACCOUNTS: &[AccountSpec] = &[
    AccountSpec {
        name: "emma",
        password: "emma123",
        description: "Read-only user account",
        group: "read-only-users",
    },
    AccountSpec {
        name: "otto",
        password: "otto123",
        description: "Schema reviewer with full object permissions",
        group: "schema-reviewers",
    },
];

pub async fn find_permission(api: &dyn InfrahubApi, permission: &Permission) -> Result<Option<String>> {
    let (query, variables) = permission.lookup();
    let nodes = list_nodes(api, &query, variables, permission.kind()).await?;
    Ok(nodes
        .first()
        .and_then(|n| n.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string))
}

pub async fn ensure_permissions(api: &dyn InfrahubApi) -> Result<()> {
    println!("Ensuring required permissions exist...");
    for identifier in PERMISSIONS {
        let permission = Permission::parse(identifier)?;
        if find_permission(api, &permission).await?.is_some() {
            println!("  Permission {} already exists", identifier);
            continue;
        }
        match api.create(permission.kind(), permission.payload()).await {
            Ok(_) => println!("  Created permission {}", identifier),
            Err(e) if is_already_exists(&e) => {
                println!("  Permission {} already exists (uniqueness constraint)", identifier)
            }
            Err(e) => {
                tracing::warn!("Failed to create permission {}: {}", identifier, e);
                println!("  Failed to create permission {}: {}", identifier, e);
            }
        }
    }
    Ok(())
}

/// Look an object up by name, creating it with `data` when absent
async fn get_or_create(api: &dyn InfrahubApi, kind: &str, name: &str, data: Value) -> Result<String> {
    if let Some(id) = find_id_by_name(api, kind, name).await? {
        println!("  {} '{}' already exists (ID: {})", kind, name, id);
        return Ok(id);
    }
    let created = api.create(kind, data).await?;
    println!("  Created {} '{}' (ID: {})", kind, name, created.id);
    Ok(created.id)
}

pub async fn create_roles(api: &dyn InfrahubApi) -> Result<HashMap<String, String>> {
    println!("\nCreating roles...");
    let mut role_ids = HashMap::new();
    for role in ROLES {
        let mut permission_ids = Vec::new();
        for identifier in role.permissions {
            match find_permission(api, &Permission::parse(identifier)?).await? {
                Some(id) => permission_ids.push(id),
                None => println!("  Error: Permission {} not found after creation attempt!", identifier),
            }
        }
        let id = get_or_create(
            api,
            "CoreAccountRole",
            role.name,
            json!({ "name": attr(role.name), "permissions": rels(&permission_ids) }),
        )
        .await?;
        role_ids.insert(role.name.to_string(), id);
    }
    Ok(role_ids)
}

pub async fn create_groups(api: &dyn InfrahubApi, role_ids: &HashMap<String, String>) -> Result<HashMap<String, String>> {
    println!("\nCreating groups...");
    let mut group_ids = HashMap::new();
    for group in GROUPS {
        let role_id = role_ids
            .get(group.role)
            .ok_or_else(|| anyhow!("Role {} missing for group {}", group.role, group.name))?;
        let id = get_or_create(
            api,
            "CoreAccountGroup",
            group.name,
            json!({
                "name": attr(group.name),
                "description": attr(group.description),
                "roles": rels([role_id]),
            }),
        )
        .await?;
        group_ids.insert(group.name.to_string(), id);
    }
    Ok(group_ids)
}

pub async fn create_accounts(api: &dyn InfrahubApi, group_ids: &HashMap<String, String>) -> Result<()> {
    println!("\nCreating users...");
    for account in ACCOUNTS {
        let group_id = group_ids
            .get(account.group)
            .ok_or_else(|| anyhow!("Group {} missing for user {}", account.group, account.name))?;
        get_or_create(
            api,
            "CoreAccount",
            account.name,
            json!({
                "name": attr(account.name),
                "password": attr(account.password),
                "account_type": attr("User"),
                "description": attr(account.description),
                "member_of_groups": rels([group_id]),
            }),
        )
        .await?;
    }
    Ok(())
}

/// Permissions, then roles, then groups, then accounts
pub async fn run(api: &dyn InfrahubApi) -> Result<()> {
    ensure_permissions(api).await?;
    let role_ids = create_roles(api).await?;
    let group_ids = create_groups(api, &role_ids).await?;
    create_accounts(api, &group_ids).await?;
    println!("\nUsers, roles and groups are in place");
    Ok(())
}
