//! Permission-driven workflows: each enabled permission is authorized and
//! its API calls are replayed under the returned decision. Only an
//! authorize call that yields no decision at all skips the workflow.

use super::{send, session_identity, skip_without_session, Call, Method, ScenarioContext};
use goose::prelude::*;
use serde_json::{json, Value};

pub const AUTHORIZE_PATH: &str = "/api/permission/authorize";

#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub method: Method,
    pub endpoint: &'static str,
    pub body: Option<Value>,
    pub description: &'static str,
}

impl ApiCall {
    fn get(endpoint: &'static str, description: &'static str) -> Self {
        Self {
            method: Method::Get,
            endpoint,
            body: None,
            description,
        }
    }

    fn post(endpoint: &'static str, body: Value, description: &'static str) -> Self {
        Self {
            method: Method::Post,
            endpoint,
            body: Some(body),
            description,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Permission {
    pub name: &'static str,
    pub action: &'static str,
    pub plugin: &'static str,
    pub workflow: Vec<ApiCall>,
    pub enabled: bool,
}

/// Ordered permission catalog; iteration order is request order.
#[derive(Debug, Clone)]
pub struct PermissionCatalog {
    permissions: Vec<Permission>,
}

fn permission(
    name: &'static str,
    action: &'static str,
    plugin: &'static str,
    workflow: Vec<ApiCall>,
) -> Permission {
    Permission {
        name,
        action,
        plugin,
        workflow,
        enabled: true,
    }
}

impl PermissionCatalog {
    /// Catalog, RBAC and scaffolder permissions enabled; orchestrator ones
    /// disabled until the plugin is enabled.
    pub fn standard() -> Self {
        let permissions = vec![
            permission(
                "catalog-entity",
                "read",
                "catalog",
                vec![
                    ApiCall::get("/api/catalog/entities/by-query?limit=20", "Query entities with pagination"),
                    ApiCall::get("/api/catalog/entities?filter=kind=Component", "Filter components"),
                    ApiCall::get("/api/catalog/entities?filter=kind=API", "Filter APIs"),
                    ApiCall::get("/api/catalog/entities?filter=kind=User", "Filter users"),
                    ApiCall::get("/api/catalog/entities?filter=kind=Group", "Filter groups"),
                    ApiCall::get("/api/catalog/entities?filter=kind=System", "Filter systems"),
                    ApiCall::get("/api/catalog/entities?filter=kind=Domain", "Filter domains"),
                    ApiCall::get("/api/catalog/entities?filter=kind=Resource", "Filter resources"),
                    ApiCall::get("/api/search/query?term=component", "Search for components"),
                    ApiCall::get("/api/search/query?term=api", "Search for APIs"),
                    ApiCall::get("/api/search/query?term=service", "Search for services"),
                ],
            ),
            permission(
                "catalog.location.read",
                "read",
                "catalog",
                vec![ApiCall::get("/api/catalog/locations", "List all locations")],
            ),
            permission(
                "policy-entity",
                "read",
                "rbac",
                vec![
                    ApiCall::get("/api/permission/policies", "List all policies"),
                    ApiCall::get("/api/permission/roles", "List all roles"),
                    ApiCall::get("/api/permission/plugins/policies", "List plugin policies"),
                    ApiCall::get("/api/permission/plugins/condition-rules", "List condition rules"),
                ],
            ),
            permission(
                "scaffolder-template",
                "read",
                "scaffolder",
                vec![ApiCall::get(
                    "/api/catalog/entities?filter=kind=Template",
                    "List templates via catalog",
                )],
            ),
            permission(
                "scaffolder.task.read",
                "read",
                "scaffolder",
                vec![ApiCall::get("/api/scaffolder/v2/tasks", "List all tasks")],
            ),
            permission(
                "scaffolder.action.read",
                "read",
                "scaffolder",
                vec![ApiCall::get("/api/scaffolder/v2/actions", "List available actions")],
            ),
            permission(
                "scaffolder.template.management",
                "read",
                "scaffolder",
                vec![ApiCall::get(
                    "/api/scaffolder/v2/actions",
                    "View template management actions",
                )],
            ),
            Permission {
                enabled: false,
                ..permission(
                    "orchestrator.workflow.use",
                    "update",
                    "orchestrator",
                    vec![
                        ApiCall::post("/api/orchestrator/v2/workflows/overview", json!({}), "Get workflows overview"),
                        ApiCall::post("/api/orchestrator/v2/workflows/instances", json!({}), "List workflow instances"),
                    ],
                )
            },
            Permission {
                enabled: false,
                ..permission(
                    "orchestrator.workflow.read",
                    "read",
                    "orchestrator",
                    vec![ApiCall::post(
                        "/api/orchestrator/v2/workflows/overview",
                        json!({}),
                        "Read workflows overview",
                    )],
                )
            },
        ];
        Self { permissions }
    }

    /// Enable every permission owned by `plugin`.
    pub fn enable_plugin(&mut self, plugin: &str) {
        for p in self.permissions.iter_mut().filter(|p| p.plugin == plugin) {
            p.enabled = true;
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter().filter(|p| p.enabled)
    }

    pub fn all(&self) -> &[Permission] {
        &self.permissions
    }
}

/// Body of a single-item `basic` permission authorization request.
pub fn authorize_body(name: &str, action: &str) -> Value {
    json!({
        "items": [{
            "id": uuid::Uuid::new_v4().to_string(),
            "permission": {
                "type": "basic",
                "name": name,
                "attributes": { "action": action }
            }
        }]
    })
}

/// Decision of one authorize item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermitResult {
    Allow,
    Deny,
    /// Conditional policy; the caller evaluates the returned conditions.
    Conditional,
    /// Any other decision string, kept verbatim.
    Other(String),
    /// No decision could be read (transport failure or unparseable body).
    Error,
}

impl PermitResult {
    pub fn as_str(&self) -> &str {
        match self {
            PermitResult::Allow => "ALLOW",
            PermitResult::Deny => "DENY",
            PermitResult::Conditional => "CONDITIONAL",
            PermitResult::Other(raw) => raw,
            PermitResult::Error => "ERROR",
        }
    }

    /// Result of the first item of an authorize response.
    pub fn from_response(body: Option<&str>) -> Self {
        let result = body
            .and_then(|b| serde_json::from_str::<Value>(b).ok())
            .and_then(|v| v["items"][0]["result"].as_str().map(str::to_string));
        match result.as_deref() {
            Some("ALLOW") => PermitResult::Allow,
            Some("DENY") => PermitResult::Deny,
            Some("CONDITIONAL") => PermitResult::Conditional,
            Some("ERROR") | None => PermitResult::Error,
            Some(raw) => PermitResult::Other(raw.to_string()),
        }
    }

    /// Whether the permission's workflow is replayed. Every decision the
    /// backend returned is replayed, denials included, so the load shape
    /// does not depend on the policy set.
    pub fn replays_workflow(&self) -> bool {
        *self != PermitResult::Error
    }
}

/// Authorize every enabled permission in order and replay its workflow.
pub async fn test_all_permissions(user: &mut GooseUser, ctx: &ScenarioContext) -> TransactionResult {
    let Some(identity) = session_identity(user) else {
        return skip_without_session(ctx.options.scenario.as_str()).await;
    };

    for permission in ctx.permissions.enabled() {
        let reply = send(
            user,
            ctx,
            Call::post_json(AUTHORIZE_PATH, authorize_body(permission.name, permission.action))
                .name(format!("[AUTH] {}", permission.name))
                .auth(&identity),
        )
        .await?;
        let result = PermitResult::from_response(reply.body.as_deref());
        tracing::debug!(permission = permission.name, result = result.as_str(), "authorized");
        if !result.replays_workflow() {
            tracing::warn!(permission = permission.name, "no authorize decision; skipping workflow");
            continue;
        }

        for call in &permission.workflow {
            send(
                user,
                ctx,
                Call::with_method(call.method, call.endpoint, call.body.clone())
                    .name(format!("{}|{}", call.endpoint, result.as_str()))
                    .auth(&identity),
            )
            .await?;
        }
    }
    Ok(())
}
