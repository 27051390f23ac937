//! Software-catalog browsing: the plain facet listing, the table-driven
//! browse of the 1.1 journey and the full catalog journey with ownership
//! filters and paging.

use super::{send, session_identity, skip_without_session, Call, ScenarioContext};
use crate::auth::Identity;
use goose::prelude::*;
use serde_json::json;

pub const FACETS_PATH: &str = "/api/catalog/entity-facets";
pub const ENTITIES_PATH: &str = "/api/catalog/entities";
pub const BY_QUERY_PATH: &str = "/api/catalog/entities/by-query";
pub const BY_REFS_PATH: &str = "/api/catalog/entities/by-refs";

/// Group used in place of the guest's (absent) group.
pub const GUEST_GROUP_REF: &str = "group:default/group1";

/// Query string of an entity-facets request, optionally scoped to one kind.
pub fn facet_params(facet: &str, kind: Option<&str>) -> Vec<(String, String)> {
    let mut params = vec![("facet".to_string(), facet.to_string())];
    if let Some(kind) = kind {
        params.push(("filter".to_string(), format!("kind={kind}")));
    }
    params
}

/// Inputs of an `entities/by-query` request.
#[derive(Debug, Clone, Default)]
pub struct EntityQuery<'a> {
    pub kind: Option<&'a str>,
    pub limit: u32,
    pub user_ref: Option<&'a str>,
    pub group_ref: Option<&'a str>,
    pub additional_filter: Vec<(&'a str, &'a str)>,
    pub additional_params: Vec<(&'a str, String)>,
}

impl<'a> EntityQuery<'a> {
    pub fn kind(kind: &'a str, limit: u32) -> Self {
        Self {
            kind: Some(kind),
            limit,
            ..Default::default()
        }
    }

    pub fn owned_by(mut self, user_ref: Option<&'a str>, group_ref: Option<&'a str>) -> Self {
        self.user_ref = user_ref;
        self.group_ref = group_ref;
        self
    }

    pub fn group(mut self, group_ref: Option<&'a str>) -> Self {
        self.group_ref = group_ref;
        self
    }

    pub fn filter(mut self, key: &'a str, value: &'a str) -> Self {
        self.additional_filter.push((key, value));
        self
    }

    /// Query parameters in request order: `limit`, `orderField` for paged
    /// requests, the comma-joined `filter`, then any additional parameters.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("limit".to_string(), self.limit.to_string())];
        if self.limit > 0 {
            params.push(("orderField".to_string(), "metadata.name,asc".to_string()));
        }

        let mut filter = String::new();
        if let Some(kind) = self.kind {
            filter.push_str(&format!("kind={kind}"));
        }
        if let Some(user_ref) = self.user_ref {
            filter.push_str(&format!(",relations.ownedBy={user_ref}"));
        }
        if let Some(group_ref) = self.group_ref {
            filter.push_str(&format!(",relations.ownedBy={group_ref}"));
        }
        for (k, v) in &self.additional_filter {
            filter.push_str(&format!(",{k}={v}"));
        }
        if !filter.is_empty() {
            params.push(("filter".to_string(), filter));
        }

        for (k, v) in &self.additional_params {
            params.retain(|(existing, _)| existing != k);
            params.push((k.to_string(), v.clone()));
        }
        params
    }
}

pub async fn list_catalog(user: &mut GooseUser, ctx: &ScenarioContext) -> TransactionResult {
    send(
        user,
        ctx,
        Call::get(FACETS_PATH).query(facet_params("spec.type", Some("component"))),
    )
    .await?;
    Ok(())
}

async fn facets(
    user: &mut GooseUser,
    ctx: &ScenarioContext,
    identity: &Identity,
    facet: &str,
    kind: Option<&str>,
) -> TransactionResult {
    send(
        user,
        ctx,
        Call::get(FACETS_PATH)
            .query(facet_params(facet, kind))
            .auth(identity),
    )
    .await?;
    Ok(())
}

async fn entities(
    user: &mut GooseUser,
    ctx: &ScenarioContext,
    identity: &Identity,
    filter: &str,
) -> TransactionResult {
    send(
        user,
        ctx,
        Call::get(ENTITIES_PATH)
            .query(vec![("filter".to_string(), filter.to_string())])
            .auth(identity),
    )
    .await?;
    Ok(())
}

async fn by_query(
    user: &mut GooseUser,
    ctx: &ScenarioContext,
    identity: &Identity,
    query: EntityQuery<'_>,
) -> Result<super::Reply, Box<TransactionError>> {
    send(
        user,
        ctx,
        Call::get(BY_QUERY_PATH).query(query.params()).auth(identity),
    )
    .await
}

async fn by_refs(
    user: &mut GooseUser,
    ctx: &ScenarioContext,
    identity: &Identity,
    group_ref: Option<&str>,
) -> TransactionResult {
    send(
        user,
        ctx,
        Call::post_json(BY_REFS_PATH, json!({ "entityRefs": [group_ref] })).auth(identity),
    )
    .await?;
    Ok(())
}

/// Catalog browse driven by fixed facet and entity filter tables.
pub async fn browse_catalog(user: &mut GooseUser, ctx: &ScenarioContext) -> TransactionResult {
    let Some(id) = session_identity(user) else {
        return skip_without_session(ctx.options.scenario.as_str()).await;
    };
    let id = &id;

    for facet in ["kind", "relations.ownedBy", "metadata.namespace", "spec.lifecycle", "metadata.tags"] {
        facets(user, ctx, id, facet, None).await?;
    }
    for kind in ["component", "api", "component"] {
        entities(user, ctx, id, &format!("kind={kind}")).await?;
        for facet in ["spec.lifecycle", "spec.type", "metadata.namespace", "metadata.tags"] {
            facets(user, ctx, id, facet, Some(kind)).await?;
        }
    }
    entities(user, ctx, id, "kind=component,spec.type=library").await?;
    entities(user, ctx, id, "kind=component").await?;
    Ok(())
}

/// Next-page cursor from a by-query response, when there is a next page.
pub fn next_cursor(body: &serde_json::Value) -> Option<String> {
    body.get("pageInfo")?
        .get("nextCursor")?
        .as_str()
        .map(str::to_string)
}

/// Catalog journey of a signed-in user: load the catalog, switch to APIs
/// and back, select "library", select "all", then load the next page.
pub async fn catalog_journey(user: &mut GooseUser, ctx: &ScenarioContext) -> TransactionResult {
    let Some(identity) = session_identity(user) else {
        return skip_without_session(ctx.options.scenario.as_str()).await;
    };
    let id = &identity;
    let user_ref = identity.user_ref.as_deref();
    let group_ref = if identity.is_guest() {
        Some(GUEST_GROUP_REF)
    } else {
        identity.group_ref.as_deref()
    };

    // Load catalog
    for facet in ["relations.ownedBy", "kind", "spec.lifecycle", "metadata.tags", "metadata.namespace"] {
        facets(user, ctx, id, facet, None).await?;
    }
    by_query(user, ctx, id, EntityQuery::kind("component", 20)).await?;
    by_query(user, ctx, id, EntityQuery::kind("component", 20)).await?;
    facets(user, ctx, id, "spec.type", Some("component")).await?;
    by_query(user, ctx, id, EntityQuery::kind("component", 0).owned_by(user_ref, group_ref)).await?;
    by_query(user, ctx, id, EntityQuery::kind("component", 0)).await?;
    for facet in ["spec.lifecycle", "metadata.tags", "metadata.namespace"] {
        facets(user, ctx, id, facet, Some("component")).await?;
    }
    by_refs(user, ctx, id, group_ref).await?;
    by_query(user, ctx, id, EntityQuery::kind("component", 20).owned_by(user_ref, group_ref)).await?;

    // Switch to API
    by_query(user, ctx, id, EntityQuery::kind("api", 20).owned_by(user_ref, group_ref)).await?;
    facets(user, ctx, id, "spec.type", Some("api")).await?;
    by_query(user, ctx, id, EntityQuery::kind("api", 0).owned_by(user_ref, group_ref)).await?;
    by_query(user, ctx, id, EntityQuery::kind("api", 0)).await?;
    for facet in ["spec.lifecycle", "metadata.tags", "metadata.namespace"] {
        facets(user, ctx, id, facet, Some("api")).await?;
    }

    // Switch to Component
    by_query(user, ctx, id, EntityQuery::kind("component", 20).owned_by(user_ref, group_ref)).await?;
    facets(user, ctx, id, "spec.lifecycle", Some("component")).await?;
    by_query(user, ctx, id, EntityQuery::kind("component", 0).owned_by(user_ref, group_ref)).await?;
    by_query(user, ctx, id, EntityQuery::kind("component", 0)).await?;
    for facet in ["spec.lifecycle", "metadata.tags", "metadata.namespace"] {
        facets(user, ctx, id, facet, Some("component")).await?;
    }
    by_refs(user, ctx, id, group_ref).await?;

    // Select "library"
    by_query(
        user,
        ctx,
        id,
        EntityQuery::kind("component", 20)
            .owned_by(user_ref, group_ref)
            .filter("spec_type", "library"),
    )
    .await?;
    by_query(
        user,
        ctx,
        id,
        EntityQuery::kind("component", 0)
            .owned_by(user_ref, group_ref)
            .filter("spec_type", "library"),
    )
    .await?;
    by_query(
        user,
        ctx,
        id,
        EntityQuery::kind("component", 0).filter("spec_type", "library"),
    )
    .await?;
    by_query(user, ctx, id, EntityQuery::kind("component", 20)).await?;
    by_refs(user, ctx, id, group_ref).await?;

    // Select "all"
    by_query(user, ctx, id, EntityQuery::kind("component", 20).group(group_ref)).await?;
    by_query(user, ctx, id, EntityQuery::kind("component", 0).group(group_ref)).await?;
    by_refs(user, ctx, id, group_ref).await?;

    // Load next page
    let page = by_query(user, ctx, id, EntityQuery::kind("component", 20).group(group_ref)).await?;
    if let Some(cursor) = page.json().as_ref().and_then(next_cursor) {
        let query = EntityQuery {
            limit: 20,
            additional_params: vec![("cursor", cursor)],
            ..Default::default()
        };
        by_query(user, ctx, id, query).await?;
    }
    Ok(())
}
