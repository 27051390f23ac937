//! Orchestrator workflow execution: overview, authorize, run the `basic`
//! workflow, then look the instance up individually and in the list.

use super::permissions::{authorize_body, AUTHORIZE_PATH};
use super::{send, session_identity, skip_without_session, Call, ScenarioContext};
use goose::prelude::*;
use serde_json::{json, Value};

pub const BASE_PATH: &str = "/api/orchestrator/v2";
pub const WORKFLOW: &str = "basic";

pub fn execute_body(input: Value) -> Value {
    json!({ "inputData": input, "authTokens": [] })
}

/// First page of a workflow's instances, newest first.
pub fn instances_body(workflow: &str) -> Value {
    json!({
        "paginationInfo": {
            "pageSize": 21,
            "offset": 0,
            "orderBy": "start",
            "orderDirection": "DESC"
        },
        "filters": { "operator": "EQ", "value": workflow, "field": "processId" }
    })
}

pub fn instance_id(response: &Value) -> Option<String> {
    match &response["id"] {
        Value::String(id) => Some(id.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub async fn execute(user: &mut GooseUser, ctx: &ScenarioContext) -> TransactionResult {
    let Some(identity) = session_identity(user) else {
        return skip_without_session(ctx.options.scenario.as_str()).await;
    };

    send(
        user,
        ctx,
        Call::post_json(format!("{BASE_PATH}/workflows/overview"), json!({})).auth(&identity),
    )
    .await?;
    send(
        user,
        ctx,
        Call::post_json(AUTHORIZE_PATH, authorize_body("orchestrator.workflow.use", "update"))
            .auth(&identity),
    )
    .await?;

    let run = send(
        user,
        ctx,
        Call::post_json(
            format!("{BASE_PATH}/workflows/{WORKFLOW}/execute"),
            execute_body(json!({ "projectName": "test" })),
        )
        .auth(&identity),
    )
    .await?;

    match run.json().as_ref().and_then(instance_id) {
        Some(id) => {
            send(
                user,
                ctx,
                Call::get(format!("{BASE_PATH}/workflows/instances/{id}"))
                    .name(format!("{BASE_PATH}/workflows/instances/[id]"))
                    .auth(&identity),
            )
            .await?;
        }
        None => tracing::warn!(workflow = WORKFLOW, "execute response carried no instance id"),
    }

    send(
        user,
        ctx,
        Call::post_json(
            format!("{BASE_PATH}/workflows/instances"),
            instances_body(WORKFLOW),
        )
        .auth(&identity),
    )
    .await?;
    Ok(())
}
