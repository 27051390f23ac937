use super::{send, Call, ScenarioContext};
use goose::prelude::*;

pub const LICENSE_PATH: &str = "/oc-license";

pub async fn get_license(user: &mut GooseUser, ctx: &ScenarioContext) -> TransactionResult {
    send(user, ctx, Call::get(LICENSE_PATH)).await?;
    Ok(())
}
