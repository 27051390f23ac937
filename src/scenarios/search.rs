//! Software-catalog search queries, four equally weighted tasks.

use super::{send, Call, ScenarioContext};
use goose::prelude::*;

pub const SEARCH_PATH: &str = "/api/search/query";

/// Named search queries; every one is scoped to the software catalog.
pub const QUERIES: [(&str, &[(&str, &str)]); 4] = [
    ("all", &[]),
    ("all_components", &[("filters[kind]", "Component")]),
    ("not_found", &[("term", "n/a")]),
    (
        "components_by_lifecycle",
        &[
            ("filters[kind]", "Component"),
            ("filters[lifecycle][0]", "experimental"),
        ],
    ),
];

pub fn search_params(query: &str) -> Option<Vec<(String, String)>> {
    let (_, extra) = QUERIES.iter().find(|(name, _)| *name == query)?;
    let mut params = vec![("types[0]".to_string(), "software-catalog".to_string())];
    params.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    Some(params)
}

async fn search(user: &mut GooseUser, ctx: &ScenarioContext, query: &str) -> TransactionResult {
    let params = search_params(query).unwrap_or_default();
    send(user, ctx, Call::get(SEARCH_PATH).query(params)).await?;
    Ok(())
}

pub async fn search_all(user: &mut GooseUser, ctx: &ScenarioContext) -> TransactionResult {
    search(user, ctx, "all").await
}

pub async fn search_all_components(user: &mut GooseUser, ctx: &ScenarioContext) -> TransactionResult {
    search(user, ctx, "all_components").await
}

pub async fn search_not_found(user: &mut GooseUser, ctx: &ScenarioContext) -> TransactionResult {
    search(user, ctx, "not_found").await
}

pub async fn search_components_by_lifecycle(
    user: &mut GooseUser,
    ctx: &ScenarioContext,
) -> TransactionResult {
    search(user, ctx, "components_by_lifecycle").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params() {
        let params = search_params("components_by_lifecycle").unwrap();
        assert_eq!(params[0], ("types[0]".into(), "software-catalog".into()));
        assert_eq!(params.len(), 3);
        assert_eq!(params[2].1, "experimental");

        assert_eq!(search_params("all").unwrap().len(), 1);
        assert!(search_params("unknown").is_none());
    }
}
