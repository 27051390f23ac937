//! Parsing helpers for the two login flows: the guest refresh endpoint and
//! the Keycloak authorization-code flow fronted by oauth2-proxy.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use url::Url;

pub const GUEST_REFRESH_PATH: &str = "/api/auth/guest/refresh";
pub const OAUTH2_PROXY_REFRESH_PATH: &str = "/api/auth/oauth2Proxy/refresh";
pub const REALM: &str = "backstage";
pub const CLIENT_ID: &str = "backstage";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("refresh payload is not valid identity JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("refresh payload carries an empty token")]
    EmptyToken,

    #[error("no login form action in Keycloak response")]
    MissingFormAction,

    #[error("invalid URL {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Which login produced the refresh payload; they pick identity refs differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    Guest,
    Keycloak,
}

/// Bearer token and ownership refs of the logged-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub token: String,
    pub user_ref: Option<String>,
    pub group_ref: Option<String>,
}

impl Identity {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub fn is_guest(&self) -> bool {
        self.user_ref.as_deref().is_some_and(|u| u.contains("guest"))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshPayload {
    backstage_identity: BackstageIdentity,
}

#[derive(Deserialize)]
struct BackstageIdentity {
    token: String,
    identity: IdentityRefs,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityRefs {
    #[serde(default)]
    ownership_entity_refs: Vec<String>,
}

/// Extract the token and entity refs from a `backstageIdentity` refresh body.
///
/// Guest: the first `user:` ref is the user; a guest user has no group and
/// ends the scan, otherwise `group:` refs set the group. Keycloak: the last
/// `user:` and the last `group:` ref win.
pub fn identity_from_refresh(body: &str, mode: IdentityMode) -> Result<Identity, AuthError> {
    let payload: RefreshPayload = serde_json::from_str(body)?;
    let BackstageIdentity { token, identity } = payload.backstage_identity;
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }

    let mut user_ref = None;
    let mut group_ref = None;
    for entity_ref in identity.ownership_entity_refs {
        match mode {
            IdentityMode::Guest => {
                if entity_ref.starts_with("user") {
                    let guest = entity_ref.contains("guest");
                    user_ref = Some(entity_ref);
                    if guest {
                        group_ref = None;
                        break;
                    }
                } else if entity_ref.starts_with("group") {
                    group_ref = Some(entity_ref);
                }
            }
            IdentityMode::Keycloak => {
                if entity_ref.starts_with("group") {
                    group_ref = Some(entity_ref);
                } else if entity_ref.starts_with("user") {
                    user_ref = Some(entity_ref);
                }
            }
        }
    }

    Ok(Identity {
        token,
        user_ref,
        group_ref,
    })
}

fn form_action_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"action="([^"]*)""#).ok())
        .as_ref()
}

/// First `action="…"` in the Keycloak login page, with `&amp;` unescaped.
pub fn extract_form_action(html: &str) -> Result<String, AuthError> {
    form_action_regex()
        .and_then(|re| re.captures(html))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace("&amp;", "&"))
        .ok_or(AuthError::MissingFormAction)
}

/// Value of query parameter `name` in an absolute URL.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// OAuth `state` carried by the URL the oauth2-proxy refresh redirected to.
pub fn redirect_state(final_url: Option<&str>) -> Option<String> {
    final_url
        .and_then(|u| query_param(u, "state"))
        .filter(|state| !state.is_empty())
}

fn keycloak_base(kc_host: &str) -> String {
    let host = kc_host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// OpenID Connect authorization endpoint for the backstage realm.
pub fn keycloak_auth_url(kc_host: &str, state: &str, backstage_host: &str) -> Result<Url, AuthError> {
    let endpoint = format!(
        "{}/realms/{REALM}/protocol/openid-connect/auth",
        keycloak_base(kc_host)
    );
    let redirect_uri = format!("{}/oauth2/callback", backstage_host.trim_end_matches('/'));
    Url::parse_with_params(
        &endpoint,
        &[
            ("client_id", CLIENT_ID),
            ("state", state),
            ("redirect_uri", redirect_uri.as_str()),
            ("scope", "openid email profile"),
            ("response_type", "code"),
        ],
    )
    .map_err(|source| AuthError::Url {
        url: endpoint.clone(),
        source,
    })
}

/// Credentials form posted to the login form action.
pub fn login_form(username: &str, password: &str, action_url: &str) -> Vec<(&'static str, String)> {
    vec![
        ("username", username.to_string()),
        ("password", password.to_string()),
        ("credentialId", String::new()),
        ("client_id", CLIENT_ID.to_string()),
        (
            "tab_id",
            query_param(action_url, "tab_id").unwrap_or_default(),
        ),
        (
            "execution",
            query_param(action_url, "execution").unwrap_or_default(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(refs: &[&str]) -> String {
        serde_json::json!({
            "backstageIdentity": {
                "token": "tok",
                "identity": { "ownershipEntityRefs": refs }
            }
        })
        .to_string()
    }

    #[test]
    fn test_guest_identity_stops_at_guest_user() {
        let body = payload(&["group:default/early", "user:development/guest", "group:default/late"]);
        let id = identity_from_refresh(&body, IdentityMode::Guest).unwrap();
        assert_eq!(id.token, "tok");
        assert_eq!(id.user_ref.as_deref(), Some("user:development/guest"));
        assert_eq!(id.group_ref, None);
        assert!(id.is_guest());
        assert_eq!(id.bearer(), "Bearer tok");
    }

    #[test]
    fn test_guest_identity_regular_user_keeps_groups() {
        let body = payload(&["user:default/t1", "group:default/g1", "group:default/g2"]);
        let id = identity_from_refresh(&body, IdentityMode::Guest).unwrap();
        assert_eq!(id.user_ref.as_deref(), Some("user:default/t1"));
        assert_eq!(id.group_ref.as_deref(), Some("group:default/g2"));
    }

    #[test]
    fn test_keycloak_identity_last_refs_win() {
        let body = payload(&["group:default/g1", "user:default/t_1", "group:default/g2"]);
        let id = identity_from_refresh(&body, IdentityMode::Keycloak).unwrap();
        assert_eq!(id.user_ref.as_deref(), Some("user:default/t_1"));
        assert_eq!(id.group_ref.as_deref(), Some("group:default/g2"));
    }

    #[test]
    fn test_identity_errors() {
        assert!(matches!(
            identity_from_refresh("{}", IdentityMode::Guest),
            Err(AuthError::Payload(_))
        ));
        let empty = r#"{"backstageIdentity":{"token":"","identity":{"ownershipEntityRefs":[]}}}"#;
        assert!(matches!(
            identity_from_refresh(empty, IdentityMode::Keycloak),
            Err(AuthError::EmptyToken)
        ));
    }

    #[test]
    fn test_extract_form_action_unescapes() {
        let html = r#"<form id="kc-form-login" action="https://kc.example.com/realms/backstage/login-actions/authenticate?session_code=abc&amp;execution=e-1&amp;client_id=backstage&amp;tab_id=T9" method="post">"#;
        let action = extract_form_action(html).unwrap();
        assert!(action.ends_with("execution=e-1&client_id=backstage&tab_id=T9"));
        assert_eq!(query_param(&action, "execution").as_deref(), Some("e-1"));
        assert_eq!(query_param(&action, "tab_id").as_deref(), Some("T9"));
        assert!(matches!(
            extract_form_action("<html></html>"),
            Err(AuthError::MissingFormAction)
        ));
    }

    #[test]
    fn test_redirect_state() {
        assert_eq!(
            redirect_state(Some("https://kc/oauth2/start?state=st-1")).as_deref(),
            Some("st-1")
        );
        assert_eq!(redirect_state(Some("https://kc/oauth2/start?state=")), None);
        assert_eq!(redirect_state(Some("https://kc/oauth2/start")), None);
        assert_eq!(redirect_state(None), None);
    }

    #[test]
    fn test_query_param_missing() {
        assert_eq!(query_param("https://h/p?state=s1", "state").as_deref(), Some("s1"));
        assert_eq!(query_param("https://h/p", "state"), None);
        assert_eq!(query_param("not a url", "state"), None);
    }

    #[test]
    fn test_keycloak_auth_url() {
        let url = keycloak_auth_url("kc.example.com", "st", "https://rhdh.example.com/").unwrap();
        assert_eq!(url.host_str(), Some("kc.example.com"));
        assert_eq!(url.path(), "/realms/backstage/protocol/openid-connect/auth");
        assert_eq!(query_param(url.as_str(), "state").as_deref(), Some("st"));
        assert_eq!(
            query_param(url.as_str(), "redirect_uri").as_deref(),
            Some("https://rhdh.example.com/oauth2/callback")
        );
        assert_eq!(
            query_param(url.as_str(), "scope").as_deref(),
            Some("openid email profile")
        );
    }

    #[test]
    fn test_login_form_fields() {
        let form = login_form("t_1", "secret", "https://kc/x?execution=e&tab_id=t");
        let names: Vec<_> = form.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            names,
            ["username", "password", "credentialId", "client_id", "tab_id", "execution"]
        );
        assert_eq!(form[4].1, "t");
        assert_eq!(form[5].1, "e");
    }
}
