//! Goose scenarios replaying RHDH API traffic.
//!
//! Every scenario starts its virtual users with [`start_user`] (client setup
//! and, where needed, a guest or Keycloak login) and then loops over its
//! transactions. Shared state lives in one [`ScenarioContext`] behind an
//! `Arc`, captured by every transaction closure.

use crate::auth::{self, AuthError, Identity, IdentityMode};
use crate::partition::UserPool;
use crate::ScenarioKind;
use goose::config::GooseConfiguration;
use goose::metrics::{GooseMetrics, GooseRequestMetric};
use goose::prelude::*;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub mod catalog;
pub mod license;
pub mod orchestrator;
pub mod permissions;
pub mod search;

use permissions::PermissionCatalog;

/// Wrap `async fn(&mut GooseUser, &ScenarioContext) -> TransactionResult`
/// into a goose transaction holding its own handle on the context.
macro_rules! context_transaction {
    ($ctx:expr, $func:path) => {{
        let ctx = ::std::sync::Arc::clone(&$ctx);
        let closure: ::goose::goose::TransactionFunction = ::std::sync::Arc::new(move |user| {
            let ctx = ::std::sync::Arc::clone(&ctx);
            ::std::boxed::Box::pin(async move { $func(user, &ctx).await })
        });
        ::goose::goose::Transaction::new(closure)
    }};
}

/// Run-wide settings shared by every virtual user.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub scenario: ScenarioKind,
    /// Backstage base URL, e.g. `https://rhdh.example.com`.
    pub host: String,
    pub keycloak_host: Option<String>,
    pub keycloak_password: String,
    /// Log request/response metadata and bodies.
    pub debug: bool,
    pub enable_orchestrator: bool,
}

pub struct ScenarioContext {
    pub options: LoadOptions,
    pub users: UserPool,
    pub permissions: PermissionCatalog,
}

impl ScenarioContext {
    /// `usernames` is this process's chunk of the synthetic user pool.
    pub fn new(options: LoadOptions, usernames: Vec<String>) -> Self {
        let users = UserPool::new(options.scenario.username_prefix(), usernames);
        let mut permissions = PermissionCatalog::standard();
        if options.enable_orchestrator {
            permissions.enable_plugin("orchestrator");
        }
        Self {
            options,
            users,
            permissions,
        }
    }
}

/// Per-user session data stored on the goose user after login.
#[derive(Debug, Clone)]
pub struct Session {
    pub username: Option<String>,
    pub identity: Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
enum Body {
    Json(Value),
    Form(Vec<(&'static str, String)>),
}

/// One HTTP call issued through the goose user.
#[derive(Debug, Clone)]
pub struct Call {
    method: Method,
    path: String,
    name: Option<String>,
    query: Vec<(String, String)>,
    body: Option<Body>,
    bearer: Option<String>,
}

impl Call {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            name: None,
            query: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        let mut call = Self::new(Method::Post, path);
        call.body = Some(Body::Json(body));
        call
    }

    pub fn post_form(path: impl Into<String>, form: Vec<(&'static str, String)>) -> Self {
        let mut call = Self::new(Method::Post, path);
        call.body = Some(Body::Form(form));
        call
    }

    pub fn with_method(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        match (method, body) {
            (Method::Post, Some(body)) => Self::post_json(path, body),
            (method, _) => Self::new(method, path),
        }
    }

    pub fn query(mut self, params: Vec<(String, String)>) -> Self {
        self.query = params;
        self
    }

    /// Metric name the request is aggregated under.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn auth(mut self, identity: &Identity) -> Self {
        self.bearer = Some(identity.bearer());
        self
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.path)
    }
}

/// Outcome of a call. `body` is `None` when the request failed in transport
/// or the body could not be read; goose has already counted the failure.
pub struct Reply {
    pub request: GooseRequestMetric,
    pub status: Option<u16>,
    pub url: Option<String>,
    pub body: Option<String>,
}

impl Reply {
    pub fn json(&self) -> Option<Value> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_str(b).ok())
    }
}

pub async fn send(
    user: &mut GooseUser,
    ctx: &ScenarioContext,
    call: Call,
) -> Result<Reply, Box<TransactionError>> {
    let method = match call.method {
        Method::Get => GooseMethod::Get,
        Method::Post => GooseMethod::Post,
    };
    let mut builder = user.get_request_builder(&method, &call.path)?;
    if !call.query.is_empty() {
        builder = builder.query(&call.query);
    }
    if let Some(bearer) = &call.bearer {
        builder = builder.header("Authorization", bearer.as_str());
    }
    builder = match &call.body {
        Some(Body::Json(value)) => builder
            .header("Content-Type", "application/json")
            .body(value.to_string()),
        Some(Body::Form(form)) => builder.form(form),
        None => builder,
    };

    let mut request = GooseRequest::builder().set_request_builder(builder);
    if let Some(name) = call.name.as_deref() {
        request = request.name(name);
    }
    let goose = user.request(request.build()).await?;

    let (status, url, body) = match goose.response {
        Ok(response) => {
            let status = response.status().as_u16();
            let url = response.url().to_string();
            let body = match response.text().await {
                Ok(text) => Some(text),
                Err(error) => {
                    tracing::debug!(name = call.label(), %error, "unable to read response body");
                    None
                }
            };
            (Some(status), Some(url), body)
        }
        Err(error) => {
            tracing::debug!(name = call.label(), %error, "request failed");
            (None, None, None)
        }
    };

    if ctx.options.debug {
        let response = body.as_deref().unwrap_or_default();
        tracing::debug!(
            name = call.label(),
            query = ?call.query,
            status = ?status,
            response_size = response.len(),
            response,
            "response"
        );
    }

    Ok(Reply {
        request: goose.request,
        status,
        url,
        body,
    })
}

/// Identity of a logged-in user, if login succeeded.
pub fn session_identity(user: &GooseUser) -> Option<Identity> {
    user.get_session_data::<Session>()
        .map(|s| s.identity.clone())
}

/// A user without a session issues no requests. The pause keeps it from
/// spinning on its task list.
pub async fn skip_without_session(scenario: &str) -> TransactionResult {
    tracing::warn!(scenario, "user has no session; skipping task");
    tokio::time::sleep(Duration::from_secs(1)).await;
    Ok(())
}

fn record_auth_failure(user: &GooseUser, reply: &mut Reply, error: &AuthError) {
    tracing::warn!(%error, "login failed");
    let tag = format!("login failed: {error}");
    let _ = user.set_failure(&tag, &mut reply.request, None, reply.body.as_deref());
}

async fn guest_login(
    user: &mut GooseUser,
    ctx: &ScenarioContext,
) -> Result<Option<Identity>, Box<TransactionError>> {
    let mut reply = send(user, ctx, Call::get(auth::GUEST_REFRESH_PATH)).await?;
    let Some(body) = reply.body.clone() else {
        return Ok(None);
    };
    match auth::identity_from_refresh(&body, IdentityMode::Guest) {
        Ok(identity) => Ok(Some(identity)),
        Err(error) => {
            record_auth_failure(user, &mut reply, &error);
            Ok(None)
        }
    }
}

/// Authorization-code flow through oauth2-proxy and Keycloak. Redirects are
/// followed by the client; the final response of the credentials post is
/// the refresh payload.
async fn keycloak_login(
    user: &mut GooseUser,
    ctx: &ScenarioContext,
    kc_host: &str,
    username: &str,
) -> Result<Option<Identity>, Box<TransactionError>> {
    let refresh = send(user, ctx, Call::get(auth::OAUTH2_PROXY_REFRESH_PATH)).await?;
    let state = match auth::redirect_state(refresh.url.as_deref()) {
        Some(state) => state,
        None => {
            tracing::warn!(
                url = refresh.url.as_deref().unwrap_or("<none>"),
                "oauth2-proxy refresh carried no state; continuing with an empty one"
            );
            String::new()
        }
    };

    let mut login_page = match auth::keycloak_auth_url(kc_host, &state, &ctx.options.host) {
        Ok(url) => {
            send(
                user,
                ctx,
                Call::get(url.to_string()).name("/realms/backstage/protocol/openid-connect/auth"),
            )
            .await?
        }
        Err(error) => {
            tracing::error!(%error, "invalid Keycloak host");
            return Ok(None);
        }
    };
    let Some(page) = login_page.body.clone() else {
        return Ok(None);
    };
    let action = match auth::extract_form_action(&page) {
        Ok(action) => action,
        Err(error) => {
            record_auth_failure(user, &mut login_page, &error);
            return Ok(None);
        }
    };

    let form = auth::login_form(username, &ctx.options.keycloak_password, &action);
    let mut token_reply = send(
        user,
        ctx,
        Call::post_form(action, form).name("/realms/backstage/login-actions/authenticate"),
    )
    .await?;
    let Some(body) = token_reply.body.clone() else {
        return Ok(None);
    };
    match auth::identity_from_refresh(&body, IdentityMode::Keycloak) {
        Ok(identity) => Ok(Some(identity)),
        Err(error) => {
            record_auth_failure(user, &mut token_reply, &error);
            Ok(None)
        }
    }
}

/// On-start transaction: client setup, then login for scenarios that need it.
pub async fn start_user(user: &mut GooseUser, ctx: &ScenarioContext) -> TransactionResult {
    user.set_client_builder(
        reqwest::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(true),
    )
    .await?;

    if !ctx.options.scenario.requires_login() {
        return Ok(());
    }

    let (username, identity) = match ctx.options.keycloak_host.as_deref() {
        Some(kc_host) => {
            let username = ctx.users.pop();
            tracing::debug!(%username, "logging in through Keycloak");
            let identity = keycloak_login(user, ctx, kc_host, &username).await?;
            (Some(username), identity)
        }
        None => (None, guest_login(user, ctx).await?),
    };

    if let Some(identity) = identity {
        tracing::debug!(user_ref = ?identity.user_ref, group_ref = ?identity.group_ref, "logged in");
        user.set_session_data(Session { username, identity });
    }
    Ok(())
}

/// Assemble the goose scenario for the configured kind.
pub fn build_scenario(ctx: &Arc<ScenarioContext>) -> Scenario {
    let kind = ctx.options.scenario;
    let start = context_transaction!(ctx, start_user)
        .set_name("on_start")
        .set_on_start();
    let scenario = Scenario::new(kind.as_str()).register_transaction(start);

    match kind {
        ScenarioKind::ListCatalog => scenario
            .register_transaction(context_transaction!(ctx, catalog::list_catalog).set_name("list catalog")),
        ScenarioKind::SearchCatalog => scenario
            .register_transaction(context_transaction!(ctx, search::search_all).set_name("search all"))
            .register_transaction(
                context_transaction!(ctx, search::search_all_components).set_name("search all components"),
            )
            .register_transaction(
                context_transaction!(ctx, search::search_not_found).set_name("search not found"),
            )
            .register_transaction(
                context_transaction!(ctx, search::search_components_by_lifecycle)
                    .set_name("search components by lifecycle"),
            ),
        ScenarioKind::OcLicense => scenario
            .register_transaction(context_transaction!(ctx, license::get_license).set_name("get license")),
        ScenarioKind::Mvp1dot1 => scenario
            .register_transaction(context_transaction!(ctx, catalog::browse_catalog).set_name("browse catalog")),
        ScenarioKind::Mvp => scenario
            .register_transaction(context_transaction!(ctx, catalog::catalog_journey).set_name("catalog journey")),
        ScenarioKind::Orchestrator => scenario
            .register_transaction(context_transaction!(ctx, orchestrator::execute).set_name("execute workflow")),
        ScenarioKind::Realistic => scenario.register_transaction(
            context_transaction!(ctx, permissions::test_all_permissions).set_name("all permissions"),
        ),
    }
}

/// How long and how hard to run.
#[derive(Debug, Clone, Default)]
pub struct AttackSettings {
    pub users: usize,
    /// Users started per second, goose syntax (`"5"`, `"0.5"`).
    pub hatch_rate: Option<String>,
    /// Run time in seconds.
    pub run_time: Option<usize>,
    /// Stop each user after this many iterations of its task list.
    pub iterations: Option<usize>,
}

impl AttackSettings {
    /// One virtual user per username this worker holds, so no two users of
    /// the process share an identity.
    pub fn for_worker(usernames: &[String]) -> Self {
        Self {
            users: usernames.len(),
            ..Default::default()
        }
    }
}

/// Parse a run time of `90`, `30s`, `5m`, `1h` or combinations like `1h30m`.
pub fn parse_run_time(value: &str) -> Result<usize, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("empty run time".to_string());
    }
    if let Ok(secs) = value.parse::<usize>() {
        return Ok(secs);
    }

    let mut total = 0usize;
    let mut digits = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            _ => return Err(format!("invalid unit {c:?} in run time {value:?}")),
        };
        let n: usize = digits
            .parse()
            .map_err(|_| format!("missing number before {c:?} in run time {value:?}"))?;
        total += n * unit;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(format!("trailing number without unit in run time {value:?}"));
    }
    Ok(total)
}

/// Run the attack to completion and return goose's metrics.
pub async fn run_attack(
    ctx: Arc<ScenarioContext>,
    settings: &AttackSettings,
) -> Result<GooseMetrics, GooseError> {
    let mut attack = GooseAttack::initialize_with_config(GooseConfiguration::default())?
        .register_scenario(build_scenario(&ctx))
        .set_default(GooseDefault::Host, ctx.options.host.as_str())?
        .set_default(GooseDefault::Users, settings.users)?
        .set_default(GooseDefault::NoTelnet, true)?
        .set_default(GooseDefault::NoWebSocket, true)?;

    if let Some(rate) = settings.hatch_rate.as_deref() {
        attack = attack.set_default(GooseDefault::HatchRate, rate)?;
    }
    if let Some(secs) = settings.run_time {
        attack = attack.set_default(GooseDefault::RunTime, secs)?;
    }
    if let Some(iterations) = settings.iterations {
        attack = attack.set_default(GooseDefault::Iterations, iterations)?;
    }

    tracing::info!(
        scenario = ctx.options.scenario.as_str(),
        host = %ctx.options.host,
        users = settings.users,
        "starting load test"
    );
    attack.execute().await
}
