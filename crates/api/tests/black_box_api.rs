use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;

use genera_auth::{JwtClaims, Profile, RoleType, Session, SessionUser, UserRole};
use genera_client::{
    AuthContext, AuthPhase, AuthPorts, ClientConfig, InMemoryStorage, RecordingNavigator, RoleSource,
    RolesApiClient, RolesApiError, RolesSource, SessionProvider, SessionProviderError, SessionSnapshot,
};
use genera_core::{SchoolId, UserId};
use genera_infra::InMemoryDirectory;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str, directory: Arc<InMemoryDirectory>) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = genera_api::app::build_app(jwt_secret.as_bytes(), directory);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, user_id: UserId, ttl: ChronoDuration) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user_id,
        email: Some("ana@colegio.cl".to_string()),
        role: Some("authenticated".to_string()),
        iat: (now - ChronoDuration::minutes(20)).timestamp(),
        exp: (now + ttl).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn seeded_user(directory: &InMemoryDirectory, roles: &[RoleType]) -> UserId {
    let user = UserId::new();
    directory.upsert_profile(Profile::new(user));
    for role in roles {
        directory.add_role(UserRole::new(user, *role).with_school(SchoolId::new(7)));
    }
    user
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn(SECRET, Arc::new(InMemoryDirectory::new())).await;

    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn my_roles_requires_a_valid_token() {
    let directory = Arc::new(InMemoryDirectory::new());
    let user = seeded_user(&directory, &[RoleType::Docente]);
    let srv = TestServer::spawn(SECRET, directory).await;
    let client = reqwest::Client::new();

    let missing = client.get(srv.url("/api/auth/my-roles")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let forged = client
        .get(srv.url("/api/auth/my-roles"))
        .bearer_auth(mint_jwt("other-secret", user, ChronoDuration::minutes(10)))
        .send()
        .await
        .unwrap();
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let expired = client
        .get(srv.url("/api/auth/my-roles"))
        .bearer_auth(mint_jwt(SECRET, user, ChronoDuration::minutes(-5)))
        .send()
        .await
        .unwrap();
    assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn my_roles_returns_the_callers_active_roles() {
    let directory = Arc::new(InMemoryDirectory::new());
    let user = seeded_user(&directory, &[RoleType::Docente, RoleType::SupervisorDeRed]);
    let mut revoked = UserRole::new(user, RoleType::Admin);
    revoked.is_active = false;
    directory.add_role(revoked);
    let other = seeded_user(&directory, &[RoleType::Admin]);
    let srv = TestServer::spawn(SECRET, directory).await;

    let res = reqwest::Client::new()
        .get(srv.url("/api/auth/my-roles"))
        .bearer_auth(mint_jwt(SECRET, user, ChronoDuration::minutes(10)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    let roles = body["roles"].as_array().unwrap();
    assert_eq!(roles.len(), 2);
    assert!(roles.iter().all(|r| r["user_id"] == user.to_string()));
    assert!(roles.iter().all(|r| r["user_id"] != other.to_string()));
    assert!(roles.iter().all(|r| r["role_type"] != "admin"));
}

#[tokio::test]
async fn directory_failure_is_a_json_500() {
    let directory = Arc::new(InMemoryDirectory::new());
    let user = seeded_user(&directory, &[RoleType::Docente]);
    directory.fail_role_reads(true);
    let srv = TestServer::spawn(SECRET, directory).await;

    let res = reqwest::Client::new()
        .get(srv.url("/api/auth/my-roles"))
        .bearer_auth(mint_jwt(SECRET, user, ChronoDuration::minutes(10)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "directory_error");
}

#[tokio::test]
async fn roles_client_talks_to_the_server() {
    let directory = Arc::new(InMemoryDirectory::new());
    let user = seeded_user(&directory, &[RoleType::LiderComunidad]);
    let srv = TestServer::spawn(SECRET, directory).await;

    let client = RolesApiClient::new(&srv.base_url, Duration::from_secs(5)).unwrap();
    assert!(client.check_connectivity().await);

    let roles = client
        .fetch_my_roles(&mint_jwt(SECRET, user, ChronoDuration::minutes(10)))
        .await
        .unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].role_type, RoleType::LiderComunidad);
    assert_eq!(roles[0].school_id, Some(SchoolId::new(7)));

    let rejected = client.fetch_my_roles("not-a-jwt").await;
    assert!(matches!(rejected, Err(RolesApiError::Api(401, _))));
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth context against a live server
// ─────────────────────────────────────────────────────────────────────────────

struct NoopProvider;

#[async_trait]
impl SessionProvider for NoopProvider {
    async fn sign_out(&self) -> Result<(), SessionProviderError> {
        Ok(())
    }
}

fn context_for(srv: &TestServer, directory: Arc<InMemoryDirectory>) -> Arc<AuthContext> {
    let config = ClientConfig {
        api_url: srv.base_url.clone(),
        ..ClientConfig::default()
    };
    let roles_api = RolesApiClient::from_config(&config).unwrap();
    AuthContext::new(
        AuthPorts {
            directory,
            roles_api: Arc::new(roles_api),
            session_provider: Arc::new(NoopProvider),
            storage: Arc::new(InMemoryStorage::new()),
            navigator: Arc::new(RecordingNavigator::new()),
        },
        &config,
    )
}

fn session(user: UserId, token: String) -> Session {
    Session {
        access_token: token,
        refresh_token: None,
        expires_at: Utc::now() + ChronoDuration::hours(1),
        user: SessionUser::new(user, Some("ana@colegio.cl".to_string())),
    }
}

#[tokio::test]
async fn auth_context_resolves_roles_through_the_api() {
    let directory = Arc::new(InMemoryDirectory::new());
    let user = seeded_user(&directory, &[RoleType::EquipoDirectivo]);
    let srv = TestServer::spawn(SECRET, directory.clone()).await;
    let ctx = context_for(&srv, directory.clone());

    let token = mint_jwt(SECRET, user, ChronoDuration::minutes(10));
    ctx.on_session_change(SessionSnapshot::signed_in(session(user, token))).await;

    let state = ctx.state();
    assert_eq!(state.phase, AuthPhase::Ready);
    assert_eq!(state.role_source, RoleSource::Api);
    assert!(state.has_role(RoleType::EquipoDirectivo));
    assert_eq!(ctx.highest_role(), Some(RoleType::EquipoDirectivo));
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn rejected_token_falls_back_to_the_direct_query() {
    let directory = Arc::new(InMemoryDirectory::new());
    let user = seeded_user(&directory, &[RoleType::Docente]);
    let srv = TestServer::spawn(SECRET, directory.clone()).await;
    let ctx = context_for(&srv, directory.clone());

    let forged = mint_jwt("wrong-secret", user, ChronoDuration::minutes(10));
    ctx.on_session_change(SessionSnapshot::signed_in(session(user, forged))).await;

    let state = ctx.state();
    assert_eq!(state.phase, AuthPhase::Ready);
    assert_eq!(state.role_source, RoleSource::DirectQuery);
    assert_eq!(state.user_roles.len(), 1);
    assert_eq!(state.error, None);
}
