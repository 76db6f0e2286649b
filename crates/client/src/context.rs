//! The auth context: turns session snapshots into a published [`AuthState`].
//!
//! ## Passes and generations
//!
//! Every change of session user starts a resolution pass tagged with a
//! generation number taken from an atomic counter. A pass may only publish
//! while its generation is still the latest; sign-out snapshots and
//! [`AuthContext::logout`] bump the counter, so a slow pass for an old
//! session can never overwrite newer state.
//!
//! Publishing happens inside the `watch` channel's write lock, which makes the
//! generation check and the write a single step.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use genera_auth::{
    AuthzError, DataScope, OrganizationalScope, PermissionKey, Profile, RolePermissions, RoleType,
    Session, SessionUser, UserRole, authorize, get_highest_role, get_user_data_scope,
    organizational_scope,
};
use genera_core::UserId;
use genera_infra::RoleDirectory;

use crate::config::ClientConfig;
use crate::host::{
    BrowserStorage, Navigator, REMEMBER_ME_KEY, SESSION_ONLY_KEY, SessionProvider, SessionProviderError,
    StorageArea,
};
use crate::resolver::{ResolveError, Resolution, Resolver, RoleSource};
use crate::roles_api::RolesSource;

/// What the session provider currently reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    /// The provider is still restoring the session.
    pub loading: bool,
}

impl SessionSnapshot {
    pub fn loading() -> Self {
        Self {
            session: None,
            loading: true,
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(session: Session) -> Self {
        Self {
            session: Some(session),
            loading: false,
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    #[default]
    Uninitialized,
    /// Waiting for the session provider.
    Loading,
    Unauthenticated,
    LoadingProfile,
    Ready,
}

/// Consolidated authorization snapshot published to consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub phase: AuthPhase,
    /// Set iff there is a session and its profile was found.
    pub user: Option<SessionUser>,
    pub profile: Option<Profile>,
    pub loading: bool,
    pub is_admin: bool,
    pub is_global_admin: bool,
    pub user_roles: Vec<UserRole>,
    pub permissions: RolePermissions,
    pub avatar_url: Option<String>,
    pub role_source: RoleSource,
    pub error: Option<ResolveError>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            phase: AuthPhase::Uninitialized,
            user: None,
            profile: None,
            loading: true,
            is_admin: false,
            is_global_admin: false,
            user_roles: Vec::new(),
            permissions: RolePermissions::none(),
            avatar_url: None,
            role_source: RoleSource::None,
            error: None,
        }
    }
}

impl AuthState {
    fn with_phase(phase: AuthPhase, loading: bool) -> Self {
        Self {
            phase,
            loading,
            ..Self::default()
        }
    }

    pub fn unauthenticated() -> Self {
        Self::with_phase(AuthPhase::Unauthenticated, false)
    }

    fn ready(user: SessionUser, resolution: Resolution) -> Self {
        Self {
            phase: AuthPhase::Ready,
            user: Some(user),
            profile: Some(resolution.profile),
            loading: false,
            is_admin: resolution.is_admin,
            is_global_admin: resolution.is_global_admin,
            user_roles: resolution.roles,
            permissions: resolution.permissions,
            avatar_url: Some(resolution.avatar_url),
            role_source: resolution.role_source,
            error: resolution.warning,
        }
    }

    fn failed(error: ResolveError) -> Self {
        Self {
            error: Some(error),
            ..Self::unauthenticated()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn has_permission(&self, key: &str) -> bool {
        self.permissions.has_permission(key)
    }

    pub fn has_role(&self, role: RoleType) -> bool {
        self.user_roles
            .iter()
            .any(|r| r.is_active && r.role_type == role)
    }
}

/// Collaborators the context is wired to.
pub struct AuthPorts {
    pub directory: Arc<dyn RoleDirectory>,
    pub roles_api: Arc<dyn RolesSource>,
    pub session_provider: Arc<dyn SessionProvider>,
    pub storage: Arc<dyn BrowserStorage>,
    pub navigator: Arc<dyn Navigator>,
}

/// A pass that has been admitted and may run.
#[derive(Debug)]
struct Pass {
    generation: u64,
    session: Session,
}

#[derive(Debug, Default)]
struct Tracked {
    /// User of the current or in-flight pass.
    user_id: Option<UserId>,
    /// Latest session seen for that user (tokens refresh without a new pass).
    session: Option<Session>,
}

/// Session-to-permissions resolver, shared as `Arc<AuthContext>`.
pub struct AuthContext {
    resolver: Resolver,
    session_provider: Arc<dyn SessionProvider>,
    storage: Arc<dyn BrowserStorage>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    generation: AtomicU64,
    tracked: Mutex<Tracked>,
    state: watch::Sender<AuthState>,
}

impl AuthContext {
    pub fn new(ports: AuthPorts, config: &ClientConfig) -> Arc<Self> {
        let (state, _) = watch::channel(AuthState::default());
        Arc::new(Self {
            resolver: Resolver::new(ports.directory, ports.roles_api, config),
            session_provider: ports.session_provider,
            storage: ports.storage,
            navigator: ports.navigator,
            login_path: config.login_path.clone(),
            generation: AtomicU64::new(0),
            tracked: Mutex::new(Tracked::default()),
            state,
        })
    }

    /// Current snapshot.
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Handle one session snapshot, running the pass (if any) to completion.
    pub async fn on_session_change(&self, snapshot: SessionSnapshot) {
        if let Some(pass) = self.admit(snapshot) {
            self.execute(pass).await;
        }
    }

    /// Follow a stream of session snapshots until its sender is dropped.
    ///
    /// Passes run as independent tasks; stale ones are discarded at publish.
    pub fn run(self: Arc<Self>, mut sessions: watch::Receiver<SessionSnapshot>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let snapshot = sessions.borrow_and_update().clone();
                if let Some(pass) = self.admit(snapshot) {
                    let ctx = Arc::clone(&self);
                    tokio::spawn(async move {
                        ctx.execute(pass).await;
                    });
                }
                if sessions.changed().await.is_err() {
                    debug!("session stream closed");
                    break;
                }
            }
        })
    }

    /// Decide what a snapshot means and publish the immediate state for it.
    fn admit(&self, snapshot: SessionSnapshot) -> Option<Pass> {
        let Ok(mut tracked) = self.tracked.lock() else {
            error!("auth context lock poisoned; ignoring session change");
            return None;
        };

        let Some(session) = snapshot.session else {
            tracked.user_id = None;
            tracked.session = None;
            let generation = self.bump();
            let state = if snapshot.loading {
                AuthState::with_phase(AuthPhase::Loading, true)
            } else {
                AuthState::unauthenticated()
            };
            self.publish(generation, state);
            return None;
        };

        let user_id = session.user.id;
        if tracked.user_id == Some(user_id) {
            tracked.session = Some(session);
            return None;
        }

        tracked.user_id = Some(user_id);
        tracked.session = Some(session.clone());
        let generation = self.bump();
        info!(user_id = %user_id, generation, "session user changed; resolving");
        self.publish(generation, AuthState::with_phase(AuthPhase::LoadingProfile, true));

        Some(Pass { generation, session })
    }

    async fn execute(&self, pass: Pass) -> Option<ResolveError> {
        let user = pass.session.user.clone();
        let (state, error) = match self.resolver.resolve(&pass.session).await {
            Ok(resolution) => {
                let warning = resolution.warning.clone();
                (AuthState::ready(user, resolution), warning)
            }
            Err(e) => {
                warn!(error = %e, "resolution failed; publishing unauthenticated state");
                (AuthState::failed(e.clone()), Some(e))
            }
        };

        let fatal = error.as_ref().is_some_and(ResolveError::is_fatal);
        if self.publish(pass.generation, state) && fatal {
            // Let the next snapshot for this user try again.
            if let Ok(mut tracked) = self.tracked.lock() {
                if tracked.user_id == Some(pass.session.user.id) {
                    tracked.user_id = None;
                }
            }
        }
        error
    }

    fn bump(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Publish `state` if `generation` is still the latest. Returns whether it did.
    fn publish(&self, generation: u64, state: AuthState) -> bool {
        let published = self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = state;
            true
        });
        if !published {
            debug!(generation, "discarding stale resolution pass");
        }
        published
    }

    /// Re-run resolution for the current session (e.g. after roles changed).
    ///
    /// Returns the error recorded by the pass, if any.
    pub async fn refresh_roles(&self) -> Option<ResolveError> {
        let pass = {
            let tracked = self.tracked.lock().ok()?;
            let session = tracked.session.clone()?;
            Pass {
                generation: self.bump(),
                session,
            }
        };
        self.execute(pass).await
    }

    /// Sign out.
    ///
    /// Local state, cached profiles and persisted flags are cleared before the
    /// remote call; navigation to the login page happens whatever it returns.
    pub async fn logout(&self) -> Result<(), SessionProviderError> {
        if let Ok(mut tracked) = self.tracked.lock() {
            tracked.user_id = None;
            tracked.session = None;
        }
        let generation = self.bump();
        self.publish(generation, AuthState::unauthenticated());
        self.resolver.cache().clear();

        self.storage.remove(StorageArea::Local, REMEMBER_ME_KEY);
        self.storage.remove(StorageArea::Session, SESSION_ONLY_KEY);

        let result = self.session_provider.sign_out().await;
        if let Err(e) = &result {
            error!(error = %e, "remote sign-out failed");
        }

        self.navigator.navigate(&self.login_path);
        result
    }

    /// String-keyed permission check; unknown keys are never granted.
    pub fn has_permission(&self, key: &str) -> bool {
        self.state.borrow().has_permission(key)
    }

    pub fn has_role(&self, role: RoleType) -> bool {
        self.state.borrow().has_role(role)
    }

    pub fn require_permission(&self, key: PermissionKey) -> Result<(), AuthzError> {
        authorize(&self.state.borrow().permissions, key)
    }

    pub fn organizational_scope(&self) -> Option<OrganizationalScope> {
        organizational_scope(&self.state.borrow().user_roles)
    }

    pub fn highest_role(&self) -> Option<RoleType> {
        get_highest_role(&self.state.borrow().user_roles)
    }

    pub fn data_scope(&self) -> DataScope {
        get_user_data_scope(&self.state.borrow().user_roles)
    }
}
