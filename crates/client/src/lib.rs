//! `genera-client`: the auth context and the ports it talks through.
//!
//! An [`AuthContext`] follows the session provider, resolves the signed-in
//! user's profile, roles and permissions, and publishes one [`AuthState`]
//! over a `tokio::sync::watch` channel.

pub mod avatar;
pub mod cache;
pub mod config;
pub mod context;
pub mod host;
pub mod resolver;
pub mod roles_api;

pub use avatar::resolve_avatar_url;
pub use cache::ProfileCache;
pub use config::ClientConfig;
pub use context::{AuthContext, AuthPhase, AuthPorts, AuthState, SessionSnapshot};
pub use host::{
    BrowserStorage, InMemoryStorage, Navigator, REMEMBER_ME_KEY, RecordingNavigator, SESSION_ONLY_KEY,
    SessionProvider, SessionProviderError, StorageArea,
};
pub use resolver::{ResolveError, Resolution, Resolver, RoleSource};
pub use roles_api::{MY_ROLES_PATH, MyRolesResponse, RolesApiClient, RolesApiError, RolesSource};
