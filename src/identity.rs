//! Identity provider seam and reconciliation with backend user records.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{
    api::QuizBackend,
    config::IdentityConfig,
    error::{AccountError, ApiError, AuthError},
    models::{BackendUser, Id, NewUser},
};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityUser {
    /// Provider-assigned id; the backend stores it as `firebase_uid`.
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<IdentityUser>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<IdentityUser, AuthError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityUser, AuthError>;
    async fn sign_in_with_google(&self) -> Result<IdentityUser, AuthError> {
        Err(AuthError::ProviderUnavailable)
    }
    async fn update_profile(&self, display_name: &str) -> Result<IdentityUser, AuthError>;
    async fn sign_out(&self);
}

struct Account {
    user: IdentityUser,
    password: String,
}

#[derive(Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
    current: Option<IdentityUser>,
}

/// In-process identity provider. Good enough for the terminal client and
/// for tests; it does not talk to any identity service.
#[derive(Default)]
pub struct LocalIdentity {
    inner: Mutex<Accounts>,
}

impl LocalIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts out signed in as the configured user.
    pub fn signed_in(cfg: &IdentityConfig) -> Self {
        let user = IdentityUser {
            uid: cfg.uid.clone(),
            display_name: cfg.name.clone(),
            email: Some(cfg.email.clone()),
        };
        let me = Self::default();
        me.with(|a| a.current = Some(user));
        me
    }

    fn with<R>(&self, f: impl FnOnce(&mut Accounts) -> R) -> R {
        // a poisoned lock only means another caller panicked mid-update
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    fn current_user(&self) -> Option<IdentityUser> {
        self.with(|a| a.current.clone())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<IdentityUser, AuthError> {
        let email = email.trim().to_ascii_lowercase();
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        self.with(|a| {
            if a.by_email.contains_key(&email) {
                return Err(AuthError::EmailInUse);
            }
            let user = IdentityUser {
                uid: Uuid::new_v4().simple().to_string(),
                display_name: None,
                email: Some(email.clone()),
            };
            a.by_email.insert(
                email,
                Account {
                    user: user.clone(),
                    password: password.to_string(),
                },
            );
            a.current = Some(user.clone());
            Ok(user)
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityUser, AuthError> {
        let email = email.trim().to_ascii_lowercase();
        self.with(|a| {
            let user = match a.by_email.get(&email) {
                Some(acc) if acc.password == password => acc.user.clone(),
                _ => return Err(AuthError::InvalidCredentials),
            };
            a.current = Some(user.clone());
            Ok(user)
        })
    }

    async fn update_profile(&self, display_name: &str) -> Result<IdentityUser, AuthError> {
        self.with(|a| {
            let current = a.current.as_mut().ok_or(AuthError::NotSignedIn)?;
            current.display_name = Some(display_name.to_string());
            let updated = current.clone();
            if let Some(acc) = updated
                .email
                .as_ref()
                .and_then(|e| a.by_email.get_mut(e))
            {
                acc.user = updated.clone();
            }
            Ok(updated)
        })
    }

    async fn sign_out(&self) {
        self.with(|a| a.current = None);
    }
}

/// Backend user record for a provider identity.
pub fn user_record(user: &IdentityUser) -> NewUser {
    let email = user.email.clone().unwrap_or_default();
    let display = user
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let username = match display {
        Some(name) => name
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase(),
        None => email
            .split('@')
            .next()
            .filter(|local| !local.is_empty())
            .unwrap_or("user")
            .to_string(),
    };
    NewUser {
        firebase_uid: user.uid.clone(),
        username,
        email,
        name: display.unwrap_or("User").to_string(),
        role: "user".into(),
    }
}

/// Find-or-create the backend user for `user` and return its id.
///
/// Creating an existing user is expected to fail with an HTTP error
/// (usually 409); that case falls through to a lookup by uid, so two racing
/// callers both end up with the same id.
pub async fn ensure_backend_user(
    backend: &dyn QuizBackend,
    user: &IdentityUser,
) -> Result<Id, ApiError> {
    match backend.create_user(&user_record(user)).await {
        Ok(created) => Ok(created.id),
        Err(e) if e.status().is_some() => {
            tracing::debug!(
                uid = %user.uid,
                error = %e,
                "user create rejected, looking up existing"
            );
            Ok(backend.find_user(&user.uid).await?.id)
        }
        Err(e) => Err(e),
    }
}

/// A provider identity together with its lazily resolved backend id.
/// Concurrent `resolve` calls share one reconciliation; failures are not
/// cached.
#[derive(Debug)]
pub struct BackendIdentity {
    user: IdentityUser,
    id: OnceCell<Id>,
}

impl BackendIdentity {
    pub fn new(user: IdentityUser) -> Self {
        Self {
            user,
            id: OnceCell::new(),
        }
    }

    pub fn user(&self) -> &IdentityUser {
        &self.user
    }

    pub fn cached_id(&self) -> Option<Id> {
        self.id.get().copied()
    }

    pub async fn resolve(&self, backend: &dyn QuizBackend) -> Result<Id, ApiError> {
        self.id
            .get_or_try_init(|| ensure_backend_user(backend, &self.user))
            .await
            .copied()
    }
}

/// Sign-up page flow: provider account, display name, backend record.
pub async fn register(
    provider: &dyn IdentityProvider,
    backend: &dyn QuizBackend,
    name: &str,
    email: &str,
    password: &str,
) -> Result<BackendUser, AccountError> {
    provider.sign_up(email, password).await?;
    let user = provider.update_profile(name).await?;
    let created = backend
        .create_user(&user_record(&user))
        .await
        .map_err(AccountError::Backend)?;
    tracing::info!(uid = %user.uid, user_id = created.id, "account created");
    Ok(created)
}

/// Sign-in page flow: provider sign-in, then make sure the backend knows
/// the user.
pub async fn sign_in(
    provider: &dyn IdentityProvider,
    backend: &dyn QuizBackend,
    email: &str,
    password: &str,
) -> Result<Id, AccountError> {
    let user = provider.sign_in(email, password).await?;
    ensure_backend_user(backend, &user)
        .await
        .map_err(AccountError::Backend)
}
