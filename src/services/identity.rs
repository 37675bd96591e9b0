//! Source of the signed-in user.

use crate::types::session::UserIdentity;

/// Supplies the user a view is scoped to. `None` means signed out.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserIdentity>;
}

/// Identity fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<UserIdentity>,
}

impl StaticIdentity {
    pub fn signed_in(user: UserIdentity) -> Self {
        Self { user: Some(user) }
    }

    pub fn signed_out() -> Self {
        Self { user: None }
    }

    /// Reads the user id from `id_var` and the email from `email_var`.
    /// A missing or blank id means signed out.
    pub fn from_env(id_var: &str, email_var: &str) -> Self {
        let user = std::env::var(id_var)
            .ok()
            .filter(|id| !id.trim().is_empty())
            .map(|id| UserIdentity::new(id.trim(), std::env::var(email_var).unwrap_or_default()));
        Self { user }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserIdentity> {
        self.user.clone()
    }
}
