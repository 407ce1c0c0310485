use std::sync::Arc;

use tracing::info;

use gatehouse_db::models::UserRow;
use gatehouse_db::Database;
use gatehouse_types::models::{Role, VerifiedIdentity};

use crate::error::AuthError;

/// Maps verified external identities onto the local users table. One
/// implementation serves every provider adapter; each adapter must have
/// fully validated its credential before calling in, because nothing here
/// re-checks it.
pub struct IdentityReconciler {
    db: Arc<Database>,
    /// Configured admin email, lowercased. Used only for role derivation at
    /// login; the request-time admin check goes through admin_grants.
    admin_email: Option<String>,
}

impl IdentityReconciler {
    pub fn new(db: Arc<Database>, admin_email: Option<String>) -> Self {
        Self {
            db,
            admin_email: admin_email.map(|e| fold_email(&e)),
        }
    }

    /// Resolve the user for a verified identity, creating it on first login.
    /// Creation marks the user verified (the external channel already proved
    /// ownership); repeat logins backfill an empty name and keep verified
    /// monotonic. Returns the user id and the role derived for this login.
    pub fn resolve_or_create(&self, identity: &VerifiedIdentity) -> Result<(i64, Role), AuthError> {
        let email = fold_email(&identity.email);

        let user_id = match self.db.get_user_by_email(&email)? {
            Some(user) => {
                if let Some(name) = identity.name.as_deref() {
                    if user.name.as_deref().unwrap_or("").is_empty() {
                        self.db.set_user_name_if_empty(user.id, name)?;
                    }
                }
                if !user.verified {
                    self.db.mark_user_verified(user.id)?;
                }
                user.id
            }
            None => {
                let id = self.db.create_user(
                    Some(&email),
                    identity.name.as_deref(),
                    None,
                    None,
                    true,
                )?;
                info!(user_id = id, "created user for first login");
                id
            }
        };

        let role = self.derive_role(Some(&email), identity.provider_role);
        // Recomputed every login; never trusted from a previous token or a
        // stale provider answer.
        self.db.set_user_role(user_id, role.as_str())?;

        Ok((user_id, role))
    }

    /// Role for a user already resolved by some other key (e.g. phone-based
    /// OTP login).
    pub fn role_for_user(&self, user: &UserRow) -> Role {
        self.derive_role(user.email.as_deref(), None)
    }

    fn derive_role(&self, email: Option<&str>, provider_role: Option<Role>) -> Role {
        if provider_role == Some(Role::Admin) {
            return Role::Admin;
        }
        match (email, self.admin_email.as_deref()) {
            (Some(e), Some(admin)) if fold_email(e) == admin => Role::Admin,
            _ => Role::User,
        }
    }
}

/// Case-fold and trim an email for lookup and storage.
pub fn fold_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconciler(admin: Option<&str>) -> IdentityReconciler {
        let db = Arc::new(Database::open_in_memory().unwrap());
        IdentityReconciler::new(db, admin.map(String::from))
    }

    fn identity(email: &str, name: Option<&str>) -> VerifiedIdentity {
        VerifiedIdentity {
            email: email.into(),
            name: name.map(String::from),
            provider_role: None,
        }
    }

    #[test]
    fn email_resolution_is_case_insensitive_and_keeps_first_name() {
        let r = reconciler(None);

        let (id1, _) = r.resolve_or_create(&identity("A@x.com", Some("Ann"))).unwrap();
        let (id2, _) = r.resolve_or_create(&identity("a@x.com", Some("Ann2"))).unwrap();
        assert_eq!(id1, id2);

        let user = r.db.get_user_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(user.name.as_deref(), Some("Ann"));
        assert!(user.verified);
    }

    #[test]
    fn empty_name_is_backfilled() {
        let r = reconciler(None);

        let (id, _) = r.resolve_or_create(&identity("b@x.com", None)).unwrap();
        r.resolve_or_create(&identity("b@x.com", Some("Bea"))).unwrap();

        let user = r.db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(user.name.as_deref(), Some("Bea"));
    }

    #[test]
    fn verified_is_monotonic() {
        let r = reconciler(None);
        let id = r
            .db
            .create_user(Some("c@x.com"), None, None, None, false)
            .unwrap();

        r.resolve_or_create(&identity("C@X.COM", None)).unwrap();
        assert!(r.db.get_user_by_id(id).unwrap().unwrap().verified);
    }

    #[test]
    fn admin_role_from_configured_email() {
        let r = reconciler(Some("Boss@Corp.com"));

        let (_, role) = r.resolve_or_create(&identity("boss@corp.com", None)).unwrap();
        assert_eq!(role, Role::Admin);

        let (_, role) = r.resolve_or_create(&identity("peon@corp.com", None)).unwrap();
        assert_eq!(role, Role::User);
    }

    #[test]
    fn admin_role_from_provider_metadata() {
        let r = reconciler(None);
        let mut ident = identity("ext@x.com", None);
        ident.provider_role = Some(Role::Admin);

        let (_, role) = r.resolve_or_create(&ident).unwrap();
        assert_eq!(role, Role::Admin);
    }
}
