//! Account operations that touch storage
//!
//! Model methods only build [`Pending`] changes; [`AccountService`]
//! validates and commits them through the injected [`Store`].

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AccountsError, AccountsResult};
use crate::hashers::Hashers;
use crate::mail::{MailMessage, Mailer};
use crate::models::{Pending, PermissionRecord, ProviderRecord, UserRecord, WriteIntent};
use crate::repositories::Store;

pub struct AccountService<S> {
    store: Arc<S>,
    hashers: Hashers,
    mailer: Arc<dyn Mailer>,
    default_from: String,
}

impl<S: Store> AccountService<S> {
    pub fn new(
        store: Arc<S>,
        hashers: Hashers,
        mailer: Arc<dyn Mailer>,
        default_from: impl Into<String>,
    ) -> Self {
        Self {
            store,
            hashers,
            mailer,
            default_from: default_from.into(),
        }
    }

    pub fn hashers(&self) -> &Hashers {
        &self.hashers
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Validate and write a pending user
    pub async fn commit(&self, pending: Pending<UserRecord>) -> AccountsResult<UserRecord> {
        let intent = pending.intent();
        let user = pending.into_record();
        user.validate()?;

        match intent {
            WriteIntent::Insert => self.store.insert_user(&user).await?,
            WriteIntent::Update => self.store.update_user(&user).await?,
        }
        debug!("Committed user {} ({:?})", user.id, intent);
        Ok(user)
    }

    pub async fn save(&self, user: UserRecord) -> AccountsResult<UserRecord> {
        self.commit(Pending::update(user)).await
    }

    /// Create and persist a user with a hashed password.
    ///
    /// The domain part of `email` is lower-cased. A value without `@` is
    /// stored as given; a missing one fails validation.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> AccountsResult<UserRecord> {
        let pending = UserRecord::create(username, password, email, &self.hashers)?;
        let user = self.commit(pending).await?;
        info!("Created user {} ({})", user.id, username);
        Ok(user)
    }

    pub async fn create_superuser(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> AccountsResult<UserRecord> {
        let mut user =
            UserRecord::create(username, password, Some(email), &self.hashers)?.into_record();
        user.is_staff = true;
        user.is_superuser = true;
        let user = self.commit(Pending::insert(user)).await?;
        info!("Created superuser {} ({})", user.id, username);
        Ok(user)
    }

    pub async fn set_credential(
        &self,
        user: UserRecord,
        password: &str,
    ) -> AccountsResult<UserRecord> {
        let user = self.commit(user.set_credential(&self.hashers, password)?).await?;
        info!("Password changed for user {}", user.id);
        Ok(user)
    }

    pub async fn set_unusable_credential(&self, user: UserRecord) -> AccountsResult<UserRecord> {
        self.commit(user.set_unusable_credential()).await
    }

    pub fn check_credential(&self, user: &UserRecord, password: &str) -> bool {
        user.check_credential(&self.hashers, password)
    }

    /// Log a user in by username and password.
    ///
    /// Returns `None` for unknown users, inactive users and wrong
    /// passwords. On success the password is re-hashed when its algorithm
    /// or parameters are outdated, and `last_login` is stamped.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> AccountsResult<Option<UserRecord>> {
        let Some(mut user) = self.store.user_by_username(username).await? else {
            // Unknown usernames still cost one hash.
            self.hashers.make_hash(password)?;
            debug!("Login attempt for unknown username");
            return Ok(None);
        };

        if !user.check_credential(&self.hashers, password) {
            warn!("Failed login for user {}", user.id);
            return Ok(None);
        }
        if !user.is_active {
            warn!("Login refused for inactive user {}", user.id);
            return Ok(None);
        }

        if self.hashers.must_update(&user.password) {
            user.password = self.hashers.make_hash(password)?;
            info!("Upgraded password hash for user {}", user.id);
        }
        user.last_login = Utc::now();

        Ok(Some(self.save(user).await?))
    }

    pub async fn user(&self, id: Uuid) -> AccountsResult<UserRecord> {
        self.store
            .user_by_id(id)
            .await?
            .ok_or_else(|| AccountsError::not_found("user", id.to_string()))
    }

    pub async fn user_by_username(&self, username: &str) -> AccountsResult<Option<UserRecord>> {
        self.store.user_by_username(username).await
    }

    pub async fn user_by_provider(
        &self,
        provider_id: &str,
        uid: &str,
    ) -> AccountsResult<Option<UserRecord>> {
        self.store.user_by_provider(provider_id, uid).await
    }

    pub async fn delete_user(&self, id: Uuid) -> AccountsResult<bool> {
        let deleted = self.store.delete_user(id).await?;
        if deleted {
            info!("Deleted user {}", id);
        }
        Ok(deleted)
    }

    /// Grant a stored permission. Granting twice is a no-op.
    pub async fn grant_permission(
        &self,
        mut user: UserRecord,
        permission: &PermissionRecord,
    ) -> AccountsResult<UserRecord> {
        if self.store.permission_by_id(permission.id).await?.is_none() {
            return Err(AccountsError::not_found("permission", permission.id.to_string()));
        }
        if !user.grant(permission) {
            return Ok(user);
        }
        self.save(user).await
    }

    pub async fn revoke_permission(
        &self,
        mut user: UserRecord,
        permission: &PermissionRecord,
    ) -> AccountsResult<UserRecord> {
        if !user.revoke(permission) {
            return Ok(user);
        }
        self.save(user).await
    }

    /// Attach a provider identity. The identity may belong to one user only.
    pub async fn link_provider(
        &self,
        mut user: UserRecord,
        provider: ProviderRecord,
    ) -> AccountsResult<UserRecord> {
        if let Some(owner) = self
            .store
            .user_by_provider(&provider.provider_id, &provider.uid)
            .await?
        {
            if owner.id != user.id {
                return Err(AccountsError::duplicate(
                    "providers",
                    format!("{}:{}", provider.provider_id, provider.uid),
                ));
            }
        }
        user.link_provider(provider);
        self.save(user).await
    }

    pub async fn unlink_provider(
        &self,
        mut user: UserRecord,
        provider_id: &str,
        uid: &str,
    ) -> AccountsResult<UserRecord> {
        if !user.unlink_provider(provider_id, uid) {
            return Ok(user);
        }
        self.save(user).await
    }

    /// Send a message to the user's address. Mailer failures are returned.
    pub async fn email_user(
        &self,
        user: &UserRecord,
        subject: &str,
        body: &str,
        from: Option<&str>,
    ) -> AccountsResult<()> {
        let message = MailMessage {
            subject: subject.to_string(),
            body: body.to_string(),
            from: Some(from.unwrap_or(&self.default_from).to_string()),
            to: vec![user.email.clone()],
        };
        self.mailer.send(message).await?;
        debug!("Mailed user {}", user.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::hashers::{PasswordHasher, Pbkdf2Sha256Hasher, fast_hashers};
    use crate::repositories::{MemoryStore, UserRepository};
    use crate::validation::ValidationErrorKind;
    use async_trait::async_trait;
    use chrono::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<MailMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: MailMessage) -> AccountsResult<()> {
            self.sent.lock().await.push(message);
            Ok(())
        }
    }

    struct BrokenMailer;

    #[async_trait]
    impl Mailer for BrokenMailer {
        async fn send(&self, _: MailMessage) -> AccountsResult<()> {
            Err(AccountsError::Mail("smtp unreachable".to_string()))
        }
    }

    fn service_with(mailer: Arc<dyn Mailer>) -> AccountService<MemoryStore> {
        AccountService::new(
            Arc::new(MemoryStore::new()),
            fast_hashers(),
            mailer,
            "webmaster@localhost",
        )
    }

    fn service() -> AccountService<MemoryStore> {
        service_with(Arc::new(RecordingMailer::default()))
    }

    #[tokio::test]
    async fn create_user_normalizes_and_persists() {
        let service = service();
        let user = service
            .create_user("bob", "hunter2", Some("Bob@EXAMPLE.com"))
            .await
            .unwrap();

        assert_eq!(user.email, "Bob@example.com");
        let stored = service.user_by_username("bob").await.unwrap().unwrap();
        assert_eq!(stored, user);
        assert!(service.check_credential(&stored, "hunter2"));
        assert!(!service.check_credential(&stored, "hunter3"));
    }

    #[tokio::test]
    async fn create_user_keeps_malformed_email() {
        let service = service();
        let user = service
            .create_user("carol", "pw", Some("not-an-email"))
            .await
            .unwrap();
        assert_eq!(user.email, "not-an-email");
        assert_eq!(service.user(user.id).await.unwrap().email, "not-an-email");
    }

    #[tokio::test]
    async fn create_user_without_email_is_rejected() {
        let service = service();
        let err = service.create_user("dave", "pw", None).await.unwrap_err();
        match err {
            AccountsError::Validation(e) => {
                assert_eq!(e.field, "email");
                assert_eq!(e.kind, ValidationErrorKind::Blank);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(service.user_by_username("dave").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn usernames_are_sparse_unique() {
        let service = service();
        service
            .commit(Pending::insert(UserRecord::new("a@example.com", "uid-a")))
            .await
            .unwrap();
        service
            .commit(Pending::insert(UserRecord::new("b@example.com", "uid-b")))
            .await
            .unwrap();

        service.create_user("erin", "pw", Some("e@example.com")).await.unwrap();
        let err = service
            .create_user("erin", "pw", Some("other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AccountsError::UniquenessViolation { field: "username", .. }
        ));
    }

    #[tokio::test]
    async fn set_credential_is_persisted() {
        let service = service();
        let user = service.create_user("bob", "first", Some("bob@example.com")).await.unwrap();

        service.set_credential(user.clone(), "second").await.unwrap();
        let stored = service.user(user.id).await.unwrap();
        assert!(service.check_credential(&stored, "second"));
        assert!(!service.check_credential(&stored, "first"));

        let stored = service.set_unusable_credential(stored).await.unwrap();
        assert!(!stored.has_usable_credential());
        assert!(service.authenticate("bob", "second").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn authenticate_checks_password_and_activity() {
        let service = service();
        let mut user = service.create_user("bob", "pw", Some("bob@example.com")).await.unwrap();
        user.last_login = user.last_login - Duration::days(3);
        let user = service.save(user).await.unwrap();

        assert!(service.authenticate("bob", "wrong").await.unwrap().is_none());
        assert!(service.authenticate("nobody", "pw").await.unwrap().is_none());

        let logged_in = service.authenticate("bob", "pw").await.unwrap().unwrap();
        assert!(logged_in.last_login > user.last_login);

        let mut inactive = logged_in;
        inactive.is_active = false;
        service.save(inactive).await.unwrap();
        assert!(service.authenticate("bob", "pw").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn authenticate_upgrades_legacy_hashes() {
        let service = service();
        let mut user = UserRecord::new("bob@example.com", "uid-bob");
        user.username = Some("bob".to_string());
        user.password = Pbkdf2Sha256Hasher::new(1_000).unwrap().encode("pw").unwrap();
        service.commit(Pending::insert(user.clone())).await.unwrap();

        service.authenticate("bob", "pw").await.unwrap().unwrap();
        let stored = service.store().user_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.password.starts_with("argon2$"));
        assert!(service.check_credential(&stored, "pw"));
    }

    #[tokio::test]
    async fn superusers_are_staff() {
        let service = service();
        let admin = service
            .create_superuser("admin", "pw", "admin@Trotamundia.com")
            .await
            .unwrap();
        assert!(admin.is_staff && admin.is_superuser && admin.is_active);
        assert_eq!(admin.email, "admin@trotamundia.com");
    }

    #[tokio::test]
    async fn grants_require_stored_permissions() {
        let service = service();
        let catalog = Catalog::new(service.store().clone());
        let article = catalog
            .get_or_create_content_type("article", "blog", "article")
            .await
            .unwrap();
        let perms = catalog.ensure_default_permissions(&article).await.unwrap();
        let user = service.create_user("bob", "pw", Some("bob@example.com")).await.unwrap();

        let user = service.grant_permission(user, &perms[2]).await.unwrap();
        let user = service.grant_permission(user, &perms[0]).await.unwrap();
        let user = service.grant_permission(user, &perms[2]).await.unwrap();
        assert_eq!(
            service.user(user.id).await.unwrap().permissions,
            vec![perms[2].id, perms[0].id]
        );

        let user = service.revoke_permission(user, &perms[2]).await.unwrap();
        assert_eq!(service.user(user.id).await.unwrap().permissions, vec![perms[0].id]);

        let stray = PermissionRecord::new("Can fly", &article, "fly_article");
        let err = service.grant_permission(user, &stray).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn provider_identity_belongs_to_one_user() {
        let service = service();
        let ana = service.create_user("ana", "pw", Some("ana@example.com")).await.unwrap();
        let bob = service.create_user("bob", "pw", Some("bob@example.com")).await.unwrap();
        let google = ProviderRecord::new("google.com", "g-1", "ana@gmail.com");

        let ana = service.link_provider(ana, google.clone()).await.unwrap();
        let found = service.user_by_provider("google.com", "g-1").await.unwrap().unwrap();
        assert_eq!(found.id, ana.id);

        let err = service.link_provider(bob, google).await.unwrap_err();
        assert!(matches!(err, AccountsError::UniquenessViolation { field: "providers", .. }));

        service.unlink_provider(ana, "google.com", "g-1").await.unwrap();
        assert!(service.user_by_provider("google.com", "g-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn email_user_uses_default_sender() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = service_with(mailer.clone());
        let user = service.create_user("bob", "pw", Some("bob@example.com")).await.unwrap();

        service.email_user(&user, "Hi", "Welcome", None).await.unwrap();
        service
            .email_user(&user, "Again", "Still here", Some("team@trotamundia.com"))
            .await
            .unwrap();

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, vec!["bob@example.com".to_string()]);
        assert_eq!(sent[0].from.as_deref(), Some("webmaster@localhost"));
        assert_eq!(sent[1].from.as_deref(), Some("team@trotamundia.com"));
    }

    #[tokio::test]
    async fn mail_failures_propagate() {
        let service = service_with(Arc::new(BrokenMailer));
        let user = service.create_user("bob", "pw", Some("bob@example.com")).await.unwrap();
        let err = service.email_user(&user, "Hi", "Welcome", None).await.unwrap_err();
        assert!(matches!(err, AccountsError::Mail(_)));
    }

    #[tokio::test]
    async fn delete_user_reports_absence() {
        let service = service();
        let user = service.create_user("bob", "pw", Some("bob@example.com")).await.unwrap();
        assert!(service.delete_user(user.id).await.unwrap());
        assert!(!service.delete_user(user.id).await.unwrap());
        assert!(service.user(user.id).await.unwrap_err().is_not_found());
    }
}
