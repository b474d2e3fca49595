// libs/user-cell/src/services/user.rs
use std::sync::{Arc, LazyLock};

use chrono::{Duration, Utc};
use regex::Regex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Role, PASSWORD_CHANGE_PURPOSE};
use shared_utils::jwt::{issue_token, TokenSubject};

use crate::models::{
    AdminUpdateUserRequest, ChangePasswordRequest, CreateUserRequest, LoginOutcome, LoginRequest,
    LoginResponse, RegisterRequest, ResetPasswordRequest, UpdateProfileRequest, UserError,
    UserProfile, UserRecord, UserStatus,
};
use crate::services::password::PasswordService;
use crate::services::store::{NewUser, SupabaseUserRepository, UserPatch, UserRepository};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const PASSWORD_CHANGE_TTL_HOURS: i64 = 1;

static EMAIL_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(EMAIL_PATTERN).ok());

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lowercased, trimmed and format-checked email.
fn normalize_email(raw: &str) -> Result<String, UserError> {
    let email = raw.trim().to_lowercase();
    let valid = EMAIL_REGEX.as_ref().is_some_and(|re| re.is_match(&email));
    if valid {
        Ok(email)
    } else {
        Err(UserError::InvalidEmail)
    }
}

fn parse_role(raw: &str) -> Result<Role, UserError> {
    raw.trim()
        .parse()
        .map_err(|_| UserError::InvalidRole(raw.trim().to_string()))
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
    jwt_secret: String,
    token_ttl: Duration,
}

impl UserService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self::with_repository(
            Arc::new(SupabaseUserRepository::new(supabase)),
            config.jwt_secret.clone(),
            config.token_ttl(),
        )
    }

    pub fn with_repository(repository: Arc<dyn UserRepository>, jwt_secret: String, token_ttl: Duration) -> Self {
        Self {
            repository,
            jwt_secret,
            token_ttl,
        }
    }

    // ==========================================================================
    // REGISTRATION AND LOGIN
    // ==========================================================================

    /// Public sign-up. The account is always an active patient.
    #[instrument(skip(self, request))]
    pub async fn register(&self, request: RegisterRequest) -> Result<UserProfile, UserError> {
        let create = CreateUserRequest {
            name: request.name,
            email: request.email,
            password: request.password,
            role: None,
            phone: request.phone,
        };
        self.create_account(create, Role::Patient).await
    }

    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome, UserError> {
        let (Some(email), Some(password)) = (present(request.email), request.password.filter(|p| !p.is_empty()))
        else {
            return Err(UserError::MissingCredentials);
        };

        let email = email.to_lowercase();
        let user = self
            .repository
            .find_by_email(email)
            .await?
            .ok_or(UserError::InvalidCredentials)?;

        if user.status != UserStatus::Active {
            warn!("Login attempt on {} account {}", user.status, user.id);
            return Err(UserError::AccountInactive);
        }

        if !PasswordService::verify_password(&password, &user.password_hash)? {
            return Err(UserError::InvalidCredentials);
        }

        if user.force_password_change {
            info!("User {} must change password before logging in", user.id);
            let reset_token = self.issue(&user, Some(PASSWORD_CHANGE_PURPOSE), Duration::hours(PASSWORD_CHANGE_TTL_HOURS))?;
            return Ok(LoginOutcome::PasswordChangeRequired { reset_token });
        }

        let token = self.issue(&user, None, self.token_ttl)?;

        let now = Utc::now();
        let patch = UserPatch {
            last_login: Some(now),
            ..Default::default()
        };
        let user = match self.repository.update(user.id, patch).await {
            Ok(Some(updated)) => updated,
            Ok(None) => user,
            Err(e) => {
                warn!("Failed to record last login for {}: {}", user.id, e);
                user
            }
        };

        info!("User {} logged in", user.id);

        Ok(LoginOutcome::Authenticated(LoginResponse {
            success: true,
            token,
            user: user.into(),
        }))
    }

    fn issue(&self, user: &UserRecord, purpose: Option<&str>, ttl: Duration) -> Result<String, UserError> {
        let subject = TokenSubject {
            id: user.id,
            email: Some(user.email.clone()),
            name: Some(user.name.clone()),
            role: user.role,
            purpose: purpose.map(str::to_string),
        };
        issue_token(&subject, &self.jwt_secret, ttl).map_err(UserError::Token)
    }

    // ==========================================================================
    // OWN PROFILE
    // ==========================================================================

    pub async fn get_profile(&self, user_id: Uuid) -> Result<UserProfile, UserError> {
        self.find(user_id).await.map(UserProfile::from)
    }

    /// Only name, email and phone can be changed here.
    pub async fn update_profile(&self, user_id: Uuid, request: UpdateProfileRequest) -> Result<UserProfile, UserError> {
        let mut patch = UserPatch {
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        if let Some(name) = request.name {
            patch.name = Some(present(Some(name)).ok_or_else(|| UserError::MissingFields("Name cannot be empty".to_string()))?);
        }
        if let Some(email) = request.email {
            patch.email = Some(self.unique_email(&email, Some(user_id)).await?);
        }
        patch.phone = request.phone.map(|p| p.trim().to_string());

        self.apply(user_id, patch).await
    }

    /// Clears the forced-change flag once a new password is set.
    pub async fn change_password(&self, user_id: Uuid, request: ChangePasswordRequest) -> Result<(), UserError> {
        let new_password = request
            .new_password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| UserError::MissingFields("New password is required".to_string()))?;
        PasswordService::validate_password(&new_password)?;

        let patch = UserPatch {
            password_hash: Some(PasswordService::hash_password(&new_password)?),
            force_password_change: Some(false),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };
        self.apply(user_id, patch).await?;

        info!("User {} changed password", user_id);
        Ok(())
    }

    // ==========================================================================
    // DIRECTORY
    // ==========================================================================

    pub async fn list_users(&self, role: Option<Role>) -> Result<Vec<UserProfile>, UserError> {
        let users = self.repository.list(role).await?;
        debug!("Listed {} users (role filter: {:?})", users.len(), role);
        Ok(users.into_iter().map(UserProfile::from).collect())
    }

    // ==========================================================================
    // ADMINISTRATION
    // ==========================================================================

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserProfile, UserError> {
        let role = match request.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => parse_role(raw)?,
            None => Role::Patient,
        };
        self.create_account(request, role).await
    }

    pub async fn admin_update_user(&self, user_id: Uuid, request: AdminUpdateUserRequest) -> Result<UserProfile, UserError> {
        let mut patch = UserPatch {
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        if let Some(name) = request.name {
            patch.name = Some(present(Some(name)).ok_or_else(|| UserError::MissingFields("Name cannot be empty".to_string()))?);
        }
        if let Some(email) = request.email {
            patch.email = Some(self.unique_email(&email, Some(user_id)).await?);
        }
        if let Some(role) = request.role {
            patch.role = Some(parse_role(&role)?);
        }
        if let Some(status) = request.status {
            patch.status = Some(status.parse()?);
        }
        if let Some(password) = present(request.password) {
            PasswordService::validate_password(&password)?;
            patch.password_hash = Some(PasswordService::hash_password(&password)?);
        }
        patch.phone = request.phone.map(|p| p.trim().to_string());

        let updated = self.apply(user_id, patch).await?;
        info!("User {} updated by admin", user_id);
        Ok(updated)
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), UserError> {
        if !self.repository.delete(user_id).await? {
            return Err(UserError::NotFound);
        }
        info!("User {} deleted", user_id);
        Ok(())
    }

    /// Sets a temporary password and forces a change at next login.
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), UserError> {
        let (Some(email), Some(new_password)) = (present(request.email), request.new_password.filter(|p| !p.is_empty()))
        else {
            return Err(UserError::MissingFields("Email and new password are required".to_string()));
        };
        PasswordService::validate_password(&new_password)?;

        let user = self
            .repository
            .find_by_email(email.to_lowercase())
            .await?
            .ok_or(UserError::NotFound)?;

        let patch = UserPatch {
            password_hash: Some(PasswordService::hash_password(&new_password)?),
            force_password_change: Some(true),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };
        self.apply(user.id, patch).await?;

        info!("Password reset for user {}", user.id);
        Ok(())
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    async fn create_account(&self, request: CreateUserRequest, role: Role) -> Result<UserProfile, UserError> {
        let (Some(name), Some(email), Some(password)) = (
            present(request.name),
            present(request.email),
            request.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(UserError::MissingFields("Name, email and password are required".to_string()));
        };

        let email = self.unique_email(&email, None).await?;
        PasswordService::validate_password(&password)?;

        let now = Utc::now();
        let record = self
            .repository
            .insert(NewUser {
                name,
                email,
                password_hash: PasswordService::hash_password(&password)?,
                role,
                phone: present(request.phone),
                status: UserStatus::Active,
                force_password_change: false,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!("Created {} account {}", record.role, record.id);
        Ok(record.into())
    }

    /// Normalizes `raw` and checks that no other account uses it.
    async fn unique_email(&self, raw: &str, owner: Option<Uuid>) -> Result<String, UserError> {
        let email = normalize_email(raw)?;
        match self.repository.find_by_email(email.clone()).await? {
            Some(existing) if Some(existing.id) != owner => Err(UserError::EmailTaken),
            _ => Ok(email),
        }
    }

    async fn find(&self, user_id: Uuid) -> Result<UserRecord, UserError> {
        self.repository
            .find_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound)
    }

    async fn apply(&self, user_id: Uuid, patch: UserPatch) -> Result<UserProfile, UserError> {
        self.repository
            .update(user_id, patch)
            .await?
            .map(UserProfile::from)
            .ok_or(UserError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::MockUserRepository;
    use assert_matches::assert_matches;
    use shared_utils::jwt::validate_token;

    const SECRET: &str = "unit-test-secret";

    fn record(email: &str, password: &str, role: Role) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            name: "Jane Roe".to_string(),
            email: email.to_string(),
            password_hash: PasswordService::hash_password(password).unwrap(),
            role,
            phone: None,
            status: UserStatus::Active,
            force_password_change: false,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(repository: MockUserRepository) -> UserService {
        UserService::with_repository(Arc::new(repository), SECRET.to_string(), Duration::hours(1))
    }

    fn stored(new: NewUser) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            phone: new.phone,
            status: new.status,
            force_password_change: new.force_password_change,
            last_login: None,
            created_at: new.created_at,
            updated_at: new.updated_at,
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email("  Jane@Example.COM ").unwrap(), "jane@example.com");
        assert_eq!(normalize_email("jane@example"), Err(UserError::InvalidEmail));
        assert_eq!(normalize_email("jane doe@example.com"), Err(UserError::InvalidEmail));
    }

    #[tokio::test]
    async fn test_register_always_creates_active_patient() {
        let mut repository = MockUserRepository::new();
        repository.expect_find_by_email().returning(|_| Ok(None));
        repository
            .expect_insert()
            .withf(|new| {
                new.role == Role::Patient
                    && new.status == UserStatus::Active
                    && new.email == "new@example.com"
                    && new.password_hash.starts_with("$argon2")
            })
            .times(1)
            .returning(|new| Ok(stored(new)));

        let profile = service(repository)
            .register(RegisterRequest {
                name: Some("New Patient".to_string()),
                email: Some("New@Example.com".to_string()),
                password: Some("secret1".to_string()),
                phone: None,
            })
            .await
            .unwrap();

        assert_eq!(profile.role, Role::Patient);
        assert_eq!(profile.email, "new@example.com");
    }

    #[tokio::test]
    async fn test_register_validation() {
        let taken = record("taken@example.com", "secret1", Role::Patient);
        let mut repository = MockUserRepository::new();
        repository
            .expect_find_by_email()
            .returning(move |email| Ok((email == "taken@example.com").then(|| taken.clone())));
        repository.expect_insert().never();
        let svc = service(repository);

        let request = |name: &str, email: &str, password: &str| RegisterRequest {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            phone: None,
        };

        assert_matches!(svc.register(request("", "a@b.co", "secret1")).await, Err(UserError::MissingFields(_)));
        assert_matches!(svc.register(request("A", "not-an-email", "secret1")).await, Err(UserError::InvalidEmail));
        assert_matches!(svc.register(request("A", "taken@example.com", "secret1")).await, Err(UserError::EmailTaken));
        assert_matches!(svc.register(request("A", "free@example.com", "123")).await, Err(UserError::WeakPassword));
    }

    #[tokio::test]
    async fn test_login_success_issues_token() {
        let user = record("jane@example.com", "secret1", Role::Doctor);
        let user_id = user.id;
        let found = user.clone();

        let mut repository = MockUserRepository::new();
        repository
            .expect_find_by_email()
            .returning(move |_| Ok(Some(found.clone())));
        repository
            .expect_update()
            .withf(|_, patch| patch.last_login.is_some())
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("write failed")));

        let outcome = service(repository)
            .login(login("JANE@example.com", "secret1"))
            .await
            .unwrap();

        let LoginOutcome::Authenticated(response) = outcome else {
            panic!("expected an authenticated session");
        };
        let claims = validate_token(&response.token, SECRET).unwrap();
        assert_eq!(claims.id, user_id);
        assert_eq!(claims.role, Role::Doctor);
        assert!(!claims.is_password_change_only());
    }

    #[tokio::test]
    async fn test_login_failures() {
        let active = record("jane@example.com", "secret1", Role::Patient);
        let inactive = UserRecord {
            status: UserStatus::Suspended,
            ..record("gone@example.com", "secret1", Role::Patient)
        };

        let mut repository = MockUserRepository::new();
        repository.expect_find_by_email().returning(move |email| {
            Ok(match email.as_str() {
                "jane@example.com" => Some(active.clone()),
                "gone@example.com" => Some(inactive.clone()),
                _ => None,
            })
        });
        repository.expect_update().never();
        let svc = service(repository);

        assert_matches!(
            svc.login(LoginRequest { email: Some("jane@example.com".into()), password: None }).await,
            Err(UserError::MissingCredentials)
        );
        assert_matches!(svc.login(login("nobody@example.com", "secret1")).await, Err(UserError::InvalidCredentials));
        assert_matches!(svc.login(login("jane@example.com", "wrong")).await, Err(UserError::InvalidCredentials));
        assert_matches!(svc.login(login("gone@example.com", "secret1")).await, Err(UserError::AccountInactive));
    }

    #[tokio::test]
    async fn test_login_with_forced_change_returns_restricted_token() {
        let user = UserRecord {
            force_password_change: true,
            ..record("jane@example.com", "temp123", Role::Patient)
        };

        let mut repository = MockUserRepository::new();
        repository
            .expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));
        repository.expect_update().never();

        let outcome = service(repository).login(login("jane@example.com", "temp123")).await.unwrap();

        let LoginOutcome::PasswordChangeRequired { reset_token } = outcome else {
            panic!("expected a password change requirement");
        };
        assert!(validate_token(&reset_token, SECRET).unwrap().is_password_change_only());
    }

    #[tokio::test]
    async fn test_profile_update_rejects_taken_email() {
        let me = Uuid::new_v4();
        let other = record("other@example.com", "secret1", Role::Patient);

        let mut repository = MockUserRepository::new();
        repository
            .expect_find_by_email()
            .returning(move |_| Ok(Some(other.clone())));
        repository.expect_update().never();

        let result = service(repository)
            .update_profile(
                me,
                UpdateProfileRequest {
                    email: Some("other@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert_matches!(result, Err(UserError::EmailTaken));
    }

    #[tokio::test]
    async fn test_change_password_clears_flag() {
        let mut repository = MockUserRepository::new();
        let user = record("jane@example.com", "old-secret", Role::Patient);
        repository
            .expect_update()
            .withf(|_, patch| {
                patch.force_password_change == Some(false)
                    && patch.password_hash.as_deref().is_some_and(|h| h.starts_with("$argon2"))
                    && patch.role.is_none()
            })
            .times(1)
            .returning(move |_, _| Ok(Some(user.clone())));

        let svc = service(repository);
        assert!(svc
            .change_password(Uuid::new_v4(), ChangePasswordRequest { new_password: Some("new-secret".into()) })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_create_user_with_role_and_invalid_role() {
        let mut repository = MockUserRepository::new();
        repository.expect_find_by_email().returning(|_| Ok(None));
        repository
            .expect_insert()
            .withf(|new| new.role == Role::Doctor)
            .times(1)
            .returning(|new| Ok(stored(new)));
        let svc = service(repository);

        let mut request = CreateUserRequest {
            name: Some("Dr. Who".to_string()),
            email: Some("who@example.com".to_string()),
            password: Some("tardis1".to_string()),
            role: Some("doctor".to_string()),
            phone: None,
        };
        assert_eq!(svc.create_user(request.clone()).await.unwrap().role, Role::Doctor);

        request.role = Some("nurse".to_string());
        assert_matches!(svc.create_user(request).await, Err(UserError::InvalidRole(_)));
    }

    #[tokio::test]
    async fn test_reset_password_sets_flag() {
        let user = record("jane@example.com", "secret1", Role::Patient);
        let user_id = user.id;
        let found = user.clone();

        let mut repository = MockUserRepository::new();
        repository
            .expect_find_by_email()
            .returning(move |_| Ok(Some(found.clone())));
        repository
            .expect_update()
            .withf(move |id, patch| *id == user_id && patch.force_password_change == Some(true))
            .times(1)
            .returning(move |_, _| Ok(Some(user.clone())));

        let result = service(repository)
            .reset_password(ResetPasswordRequest {
                email: Some("jane@example.com".to_string()),
                new_password: Some("temp123".to_string()),
            })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_delete_missing_user() {
        let mut repository = MockUserRepository::new();
        repository.expect_delete().returning(|_| Ok(false));

        assert_matches!(service(repository).delete_user(Uuid::new_v4()).await, Err(UserError::NotFound));
    }
}
