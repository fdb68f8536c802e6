use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use super::ServiceError;
use crate::auth::password::{hash_password, verify_account_password};
use crate::auth::{IdentityClaim, IssuedToken, Role, TokenService};
use crate::database::models::{User, UserSummary};
use crate::database::{DocumentStore, Repository, StoreError};
use crate::filter::Filter;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Account creation and credential exchange
pub struct AuthService {
    users: Repository<User>,
    tokens: Arc<TokenService>,
    open_registration: bool,
}

impl AuthService {
    pub fn new(store: Arc<dyn DocumentStore>, tokens: Arc<TokenService>, open_registration: bool) -> Self {
        Self {
            users: Repository::new(store),
            tokens,
            open_registration,
        }
    }

    /// Self-service registration, only while registration is open
    pub async fn register(&self, request: &RegisterRequest) -> Result<UserSummary, ServiceError> {
        if !self.open_registration {
            warn!("Registration attempt while registration is closed");
            return Err(ServiceError::Forbidden("Registration is closed".to_string()));
        }

        let (Some(username), Some(password), Some(role)) = (
            non_empty(&request.username),
            request.password.as_deref().filter(|s| !s.is_empty()),
            non_empty(&request.role),
        ) else {
            return Err(ServiceError::validation("Username, password, and role are required"));
        };
        let role: Role = role
            .parse()
            .map_err(|_| ServiceError::invalid_field("role", format!("Unknown role '{}'", role)))?;

        self.create_user(username, password, role).await
    }

    /// Create an account directly; used by registration and the operator CLI
    pub async fn create_user(&self, username: &str, password: &str, role: Role) -> Result<UserSummary, ServiceError> {
        let user = User::new(username, hash_password(password)?, role);
        match self.users.insert(&user).await {
            Ok(_) => {
                info!("Created {} account '{}'", role, username);
                Ok(UserSummary::from(&user))
            }
            Err(StoreError::Duplicate { .. }) => Err(ServiceError::Conflict("Username already exists".to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<IssuedToken, ServiceError> {
        let (Some(username), Some(password)) = (
            non_empty(&request.username),
            request.password.as_deref().filter(|s| !s.is_empty()),
        ) else {
            return Err(ServiceError::validation("Username and password required"));
        };

        let user = self.users.select_one(&Filter::all().eq("username", username)).await?;
        let verified = verify_account_password(password, user.as_ref().map(|u| u.password_hash.as_str()));
        let Some(user) = user.filter(|_| verified) else {
            warn!("Failed login for '{}'", username);
            return Err(ServiceError::Unauthorized("Invalid username or password".to_string()));
        };

        let token = self.tokens.issue(&IdentityClaim::new(user.username.clone(), user.role))?;
        info!("User '{}' logged in", user.username);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn service(open_registration: bool) -> (AuthService, Arc<TokenService>) {
        let tokens = Arc::new(TokenService::new("test-secret", 3600).unwrap());
        let service = AuthService::new(Arc::new(MemoryStore::new()), tokens.clone(), open_registration);
        (service, tokens)
    }

    fn register(username: &str, role: &str) -> RegisterRequest {
        RegisterRequest {
            username: Some(username.to_string()),
            password: Some("pw".to_string()),
            role: Some(role.to_string()),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let (auth, tokens) = service(true);
        let summary = auth.register(&register("nurse", "admin")).await.unwrap();
        assert_eq!(summary.role, Role::Admin);

        let issued = auth
            .login(&LoginRequest {
                username: Some("nurse".to_string()),
                password: Some("pw".to_string()),
            })
            .await
            .unwrap();
        let claim = tokens.verify(&issued.access_token).unwrap().unwrap();
        assert_eq!(claim, IdentityClaim::new("nurse", Role::Admin));
    }

    #[tokio::test]
    async fn duplicate_and_invalid_registrations() {
        let (auth, _) = service(true);
        auth.register(&register("nurse", "user")).await.unwrap();

        assert!(matches!(
            auth.register(&register("nurse", "user")).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            auth.register(&register("clerk", "superuser")).await,
            Err(ServiceError::Validation { field: Some("role"), .. })
        ));
        assert!(matches!(
            auth.register(&RegisterRequest::default()).await,
            Err(ServiceError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn closed_registration_is_forbidden() {
        let (auth, _) = service(false);
        assert!(matches!(
            auth.register(&register("nurse", "admin")).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let (auth, _) = service(true);
        auth.create_user("nurse", "pw", Role::User).await.unwrap();

        let attempt = |username: &str, password: &str| LoginRequest {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
        };
        let wrong = auth.login(&attempt("nurse", "nope")).await.unwrap_err();
        let unknown = auth.login(&attempt("ghost", "pw")).await.unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, ServiceError::Unauthorized(_)));
    }
}
