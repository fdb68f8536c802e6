use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;
use crate::database::{Collection, Model};

/// Portal account. Older records carry the hash under `password`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(alias = "password")]
    pub password_hash: String,
    pub role: Role,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, password_hash: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash,
            role,
            created_at: Utc::now(),
        }
    }
}

impl Model for User {
    const COLLECTION: Collection = Collection::Users;
}

/// Account as exposed over the API, without the hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}
