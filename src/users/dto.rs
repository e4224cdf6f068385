use serde::{Deserialize, Serialize};

use crate::db::User;

/// Body of the registration and profile endpoints. Every field is optional here;
/// which ones are required depends on the endpoint and method.
#[derive(Debug, Default, Deserialize)]
pub struct UserPayload {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

/// Public view of an account; the password is write-only.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UserResponse {
    pub email: String,
    pub name: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            email: u.email,
            name: u.name,
        }
    }
}
