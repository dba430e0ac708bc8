//! User registration validation

use serde::Deserialize;

use super::{rules, ValidationPipeline};
use crate::error::{QualitagError, QualitagResult};
use crate::models::User;

/// Request to register a user
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub surname: String,
}

#[derive(Debug, Clone)]
pub struct ValidUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub surname: String,
}

/// Request to change a user's profile. Every field is required.
#[derive(Debug, Clone, Deserialize)]
pub struct UserUpdate {
    pub username: String,
    pub email: String,
    pub name: String,
    pub surname: String,
}

#[derive(Debug, Clone)]
pub struct ValidUserUpdate {
    pub username: String,
    pub email: String,
    pub name: String,
    pub surname: String,
}

impl ValidationPipeline {
    pub async fn validate_new_user(&self, request: &NewUser) -> QualitagResult<ValidUser> {
        let username = rules::required("Username", &request.username)?;
        rules::check_username(&username)?;
        let email = rules::required("Email", &request.email)?.to_lowercase();
        rules::check_email(&email)?;
        let password_hash = rules::required("Password", &request.password_hash)?;
        let name = rules::required("Name", &request.name)?;
        let surname = rules::required("Surname", &request.surname)?;

        if self.repo.user_by_username(&username).await?.is_some() {
            return Err(QualitagError::Conflict(format!("Username {} is already taken", username)));
        }
        if self.repo.user_by_email(&email).await?.is_some() {
            return Err(QualitagError::Conflict(format!("Email {} is already registered", email)));
        }

        Ok(ValidUser {
            username,
            email,
            password_hash,
            name,
            surname,
        })
    }

    /// Validate a profile change. A new username or email must not belong
    /// to another user.
    pub async fn validate_user_update(
        &self,
        user: &User,
        request: &UserUpdate,
    ) -> QualitagResult<ValidUserUpdate> {
        let username = rules::required("Username", &request.username)?;
        rules::check_username(&username)?;
        let email = rules::required("Email", &request.email)?.to_lowercase();
        rules::check_email(&email)?;
        let name = rules::required("Name", &request.name)?;
        let surname = rules::required("Surname", &request.surname)?;

        if username != user.username {
            if let Some(other) = self.repo.user_by_username(&username).await? {
                if other.id != user.id {
                    return Err(QualitagError::Conflict(format!(
                        "Username {} is already taken",
                        username
                    )));
                }
            }
        }
        if !email.eq_ignore_ascii_case(&user.email) {
            if let Some(other) = self.repo.user_by_email(&email).await? {
                if other.id != user.id {
                    return Err(QualitagError::Conflict(format!(
                        "Email {} is already registered",
                        email
                    )));
                }
            }
        }

        Ok(ValidUserUpdate {
            username,
            email,
            name,
            surname,
        })
    }
}
