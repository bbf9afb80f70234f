use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::UserRole;

pub const MAX_FIRST_NAME: usize = 16;
pub const MAX_LAST_NAME: usize = 24;
pub const MAX_EMAIL: usize = 64;
pub const MIN_PASSWORD: usize = 8;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SignInBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpBody {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Public view of a freshly created account.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpError {
    MissingField(&'static str),
    FieldTooLong(&'static str, usize),
    InvalidEmail,
    WeakPassword,
}

impl SignUpError {
    pub fn to_message(&self) -> String {
        match self {
            Self::MissingField(field) => format!("Missing required field: {}", field),
            Self::FieldTooLong(field, max) => {
                format!("{} must be at most {} characters", field, max)
            }
            Self::InvalidEmail => "Invalid email format".to_string(),
            Self::WeakPassword => {
                format!("Password must be at least {} characters", MIN_PASSWORD)
            }
        }
    }
}

impl SignUpBody {
    pub fn validate(&self) -> Result<(), SignUpError> {
        let fields = [
            ("first_name", &self.first_name, MAX_FIRST_NAME),
            ("last_name", &self.last_name, MAX_LAST_NAME),
            ("email", &self.email, MAX_EMAIL),
        ];

        for (name, value, max) in fields {
            if value.trim().is_empty() {
                return Err(SignUpError::MissingField(name));
            }
            if value.chars().count() > max {
                return Err(SignUpError::FieldTooLong(name, max));
            }
        }

        if !is_valid_email(&self.email) {
            return Err(SignUpError::InvalidEmail);
        }

        if self.password.chars().count() < MIN_PASSWORD {
            return Err(SignUpError::WeakPassword);
        }

        Ok(())
    }
}

/// `local@label(.label)*.tld` where local is word chars, `-` or `.`, labels are
/// word chars or `-`, and the tld is 2-4 of those.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    let word = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';

    if local.is_empty() || !local.chars().all(|c| word(c) || c == '.') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    let Some((tld, hosts)) = labels.split_last() else {
        return false;
    };
    if hosts.is_empty() {
        return false;
    }

    let tld_len = tld.chars().count();
    if !(2..=4).contains(&tld_len) || !tld.chars().all(word) {
        return false;
    }

    hosts.iter().all(|l| !l.is_empty() && l.chars().all(word))
}
