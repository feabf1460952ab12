use secrecy::{ExposeSecret, SecretString};

/// Account credentials for the Rently login service.
///
/// The email is the account identity; the password never leaves a
/// [`SecretString`] except when the login body is serialized.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
        }
    }

    /// Reject blank parameters before any request is made.
    pub(crate) fn validate(&self) -> Result<(), crate::Error> {
        if self.email.trim().is_empty() {
            return Err(crate::Error::MissingParameters("email"));
        }
        if self.password.expose_secret().is_empty() {
            return Err(crate::Error::MissingParameters("password"));
        }
        Ok(())
    }
}

/// An authenticated session: the bearer token issued by the login service.
///
/// Owned by the cloud client. Callers only observe whether one exists.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub(crate) token: SecretString,
}

impl Session {
    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}
