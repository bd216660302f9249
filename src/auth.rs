use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::PgWireResult;

/// Cleartext password check against the single server-wide password.
/// Any user name is accepted.
#[derive(Debug)]
pub struct InnkeepAuthSource {
    password: String,
}

impl InnkeepAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthSource for InnkeepAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        tracing::debug!(user = ?login.user(), database = ?login.database(), "password check");
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}
