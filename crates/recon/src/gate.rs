//! Driver-side request checks. The engine itself trusts its caller; drivers
//! call [`authorize`] before invoking any engine operation.

use subtle::ConstantTimeEq;

use crate::config::AuthConfig;
use crate::error::ReconError;

pub trait Authorizer {
    /// Request-forgery token check.
    fn verify_token(&self, token: Option<&str>) -> bool;

    /// Capability to manage author links.
    fn can_manage(&self) -> bool;
}

/// Token from configuration plus a fixed capability flag.
#[derive(Debug, Clone)]
pub struct StaticAuthorizer {
    expected: Option<String>,
    can_manage: bool,
}

impl StaticAuthorizer {
    pub fn new(expected: Option<String>, can_manage: bool) -> Self {
        Self { expected, can_manage }
    }

    pub fn from_config(auth: &AuthConfig, can_manage: bool) -> Self {
        Self::new(auth.token.clone(), can_manage)
    }
}

impl Authorizer for StaticAuthorizer {
    fn verify_token(&self, token: Option<&str>) -> bool {
        match (&self.expected, token) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(expected), Some(provided)) => {
                expected.as_bytes().ct_eq(provided.as_bytes()).into()
            }
        }
    }

    fn can_manage(&self) -> bool {
        self.can_manage
    }
}

/// Token first, then capability.
pub fn authorize<A>(authorizer: &A, token: Option<&str>) -> Result<(), ReconError>
where
    A: Authorizer + ?Sized,
{
    if !authorizer.verify_token(token) {
        return Err(ReconError::SecurityCheckFailed);
    }
    if !authorizer.can_manage() {
        return Err(ReconError::PermissionDenied);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_configured_token_accepts_any_request() {
        let auth = StaticAuthorizer::new(None, true);
        assert!(authorize(&auth, None).is_ok());
        assert!(authorize(&auth, Some("whatever")).is_ok());
    }

    #[test]
    fn wrong_or_missing_token_fails_security_check() {
        let auth = StaticAuthorizer::new(Some("s3cret".into()), true);
        assert!(matches!(authorize(&auth, None), Err(ReconError::SecurityCheckFailed)));
        assert!(matches!(
            authorize(&auth, Some("s3cre")),
            Err(ReconError::SecurityCheckFailed)
        ));
        assert!(authorize(&auth, Some("s3cret")).is_ok());
    }

    #[test]
    fn token_is_checked_before_capability() {
        let auth = StaticAuthorizer::new(Some("s3cret".into()), false);
        assert!(matches!(authorize(&auth, Some("nope")), Err(ReconError::SecurityCheckFailed)));
        assert!(matches!(
            authorize(&auth, Some("s3cret")),
            Err(ReconError::PermissionDenied)
        ));
    }
}
