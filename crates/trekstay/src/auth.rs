//! Request identity resolution.
//!
//! Callers identify themselves with an `x-user-id` header resolved against
//! the user repository; there is no session or token layer in scope, the
//! platform sits behind an authenticating proxy.

use axum::http::{HeaderMap, StatusCode};

use crate::domain::{User, UserId};
use crate::repository::{RepositoryError, UserRepository};

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing x-user-id header")]
    MissingIdentity,
    #[error("unknown user '{0}'")]
    UnknownUser(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingIdentity | AuthError::UnknownUser(_) => StatusCode::UNAUTHORIZED,
            AuthError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Resolve the calling user from request headers.
pub fn authenticate(users: &dyn UserRepository, headers: &HeaderMap) -> Result<User, AuthError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MissingIdentity)?;

    users
        .fetch(&UserId(raw.to_string()))?
        .ok_or_else(|| AuthError::UnknownUser(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::next_user_id;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryUsers {
        records: Mutex<HashMap<UserId, User>>,
    }

    impl UserRepository for MemoryUsers {
        fn insert(&self, user: User) -> Result<User, RepositoryError> {
            let mut guard = self.records.lock().expect("lock");
            guard.insert(user.user_id.clone(), user.clone());
            Ok(user)
        }

        fn fetch(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
            let guard = self.records.lock().expect("lock");
            Ok(guard.get(id).cloned())
        }
    }

    fn sample_user() -> User {
        User {
            user_id: next_user_id(),
            email: "guest@example.com".to_string(),
            first_name: "Abel".to_string(),
            last_name: "Tesfaye".to_string(),
            phone: None,
            is_staff: false,
        }
    }

    #[test]
    fn authenticate_resolves_header_against_repository() {
        let users = MemoryUsers::default();
        let user = users.insert(sample_user()).expect("insert");

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, user.user_id.0.parse().expect("header"));

        let resolved = authenticate(&users, &headers).expect("resolves");
        assert_eq!(resolved.user_id, user.user_id);
    }

    #[test]
    fn authenticate_rejects_missing_header() {
        let users = MemoryUsers::default();
        match authenticate(&users, &HeaderMap::new()) {
            Err(AuthError::MissingIdentity) => {}
            other => panic!("expected missing identity, got {other:?}"),
        }
    }

    #[test]
    fn authenticate_rejects_unknown_user() {
        let users = MemoryUsers::default();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, "usr-999999".parse().expect("header"));

        match authenticate(&users, &headers) {
            Err(AuthError::UnknownUser(id)) => assert_eq!(id, "usr-999999"),
            other => panic!("expected unknown user, got {other:?}"),
        }
    }
}
