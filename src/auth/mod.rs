//! Acting identity.
//!
//! Sessions are terminated by the back-office gateway in front of this
//! service. The gateway forwards the resolved user as `x-user-id` and
//! `x-user-name`; this module turns those headers into an [`Actor`] that
//! handlers pass explicitly to the transfer engine.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::debug;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Who is performing an operation. Both fields are absent for anonymous calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Option<i32>,
    pub user_name: Option<String>,
}

impl Actor {
    pub fn new(user_id: i32, user_name: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            user_name: Some(user_name.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    fn from_parts(parts: &Parts) -> Self {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let user_id = header(USER_ID_HEADER).and_then(|raw| match raw.parse::<i32>() {
            Ok(id) => Some(id),
            Err(_) => {
                debug!(value = raw, "ignoring unparseable user id header");
                None
            }
        });

        Self {
            user_id,
            user_name: header(USER_NAME_HEADER).map(str::to_string),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Actor::from_parts(parts))
    }
}
