//! Role checks layered on top of [`AuthUser`].
//!
//! Catalogue endpoints (genres, actors, plays, halls, performances) are
//! readable by any authenticated caller; handlers that write take
//! [`StaffUser`] instead. Reservations and tickets are scoped per owner
//! through [`AuthUser::owner_scope`].

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use super::AuthUser;
use crate::{error::AppError, AppState};

const STAFF_ONLY: &str = "You do not have permission to perform this action.";

/// Authenticated caller with `is_staff` set.
#[derive(Debug, Clone)]
pub struct StaffUser(pub AuthUser);

impl FromRequestParts<Arc<AppState>> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Сначала 401 для анонимов, потом 403 для не-staff
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(AppError::forbidden(STAFF_ONLY));
        }
        Ok(StaffUser(user))
    }
}

impl AuthUser {
    /// `None` lifts the per-owner filter.
    pub fn owner_scope(&self) -> Option<i64> {
        (!self.is_staff).then_some(self.user_id)
    }

    pub fn can_act_for(&self, owner_id: i64) -> bool {
        self.is_staff || self.user_id == owner_id
    }

    pub fn ensure_can_act_for(&self, owner_id: i64) -> Result<(), AppError> {
        if self.can_act_for(owner_id) {
            Ok(())
        } else {
            Err(AppError::forbidden(STAFF_ONLY))
        }
    }
}
