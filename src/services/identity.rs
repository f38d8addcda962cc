// src/services/identity.rs

use crate::{
    models::UserId,
    services::grading::GradingError,
    store::AccountStore,
    utils::jwt::Claims,
};

/// Resolves verified token claims to an existing account id.
///
/// A subject that is not numeric, or that names a deleted account, yields
/// `GradingError::Authentication`.
pub async fn resolve_caller(
    accounts: &dyn AccountStore,
    claims: &Claims,
) -> Result<UserId, GradingError> {
    let user_id = claims.sub.parse::<UserId>().map_err(|_| {
        GradingError::Authentication(format!("token subject '{}' is not a user id", claims.sub))
    })?;

    match accounts.find_by_id(user_id).await {
        Ok(Some(user)) => Ok(user.id),
        Ok(None) => Err(GradingError::Authentication(format!(
            "user {user_id} no longer exists"
        ))),
        Err(e) => Err(GradingError::Fetch(e.to_string())),
    }
}
