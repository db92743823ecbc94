//! Credential check plus weekly allowance, as one store update.

use super::policy::{format_timestamp, LoginPolicy};
use super::store::UserStore;
use crate::error::AppError;
use chrono::NaiveDateTime;

/// Successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub username: String,
    /// Logins still available this week after this one.
    pub remaining: u32,
}

/// Authenticate `username` at `now` and record the login.
///
/// Checks run in order: unknown user, wrong password, weekly cap. A failed
/// attempt leaves the store untouched.
pub fn authenticate(
    store: &dyn UserStore,
    policy: &LoginPolicy,
    username: &str,
    password: &str,
    now: NaiveDateTime,
) -> Result<LoginGrant, AppError> {
    let mut outcome = Err(AppError::NotFound);

    store.update(&mut |users| {
        let Some(record) = users.get_mut(username) else {
            outcome = Err(AppError::NotFound);
            return false;
        };
        if record.password != password {
            outcome = Err(AppError::InvalidCredentials);
            return false;
        }
        let used = policy.logins_this_week(record, now);
        if !policy.allows(used) {
            outcome = Err(AppError::RateLimited {
                limit: policy.weekly_limit(),
            });
            return false;
        }

        record.logins.push(format_timestamp(now));
        outcome = Ok(LoginGrant {
            username: username.to_owned(),
            remaining: policy.remaining_after(used + 1),
        });
        true
    })?;

    match &outcome {
        Ok(grant) => tracing::info!(
            username = %grant.username,
            remaining = grant.remaining,
            "Login accepted"
        ),
        Err(AppError::RateLimited { limit }) => {
            tracing::warn!(username = username, limit = *limit, "Weekly login limit reached")
        }
        Err(e) => tracing::warn!(username = username, "Login rejected: {e}"),
    }

    outcome
}
