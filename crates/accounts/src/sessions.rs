//! Session issuing and refresh-token rotation.

use auth::{SessionTokens, TokenKind};
use chrono::{DateTime, Utc};
use common::{AppError, AppResult, SoftDeletable, User};
use db::RefreshRecord;

use crate::identity::AuthOutcome;
use crate::{Accounts, storage};

impl Accounts {
    /// Sign an access/refresh pair and record the refresh token.
    pub async fn issue_session(&self, user: &User) -> AppResult<SessionTokens> {
        let tokens = auth::issue_session(
            &self.config.jwt,
            user.meta.id,
            user.role,
            self.config.access_ttl,
            self.config.refresh_ttl,
        )
        .map_err(|e| {
            tracing::error!(error = %e, "token signing failed");
            AppError::Internal
        })?;

        let claims = &tokens.refresh_claims;
        let record = RefreshRecord {
            user_id: user.meta.id,
            jti: claims.jti.clone(),
            token_hash: auth::fingerprint(&tokens.refresh),
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
            revoked: false,
            created_at: Utc::now(),
        };
        self.store.insert_refresh(&record).await.map_err(storage)?;
        Ok(tokens)
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<(User, SessionTokens)> {
        match self.authenticate(email, password).await? {
            AuthOutcome::Authenticated(user) => {
                let tokens = self.issue_session(&user).await?;
                tracing::info!(user = %user.meta.id, "login succeeded");
                Ok((user, tokens))
            }
            AuthOutcome::Disabled(user) => {
                tracing::warn!(user = %user.meta.id, "login refused for disabled account");
                Err(AppError::AccountDisabled)
            }
            AuthOutcome::Invalid => {
                tracing::warn!("login failed");
                Err(AppError::Unauthorized)
            }
        }
    }

    /// Exchange a refresh token for a new pair. The presented token is
    /// revoked and cannot be used again.
    pub async fn refresh(&self, token: &str) -> AppResult<(User, SessionTokens)> {
        let claims = auth::verify(&self.config.jwt, token, TokenKind::Refresh)
            .map_err(|_| AppError::Unauthorized)?;
        let record = self
            .store
            .find_refresh(&claims.jti)
            .await
            .map_err(storage)?
            .filter(|r| !r.revoked && r.token_hash == auth::fingerprint(token))
            .ok_or_else(|| {
                tracing::warn!(jti = %claims.jti, "refresh token reuse or unknown token");
                AppError::Unauthorized
            })?;

        // only one of two concurrent refreshes gets to revoke the record
        if self.store.revoke_refresh(&record.jti).await.map_err(storage)? == 0 {
            return Err(AppError::Unauthorized);
        }

        let user = self
            .store
            .find_user(record.user_id)
            .await
            .map_err(storage)?
            .ok_or(AppError::Unauthorized)?;
        if !user.is_active() {
            return Err(AppError::AccountDisabled);
        }
        let tokens = self.issue_session(&user).await?;
        Ok((user, tokens))
    }

    /// Revoke a refresh token. Unknown or invalid tokens are ignored.
    pub async fn logout(&self, token: &str) -> AppResult<()> {
        if let Ok(claims) = auth::verify(&self.config.jwt, token, TokenKind::Refresh) {
            self.store
                .revoke_refresh(&claims.jti)
                .await
                .map_err(storage)?;
            tracing::info!(user = %claims.sub, "logged out");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{accounts, registration, PASSWORD};
    use common::Role;

    #[tokio::test]
    async fn login_issues_verifiable_tokens() {
        let accounts = accounts();
        let user = accounts
            .register(registration("a@x.com", "Jane Doe", Role::Patient))
            .await
            .unwrap();
        let (logged_in, tokens) = accounts.login("A@X.com", PASSWORD).await.unwrap();
        assert_eq!(logged_in.meta.id, user.meta.id);

        let claims = auth::verify(accounts.jwt_keys(), &tokens.access, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user.meta.id);
        assert_eq!(claims.role, Role::Patient);
        let stored = accounts
            .store()
            .find_refresh(&tokens.refresh_claims.jti)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.token_hash, auth::fingerprint(&tokens.refresh));
    }

    #[tokio::test]
    async fn login_failures_are_distinguished() {
        let accounts = accounts();
        let user = accounts
            .register(registration("a@x.com", "Jane Doe", Role::Patient))
            .await
            .unwrap();
        assert_eq!(
            accounts.login("a@x.com", "nope").await.unwrap_err(),
            AppError::Unauthorized
        );
        accounts.deactivate(user.meta.id).await.unwrap();
        assert_eq!(
            accounts.login("a@x.com", PASSWORD).await.unwrap_err(),
            AppError::AccountDisabled
        );
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_reuse() {
        let accounts = accounts();
        accounts
            .register(registration("a@x.com", "Jane Doe", Role::Patient))
            .await
            .unwrap();
        let (_, first) = accounts.login("a@x.com", PASSWORD).await.unwrap();

        let (_, second) = accounts.refresh(&first.refresh).await.unwrap();
        assert_ne!(second.refresh_claims.jti, first.refresh_claims.jti);
        assert_eq!(
            accounts.refresh(&first.refresh).await.unwrap_err(),
            AppError::Unauthorized
        );
        // an access token is not a refresh token
        assert_eq!(
            accounts.refresh(&second.access).await.unwrap_err(),
            AppError::Unauthorized
        );

        accounts.logout(&second.refresh).await.unwrap();
        assert_eq!(
            accounts.refresh(&second.refresh).await.unwrap_err(),
            AppError::Unauthorized
        );
        accounts.logout("garbage").await.unwrap();
    }
}
