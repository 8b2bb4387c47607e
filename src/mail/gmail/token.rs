/// Token 自动刷新管理模块
use oauth2::{RefreshToken, RequestTokenError, TokenResponse};

use crate::config::oauth_config::OAuthConfig;
use crate::config::storage::{CredentialStore, StoredToken};
use crate::error::TriageError;
use crate::mail::gmail::oauth;

/// Token 刷新阈值（提前多少分钟刷新）
const REFRESH_THRESHOLD_MINUTES: i64 = 5;

/// Token 管理器
///
/// 负责在访问令牌即将过期时用刷新令牌换取新令牌，并写回 Token 文件
pub struct TokenManager {
    token: StoredToken,
    oauth_config: OAuthConfig,
    store: CredentialStore,
}

impl TokenManager {
    pub fn new(token: StoredToken, oauth_config: OAuthConfig, store: CredentialStore) -> Self {
        Self {
            token,
            oauth_config,
            store,
        }
    }

    /// 获取有效的 Access Token
    ///
    /// 如果 Token 即将过期（默认提前 5 分钟），则自动刷新
    pub async fn get_valid_token(&mut self) -> Result<String, TriageError> {
        if self.token.is_expiring(REFRESH_THRESHOLD_MINUTES) {
            tracing::info!(
                "Access Token 即将过期（{}），自动刷新",
                self.token.expires_at
            );
            self.refresh_access_token().await?;
        }

        Ok(self.token.access_token.clone())
    }

    /// 使用 Refresh Token 从 Google 获取新的 Access Token
    ///
    /// # Errors
    /// - 刷新令牌被拒绝（过期或撤销）→ `AuthInvalid`
    /// - 网络请求失败 → `Fetch`
    async fn refresh_access_token(&mut self) -> Result<(), TriageError> {
        tracing::debug!("开始刷新 Access Token");

        let client =
            oauth::build_client(&self.oauth_config, &self.oauth_config.redirect_uri, true)?;

        let token_response = client
            .exchange_refresh_token(&RefreshToken::new(self.token.refresh_token.clone()))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(resp) => {
                    tracing::error!("❌ Token 刷新被拒绝: {}", resp);
                    TriageError::AuthInvalid(format!(
                        "refresh token rejected ({}); re-run `mailtriage authorize`",
                        resp
                    ))
                }
                other => TriageError::Fetch(format!("token refresh failed: {}", other)),
            })?;

        let expires_in = token_response
            .expires_in()
            .unwrap_or(std::time::Duration::from_secs(3600))
            .as_secs() as i64;

        self.token
            .update_access_token(token_response.access_token().secret().to_string(), expires_in);

        // Google 有时会轮换刷新令牌
        if let Some(refresh) = token_response.refresh_token() {
            self.token.refresh_token = refresh.secret().to_string();
        }

        self.store.save(&self.token)?;

        tracing::info!(
            "✅ Access Token 刷新成功（新的过期时间: {}）",
            self.token.expires_at
        );

        Ok(())
    }

    #[cfg(test)]
    pub fn token(&self) -> &StoredToken {
        &self.token
    }
}
