/// 惰性认证会话
///
/// 状态机：Unauthenticated → Authenticated，失败时进入 Failed，下次调用会重新尝试
use std::path::PathBuf;

use crate::config::oauth_config::OAuthConfig;
use crate::config::storage::CredentialStore;
use crate::error::TriageError;
use crate::mail::gmail::oauth;
use crate::mail::gmail::token::TokenManager;

pub enum SessionState {
    Unauthenticated,
    Authenticated(TokenManager),
    /// 最近一次失败原因
    Failed(String),
}

pub struct Session {
    state: SessionState,
    credentials_file: PathBuf,
    store: CredentialStore,
}

impl Session {
    pub fn new(credentials_file: impl Into<PathBuf>, store: CredentialStore) -> Self {
        Self {
            state: SessionState::Unauthenticated,
            credentials_file: credentials_file.into(),
            store,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    /// 确保会话已认证（幂等）
    ///
    /// 已认证时直接返回；否则从 Token 文件加载。绝不进行交互式授权
    pub fn ensure_authenticated(&mut self) -> Result<&mut TokenManager, TriageError> {
        if !self.is_authenticated() {
            if let SessionState::Failed(reason) = &self.state {
                tracing::debug!("重新尝试认证（上次失败: {}）", reason);
            }

            match self.authenticate() {
                Ok(manager) => {
                    tracing::info!("✅ Gmail 会话认证成功");
                    self.state = SessionState::Authenticated(manager);
                }
                Err(e) => {
                    tracing::warn!("Gmail 会话认证失败: {}", e);
                    self.state = SessionState::Failed(e.to_string());
                    return Err(e);
                }
            }
        }

        match &mut self.state {
            SessionState::Authenticated(manager) => Ok(manager),
            _ => Err(TriageError::AuthInvalid("session is not authenticated".to_string())),
        }
    }

    /// 获取有效的 Access Token（必要时先认证、再刷新）
    pub async fn access_token(&mut self) -> Result<String, TriageError> {
        let manager = self.ensure_authenticated()?;
        let result = manager.get_valid_token().await;
        match result {
            Ok(token) => Ok(token),
            Err(e) => {
                if let TriageError::AuthInvalid(reason) = &e {
                    self.invalidate(reason.clone());
                }
                Err(e)
            }
        }
    }

    /// Token 被服务端拒绝后调用，下次操作会重新加载 Token 文件
    pub fn invalidate(&mut self, reason: String) {
        tracing::warn!("Gmail 会话失效: {}", reason);
        self.state = SessionState::Failed(reason);
    }

    fn authenticate(&self) -> Result<TokenManager, TriageError> {
        let config = OAuthConfig::load(&self.credentials_file)?;

        match self.store.load()? {
            Some(token) => Ok(TokenManager::new(token, config, self.store.clone())),
            None => {
                tracing::info!("未找到已保存的 Token，需要执行授权命令");
                Err(TriageError::AuthRequired {
                    auth_url: oauth::authorization_url(&config)?,
                })
            }
        }
    }
}
