/// Token 文件存储模块
///
/// 负责将已授权的 Token 持久化到 JSON 文件，并区分"不存在"与"已损坏"
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::TriageError;

/// 已保存的 OAuth2 Token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    /// 访问令牌
    pub access_token: String,

    /// 刷新令牌
    pub refresh_token: String,

    /// 访问令牌过期时间（UTC）
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn new(access_token: String, refresh_token: String, expires_in_seconds: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in_seconds),
        }
    }

    /// 检查 Token 是否即将过期
    ///
    /// # Arguments
    /// * `threshold_minutes` - 提前多少分钟算作"即将过期"
    pub fn is_expiring(&self, threshold_minutes: i64) -> bool {
        let threshold = Utc::now() + chrono::Duration::minutes(threshold_minutes);
        self.expires_at <= threshold
    }

    /// 更新访问令牌
    pub fn update_access_token(&mut self, new_token: String, expires_in_seconds: i64) {
        self.access_token = new_token;
        self.expires_at = Utc::now() + chrono::Duration::seconds(expires_in_seconds);
    }
}

/// Token 文件存储
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载 Token
    ///
    /// # Returns
    /// 文件不存在时返回 `None`
    ///
    /// # Errors
    /// - 文件不可读或格式错误 → `AuthInvalid`
    pub fn load(&self) -> Result<Option<StoredToken>, TriageError> {
        if !self.path.exists() {
            tracing::debug!("Token 文件不存在: {}", self.path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            TriageError::AuthInvalid(format!(
                "cannot read token file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let token: StoredToken = serde_json::from_str(&content).map_err(|e| {
            TriageError::AuthInvalid(format!(
                "malformed token file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        if token.refresh_token.is_empty() {
            return Err(TriageError::AuthInvalid(format!(
                "token file {} has no refresh token",
                self.path.display()
            )));
        }

        tracing::debug!("成功加载 Token（过期时间: {}）", token.expires_at);
        Ok(Some(token))
    }

    /// 保存 Token（覆盖写入）
    pub fn save(&self, token: &StoredToken) -> Result<(), TriageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TriageError::AuthInvalid(format!("cannot create token directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(token)
            .map_err(|e| TriageError::AuthInvalid(format!("cannot serialize token: {}", e)))?;

        std::fs::write(&self.path, content).map_err(|e| {
            TriageError::AuthInvalid(format!(
                "cannot write token file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!("Token 已保存到: {}", self.path.display());
        Ok(())
    }
}
