/// OAuth2 客户端凭据读取模块
///
/// 支持从环境变量或 Google 下载的 credentials.json 读取
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::TriageError;

/// Gmail 读取与修改标签（标记已读）所需的权限
pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// 默认重定向 URI（本地回环地址）
const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080";

/// OAuth2 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Google OAuth2 客户端 ID
    pub client_id: String,

    /// Google OAuth2 客户端密钥
    pub client_secret: String,

    /// 重定向 URI
    pub redirect_uri: String,

    /// 请求的 API 权限范围
    pub scopes: Vec<String>,
}

/// Google Cloud Console 导出的凭据文件
///
/// 桌面应用为 `installed` 段，Web 应用为 `web` 段
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
}

#[derive(Debug, Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl OAuthConfig {
    fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            scopes: vec![GMAIL_MODIFY_SCOPE.to_string()],
        }
    }

    /// 加载 OAuth2 配置
    ///
    /// 优先级（从高到低）：
    /// 1. 环境变量：`GMAIL_CLIENT_ID`, `GMAIL_CLIENT_SECRET`（可选 `OAUTH_REDIRECT_URI`）
    /// 2. 凭据文件：`credentials.json`
    ///
    /// # Errors
    /// - 凭据文件不存在或格式错误 → `AuthInvalid`
    pub fn load(credentials_file: &Path) -> Result<Self, TriageError> {
        if let (Ok(client_id), Ok(client_secret)) = (
            std::env::var("GMAIL_CLIENT_ID"),
            std::env::var("GMAIL_CLIENT_SECRET"),
        ) {
            tracing::info!("✅ 从环境变量加载 OAuth2 配置");
            let redirect_uri = std::env::var("OAUTH_REDIRECT_URI")
                .unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_string());
            return Ok(Self::new(client_id, client_secret, redirect_uri));
        }

        let config = Self::load_from_file(credentials_file)?;
        tracing::debug!("从凭据文件加载 OAuth2 配置: {}", credentials_file.display());
        Ok(config)
    }

    /// 从凭据文件加载
    pub fn load_from_file(path: &Path) -> Result<Self, TriageError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TriageError::AuthInvalid(format!(
                "cannot read client credentials file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::parse(&content)
    }

    /// 解析凭据文件内容
    fn parse(content: &str) -> Result<Self, TriageError> {
        let file: CredentialsFile = serde_json::from_str(content).map_err(|e| {
            TriageError::AuthInvalid(format!("malformed client credentials file: {}", e))
        })?;

        let section = file.installed.or(file.web).ok_or_else(|| {
            TriageError::AuthInvalid(
                "client credentials file has neither an `installed` nor a `web` section"
                    .to_string(),
            )
        })?;

        if section.client_id.trim().is_empty() {
            return Err(TriageError::AuthInvalid(
                "client credentials file has an empty client_id".to_string(),
            ));
        }

        let redirect_uri = section
            .redirect_uris
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        Ok(Self::new(
            section.client_id,
            section.client_secret,
            redirect_uri,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_installed_section() {
        let json = r#"{
            "installed": {
                "client_id": "abc.apps.googleusercontent.com",
                "client_secret": "s3cret",
                "redirect_uris": ["http://localhost"]
            }
        }"#;

        let config = OAuthConfig::parse(json).unwrap();
        assert_eq!(config.client_id, "abc.apps.googleusercontent.com");
        assert_eq!(config.client_secret, "s3cret");
        assert_eq!(config.redirect_uri, "http://localhost");
        assert_eq!(config.scopes, vec![GMAIL_MODIFY_SCOPE.to_string()]);
    }

    #[test]
    fn test_parse_web_section_without_redirects() {
        let json = r#"{"web": {"client_id": "id", "client_secret": "secret"}}"#;

        let config = OAuthConfig::parse(json).unwrap();
        assert_eq!(config.client_id, "id");
        assert_eq!(config.redirect_uri, DEFAULT_REDIRECT_URI);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            OAuthConfig::parse("not json"),
            Err(TriageError::AuthInvalid(_))
        ));
        assert!(matches!(
            OAuthConfig::parse(r#"{"other": {}}"#),
            Err(TriageError::AuthInvalid(_))
        ));
        assert!(matches!(
            OAuthConfig::parse(r#"{"installed": {"client_id": " ", "client_secret": "x"}}"#),
            Err(TriageError::AuthInvalid(_))
        ));
    }

    #[test]
    fn test_missing_file_is_auth_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let result = OAuthConfig::load_from_file(&dir.path().join("credentials.json"));
        assert!(matches!(result, Err(TriageError::AuthInvalid(_))));
    }
}
