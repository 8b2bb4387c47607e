/// 分拣核心的错误类型
///
/// 所有错误都以结构化结果返回给调用方，不会导致进程崩溃
use thiserror::Error;

/// 授权命令的提示文本
pub const AUTHORIZE_HINT: &str = "run `mailtriage authorize` once to grant mailbox access";

#[derive(Debug, Error)]
pub enum TriageError {
    /// 本地没有已保存的 Token，需要用户执行一次授权命令
    #[error("authorization required: open {auth_url} or {}", AUTHORIZE_HINT)]
    AuthRequired { auth_url: String },

    /// 凭据文件格式错误、不可读，或 Token 已被拒绝
    #[error("invalid credentials: {0}")]
    AuthInvalid(String),

    /// 远程调用失败（不自动重试）
    #[error("mail provider request failed: {0}")]
    Fetch(String),

    /// 未知的邮件 ID
    #[error("email not found: {0}")]
    NotFound(String),
}

impl TriageError {
    /// 错误类别（用于工具层的结构化错误结果）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthRequired { .. } => "auth_required",
            Self::AuthInvalid(_) => "auth_invalid",
            Self::Fetch(_) => "fetch_error",
            Self::NotFound(_) => "not_found",
        }
    }
}

pub type Result<T> = std::result::Result<T, TriageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = TriageError::AuthRequired {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth?x=1".to_string(),
        };
        assert_eq!(err.kind(), "auth_required");
        assert!(err.to_string().contains("mailtriage authorize"));

        assert_eq!(TriageError::NotFound("abc".into()).kind(), "not_found");
        assert_eq!(TriageError::Fetch("boom".into()).kind(), "fetch_error");
        assert_eq!(TriageError::AuthInvalid("bad".into()).kind(), "auth_invalid");
    }
}
