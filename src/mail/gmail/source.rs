/// 基于 Gmail API 的邮件来源
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::config::storage::CredentialStore;
use crate::error::{Result, TriageError};
use crate::mail::gmail::api::{GMAIL_API_BASE, GmailApiClient};
use crate::mail::gmail::session::Session;
use crate::mail::gmail::types::ModifyRequest;
use crate::mail::{MAX_PAGE_SIZE, MailSource, Message};

/// `hours_back` 小时前的秒级时间戳，早于 1970 年时取 0
fn unread_since(now: DateTime<Utc>, hours_back: u32) -> i64 {
    now.checked_sub_signed(Duration::hours(i64::from(hours_back)))
        .map_or(0, |after| after.timestamp().max(0))
}

pub struct GmailMailSource {
    session: Mutex<Session>,
    api_base: String,
}

impl GmailMailSource {
    /// 创建邮件来源（不会立即认证）
    pub fn new(credentials_file: impl Into<std::path::PathBuf>, store: CredentialStore) -> Self {
        Self {
            session: Mutex::new(Session::new(credentials_file, store)),
            api_base: GMAIL_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn api_client(&self) -> Result<GmailApiClient> {
        let token = self.session.lock().await.access_token().await?;
        Ok(GmailApiClient::new(token, self.api_base.as_str()))
    }

    /// 服务端拒绝 Token 时使会话失效
    async fn checked<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(TriageError::AuthInvalid(reason)) = &result {
            self.session.lock().await.invalidate(reason.clone());
        }
        result
    }
}

#[async_trait]
impl MailSource for GmailMailSource {
    async fn fetch_unread(&self, hours_back: u32) -> Result<Vec<Message>> {
        let client = self.api_client().await?;
        let after = unread_since(Utc::now(), hours_back);

        let refs = self
            .checked(client.list_unread(after, MAX_PAGE_SIZE).await)
            .await?;

        // 逐封获取，单封失败只跳过；Token 被拒绝时整批失败
        let mut messages = Vec::with_capacity(refs.len());
        for message_ref in refs {
            let raw = match client.get_message(&message_ref.id).await {
                Ok(raw) => raw,
                Err(e @ TriageError::AuthInvalid(_)) => return self.checked(Err(e)).await,
                Err(e) => {
                    tracing::warn!("获取邮件 {} 失败，跳过: {}", message_ref.id, e);
                    continue;
                }
            };

            match Message::try_from(raw) {
                Ok(message) => messages.push(message),
                Err(e) => tracing::warn!("解析邮件 {} 失败，跳过: {}", message_ref.id, e),
            }
        }

        tracing::info!(
            "📬 最近 {} 小时内获取到 {} 封未读邮件",
            hours_back,
            messages.len()
        );
        Ok(messages)
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        let client = self.api_client().await?;
        self.checked(client.modify(id, &ModifyRequest::mark_read()).await)
            .await?;

        tracing::info!("✅ 邮件 {} 已标记为已读", id);
        Ok(())
    }
}
