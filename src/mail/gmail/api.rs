/// Gmail API 调用模块
///
/// 负责列出未读邮件、获取完整邮件内容以及移除未读标签
use serde::de::DeserializeOwned;

use crate::error::TriageError;
use crate::mail::gmail::types::{GmailMessage, MessageListResponse, MessageRef, ModifyRequest};
use crate::utils::http_client;

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// 构造未读邮件查询（`after:` 使用秒级时间戳）
pub fn unread_query(after_epoch_secs: i64) -> String {
    format!("is:unread after:{}", after_epoch_secs)
}

/// 将非成功状态映射为错误
///
/// `subject` 为相关的邮件 ID 或操作描述
fn error_for_status(status: u16, body: &str, subject: &str) -> TriageError {
    match status {
        401 => TriageError::AuthInvalid(format!("access token rejected: {}", body.trim())),
        404 => TriageError::NotFound(subject.to_string()),
        400 if body.contains("Invalid id value") => TriageError::NotFound(subject.to_string()),
        _ => TriageError::Fetch(format!("{} returned HTTP {}: {}", subject, status, body.trim())),
    }
}

/// Gmail API 客户端
pub struct GmailApiClient {
    access_token: String,
    base_url: String,
}

impl GmailApiClient {
    /// # Arguments
    /// * `access_token` - 有效的 Access Token
    /// * `base_url` - API 根地址，通常为 [`GMAIL_API_BASE`]
    pub fn new(access_token: String, base_url: impl Into<String>) -> Self {
        Self {
            access_token,
            base_url: base_url.into(),
        }
    }

    async fn check(
        response: reqwest::Response,
        subject: &str,
    ) -> Result<reqwest::Response, TriageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!("Gmail API 返回错误 {} ({}): {}", status, subject, body);
        Err(error_for_status(status.as_u16(), &body, subject))
    }

    async fn parse<T: DeserializeOwned>(
        response: reqwest::Response,
        subject: &str,
    ) -> Result<T, TriageError> {
        response
            .json()
            .await
            .map_err(|e| TriageError::Fetch(format!("cannot parse {} response: {}", subject, e)))
    }

    /// 列出指定时间之后的未读邮件（单页）
    pub async fn list_unread(
        &self,
        after_epoch_secs: i64,
        max_results: u32,
    ) -> Result<Vec<MessageRef>, TriageError> {
        let query = unread_query(after_epoch_secs);
        tracing::debug!("查询未读邮件: q=\"{}\", maxResults={}", query, max_results);

        let response = http_client::get_client()
            .get(format!("{}/messages", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[("q", query), ("maxResults", max_results.to_string())])
            .send()
            .await
            .map_err(|e| TriageError::Fetch(format!("messages.list request failed: {}", e)))?;

        let response = Self::check(response, "messages.list").await?;
        let list: MessageListResponse = Self::parse(response, "messages.list").await?;

        tracing::debug!(
            "共 {} 封未读邮件（估计总数: {:?}）",
            list.messages.len(),
            list.result_size_estimate
        );
        Ok(list.messages)
    }

    /// 获取完整邮件（format=full）
    pub async fn get_message(&self, id: &str) -> Result<GmailMessage, TriageError> {
        let response = http_client::get_client()
            .get(format!("{}/messages/{}", self.base_url, id))
            .bearer_auth(&self.access_token)
            .query(&[("format", "full")])
            .send()
            .await
            .map_err(|e| TriageError::Fetch(format!("messages.get {} failed: {}", id, e)))?;

        let response = Self::check(response, id).await?;
        Self::parse(response, id).await
    }

    /// 修改邮件标签
    pub async fn modify(&self, id: &str, request: &ModifyRequest) -> Result<(), TriageError> {
        let response = http_client::get_client()
            .post(format!("{}/messages/{}/modify", self.base_url, id))
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| TriageError::Fetch(format!("messages.modify {} failed: {}", id, e)))?;

        Self::check(response, id).await?;
        Ok(())
    }
}
