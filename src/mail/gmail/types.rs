/// Gmail API 数据结构及到 [`Message`] 的映射
use base64::alphabet;
use base64::engine::{DecodePaddingMode, Engine, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mail::Message;

/// Gmail 使用 URL 安全的 base64，可能带也可能不带填充
const BASE64_URL_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// `users.messages.list` 响应
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageListResponse {
    /// 没有匹配结果时 Gmail 直接省略该字段
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    pub result_size_estimate: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
}

/// `users.messages.get?format=full` 响应
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    pub internal_date: Option<String>,
    pub payload: Option<MessagePart>,
}

/// 邮件体部件（可多层嵌套）
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    pub mime_type: Option<String>,
    pub filename: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    pub data: Option<String>,
    pub attachment_id: Option<String>,
}

/// `users.messages.modify` 请求体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_label_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_label_ids: Vec<String>,
}

impl ModifyRequest {
    /// 移除 UNREAD 标签
    pub fn mark_read() -> Self {
        Self {
            add_label_ids: Vec::new(),
            remove_label_ids: vec!["UNREAD".to_string()],
        }
    }
}

impl MessagePart {
    /// 按名称查找头（不区分大小写）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// 深度优先查找第一个 text/plain 部件
    fn find_plain_text(&self) -> Option<&MessagePart> {
        for part in &self.parts {
            if part.mime_type.as_deref() == Some("text/plain") {
                return Some(part);
            }
            if let Some(found) = part.find_plain_text() {
                return Some(found);
            }
        }
        None
    }

    /// 是否含有附件：任一部件同时有文件名和附件 ID
    fn has_attachment(&self) -> bool {
        self.parts.iter().any(|part| {
            let named = part.filename.as_deref().is_some_and(|f| !f.is_empty());
            let referenced = part
                .body
                .as_ref()
                .and_then(|b| b.attachment_id.as_deref())
                .is_some_and(|id| !id.is_empty());
            (named && referenced) || part.has_attachment()
        })
    }

    /// 提取正文
    ///
    /// 有子部件时取第一个 text/plain（找不到则为空），没有子部件时取顶层正文
    fn extract_body(&self) -> Result<String, String> {
        let source = if self.parts.is_empty() {
            Some(self)
        } else {
            self.find_plain_text()
        };

        match source.and_then(|p| p.body.as_ref()).and_then(|b| b.data.as_deref()) {
            Some(data) => decode_body(data),
            None => Ok(String::new()),
        }
    }
}

/// 解码 base64url 正文
pub fn decode_body(data: &str) -> Result<String, String> {
    let bytes = BASE64_URL_LENIENT
        .decode(data.trim())
        .map_err(|e| format!("invalid base64 body: {}", e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// 解析接收时间：优先 internalDate（毫秒），其次 Date 头
fn parse_received_at(internal_date: Option<&str>, date_header: Option<&str>) -> DateTime<Utc> {
    internal_date
        .and_then(|d| d.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
        .or_else(|| {
            date_header
                .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
                .map(|d| d.with_timezone(&Utc))
        })
        .unwrap_or_else(|| {
            tracing::warn!("邮件缺少可解析的时间，使用当前时间");
            Utc::now()
        })
}

impl TryFrom<GmailMessage> for Message {
    type Error = String;

    fn try_from(msg: GmailMessage) -> Result<Self, Self::Error> {
        let payload = msg
            .payload
            .ok_or_else(|| format!("message {} has no payload", msg.id))?;

        let body = payload.extract_body()?;
        let has_attachments = payload.has_attachment();
        let is_direct = payload
            .header("To")
            .is_some_and(|to| !to.trim().is_empty());

        Ok(Message {
            received_at: parse_received_at(msg.internal_date.as_deref(), payload.header("Date")),
            sender: payload.header("From").unwrap_or_default().to_string(),
            subject: payload.header("Subject").unwrap_or_default().to_string(),
            body,
            is_direct,
            has_attachments,
            labels: msg.label_ids.into_iter().collect(),
            id: msg.id,
        })
    }
}
