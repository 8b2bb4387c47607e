/// 邮件访问抽象
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::error::Result;

pub mod gmail;

/// 单次拉取的最大邮件数（不做分页）
pub const MAX_PAGE_SIZE: u32 = 50;

/// 从邮件服务拉取的只读邮件快照
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    /// 收件人头（To）非空即视为直接发给用户，不区分 To/Cc
    pub is_direct: bool,
    pub has_attachments: bool,
    pub labels: BTreeSet<String>,
}

/// 邮件来源
///
/// 实现方负责认证；单封邮件失败只跳过该封
#[async_trait]
pub trait MailSource: Send + Sync {
    /// 拉取最近 `hours_back` 小时内的未读邮件（最多 [`MAX_PAGE_SIZE`] 封）
    async fn fetch_unread(&self, hours_back: u32) -> Result<Vec<Message>>;

    /// 移除邮件的未读标记
    async fn mark_read(&self, id: &str) -> Result<()>;
}
