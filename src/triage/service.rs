/// 分拣服务：拉取 → 评分 → 过滤/排序/统计
use chrono::Utc;
use std::sync::Arc;

use crate::error::Result;
use crate::mail::MailSource;
use crate::triage::model::{ScoredMessage, TriageSummary};
use crate::triage::scoring;
use crate::triage::vip::VipRegistry;

pub struct TriageService<S> {
    source: S,
    vip: Arc<VipRegistry>,
}

impl<S: MailSource> TriageService<S> {
    /// # Arguments
    /// * `source` - 邮件来源
    /// * `vip` - 会话范围内共享的 VIP 注册表
    pub fn new(source: S, vip: Arc<VipRegistry>) -> Self {
        Self { source, vip }
    }

    pub fn vip(&self) -> &VipRegistry {
        &self.vip
    }

    /// 拉取并评分最近 `hours_back` 小时内的未读邮件
    async fn scored(&self, hours_back: u32) -> Result<Vec<ScoredMessage>> {
        let messages = self.source.fetch_unread(hours_back).await?;
        let vip_domains = self.vip.list().await;
        let now = Utc::now();

        Ok(messages
            .into_iter()
            .map(|message| {
                let importance_score = scoring::score(&message, &vip_domains, now);
                ScoredMessage {
                    message,
                    importance_score,
                }
            })
            .collect())
    }

    /// 重要邮件：分数 ≥ `min_importance`，按分数降序，最多 `max_results` 封
    pub async fn fetch_important(
        &self,
        hours_back: u32,
        min_importance: i32,
        max_results: usize,
    ) -> Result<Vec<ScoredMessage>> {
        let mut scored: Vec<ScoredMessage> = self
            .scored(hours_back)
            .await?
            .into_iter()
            .filter(|m| m.importance_score >= min_importance)
            .collect();

        scored.sort_by(|a, b| b.importance_score.cmp(&a.importance_score));
        scored.truncate(max_results);

        tracing::debug!(
            "重要邮件: {} 封（min_importance={}, max_results={}）",
            scored.len(),
            min_importance,
            max_results
        );
        Ok(scored)
    }

    /// 按类别统计最近 `hours_back` 小时内的未读邮件
    pub async fn summarize(&self, hours_back: u32) -> Result<TriageSummary> {
        let scored = self.scored(hours_back).await?;
        let summary = TriageSummary::from_scores(scored.iter().map(|m| m.importance_score));

        tracing::debug!("邮件统计: {:?}", summary);
        Ok(summary)
    }

    /// 标记邮件为已处理（移除未读标记）
    pub async fn mark_handled(&self, id: &str) -> Result<()> {
        self.source.mark_read(id).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::TriageError;
    use crate::mail::Message;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// 内存中的邮件来源
    pub(crate) struct FakeSource {
        pub messages: Vec<Message>,
        pub fail_fetch: bool,
        pub marked: Mutex<Vec<String>>,
    }

    impl FakeSource {
        pub(crate) fn new(messages: Vec<Message>) -> Self {
            Self {
                messages,
                fail_fetch: false,
                marked: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MailSource for FakeSource {
        async fn fetch_unread(&self, _hours_back: u32) -> Result<Vec<Message>> {
            if self.fail_fetch {
                return Err(TriageError::Fetch("HTTP 503".to_string()));
            }
            Ok(self.messages.clone())
        }

        async fn mark_read(&self, id: &str) -> Result<()> {
            if !self.messages.iter().any(|m| m.id == id) {
                return Err(TriageError::NotFound(id.to_string()));
            }
            self.marked.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    pub(crate) fn message(id: &str, sender: &str, subject: &str, body: &str) -> Message {
        Message {
            id: id.to_string(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            received_at: Utc::now() - Duration::hours(30),
            is_direct: false,
            has_attachments: false,
            labels: BTreeSet::from(["UNREAD".to_string()]),
        }
    }

    /// 分数分别为 -10, 0, 15, 45, 90 左右的一组邮件
    pub(crate) fn inbox() -> Vec<Message> {
        let mut urgent = message(
            "urgent",
            "boss@vip.com",
            "URGENT: action required",
            "please respond asap",
        );
        urgent.is_direct = true;
        urgent.received_at = Utc::now() - Duration::hours(1);

        let mut important = message("important", "hr@corp.com", "Interview invoice", "meeting");
        important.is_direct = true;
        important.has_attachments = true;

        vec![
            message("spam", "deals@shop.com", "Limited time deals", "unsubscribe"),
            message("plain", "friend@example.com", "hello", "how are you"),
            message("meeting", "team@example.com", "Meeting notes", "meeting"),
            important,
            urgent,
        ]
    }

    fn service(messages: Vec<Message>) -> TriageService<FakeSource> {
        TriageService::new(FakeSource::new(messages), Arc::new(VipRegistry::new()))
    }

    #[tokio::test]
    async fn test_fetch_important_filters_sorts_and_truncates() {
        let service = service(inbox());
        service.vip().add("vip.com").await;

        let results = service.fetch_important(24, 30, 10).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|m| m.message.id.as_str()).collect();
        assert_eq!(ids, vec!["urgent", "important"]);
        assert_eq!(results[0].importance_score, 90);
        assert!(results.iter().all(|m| m.importance_score >= 30));

        let top = service.fetch_important(24, -100, 3).await.unwrap();
        assert_eq!(top.len(), 3);
        assert!(
            top.windows(2)
                .all(|w| w[0].importance_score >= w[1].importance_score)
        );
    }

    #[tokio::test]
    async fn test_fetch_important_zero_results() {
        let service = service(inbox());
        assert!(service.fetch_important(24, 0, 0).await.unwrap().is_empty());
        assert!(service.fetch_important(24, 101, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vip_added_later_changes_scores() {
        let service = service(vec![message("x", "ceo@acme.com", "hello", "")]);
        let before = service.fetch_important(24, -100, 10).await.unwrap();
        assert_eq!(before[0].importance_score, 0);

        service.vip().add("acme.com").await;
        let after = service.fetch_important(24, -100, 10).await.unwrap();
        assert_eq!(after[0].importance_score, 20);
    }

    #[tokio::test]
    async fn test_summarize_partitions_total() {
        let service = service(inbox());
        service.vip().add("vip.com").await;

        let summary = service.summarize(24).await.unwrap();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.urgent, 1);
        assert_eq!(summary.important, 1);
        assert_eq!(summary.normal, 2);
        assert_eq!(summary.likely_spam, 1);
        assert_eq!(
            summary.urgent + summary.important + summary.normal + summary.likely_spam,
            summary.total
        );
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let mut source = FakeSource::new(inbox());
        source.fail_fetch = true;
        let service = TriageService::new(source, Arc::new(VipRegistry::new()));

        assert!(matches!(
            service.summarize(24).await,
            Err(TriageError::Fetch(_))
        ));
        assert!(matches!(
            service.fetch_important(24, 30, 10).await,
            Err(TriageError::Fetch(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_handled_delegates() {
        let service = service(inbox());
        service.mark_handled("plain").await.unwrap();
        assert_eq!(*service.source.marked.lock().unwrap(), vec!["plain".to_string()]);

        assert!(matches!(
            service.mark_handled("missing").await,
            Err(TriageError::NotFound(_))
        ));
    }
}
