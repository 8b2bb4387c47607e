//! 分拣结果数据模型

use serde::Serialize;

use crate::mail::Message;

/// 带重要度分数的邮件（每次查询重新计算，不持久化）
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMessage {
    pub message: Message,
    pub importance_score: i32,
}

/// 分数类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// ≥ 70
    Urgent,
    /// [40, 70)
    Important,
    /// [0, 40)
    Normal,
    /// < 0，只可能来自垃圾邮件判定
    LikelySpam,
}

impl Category {
    pub const URGENT_MIN: i32 = 70;
    pub const IMPORTANT_MIN: i32 = 40;

    pub fn from_score(score: i32) -> Self {
        if score >= Self::URGENT_MIN {
            Self::Urgent
        } else if score >= Self::IMPORTANT_MIN {
            Self::Important
        } else if score >= 0 {
            Self::Normal
        } else {
            Self::LikelySpam
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Important => "important",
            Self::Normal => "normal",
            Self::LikelySpam => "likely_spam",
        }
    }
}

/// 未读邮件分类统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriageSummary {
    pub total: usize,
    pub urgent: usize,
    pub important: usize,
    pub normal: usize,
    pub likely_spam: usize,
}

impl TriageSummary {
    /// 按分数统计
    pub fn from_scores(scores: impl IntoIterator<Item = i32>) -> Self {
        let mut summary = Self::default();
        for score in scores {
            summary.total += 1;
            match Category::from_score(score) {
                Category::Urgent => summary.urgent += 1,
                Category::Important => summary.important += 1,
                Category::Normal => summary.normal += 1,
                Category::LikelySpam => summary.likely_spam += 1,
            }
        }
        summary
    }

    /// 一行处理建议
    pub fn recommendation(&self) -> String {
        if self.urgent > 0 {
            format!(
                "You have {} urgent email(s) that need immediate attention.",
                self.urgent
            )
        } else if self.important > 0 {
            format!(
                "No urgent emails, but {} important email(s) are worth reviewing soon.",
                self.important
            )
        } else {
            "No urgent or important emails. You're all caught up.".to_string()
        }
    }
}
