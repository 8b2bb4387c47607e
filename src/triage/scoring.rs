/// 邮件重要度评分
///
/// 纯函数：结果只取决于邮件、VIP 域名快照和参考时间
use chrono::{DateTime, Duration, Utc};

use crate::mail::Message;

/// 垃圾邮件判定的分数
pub const SPAM_SCORE: i32 = -10;

/// 分数上限
pub const MAX_SCORE: i32 = 100;

/// 参与评分的正文长度（字符）
const BODY_SNIPPET_CHARS: usize = 500;

/// 命中数达到该值即判定为垃圾邮件
const SPAM_THRESHOLD: usize = 2;

const SPAM_INDICATORS: &[&str] = &[
    "unsubscribe",
    "promotional",
    "marketing",
    "newsletter",
    "no-reply",
    "advertisement",
    "deals",
    "offer expires",
    "limited time",
    "act now",
];

/// 关键词 → 基础权重
const IMPORTANCE_KEYWORDS: &[(&str, f64)] = &[
    ("urgent", 10.0),
    ("important", 8.0),
    ("asap", 10.0),
    ("deadline", 7.0),
    ("meeting", 6.0),
    ("action required", 9.0),
    ("please respond", 7.0),
    ("invoice", 6.0),
    ("payment", 6.0),
    ("reminder", 5.0),
    ("interview", 8.0),
    ("approval", 7.0),
];

/// 主题命中的权重倍数
const SUBJECT_MULTIPLIER: f64 = 1.5;

const VIP_BONUS: f64 = 20.0;
const DIRECT_BONUS: f64 = 10.0;
const ATTACHMENT_BONUS: f64 = 5.0;
const RECENT_BONUS: f64 = 15.0;
const TODAY_BONUS: f64 = 5.0;

/// 正文前 500 个字符（按字符而非字节截断）
fn body_snippet(body: &str) -> &str {
    match body.char_indices().nth(BODY_SNIPPET_CHARS) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// 发件人是否包含任一 VIP 域名（子串匹配）
pub fn is_vip_sender(sender: &str, vip_domains: &[String]) -> bool {
    let sender = sender.to_lowercase();
    vip_domains.iter().any(|domain| sender.contains(domain.as_str()))
}

fn recency_bonus(received_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age = now - received_at;
    if age < Duration::hours(4) {
        RECENT_BONUS
    } else if age < Duration::hours(24) {
        TODAY_BONUS
    } else {
        0.0
    }
}

/// 计算重要度分数，范围 `[-10, 100]`
///
/// 先判定垃圾邮件（命中 ≥ 2 个指示词直接返回 -10），
/// 否则累加 VIP、关键词、直接收件、时效和附件加分，最后截断到 100
pub fn score(message: &Message, vip_domains: &[String], now: DateTime<Utc>) -> i32 {
    let subject = message.subject.to_lowercase();
    let body = body_snippet(&message.body).to_lowercase();

    let spam_hits = SPAM_INDICATORS
        .iter()
        .filter(|indicator| subject.contains(*indicator) || body.contains(*indicator))
        .count();
    if spam_hits >= SPAM_THRESHOLD {
        return SPAM_SCORE;
    }

    let mut total = 0.0;

    if is_vip_sender(&message.sender, vip_domains) {
        total += VIP_BONUS;
    }

    for (keyword, weight) in IMPORTANCE_KEYWORDS {
        if subject.contains(keyword) {
            total += weight * SUBJECT_MULTIPLIER;
        }
        if body.contains(keyword) {
            total += weight;
        }
    }

    if message.is_direct {
        total += DIRECT_BONUS;
    }

    total += recency_bonus(message.received_at, now);

    if message.has_attachments {
        total += ATTACHMENT_BONUS;
    }

    // 小数部分直接舍去
    total.min(f64::from(MAX_SCORE)) as i32
}
