/// VIP 域名注册表
///
/// 仅保存在进程内存中，重启后丢失
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct VipRegistry {
    /// 按插入顺序保存，不做大小写归一化
    domains: RwLock<Vec<String>>,
}

impl VipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加域名（幂等）
    ///
    /// # Returns
    /// 新插入时返回 `true`，已存在时返回 `false`
    pub async fn add(&self, domain: &str) -> bool {
        let mut domains = self.domains.write().await;
        if domains.iter().any(|d| d == domain) {
            tracing::debug!("VIP 域名已存在: {}", domain);
            return false;
        }

        domains.push(domain.to_string());
        tracing::info!("⭐ 添加 VIP 域名: {}（共 {} 个）", domain, domains.len());
        true
    }

    /// 按插入顺序列出所有域名
    pub async fn list(&self) -> Vec<String> {
        self.domains.read().await.clone()
    }
}
