/// 分拣引擎：评分、VIP 注册表与分拣服务
pub mod model;
pub mod scoring;
pub mod service;
pub mod vip;

pub use model::{Category, ScoredMessage};
pub use service::TriageService;
pub use vip::VipRegistry;
