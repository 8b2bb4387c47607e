/// Gmail 模块 - OAuth2 认证与 API 调用
pub mod api;
pub mod oauth;
pub mod session;
pub mod source;
pub mod token;
pub mod types;

pub use source::GmailMailSource;
