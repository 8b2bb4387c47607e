/// 面向调用方的工具
///
/// 五个操作的参数默认值、JSON Schema 及结果格式化
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::TriageError;
use crate::mail::MailSource;
use crate::triage::{Category, ScoredMessage, TriageService};

pub const GET_IMPORTANT_EMAILS: &str = "get_important_emails";
pub const MARK_EMAIL_HANDLED: &str = "mark_email_handled";
pub const ADD_VIP_DOMAIN: &str = "add_vip_domain";
pub const GET_VIP_DOMAINS: &str = "get_vip_domains";
pub const GET_EMAIL_SUMMARY: &str = "get_email_summary";

/// 列表中正文预览的长度（字符）
const SNIPPET_CHARS: usize = 200;

/// 工具定义（名称、描述、参数 Schema）
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// 工具调用结果
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    fn success(value: Value) -> Self {
        Self {
            text: pretty(&value),
            is_error: false,
        }
    }

    /// 核心错误以结构化结果返回，而不是协议错误
    fn failure(err: &TriageError) -> Self {
        let mut value = json!({
            "error": err.kind(),
            "message": err.to_string(),
        });
        if let TriageError::AuthRequired { auth_url } = err {
            value["auth_url"] = json!(auth_url);
            value["setup"] = json!(crate::error::AUTHORIZE_HINT);
        }

        Self {
            text: pretty(&value),
            is_error: true,
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// 工具调用本身无效（未知工具或参数错误）
#[derive(Debug, thiserror::Error)]
pub enum ToolCallError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

fn default_hours_back() -> u32 {
    24
}

fn default_min_importance() -> i32 {
    30
}

fn default_max_results() -> usize {
    10
}

#[derive(Debug, Deserialize)]
struct GetImportantArgs {
    #[serde(default = "default_hours_back")]
    hours_back: u32,
    #[serde(default = "default_min_importance")]
    min_importance: i32,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct MarkHandledArgs {
    email_id: String,
}

#[derive(Debug, Deserialize)]
struct AddVipArgs {
    domain: String,
}

#[derive(Debug, Deserialize)]
struct SummaryArgs {
    #[serde(default = "default_hours_back")]
    hours_back: u32,
}

/// 邮件在结果中的呈现
#[derive(Debug, Serialize)]
struct EmailView<'a> {
    id: &'a str,
    sender: &'a str,
    subject: &'a str,
    received_at: String,
    importance_score: i32,
    category: &'static str,
    is_direct: bool,
    has_attachments: bool,
    snippet: String,
}

impl<'a> From<&'a ScoredMessage> for EmailView<'a> {
    fn from(scored: &'a ScoredMessage) -> Self {
        let message = &scored.message;
        Self {
            id: &message.id,
            sender: &message.sender,
            subject: &message.subject,
            received_at: message.received_at.to_rfc3339(),
            importance_score: scored.importance_score,
            category: Category::from_score(scored.importance_score).as_str(),
            is_direct: message.is_direct,
            has_attachments: message.has_attachments,
            snippet: message.body.chars().take(SNIPPET_CHARS).collect(),
        }
    }
}

/// 所有工具的定义
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: GET_IMPORTANT_EMAILS,
            description: "Fetch recent unread emails ranked by importance score (-10 to 100).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "hours_back": {
                        "type": "integer",
                        "minimum": 0,
                        "default": default_hours_back(),
                        "description": "Only consider unread emails received within this many hours"
                    },
                    "min_importance": {
                        "type": "integer",
                        "default": default_min_importance(),
                        "description": "Minimum importance score to include"
                    },
                    "max_results": {
                        "type": "integer",
                        "minimum": 0,
                        "default": default_max_results(),
                        "description": "Maximum number of emails to return"
                    }
                }
            }),
        },
        ToolDefinition {
            name: MARK_EMAIL_HANDLED,
            description: "Mark an email as read once it has been handled.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "email_id": {"type": "string", "description": "ID of the email to mark as read"}
                },
                "required": ["email_id"]
            }),
        },
        ToolDefinition {
            name: ADD_VIP_DOMAIN,
            description: "Treat emails from a sender domain as high priority for this session.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "domain": {"type": "string", "description": "Sender domain, e.g. example.com"}
                },
                "required": ["domain"]
            }),
        },
        ToolDefinition {
            name: GET_VIP_DOMAINS,
            description: "List the VIP sender domains configured for this session.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: GET_EMAIL_SUMMARY,
            description: "Summarize recent unread emails by category with a recommendation.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "hours_back": {
                        "type": "integer",
                        "minimum": 0,
                        "default": default_hours_back(),
                        "description": "Only consider unread emails received within this many hours"
                    }
                }
            }),
        },
    ]
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolCallError> {
    // 无参数调用时调用方可能传 null
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|e| ToolCallError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// 工具分发
pub struct Tools<S> {
    service: TriageService<S>,
}

impl<S: MailSource> Tools<S> {
    pub fn new(service: TriageService<S>) -> Self {
        Self { service }
    }

    /// 调用工具
    ///
    /// # Errors
    /// 仅在工具不存在或参数无效时返回错误；业务失败以 `is_error` 结果返回
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolCallError> {
        tracing::debug!("调用工具: {} {}", name, arguments);

        let result = match name {
            GET_IMPORTANT_EMAILS => self.get_important_emails(parse_args(name, arguments)?).await,
            MARK_EMAIL_HANDLED => self.mark_email_handled(parse_args(name, arguments)?).await,
            ADD_VIP_DOMAIN => {
                let args: AddVipArgs = parse_args(name, arguments)?;
                // 空域名会匹配所有发件人
                if args.domain.trim().is_empty() {
                    return Err(ToolCallError::InvalidArguments {
                        tool: name.to_string(),
                        reason: "domain must not be empty".to_string(),
                    });
                }
                self.add_vip_domain(args).await
            }
            GET_VIP_DOMAINS => self.get_vip_domains().await,
            GET_EMAIL_SUMMARY => self.get_email_summary(parse_args(name, arguments)?).await,
            _ => return Err(ToolCallError::UnknownTool(name.to_string())),
        };

        Ok(match result {
            Ok(value) => ToolOutput::success(value),
            Err(e) => {
                tracing::error!("工具 {} 执行失败: {}", name, e);
                ToolOutput::failure(&e)
            }
        })
    }

    async fn get_important_emails(&self, args: GetImportantArgs) -> Result<Value, TriageError> {
        let emails = self
            .service
            .fetch_important(args.hours_back, args.min_importance, args.max_results)
            .await?;

        let views: Vec<EmailView> = emails.iter().map(EmailView::from).collect();
        let summary = if views.is_empty() {
            format!(
                "No unread emails with importance >= {} in the last {} hours.",
                args.min_importance, args.hours_back
            )
        } else {
            format!(
                "Found {} important email(s) in the last {} hours (min importance {}).",
                views.len(),
                args.hours_back,
                args.min_importance
            )
        };

        Ok(json!({
            "emails": views,
            "count": views.len(),
            "summary": summary,
        }))
    }

    async fn mark_email_handled(&self, args: MarkHandledArgs) -> Result<Value, TriageError> {
        self.service.mark_handled(&args.email_id).await?;
        Ok(json!({
            "success": true,
            "message": format!("Email {} marked as read.", args.email_id),
        }))
    }

    async fn add_vip_domain(&self, args: AddVipArgs) -> Result<Value, TriageError> {
        let added = self.service.vip().add(&args.domain).await;
        let message = if added {
            format!("Added VIP domain: {}", args.domain)
        } else {
            format!("{} is already a VIP domain.", args.domain)
        };

        Ok(json!({
            "success": true,
            "message": message,
            "vip_domains": self.service.vip().list().await,
        }))
    }

    async fn get_vip_domains(&self) -> Result<Value, TriageError> {
        let domains = self.service.vip().list().await;
        let message = if domains.is_empty() {
            "No VIP domains configured.".to_string()
        } else {
            format!("{} VIP domain(s) configured.", domains.len())
        };

        Ok(json!({
            "vip_domains": domains,
            "message": message,
        }))
    }

    async fn get_email_summary(&self, args: SummaryArgs) -> Result<Value, TriageError> {
        let summary = self.service.summarize(args.hours_back).await?;
        Ok(json!({
            "hours_back": args.hours_back,
            "total": summary.total,
            "urgent": summary.urgent,
            "important": summary.important,
            "normal": summary.normal,
            "likely_spam": summary.likely_spam,
            "recommendation": summary.recommendation(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::VipRegistry;
    use crate::triage::service::tests::{FakeSource, inbox};
    use std::sync::Arc;

    fn tools() -> Tools<FakeSource> {
        Tools::new(TriageService::new(
            FakeSource::new(inbox()),
            Arc::new(VipRegistry::new()),
        ))
    }

    fn parse(output: &ToolOutput) -> Value {
        serde_json::from_str(&output.text).unwrap()
    }

    #[test]
    fn test_definitions_cover_all_tools() {
        let names: Vec<&str> = definitions().iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                GET_IMPORTANT_EMAILS,
                MARK_EMAIL_HANDLED,
                ADD_VIP_DOMAIN,
                GET_VIP_DOMAINS,
                GET_EMAIL_SUMMARY
            ]
        );

        let value = serde_json::to_value(&definitions()[1]).unwrap();
        assert_eq!(value["inputSchema"]["required"], json!(["email_id"]));
    }

    #[tokio::test]
    async fn test_get_important_emails_defaults() {
        let tools = tools();
        tools
            .call(ADD_VIP_DOMAIN, json!({"domain": "vip.com"}))
            .await
            .unwrap();

        let output = tools.call(GET_IMPORTANT_EMAILS, Value::Null).await.unwrap();
        assert!(!output.is_error);

        let value = parse(&output);
        assert_eq!(value["count"], 2);
        assert_eq!(value["emails"][0]["id"], "urgent");
        assert_eq!(value["emails"][0]["importance_score"], 90);
        assert_eq!(value["emails"][0]["category"], "urgent");
        assert!(value["summary"].as_str().unwrap().contains("Found 2"));
    }

    #[tokio::test]
    async fn test_add_vip_domain_twice() {
        let tools = tools();
        let acme = json!({"domain": "acme.com"});
        let first = parse(&tools.call(ADD_VIP_DOMAIN, acme.clone()).await.unwrap());
        assert_eq!(first["vip_domains"], json!(["acme.com"]));

        let second = parse(&tools.call(ADD_VIP_DOMAIN, acme).await.unwrap());
        assert!(second["message"].as_str().unwrap().contains("already"));

        let listed = parse(&tools.call(GET_VIP_DOMAINS, json!({})).await.unwrap());
        assert_eq!(listed["vip_domains"], json!(["acme.com"]));
    }

    #[tokio::test]
    async fn test_get_vip_domains_empty() {
        let listed = parse(&tools().call(GET_VIP_DOMAINS, json!({})).await.unwrap());
        assert_eq!(listed["vip_domains"], json!([]));
        assert_eq!(listed["message"], "No VIP domains configured.");
    }

    #[tokio::test]
    async fn test_email_summary() {
        let value = parse(
            &tools()
                .call(GET_EMAIL_SUMMARY, json!({"hours_back": 48}))
                .await
                .unwrap(),
        );

        assert_eq!(value["hours_back"], 48);
        assert_eq!(value["total"], 5);
        assert_eq!(value["likely_spam"], 1);
        assert!(value["recommendation"].is_string());
    }

    #[tokio::test]
    async fn test_mark_unknown_email_is_error_result() {
        let tools = tools();
        let ok = tools
            .call(MARK_EMAIL_HANDLED, json!({"email_id": "plain"}))
            .await
            .unwrap();
        assert!(!ok.is_error);

        let missing = tools
            .call(MARK_EMAIL_HANDLED, json!({"email_id": "nope"}))
            .await
            .unwrap();
        assert!(missing.is_error);
        assert_eq!(parse(&missing)["error"], "not_found");
    }

    #[tokio::test]
    async fn test_invalid_calls() {
        let tools = tools();
        assert!(matches!(
            tools.call("delete_everything", json!({})).await,
            Err(ToolCallError::UnknownTool(_))
        ));
        assert!(matches!(
            tools.call(MARK_EMAIL_HANDLED, json!({})).await,
            Err(ToolCallError::InvalidArguments { .. })
        ));
        assert!(matches!(
            tools.call(ADD_VIP_DOMAIN, json!({"domain": "  "})).await,
            Err(ToolCallError::InvalidArguments { .. })
        ));
        assert!(matches!(
            tools.call(GET_IMPORTANT_EMAILS, json!({"hours_back": "soon"})).await,
            Err(ToolCallError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_auth_required_failure_carries_url() {
        let output = ToolOutput::failure(&TriageError::AuthRequired {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth?client_id=x".to_string(),
        });
        assert!(output.is_error);

        let value = parse(&output);
        assert_eq!(value["error"], "auth_required");
        assert!(value["auth_url"].as_str().unwrap().contains("client_id=x"));
        assert!(value["setup"].as_str().unwrap().contains("mailtriage authorize"));
    }
}
