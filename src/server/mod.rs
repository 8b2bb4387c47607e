/// stdio 工具服务
///
/// 每行一个 JSON-RPC 2.0 消息；stdout 只用于协议输出，日志写到 stderr
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::mail::MailSource;
use crate::tools::{self, Tools};

/// 协议版本
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct Request {
    /// 没有 id 的是通知，不回复
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

impl Response {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

pub struct Server<S> {
    name: String,
    tools: Tools<S>,
}

impl<S: MailSource> Server<S> {
    pub fn new(name: impl Into<String>, tools: Tools<S>) -> Self {
        Self {
            name: name.into(),
            tools,
        }
    }

    /// 读 stdin 直到 EOF
    pub async fn run(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        tracing::info!("🚀 {} 已启动，等待请求", self.name);

        while let Some(line) = lines.next_line().await.context("读取 stdin 失败")? {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line).await {
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                stdout
                    .write_all(out.as_bytes())
                    .await
                    .context("写入 stdout 失败")?;
                stdout.flush().await?;
            }
        }

        tracing::info!("stdin 已关闭，退出");
        Ok(())
    }

    /// 处理一行输入，返回需要写回的响应（通知返回 None）
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("无法解析的请求: {}", e);
                return to_value(Response::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("parse error: {}", e),
                ));
            }
        };

        let request: Request = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return to_value(Response::error(
                    Value::Null,
                    INVALID_REQUEST,
                    format!("invalid request: {}", e),
                ));
            }
        };

        let Some(id) = request.id else {
            tracing::debug!("收到通知: {}", request.method);
            return None;
        };

        tracing::debug!("收到请求: {} (id={})", request.method, id);
        let response = match self.dispatch(&request.method, request.params).await {
            Ok(result) => Response::result(id, result),
            Err((code, message)) => Response::error(id, code, message),
        };
        to_value(response)
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, (i64, String)> {
        match method {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": self.name,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tools::definitions() })),
            "tools/call" => {
                let params: CallParams = serde_json::from_value(params)
                    .map_err(|e| (INVALID_PARAMS, format!("invalid params: {}", e)))?;

                match self.tools.call(&params.name, params.arguments).await {
                    Ok(output) => Ok(json!({
                        "content": [{ "type": "text", "text": output.text }],
                        "isError": output.is_error,
                    })),
                    Err(e) => {
                        tracing::warn!("工具调用无效: {}", e);
                        Err((INVALID_PARAMS, e.to_string()))
                    }
                }
            }
            _ => Err((METHOD_NOT_FOUND, format!("method not found: {}", method))),
        }
    }
}

fn to_value(response: Response) -> Option<Value> {
    serde_json::to_value(response).ok()
}
