/// Gmail OAuth2 授权
///
/// - [`authorization_url`]：生成供用户手动打开的授权链接（核心只报告，不交互）
/// - [`authorize`]：一次性的交互式授权码流程（带 PKCE），仅由 `mailtriage authorize` 调用
use anyhow::{Context, Result};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use std::time::Duration;
use tiny_http::{Header, Request, Response, Server};
use tokio::sync::oneshot;
use url::Url;

use crate::config::oauth_config::OAuthConfig;
use crate::config::storage::{CredentialStore, StoredToken};
use crate::error::TriageError;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// OAuth2 回调超时时间（秒）
const CALLBACK_TIMEOUT_SECS: u64 = 120;

/// 本地服务器端口范围
const PORT_RANGE: std::ops::Range<u16> = 8080..8090;

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>mailtriage</title></head>
<body style="font-family: sans-serif; text-align: center; margin-top: 80px">
    <h1>Authorization complete</h1>
    <p>mailtriage can now read your unread mail. You may close this page.</p>
</body>
</html>"#;

const ERROR_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>mailtriage</title></head>
<body style="font-family: sans-serif; text-align: center; margin-top: 80px">
    <h1>Authorization failed</h1>
    <p>Return to the terminal for details and run the command again.</p>
</body>
</html>"#;

type CallbackResult = (AuthorizationCode, CsrfToken);

/// 构建 OAuth2 客户端
///
/// `with_secret = false` 时构建公共客户端（仅 PKCE）
pub fn build_client(
    config: &OAuthConfig,
    redirect_uri: &str,
    with_secret: bool,
) -> std::result::Result<BasicClient, TriageError> {
    let invalid =
        |e: url::ParseError| TriageError::AuthInvalid(format!("invalid OAuth2 URL: {}", e));

    let secret = (with_secret && !config.client_secret.is_empty())
        .then(|| ClientSecret::new(config.client_secret.clone()));

    Ok(BasicClient::new(
        ClientId::new(config.client_id.clone()),
        secret,
        AuthUrl::new(GOOGLE_AUTH_URL.to_string()).map_err(invalid)?,
        Some(TokenUrl::new(GOOGLE_TOKEN_URL.to_string()).map_err(invalid)?),
    )
    .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string()).map_err(invalid)?))
}

/// 生成授权 URL（用于 `AuthRequired` 错误）
///
/// 离线访问 + 强制同意，确保 Google 返回 refresh_token
pub fn authorization_url(config: &OAuthConfig) -> std::result::Result<String, TriageError> {
    let client = build_client(config, &config.redirect_uri, true)?;

    let (auth_url, _csrf_state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(config.scopes.iter().map(|s| Scope::new(s.clone())))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .url();

    Ok(auth_url.to_string())
}

/// 执行一次交互式授权
///
/// 1. 绑定本地回调端口
/// 2. 生成带 PKCE 的授权 URL
/// 3. 打开浏览器（失败时在日志中给出 URL）
/// 4. 等待回调并验证 CSRF state
/// 5. 交换 Token 并写入 Token 文件
///
/// # Errors
/// - 所有端口均被占用
/// - 用户拒绝授权或超时
/// - Token 交换失败或未返回 refresh_token
pub async fn authorize(config: &OAuthConfig, store: &CredentialStore) -> Result<StoredToken> {
    tracing::info!("🔐 开始 Gmail OAuth2 授权流程");

    let (server, port) = bind_local_server()?;
    let redirect_uri = format!("http://localhost:{}", port);
    tracing::info!("✅ 本地服务器启动成功: {}", redirect_uri);

    let client = build_client(config, &redirect_uri, true)?;
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf_state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(config.scopes.iter().map(|s| Scope::new(s.clone())))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(pkce_challenge)
        .url();

    let (code_tx, code_rx) = oneshot::channel();
    let server_handle = std::thread::spawn(move || serve_callback(server, port, code_tx));

    tracing::info!("请在浏览器中完成授权: {}", auth_url);
    if let Err(e) = webbrowser::open(auth_url.as_str()) {
        tracing::warn!("无法打开浏览器，请手动复制上面的 URL: {}", e);
    }

    let received = tokio::time::timeout(Duration::from_secs(CALLBACK_TIMEOUT_SECS), code_rx)
        .await
        .context("授权超时：用户未在规定时间内完成授权")?;

    // 服务器线程在收到回调（或出错）后退出
    let server_result = server_handle
        .join()
        .map_err(|_| anyhow::anyhow!("服务器线程 panic"))?;

    let (received_code, received_state) = match received {
        Ok(callback) => callback,
        Err(_) => {
            server_result.context("本地服务器接收回调失败")?;
            anyhow::bail!("本地服务器未收到授权回调");
        }
    };
    tracing::info!("✅ 收到授权回调");

    if received_state.secret() != csrf_state.secret() {
        anyhow::bail!("CSRF 验证失败：state 不匹配");
    }
    tracing::info!("✅ CSRF 验证通过");

    let token_response =
        exchange_code_for_token(received_code, pkce_verifier, config, &redirect_uri)
            .await
            .context("Token 交换失败")?;

    let refresh_token = token_response
        .refresh_token()
        .ok_or_else(|| {
            anyhow::anyhow!("未收到 refresh_token（请在 Google 账户中撤销授权后重试）")
        })?
        .secret()
        .to_string();

    let expires_in = token_response
        .expires_in()
        .unwrap_or(Duration::from_secs(3600))
        .as_secs() as i64;

    let token = StoredToken::new(
        token_response.access_token().secret().to_string(),
        refresh_token,
        expires_in,
    );

    store.save(&token).context("保存 Token 失败")?;

    tracing::info!("🎉 授权完成，Token 已保存到 {}", store.path().display());
    Ok(token)
}

/// 在端口范围内绑定第一个可用端口
fn bind_local_server() -> Result<(Server, u16)> {
    let mut last_error = None;
    for port in PORT_RANGE {
        match Server::http(format!("127.0.0.1:{}", port)) {
            Ok(server) => return Ok((server, port)),
            Err(e) => {
                tracing::debug!("端口 {} 不可用: {}", port, e);
                last_error = Some(e.to_string());
            }
        }
    }

    Err(anyhow::anyhow!(
        "无法启动本地服务器（所有端口均被占用）: {}",
        last_error.unwrap_or_default()
    ))
}

fn html_response(body: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    let response = Response::from_string(body);
    match Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]) {
        Ok(header) => response.with_header(header),
        Err(_) => response,
    }
}

/// 处理回调请求，直到收到 code 或 error
fn serve_callback(
    server: Server,
    port: u16,
    code_tx: oneshot::Sender<CallbackResult>,
) -> Result<()> {
    for request in server.incoming_requests() {
        match parse_callback(port, request.url())? {
            Callback::Code(code, state) => {
                respond(request, html_response(SUCCESS_HTML))?;
                code_tx.send((code, state)).ok();
                return Ok(());
            }
            Callback::Denied(error) => {
                tracing::error!("用户拒绝授权: {}", error);
                respond(request, html_response(ERROR_HTML))?;
                anyhow::bail!("用户拒绝授权: {}", error);
            }
            Callback::Other => {
                // 例如浏览器请求 /favicon.ico
                respond(request, Response::from_string("").with_status_code(404))?;
            }
        }
    }

    Ok(())
}

fn respond(request: Request, response: Response<std::io::Cursor<Vec<u8>>>) -> Result<()> {
    request.respond(response).context("写入回调响应失败")
}

#[derive(Debug)]
enum Callback {
    Code(AuthorizationCode, CsrfToken),
    Denied(String),
    Other,
}

fn parse_callback(port: u16, path: &str) -> Result<Callback> {
    let url = Url::parse(&format!("http://localhost:{}{}", port, path))?;
    let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        return Ok(Callback::Denied(error.clone()));
    }

    match (params.get("code"), params.get("state")) {
        (Some(code), Some(state)) => Ok(Callback::Code(
            AuthorizationCode::new(code.clone()),
            CsrfToken::new(state.clone()),
        )),
        _ => Ok(Callback::Other),
    }
}

/// 交换授权码为 Token
///
/// 首次带 client_secret；返回 invalid_client 时以公共客户端（仅 PKCE）重试
async fn exchange_code_for_token(
    code: AuthorizationCode,
    verifier: PkceCodeVerifier,
    config: &OAuthConfig,
    redirect_uri: &str,
) -> Result<
    oauth2::StandardTokenResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>,
> {
    let code_secret = code.secret().to_string();
    let verifier_secret = verifier.secret().to_string();

    let client = build_client(config, redirect_uri, true)?;
    let first = client
        .exchange_code(code)
        .set_pkce_verifier(verifier)
        .request_async(oauth2::reqwest::async_http_client)
        .await;

    let err = match first {
        Ok(token) => return Ok(token),
        Err(e) => e,
    };

    let err_str = format!("{:?}", err);
    tracing::error!("Token 交换详细错误: {}", err_str);

    if !(err_str.contains("invalid_client") || err_str.contains("Unauthorized")) {
        anyhow::bail!("Token 交换请求失败: {}", err);
    }

    tracing::warn!(
        "首次交换返回 invalid_client，尝试不带 client_secret 的公共客户端重试（PKCE-only）"
    );

    build_client(config, redirect_uri, false)?
        .exchange_code(AuthorizationCode::new(code_secret))
        .set_pkce_verifier(PkceCodeVerifier::new(verifier_secret))
        .request_async(oauth2::reqwest::async_http_client)
        .await
        .map_err(|e| anyhow::anyhow!("使用 PKCE-only 重试仍失败: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OAuthConfig {
        OAuthConfig {
            client_id: "test-client.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:8080".to_string(),
            scopes: vec![crate::config::oauth_config::GMAIL_MODIFY_SCOPE.to_string()],
        }
    }

    #[test]
    fn test_port_range() {
        assert!(PORT_RANGE.contains(&8080));
        assert!(PORT_RANGE.contains(&8089));
        assert!(!PORT_RANGE.contains(&8090));
    }

    #[test]
    fn test_authorization_url_requests_offline_access() {
        let url = Url::parse(&authorization_url(&test_config()).unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(
            params.get("client_id").map(String::as_str),
            Some("test-client.apps.googleusercontent.com")
        );
        assert_eq!(params.get("access_type").map(String::as_str), Some("offline"));
        assert_eq!(
            params.get("redirect_uri").map(String::as_str),
            Some("http://localhost:8080")
        );
        assert!(params.get("scope").unwrap().contains("gmail.modify"));
    }

    #[test]
    fn test_invalid_redirect_is_auth_invalid() {
        let mut config = test_config();
        config.redirect_uri = "not a url".to_string();
        assert!(matches!(
            authorization_url(&config),
            Err(TriageError::AuthInvalid(_))
        ));
    }

    #[test]
    fn test_parse_callback() {
        match parse_callback(8080, "/?code=abc&state=xyz").unwrap() {
            Callback::Code(code, state) => {
                assert_eq!(code.secret(), "abc");
                assert_eq!(state.secret(), "xyz");
            }
            other => panic!("unexpected callback: {:?}", other),
        }

        assert!(matches!(
            parse_callback(8080, "/?error=access_denied").unwrap(),
            Callback::Denied(e) if e == "access_denied"
        ));
        assert!(matches!(
            parse_callback(8080, "/favicon.ico").unwrap(),
            Callback::Other
        ));
    }

    #[test]
    fn test_html_contains_charset() {
        assert!(SUCCESS_HTML.contains("utf-8"));
        assert!(ERROR_HTML.contains("utf-8"));
    }
}
