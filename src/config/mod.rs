use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod oauth_config;
pub mod storage;

/// 配置目录名
const APP_DIR: &str = "mailtriage";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// 凭据文件位置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// OAuth2 客户端凭据（Google 下载的 credentials.json）
    pub credentials_file: PathBuf,
    /// 已授权的 Token 文件
    pub token_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 在 initialize 响应中报告的服务名
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "mailtriage".to_string(),
        }
    }
}

impl Config {
    /// 以指定目录为基础的默认配置
    pub fn with_base_dir(dir: &Path) -> Self {
        Self {
            paths: PathsConfig {
                credentials_file: dir.join("credentials.json"),
                token_file: dir.join("token.json"),
            },
            server: ServerConfig::default(),
        }
    }

    /// 应用环境变量覆盖：`MAILTRIAGE_CREDENTIALS`, `MAILTRIAGE_TOKEN`
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("MAILTRIAGE_CREDENTIALS") {
            tracing::debug!("使用环境变量中的凭据路径: {}", path);
            self.paths.credentials_file = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("MAILTRIAGE_TOKEN") {
            tracing::debug!("使用环境变量中的 Token 路径: {}", path);
            self.paths.token_file = PathBuf::from(path);
        }
    }
}

/// 获取配置目录，不存在时创建
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("无法获取配置目录"))?
        .join(APP_DIR);

    std::fs::create_dir_all(&dir).context("创建配置目录失败")?;
    Ok(dir)
}

/// 获取配置文件路径
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// 加载配置
///
/// 文件不存在时写入默认配置
pub fn load() -> Result<Config> {
    let path = config_path()?;
    let mut config = load_from(&path)?;
    config.apply_env_overrides();
    Ok(config)
}

/// 从指定路径加载配置，文件不存在时在同目录生成默认配置
pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Config::with_base_dir(base);
        save_to(&config, path)?;
        tracing::info!("已生成默认配置: {}", path.display());
        return Ok(config);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
    let config: Config = toml::from_str(&content).context("解析配置文件失败")?;
    Ok(config)
}

/// 保存配置
pub fn save_to(config: &Config, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_live_next_to_config() {
        let config = Config::with_base_dir(Path::new("/tmp/mt"));
        assert_eq!(
            config.paths.credentials_file,
            PathBuf::from("/tmp/mt/credentials.json")
        );
        assert_eq!(config.paths.token_file, PathBuf::from("/tmp/mt/token.json"));
        assert_eq!(config.server.name, "mailtriage");
    }

    #[test]
    fn test_load_creates_default_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let first = load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(first.paths.token_file, dir.path().join("token.json"));

        let second = load_from(&path).unwrap();
        assert_eq!(second.paths.token_file, first.paths.token_file);
    }

    #[test]
    fn test_server_section_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[paths]\ncredentials_file = \"/a/c.json\"\ntoken_file = \"/a/t.json\"\n",
        )
        .unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.paths.credentials_file, PathBuf::from("/a/c.json"));
        assert_eq!(config.server.name, "mailtriage");
    }
}
