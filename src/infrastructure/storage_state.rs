//! 会话存储状态（cookie）的持久化
//!
//! 每个用户一个 JSON 文件，会话启动时加载，关闭前写回。

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam, TimeSinceEpoch};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::models::UserId;

/// 持久化的单个 cookie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Unix 秒；会话 cookie 为 -1
    #[serde(default = "session_expiry")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

fn default_path() -> String {
    "/".to_string()
}

fn session_expiry() -> f64 {
    -1.0
}

impl StoredCookie {
    fn is_expired(&self, now_secs: f64) -> bool {
        self.expires > 0.0 && self.expires <= now_secs
    }
}

impl From<&Cookie> for StoredCookie {
    fn from(cookie: &Cookie) -> Self {
        Self {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            domain: cookie.domain.clone(),
            path: cookie.path.clone(),
            expires: if cookie.session { -1.0 } else { cookie.expires },
            http_only: cookie.http_only,
            secure: cookie.secure,
        }
    }
}

/// 存储状态文件内容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<StoredCookie>,
}

impl StorageState {
    pub fn from_cookies(cookies: &[Cookie]) -> Self {
        Self {
            cookies: cookies.iter().map(StoredCookie::from).collect(),
        }
    }

    /// 读取存储状态；文件不存在时返回 `None`
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        if fs::metadata(path).await.is_err() {
            debug!("存储状态不存在: {}", path.display());
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("无法读取存储状态: {}", path.display()))?;
        let state = serde_json::from_str(&content)
            .with_context(|| format!("无法解析存储状态: {}", path.display()))?;
        Ok(Some(state))
    }

    /// 写入存储状态，必要时创建目录
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("无法创建目录: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .with_context(|| format!("无法写入存储状态: {}", path.display()))?;
        Ok(())
    }

    /// 写回会话结束时的 cookie。结果为空而文件已存在时保留旧文件，
    /// 返回是否真正写入
    pub async fn persist(path: &Path, cookies: &[Cookie]) -> Result<bool> {
        if cookies.is_empty() && fs::metadata(path).await.is_ok() {
            debug!("会话没有 cookie，保留已有存储状态: {}", path.display());
            return Ok(false);
        }
        Self::from_cookies(cookies).save(path).await?;
        Ok(true)
    }

    /// 转成 CDP 参数，跳过已过期的 cookie
    pub fn to_cookie_params(&self, now_secs: f64) -> Vec<CookieParam> {
        self.cookies
            .iter()
            .filter(|cookie| !cookie.is_expired(now_secs))
            .filter_map(|cookie| {
                let mut builder = CookieParam::builder()
                    .name(cookie.name.clone())
                    .value(cookie.value.clone())
                    .domain(cookie.domain.clone())
                    .path(cookie.path.clone())
                    .http_only(cookie.http_only)
                    .secure(cookie.secure);
                if cookie.expires > 0.0 {
                    builder = builder.expires(TimeSinceEpoch::new(cookie.expires));
                }
                match builder.build() {
                    Ok(param) => Some(param),
                    Err(e) => {
                        warn!("跳过无效 cookie {}: {}", cookie.name, e);
                        None
                    }
                }
            })
            .collect()
    }
}

/// 某用户的存储状态文件路径
pub fn storage_state_path(cookies_dir: &Path, user_id: UserId) -> PathBuf {
    cookies_dir.join(format!("cookies_{}.json", user_id))
}
