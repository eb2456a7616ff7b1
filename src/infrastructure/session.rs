//! 自动化会话
//!
//! 一个会话 = 一个独立浏览器 + 一个隔离上下文 + 一个页面。会话之间不共享 cookie/缓存；
//! 同一用户的 cookie 通过存储状态文件跨会话保留。

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::storage::{GetCookiesParams, SetCookiesParams};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::Browser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::js_executor::JsExecutor;
use super::page_driver::PageDriver;
use super::storage_state::{storage_state_path, StorageState};
use crate::browser::launch_browser;
use crate::config::Config;
use crate::models::UserId;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const STEALTH_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

static PROFILE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// 浏览器会话
#[async_trait]
pub trait AutomationSession: Send + Sync {
    /// 启动浏览器并打开页面
    async fn start(&mut self) -> Result<()>;

    /// 当前页面；未启动或已关闭时为 `None`
    fn page(&self) -> Option<&dyn PageDriver>;

    /// 关闭会话，释放全部资源。重复调用无副作用
    async fn stop(&mut self) -> Result<()>;
}

/// 按用户创建会话
pub trait SessionFactory: Send + Sync {
    fn create(&self, user_id: UserId) -> Box<dyn AutomationSession>;
}

/// 浏览器启动参数
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub user_agent: String,
    pub window: (u32, u32),
    pub persist_storage_state: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            window: (1280, 720),
            persist_storage_state: true,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            headless: config.headless,
            chrome_executable: config.chrome_executable.clone(),
            persist_storage_state: config.persist_storage_state,
            ..Self::default()
        }
    }
}

/// 基于 chromiumoxide 的会话
pub struct BrowserSession {
    user_id: UserId,
    options: SessionOptions,
    state_path: PathBuf,
    profile_dir: PathBuf,
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    context: Option<BrowserContextId>,
    executor: Option<JsExecutor>,
}

impl BrowserSession {
    pub fn new(user_id: UserId, options: SessionOptions, state_path: PathBuf) -> Self {
        let profile_dir = std::env::temp_dir().join(format!(
            "auto-apply-{}-{}-{}",
            std::process::id(),
            user_id,
            PROFILE_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ));
        Self {
            user_id,
            options,
            state_path,
            profile_dir,
            browser: None,
            handler: None,
            context: None,
            executor: None,
        }
    }

    /// 把 cookie 写进浏览器上下文；页面还停在 about:blank 时也能生效
    async fn restore_storage_state(&self) -> Result<()> {
        let Some(state) = StorageState::load(&self.state_path).await? else {
            return Ok(());
        };
        let cookies = state.to_cookie_params(unix_now());
        if cookies.is_empty() {
            return Ok(());
        }
        let Some(browser) = &self.browser else {
            return Ok(());
        };
        let count = cookies.len();
        browser
            .execute(SetCookiesParams {
                cookies,
                browser_context_id: self.context.clone(),
            })
            .await
            .context("写入上下文 cookie 失败")?;
        info!("🍪 已为用户 #{} 恢复 {} 个 cookie", self.user_id, count);
        Ok(())
    }

    /// 读取整个浏览器上下文的 cookie（不限于当前页面的 URL）并写回文件
    async fn persist_storage_state(&self) -> Result<()> {
        let Some(browser) = &self.browser else {
            return Ok(());
        };
        let params = GetCookiesParams {
            browser_context_id: self.context.clone(),
        };
        let cookies = browser
            .execute(params)
            .await
            .context("读取上下文 cookie 失败")?
            .result
            .cookies;
        if StorageState::persist(&self.state_path, &cookies).await? {
            debug!("已保存 {} 个 cookie 到 {}", cookies.len(), self.state_path.display());
        }
        Ok(())
    }
}

#[async_trait]
impl AutomationSession for BrowserSession {
    async fn start(&mut self) -> Result<()> {
        if self.executor.is_some() {
            return Ok(());
        }

        let (mut browser, handler) = launch_browser(&self.options, &self.profile_dir).await?;
        self.handler = Some(handler);

        let context = browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await;
        self.browser = Some(browser);
        let context = context.context("创建浏览器上下文失败")?;
        self.context = Some(context.clone());

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context)
            .build()
            .map_err(|e| anyhow::anyhow!("构造页面参数失败: {}", e))?;
        let page = match &self.browser {
            Some(browser) => browser.new_page(target).await.context("创建页面失败")?,
            None => anyhow::bail!("浏览器未启动"),
        };
        page.execute(SetUserAgentOverrideParams::new(self.options.user_agent.clone()))
            .await?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await?;

        if let Err(e) = self.restore_storage_state().await {
            warn!("⚠️  恢复存储状态失败，继续使用空会话: {:#}", e);
        }
        self.executor = Some(JsExecutor::new(page));

        info!("✅ 用户 #{} 的浏览器会话已启动", self.user_id);
        Ok(())
    }

    fn page(&self) -> Option<&dyn PageDriver> {
        self.executor.as_ref().map(|e| e as &dyn PageDriver)
    }

    async fn stop(&mut self) -> Result<()> {
        let mut first_error: Option<anyhow::Error> = None;

        if let Some(executor) = self.executor.take() {
            if self.options.persist_storage_state {
                if let Err(e) = self.persist_storage_state().await {
                    warn!("⚠️  保存存储状态失败: {:#}", e);
                }
            }
            if let Err(e) = executor.into_page().close().await {
                warn!("关闭页面失败: {}", e);
                first_error.get_or_insert_with(|| e.into());
            }
        }

        if let Some(mut browser) = self.browser.take() {
            if let Some(context) = self.context.take() {
                if let Err(e) = browser.dispose_browser_context(context).await {
                    warn!("释放浏览器上下文失败: {}", e);
                    first_error.get_or_insert_with(|| e.into());
                }
            }
            if let Err(e) = browser.close().await {
                warn!("关闭浏览器失败: {}", e);
                first_error.get_or_insert_with(|| e.into());
            }
            if let Err(e) = browser.wait().await {
                debug!("等待浏览器退出失败: {}", e);
            }
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
            if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
                debug!("清理 profile 目录失败: {}", e);
            }
            info!("🛑 用户 #{} 的浏览器会话已关闭", self.user_id);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// 创建 [`BrowserSession`]，cookie 文件放在 `cookies_dir` 下
#[derive(Debug, Clone)]
pub struct BrowserSessionFactory {
    options: SessionOptions,
    cookies_dir: PathBuf,
}

impl BrowserSessionFactory {
    pub fn new(options: SessionOptions, cookies_dir: impl Into<PathBuf>) -> Self {
        Self {
            options,
            cookies_dir: cookies_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(SessionOptions::from_config(config), config.cookies_dir.clone())
    }
}

impl SessionFactory for BrowserSessionFactory {
    fn create(&self, user_id: UserId) -> Box<dyn AutomationSession> {
        let state_path = storage_state_path(&self.cookies_dir, user_id);
        Box::new(BrowserSession::new(user_id, self.options.clone(), state_path))
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
