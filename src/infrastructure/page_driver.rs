//! 页面驱动抽象
//!
//! 策略和表单工具只依赖这个 trait，不直接接触 chromiumoxide。

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use super::locator::{ElementAction, ElementQuery};

const URL_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// 导航到指定 URL
    async fn goto(&self, url: &str) -> Result<()>;

    /// 当前 URL
    async fn current_url(&self) -> Result<Option<String>>;

    /// 匹配元素数量
    async fn count(&self, query: &ElementQuery) -> Result<usize>;

    /// 对第一个匹配元素执行动作，未找到时返回 `false`
    async fn perform(&self, query: &ElementQuery, action: &ElementAction) -> Result<bool>;

    /// 等待 URL 包含 `fragment`，超时返回 `false`
    async fn wait_for_url(&self, fragment: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(url) = self.current_url().await? {
                if url.contains(fragment) {
                    return Ok(true);
                }
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(URL_POLL_INTERVAL).await;
        }
    }
}
