//! JS 执行器 - 基础设施层
//!
//! 持有会话中唯一的 Page 资源，只暴露"执行 JS"和 `PageDriver` 的能力

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::locator::{self, ElementAction, ElementQuery};
use super::page_driver::PageDriver;

static MARK_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval() 能力
/// - 不认识 Application / Strategy
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 取回 Page 所有权（关闭页面时使用）
    pub fn into_page(self) -> Page {
        self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    async fn set_files(&self, query: &ElementQuery, files: &[String]) -> Result<bool> {
        let token = format!("f{}", MARK_SEQUENCE.fetch_add(1, Ordering::Relaxed));
        let marked: bool = self.eval_as(locator::mark_script(query, &token)?).await?;
        if !marked {
            return Ok(false);
        }

        let element = self
            .page
            .find_element(locator::marked_selector(&token))
            .await
            .context("无法取回已标记的文件输入框")?;

        let mut params = SetFileInputFilesParams::new(files.to_vec());
        params.backend_node_id = Some(element.backend_node_id);
        self.page.execute(params).await?;

        debug!("已设置 {} 个文件到 {:?}", files.len(), query);
        Ok(true)
    }
}

#[async_trait]
impl PageDriver for JsExecutor {
    async fn goto(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("导航到 {} 失败", url))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.page.url().await?)
    }

    async fn count(&self, query: &ElementQuery) -> Result<usize> {
        self.eval_as(locator::count_script(query)?).await
    }

    async fn perform(&self, query: &ElementQuery, action: &ElementAction) -> Result<bool> {
        match action {
            ElementAction::Click => self.eval_as(locator::click_script(query)?).await,
            ElementAction::Fill(value) => self.eval_as(locator::fill_script(query, value)?).await,
            ElementAction::SetFiles(files) => self.set_files(query, files).await,
        }
    }
}
