//! 表单交互工具
//!
//! 所有方法都不返回错误：找不到元素或驱动报错都记日志并返回 `false`。

use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

use crate::infrastructure::{ElementAction, ElementQuery, PageDriver};

pub struct FormToolkit<'a> {
    page: &'a dyn PageDriver,
}

impl<'a> FormToolkit<'a> {
    pub fn new(page: &'a dyn PageDriver) -> Self {
        Self { page }
    }

    /// 按标签（子串，忽略大小写）查找输入框，找不到再按 placeholder
    pub async fn fill_text_field(&self, label: &str, value: &str) -> bool {
        let action = ElementAction::Fill(value.to_string());
        for query in [ElementQuery::label(label), ElementQuery::placeholder(label)] {
            if self.try_perform(&query, &action).await {
                debug!("已填写字段 '{}'", label);
                return true;
            }
        }
        debug!("未找到字段 '{}'", label);
        false
    }

    /// 上传文件到页面上的文件输入框
    pub async fn upload_file(&self, label: &str, path: &Path) -> bool {
        if !path.exists() {
            warn!("⚠️  待上传文件不存在: {}", path.display());
            return false;
        }
        let action = ElementAction::SetFiles(vec![path.display().to_string()]);
        let uploaded = self
            .try_perform(&ElementQuery::css("input[type='file']"), &action)
            .await;
        if uploaded {
            debug!("已上传 '{}': {}", label, path.display());
        } else {
            debug!("未找到文件输入框 '{}'", label);
        }
        uploaded
    }

    /// 点击按钮：先按角色 + 名称，再按可见文本
    pub async fn click_button(&self, pattern: &str) -> bool {
        let pattern = normalize_pattern(pattern);
        for query in [ElementQuery::button(pattern.clone()), ElementQuery::text(pattern.clone())] {
            if self.try_perform(&query, &ElementAction::Click).await {
                debug!("已点击 '{}'", pattern);
                return true;
            }
        }
        debug!("未找到按钮 '{}'", pattern);
        false
    }

    /// 页面上是否存在匹配的按钮（不点击）
    pub async fn has_button(&self, pattern: &str) -> bool {
        let query = ElementQuery::button(normalize_pattern(pattern));
        match self.page.count(&query).await {
            Ok(n) => n > 0,
            Err(e) => {
                warn!("查询按钮 '{}' 失败: {:#}", pattern, e);
                false
            }
        }
    }

    /// 点击 CSS 选择器命中的第一个元素
    pub async fn click_selector(&self, selector: &str) -> bool {
        self.try_perform(&ElementQuery::css(selector), &ElementAction::Click)
            .await
    }

    /// CSS 选择器是否命中元素
    pub async fn has_selector(&self, selector: &str) -> bool {
        match self.page.count(&ElementQuery::css(selector)).await {
            Ok(n) => n > 0,
            Err(e) => {
                warn!("查询 '{}' 失败: {:#}", selector, e);
                false
            }
        }
    }

    /// 填写 CSS 选择器命中的输入框
    pub async fn fill_selector(&self, selector: &str, value: &str) -> bool {
        self.try_perform(
            &ElementQuery::css(selector),
            &ElementAction::Fill(value.to_string()),
        )
        .await
    }

    async fn try_perform(&self, query: &ElementQuery, action: &ElementAction) -> bool {
        match self.page.perform(query, action).await {
            Ok(done) => done,
            Err(e) => {
                warn!("页面操作失败 {:?}: {:#}", query, e);
                false
            }
        }
    }
}

/// 无效的正则按字面量处理
fn normalize_pattern(pattern: &str) -> String {
    match Regex::new(pattern) {
        Ok(_) => pattern.to_string(),
        Err(_) => regex::escape(pattern),
    }
}
