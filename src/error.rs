//! 错误类型
//!
//! `PipelineError` 覆盖决策与执行两条链路。调度器在单条申请的边界上
//! 把它转换成 `failed` 状态和原因文本，只有 `QuotaExceeded` 会直接返回给调用方。

use thiserror::Error;

use crate::models::Tier;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// 今日配额已用完（用户原因，不重试，不写记录）
    #[error("Daily quota of {daily_quota} exceeded for tier {tier}")]
    QuotaExceeded { tier: Tier, daily_quota: u32 },

    /// 引用的职位/简历/用户不存在，或输入非法
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 站点策略的软失败（表单步骤无法识别、入口缺失）
    #[error("Strategy failed: {0}")]
    StrategyFailure(String),

    /// 自动化会话启动失败
    #[error("Automation session error: {0}")]
    Session(String),

    /// 站点登录失败
    #[error("Login failed: {0}")]
    LoginFailure(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// 浏览器/CDP 层的意外错误
    #[error("Browser error: {0:#}")]
    Browser(anyhow::Error),
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation(message.into())
    }

    pub fn session(message: impl Into<String>) -> Self {
        PipelineError::Session(message.into())
    }

    pub fn browser(err: impl Into<anyhow::Error>) -> Self {
        PipelineError::Browser(err.into())
    }
}

impl From<chromiumoxide::error::CdpError> for PipelineError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        PipelineError::Browser(anyhow::Error::new(err))
    }
}

/// 流水线结果类型
pub type Result<T> = std::result::Result<T, PipelineError>;
