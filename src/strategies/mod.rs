//! 站点策略：每个招聘站点一个实现，按域名注册

pub mod linkedin;
pub mod registry;

use anyhow::Result;
use async_trait::async_trait;

use crate::infrastructure::PageDriver;
use crate::models::ApplicantProfile;
use crate::services::Credentials;

pub use linkedin::{LinkedInSettings, LinkedInStrategy};
pub use registry::{DomainPattern, StrategyRegistry};

/// 一次申请流程的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Submitted,
    /// 流程没走完，附带诊断原因
    Failed(String),
}

impl ApplyOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        ApplyOutcome::Failed(reason.into())
    }
}

/// 站点策略
///
/// 返回 `Err` 表示意外故障（导航失败、驱动断开等），
/// 正常的"没走通"用 `Ok(false)` / `ApplyOutcome::Failed` 表达。
#[async_trait]
pub trait Strategy: Send + Sync {
    /// 策略名，也是凭据的索引键
    fn name(&self) -> &str;

    /// 登录站点，成功返回 `true`
    async fn login(&self, page: &dyn PageDriver, credentials: &Credentials) -> Result<bool>;

    /// 打开职位页面并走完申请流程
    async fn apply(
        &self,
        page: &dyn PageDriver,
        job_url: &str,
        profile: &ApplicantProfile,
    ) -> Result<ApplyOutcome>;
}
