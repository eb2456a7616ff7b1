//! 记录存储层
//!
//! 用户/职位/简历由外部服务维护，这里只读；申请记录由决策引擎创建，
//! 之后只由调度器（以及显式的人工操作）修改，核心从不删除记录。

pub mod memory;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Application, ApplicationId, ApplicationStatus, ExecutionOutcome, Job, JobId, NewApplication,
    Resume, ResumeId, User, UserId,
};

pub use memory::MemoryStore;

/// 存储层错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("daily quota exhausted ({used}/{quota})")]
    QuotaExhausted { used: u32, quota: u32 },
    #[error("application {id}: transition {from} -> {to} is not allowed")]
    InvalidTransition {
        id: ApplicationId,
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// 写入决策的结果
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionCommit {
    /// 新建了记录
    Created(Application),
    /// (user, job) 已有记录，原样返回
    Existing(Application),
}

impl DecisionCommit {
    pub fn into_application(self) -> Application {
        match self {
            DecisionCommit::Created(app) | DecisionCommit::Existing(app) => app,
        }
    }
}

/// 存储抽象，便于服务层脱离真实数据库单独测试
pub trait ApplicationStore: Send + Sync {
    fn user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    fn job(&self, id: JobId) -> Result<Option<Job>, StoreError>;
    fn resume(&self, id: ResumeId) -> Result<Option<Resume>, StoreError>;
    fn application(&self, id: ApplicationId) -> Result<Option<Application>, StoreError>;

    /// 按 (user, job) 查找已有申请
    fn find_application(
        &self,
        user_id: UserId,
        job_id: JobId,
    ) -> Result<Option<Application>, StoreError>;

    /// 原子地写入决策：
    /// - (user, job) 已存在时返回 `Existing`，不消耗配额
    /// - 配额已满时返回 `QuotaExhausted`，不写记录
    /// - 非拒绝决策在同一临界区内把 `quota_used_today` 加一
    fn commit_decision(&self, draft: NewApplication) -> Result<DecisionCommit, StoreError>;

    /// `status = queued AND scheduled_at <= now` 的申请
    fn due_applications(&self, now: DateTime<Utc>) -> Result<Vec<Application>, StoreError>;

    /// 写回执行结果，仅当记录仍为 `queued` 时生效
    fn record_outcome(
        &self,
        id: ApplicationId,
        outcome: ExecutionOutcome,
    ) -> Result<Application, StoreError>;

    /// 人工把失败的申请重新入队
    fn requeue(&self, id: ApplicationId, at: DateTime<Utc>) -> Result<Application, StoreError>;

    /// 人工标记为进入面试
    fn mark_interview(&self, id: ApplicationId) -> Result<Application, StoreError>;

    /// 某个用户的全部申请，按创建时间倒序
    fn applications_for_user(&self, user_id: UserId) -> Result<Vec<Application>, StoreError>;
}
