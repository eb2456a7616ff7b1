//! 投递申请记录及其状态机

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ApplicationId, JobId, ResumeId, UserId};

/// 申请状态
///
/// 合法迁移：
///
/// ```text
/// pending ──► queued ──► applied ──► interview
///    │          │  ▲
///    ▼          ▼  │ (人工重新入队)
/// rejected    failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Queued,
    Applied,
    Rejected,
    Failed,
    Interview,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Queued => "queued",
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Failed => "failed",
            ApplicationStatus::Interview => "interview",
        }
    }

    /// 是否允许从当前状态迁移到 `next`
    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        matches!(
            (self, next),
            (Pending, Queued)
                | (Pending, Rejected)
                | (Queued, Applied)
                | (Queued, Failed)
                | (Applied, Interview)
                | (Failed, Queued)
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 持久化的申请记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub user_id: UserId,
    pub job_id: JobId,
    pub resume_id: ResumeId,
    pub status: ApplicationStatus,
    pub match_score: f64,
    pub decision_reason: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Application {
    /// 是否已到执行时间
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ApplicationStatus::Queued
            && self.scheduled_at.is_some_and(|at| at <= now)
    }
}

/// 决策引擎产出的待写入记录（尚未分配 id）
#[derive(Debug, Clone, PartialEq)]
pub struct NewApplication {
    pub user_id: UserId,
    pub job_id: JobId,
    pub resume_id: ResumeId,
    pub status: ApplicationStatus,
    pub match_score: f64,
    pub decision_reason: String,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewApplication {
    /// 非拒绝的决策才消耗配额
    pub fn consumes_quota(&self) -> bool {
        self.status != ApplicationStatus::Rejected
    }
}

/// 调度器写回的执行结果
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub status: ApplicationStatus,
    pub reason: String,
    pub applied_at: Option<DateTime<Utc>>,
}

impl ExecutionOutcome {
    pub fn applied(reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: ApplicationStatus::Applied,
            reason: reason.into(),
            applied_at: Some(at),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: ApplicationStatus::Failed,
            reason: reason.into(),
            applied_at: None,
        }
    }
}
