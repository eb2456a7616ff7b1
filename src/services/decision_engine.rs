//! 决策引擎 - 业务能力层
//!
//! 对 (user, job) 评估配额与等级策略，生成并持久化一条申请记录

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::models::{
    Application, ApplicationStatus, JobId, NewApplication, ResumeId, Tier, User,
};
use crate::store::{ApplicationStore, DecisionCommit, StoreError};

/// 等级策略：最低匹配分 + 相对决策时间的调度偏移
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierPolicy {
    /// `None` 表示不按分数拒绝
    pub min_match_score: Option<f64>,
    pub schedule_offset: Duration,
}

impl TierPolicy {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self {
                min_match_score: Some(0.80),
                schedule_offset: Duration::hours(1),
            },
            Tier::Pro => Self {
                min_match_score: Some(0.60),
                schedule_offset: Duration::zero(),
            },
            // 负偏移让 EXPERT 的申请更早到期，以此实现优先级
            Tier::Expert => Self {
                min_match_score: None,
                schedule_offset: Duration::minutes(-5),
            },
        }
    }
}

/// 单次评估结果
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub status: ApplicationStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub reason: String,
}

/// 按等级策略评估一次申请（纯函数）
pub fn evaluate(tier: Tier, match_score: f64, decided_at: DateTime<Utc>) -> Decision {
    let policy = TierPolicy::for_tier(tier);

    if let Some(threshold) = policy.min_match_score {
        if match_score < threshold {
            return Decision {
                status: ApplicationStatus::Rejected,
                scheduled_at: None,
                reason: format!(
                    "Match score {:.2} below {} tier threshold {:.2}",
                    match_score,
                    tier.label(),
                    threshold
                ),
            };
        }
    }

    let reason = match tier {
        Tier::Free => "Free tier: scheduled with 1h delay",
        Tier::Pro => "Pro tier: immediate scheduling",
        Tier::Expert => "Expert tier: priority scheduling",
    };

    Decision {
        status: ApplicationStatus::Queued,
        scheduled_at: Some(decided_at + policy.schedule_offset),
        reason: reason.to_string(),
    }
}

/// 决策引擎
///
/// 职责：
/// - 幂等：同一 (user, job) 只产生一条记录
/// - 配额闸门：用完即拒绝，不延期排队
/// - 等级策略：阈值 + 调度偏移
pub struct DecisionEngine {
    store: Arc<dyn ApplicationStore>,
}

impl DecisionEngine {
    pub fn new(store: Arc<dyn ApplicationStore>) -> Self {
        Self { store }
    }

    /// 决定是否投递并写入申请记录
    ///
    /// 配额已满时返回 `PipelineError::QuotaExceeded`，且不写入任何记录
    pub fn decide_and_queue(
        &self,
        user: &User,
        job_id: JobId,
        resume_id: ResumeId,
        match_score: f64,
    ) -> Result<Application> {
        if let Some(existing) = self.store.find_application(user.id, job_id)? {
            debug!(
                "[用户 {}] 职位 {} 已有申请 #{}，直接返回",
                user.id, job_id, existing.id
            );
            return Ok(existing);
        }

        if !(0.0..=1.0).contains(&match_score) {
            return Err(PipelineError::validation(format!(
                "match score {} is outside [0, 1]",
                match_score
            )));
        }

        // 以存储中的配额计数为准，调用方传入的 user 可能是旧快照
        let current = self
            .store
            .user(user.id)?
            .ok_or_else(|| PipelineError::validation(format!("user {} not found", user.id)))?;

        if current.quota_exhausted() {
            return Err(PipelineError::QuotaExceeded {
                tier: current.tier,
                daily_quota: current.daily_quota,
            });
        }

        let decision = evaluate(current.tier, match_score, Utc::now());
        let draft = NewApplication {
            user_id: current.id,
            job_id,
            resume_id,
            status: decision.status,
            match_score,
            decision_reason: decision.reason,
            scheduled_at: decision.scheduled_at,
        };

        match self.store.commit_decision(draft) {
            Ok(DecisionCommit::Created(app)) => {
                info!(
                    "[用户 {}] 职位 {} -> 申请 #{} {} ({})",
                    current.id, job_id, app.id, app.status, app.decision_reason
                );
                Ok(app)
            }
            Ok(DecisionCommit::Existing(app)) => Ok(app),
            Err(StoreError::QuotaExhausted { .. }) => Err(PipelineError::QuotaExceeded {
                tier: current.tier,
                daily_quota: current.daily_quota,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
