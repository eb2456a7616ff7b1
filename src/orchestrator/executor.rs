//! 单条申请执行器 - 编排层
//!
//! 调用 `ApplyFlow`，把结果（或故障）转换成状态写回。
//! 这里是错误的边界：任何 `PipelineError` 都不会再往上传。

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::UnsupportedSitePolicy;
use crate::error::PipelineError;
use crate::models::{Application, ExecutionOutcome};
use crate::store::ApplicationStore;
use crate::utils::truncate_text;
use crate::workflow::{ApplicationCtx, ApplyFlow, FlowResult};

/// 单条申请在本轮的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Applied,
    Failed,
    /// 没有匹配策略
    Unsupported,
    /// 没有写回（记录已被别处改动或存储不可用）
    Skipped,
}

pub async fn process_application(
    flow: &ApplyFlow,
    store: &dyn ApplicationStore,
    application: &Application,
    policy: UnsupportedSitePolicy,
) -> ItemOutcome {
    let ctx = ApplicationCtx::new(application);
    info!("{} ▶ 开始执行", ctx);

    let (outcome, item) = match flow.run(application, &ctx).await {
        Ok(FlowResult::Applied(reason)) => {
            info!("{} ✅ {}", ctx, reason);
            (ExecutionOutcome::applied(reason, Utc::now()), ItemOutcome::Applied)
        }
        Ok(FlowResult::Failed(reason)) => {
            warn!("{} ❌ {}", ctx, truncate_text(&reason, 300));
            (ExecutionOutcome::failed(reason), ItemOutcome::Failed)
        }
        Ok(FlowResult::Unsupported(domain)) => match policy {
            UnsupportedSitePolicy::LeaveQueued => {
                info!("{} ⏭ {} 暂无策略，保持排队", ctx, domain);
                return ItemOutcome::Unsupported;
            }
            UnsupportedSitePolicy::MarkFailed => {
                warn!("{} ❌ {} 暂无策略，标记失败", ctx, domain);
                (
                    ExecutionOutcome::failed(format!(
                        "No application strategy registered for {}",
                        domain
                    )),
                    ItemOutcome::Unsupported,
                )
            }
        },
        Err(err) => {
            error!("{} ❌ 执行出错: {}", ctx, truncate_text(&err.to_string(), 300));
            (ExecutionOutcome::failed(failure_reason(&err)), ItemOutcome::Failed)
        }
    };

    match store.record_outcome(application.id, outcome) {
        Ok(updated) => {
            info!("{} 状态已更新为 {}", ctx, updated.status);
            item
        }
        Err(e) => {
            error!("{} 写回执行结果失败: {}", ctx, e);
            ItemOutcome::Skipped
        }
    }
}

fn failure_reason(err: &PipelineError) -> String {
    match err {
        PipelineError::Validation(_) | PipelineError::LoginFailure(_) => err.to_string(),
        _ => format!("Execution failed: {}", err),
    }
}
