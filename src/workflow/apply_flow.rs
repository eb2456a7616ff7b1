//! 单条申请的执行流程 - 流程层
//!
//! 流程顺序：
//! 1. 读取用户/职位/简历（缺失即校验失败，不开会话）
//! 2. 按域名选策略（没有策略交给调度器按配置处理）
//! 3. 打开会话 → 登录（有凭据时）→ 申请
//! 4. 无论成功、失败、panic 还是超时，都关闭会话

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::infrastructure::{AutomationSession, SessionFactory};
use crate::models::{ApplicantProfile, Application, Job, Resume, User};
use crate::services::{CredentialSource, Credentials};
use crate::store::ApplicationStore;
use crate::strategies::{ApplyOutcome, Strategy, StrategyRegistry};
use crate::workflow::application_ctx::ApplicationCtx;

/// 单条申请的执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowResult {
    /// 已提交，附带原因
    Applied(String),
    /// 策略没走通，附带诊断原因
    Failed(String),
    /// 没有匹配的策略，附带域名
    Unsupported(String),
}

/// 申请执行流程
///
/// - 不持有页面，会话在 `run` 内创建并释放
/// - `Err` 只表示故障（校验、会话、登录、浏览器、panic、超时）
pub struct ApplyFlow {
    store: Arc<dyn ApplicationStore>,
    registry: Arc<StrategyRegistry>,
    sessions: Arc<dyn SessionFactory>,
    credentials: Arc<dyn CredentialSource>,
    item_timeout: Option<Duration>,
}

impl ApplyFlow {
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        registry: Arc<StrategyRegistry>,
        sessions: Arc<dyn SessionFactory>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            store,
            registry,
            sessions,
            credentials,
            item_timeout: None,
        }
    }

    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout = timeout;
        self
    }

    pub async fn run(&self, application: &Application, ctx: &ApplicationCtx) -> Result<FlowResult> {
        let (user, job, resume) = self.load_records(application)?;

        let Some(strategy) = self.registry.resolve(&job) else {
            let domain = job.domain().unwrap_or_else(|| job.url.clone());
            info!("{} 没有适用于 {} 的策略", ctx, domain);
            return Ok(FlowResult::Unsupported(domain));
        };
        debug!("{} 使用策略: {}", ctx, strategy.name());

        let profile = ApplicantProfile::from_records(&user, &resume);
        let credentials = self.credentials.credentials_for(user.id, strategy.name());

        let mut session = self.sessions.create(user.id);
        let work = AssertUnwindSafe(drive(
            session.as_mut(),
            strategy.as_ref(),
            &job.url,
            &profile,
            credentials.as_ref(),
            ctx,
        ))
        .catch_unwind();

        let outcome = match self.item_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(caught) => caught,
                Err(_) => {
                    warn!("{} ⏰ 执行超时 ({:?})", ctx, limit);
                    Ok(Err(PipelineError::StrategyFailure(format!(
                        "Execution timed out after {}s",
                        limit.as_secs()
                    ))))
                }
            },
            None => work.await,
        };

        if let Err(e) = session.stop().await {
            warn!("{} 关闭会话时出错: {:#}", ctx, e);
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!("{} 💥 执行过程中 panic: {}", ctx, message);
                Err(PipelineError::StrategyFailure(format!(
                    "Unexpected fault: {}",
                    message
                )))
            }
        }
    }

    fn load_records(&self, application: &Application) -> Result<(User, Job, Resume)> {
        let user = self
            .store
            .user(application.user_id)?
            .ok_or_else(|| PipelineError::validation(format!("user {} not found", application.user_id)))?;
        let job = self
            .store
            .job(application.job_id)?
            .ok_or_else(|| PipelineError::validation(format!("job {} not found", application.job_id)))?;
        let resume = self.store.resume(application.resume_id)?.ok_or_else(|| {
            PipelineError::validation(format!("resume {} not found", application.resume_id))
        })?;
        if resume.user_id != user.id {
            return Err(PipelineError::validation(format!(
                "resume {} does not belong to user {}",
                resume.id, user.id
            )));
        }
        Ok((user, job, resume))
    }
}

async fn drive(
    session: &mut dyn AutomationSession,
    strategy: &dyn Strategy,
    job_url: &str,
    profile: &ApplicantProfile,
    credentials: Option<&Credentials>,
    ctx: &ApplicationCtx,
) -> Result<FlowResult> {
    session
        .start()
        .await
        .map_err(|e| PipelineError::session(format!("{:#}", e)))?;
    let page = session
        .page()
        .ok_or_else(|| PipelineError::session("page is not available after start"))?;

    match credentials {
        Some(credentials) => {
            let logged_in = strategy
                .login(page, credentials)
                .await
                .map_err(PipelineError::browser)?;
            if !logged_in {
                return Err(PipelineError::LoginFailure(format!(
                    "{} did not accept the configured credentials",
                    strategy.name()
                )));
            }
        }
        None => warn!(
            "{} ⚠️  未配置 {} 凭据，依赖已保存的 cookie 继续",
            ctx,
            strategy.name()
        ),
    }

    let outcome = strategy
        .apply(page, job_url, profile)
        .await
        .map_err(PipelineError::browser)?;
    Ok(match outcome {
        ApplyOutcome::Submitted => FlowResult::Applied(format!(
            "Successfully applied via {} strategy",
            strategy.name()
        )),
        ApplyOutcome::Failed(reason) => FlowResult::Failed(reason),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
