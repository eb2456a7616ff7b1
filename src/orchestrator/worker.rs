//! 应用入口 - 编排层
//!
//! 负责组装各层组件：存储、决策引擎、策略注册表、会话工厂、调度器，
//! 然后把种子决策送进决策引擎，最后进入轮询循环。

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::infrastructure::BrowserSessionFactory;
use crate::models::{load_seed_file, ApplicationStatus, DecisionRequest};
use crate::orchestrator::scheduler::{ExecutionScheduler, SchedulerSettings};
use crate::services::{DecisionEngine, SharedCredentials};
use crate::store::{ApplicationStore, MemoryStore};
use crate::strategies::{LinkedInSettings, StrategyRegistry};
use crate::utils::logging::log_startup;
use crate::workflow::ApplyFlow;

/// 种子决策的处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecisionSummary {
    pub queued: usize,
    pub rejected: usize,
    pub quota_exceeded: usize,
    pub errors: usize,
}

/// 应用主结构
pub struct App {
    config: Config,
    store: Arc<MemoryStore>,
    engine: DecisionEngine,
    scheduler: ExecutionScheduler,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let store = Arc::new(match &config.store_snapshot {
            Some(path) => MemoryStore::open_snapshot(path)?,
            None => MemoryStore::new(),
        });

        let registry = StrategyRegistry::with_defaults(LinkedInSettings::from_config(&config));
        info!("✓ 已注册 {} 个站点策略", registry.len());

        let credentials = SharedCredentials::from_config(&config);
        if config.linkedin_username.is_none() || config.linkedin_password.is_none() {
            warn!("⚠️  未配置 LinkedIn 凭据，将依赖已保存的 cookie");
        }

        let flow = ApplyFlow::new(
            store.clone(),
            Arc::new(registry),
            Arc::new(BrowserSessionFactory::from_config(&config)),
            Arc::new(credentials),
        )
        .with_item_timeout(config.item_timeout());

        let scheduler = ExecutionScheduler::new(
            store.clone(),
            flow,
            SchedulerSettings::from_config(&config),
        );

        let app = Self {
            engine: DecisionEngine::new(store.clone()),
            config,
            store,
            scheduler,
        };
        app.load_seed().await?;
        Ok(app)
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// 读取种子文件：外部记录入库，决策请求交给决策引擎
    async fn load_seed(&self) -> Result<()> {
        if !self.config.seed_file.exists() {
            warn!("⚠️ 没有找到种子文件: {}", self.config.seed_file.display());
            return Ok(());
        }
        let mut seed = load_seed_file(&self.config.seed_file).await?;
        let decisions = std::mem::take(&mut seed.decisions);
        self.store.load_seed(seed);

        let summary = self.submit_decisions(&decisions);
        info!(
            "📋 决策完成: 排队 {} | 拒绝 {} | 超出配额 {} | 错误 {}",
            summary.queued, summary.rejected, summary.quota_exceeded, summary.errors
        );
        Ok(())
    }

    /// 逐条执行决策，单条失败不影响其他
    pub fn submit_decisions(&self, decisions: &[DecisionRequest]) -> DecisionSummary {
        let mut summary = DecisionSummary::default();
        for request in decisions {
            let user = match self.store.user(request.user_id) {
                Ok(Some(user)) => user,
                Ok(None) => {
                    warn!("[用户 {}] 不存在，跳过决策", request.user_id);
                    summary.errors += 1;
                    continue;
                }
                Err(e) => {
                    error!("[用户 {}] 读取失败: {}", request.user_id, e);
                    summary.errors += 1;
                    continue;
                }
            };

            match self.engine.decide_and_queue(
                &user,
                request.job_id,
                request.resume_id,
                request.match_score,
            ) {
                Ok(app) if app.status == ApplicationStatus::Rejected => {
                    info!("[申请 #{}] 已拒绝: {}", app.id, app.decision_reason);
                    summary.rejected += 1;
                }
                Ok(app) => {
                    info!(
                        "[申请 #{}] {}: {}",
                        app.id, app.status, app.decision_reason
                    );
                    summary.queued += 1;
                }
                Err(e @ PipelineError::QuotaExceeded { .. }) => {
                    warn!("[用户 {}] {}", request.user_id, e);
                    summary.quota_exceeded += 1;
                }
                Err(e) => {
                    error!("[用户 {}] 决策失败: {}", request.user_id, e);
                    summary.errors += 1;
                }
            }
        }
        summary
    }

    /// 运行调度循环直到收到停止信号
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let cycles = self.scheduler.run(shutdown).await;
        info!("\n{}", "=".repeat(60));
        info!("📊 运行结束，共 {} 轮", cycles);
        info!(
            "完成时间: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        info!("{}", "=".repeat(60));
        Ok(())
    }
}
