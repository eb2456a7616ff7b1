//! 执行调度器 - 编排层
//!
//! 每一轮取出到期的 queued 申请，用 Semaphore 限制并发，
//! 每个申请一个任务、一个会话。同一个申请 id 不会同时被两个任务执行。

use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{Config, UnsupportedSitePolicy};
use crate::error::Result;
use crate::models::ApplicationId;
use crate::orchestrator::executor::{process_application, ItemOutcome};
use crate::store::ApplicationStore;
use crate::utils::logging::log_cycle_report;
use crate::workflow::ApplyFlow;

/// 一轮处理的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// 本轮到期的申请数
    pub due: usize,
    pub applied: usize,
    pub failed: usize,
    pub unsupported: usize,
    /// 已在执行中或没有写回
    pub skipped: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Applied => self.applied += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Unsupported => self.unsupported += 1,
            ItemOutcome::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub max_concurrent: usize,
    pub poll_interval: Duration,
    pub max_cycles: Option<u64>,
    pub unsupported_policy: UnsupportedSitePolicy,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            poll_interval: Duration::from_secs(10),
            max_cycles: None,
            unsupported_policy: UnsupportedSitePolicy::LeaveQueued,
        }
    }
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent: config.max_concurrent_applications.max(1),
            poll_interval: config.poll_interval(),
            max_cycles: config.max_cycles,
            unsupported_policy: config.unsupported_site_policy,
        }
    }
}

type InFlight = Arc<Mutex<HashSet<ApplicationId>>>;

/// 任务结束时把 id 移出执行中集合
struct InFlightGuard {
    set: InFlight,
    id: ApplicationId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.id);
        }
    }
}

pub struct ExecutionScheduler {
    store: Arc<dyn ApplicationStore>,
    flow: Arc<ApplyFlow>,
    settings: SchedulerSettings,
    semaphore: Arc<Semaphore>,
    in_flight: InFlight,
}

impl ExecutionScheduler {
    pub fn new(store: Arc<dyn ApplicationStore>, flow: ApplyFlow, settings: SchedulerSettings) -> Self {
        let permits = settings.max_concurrent.max(1);
        Self {
            store,
            flow: Arc::new(flow),
            settings,
            semaphore: Arc::new(Semaphore::new(permits)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// 登记为执行中，已在执行中时返回 `None`
    fn claim(&self, id: ApplicationId) -> Option<InFlightGuard> {
        let mut set = self.in_flight.lock().ok()?;
        set.insert(id).then(|| InFlightGuard {
            set: Arc::clone(&self.in_flight),
            id,
        })
    }

    /// 处理当前所有到期的申请
    ///
    /// 单条申请的失败不会中断本轮；只有读取队列失败才返回错误。
    pub async fn process_queue(&self) -> Result<CycleReport> {
        let due = self.store.due_applications(Utc::now())?;
        let mut report = CycleReport {
            due: due.len(),
            ..CycleReport::default()
        };
        if due.is_empty() {
            debug!("没有到期的申请");
            return Ok(report);
        }
        info!("📋 找到 {} 个待执行的申请", due.len());

        let mut handles = Vec::with_capacity(due.len());
        for application in due {
            let Some(guard) = self.claim(application.id) else {
                debug!("[申请 #{}] 正在执行中，跳过", application.id);
                report.skipped += 1;
                continue;
            };
            let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
                warn!("并发许可已关闭，停止派发");
                break;
            };

            let flow = Arc::clone(&self.flow);
            let store = Arc::clone(&self.store);
            let policy = self.settings.unsupported_policy;
            let id = application.id;

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let _guard = guard;
                process_application(&flow, store.as_ref(), &application, policy).await
            });
            handles.push((id, handle));
        }

        for (id, handle) in handles {
            match handle.await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!("[申请 #{}] 任务执行失败: {}", id, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// 轮询循环，收到停止信号或跑满 `max_cycles` 后返回已运行的轮数
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("停止信号已断开，退出调度循环");
                        break;
                    }
                    continue;
                }
            }

            cycles += 1;
            match self.process_queue().await {
                Ok(report) => log_cycle_report(cycles, &report),
                Err(e) => error!("第 {} 轮读取队列失败: {}", cycles, e),
            }

            if self.settings.max_cycles.is_some_and(|max| cycles >= max) {
                info!("已完成 {} 轮，调度结束", cycles);
                break;
            }
        }

        info!("🛑 调度器已停止，共运行 {} 轮", cycles);
        cycles
    }
}
