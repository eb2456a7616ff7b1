//! 决策 → 排队 → 执行 → 写回 的端到端测试（不启动浏览器）

use anyhow::Result;
use async_trait::async_trait;
use auto_apply::infrastructure::{ElementAction, ElementQuery};
use auto_apply::models::{ApplicantProfile, ApplicationStatus, Job, JobId, Resume, ResumeId, Tier, User, UserId};
use auto_apply::services::{Credentials, SharedCredentials};
use auto_apply::{
    ApplyFlow, ApplyOutcome, AutomationSession, DecisionEngine, ExecutionScheduler, MemoryStore,
    PageDriver, PipelineError, SchedulerSettings, SessionFactory, Strategy, StrategyRegistry,
};
use auto_apply::store::ApplicationStore;
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct BlankPage;

#[async_trait]
impl PageDriver for BlankPage {
    async fn goto(&self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(None)
    }

    async fn count(&self, _query: &ElementQuery) -> Result<usize> {
        Ok(0)
    }

    async fn perform(&self, _query: &ElementQuery, _action: &ElementAction) -> Result<bool> {
        Ok(false)
    }
}

#[derive(Default)]
struct Sessions {
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

struct BlankSession {
    page: Option<BlankPage>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl AutomationSession for BlankSession {
    async fn start(&mut self) -> Result<()> {
        self.page = Some(BlankPage);
        Ok(())
    }

    fn page(&self) -> Option<&dyn PageDriver> {
        self.page.as_ref().map(|p| p as &dyn PageDriver)
    }

    async fn stop(&mut self) -> Result<()> {
        self.page = None;
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl SessionFactory for Sessions {
    fn create(&self, _user_id: UserId) -> Box<dyn AutomationSession> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(BlankSession {
            page: None,
            closed: Arc::clone(&self.closed),
        })
    }
}

/// 对列出的 URL 返回失败，其余都提交成功
struct ScriptedBoard {
    failing_urls: HashSet<String>,
    visited: Mutex<Vec<String>>,
}

#[async_trait]
impl Strategy for ScriptedBoard {
    fn name(&self) -> &str {
        "board"
    }

    async fn login(&self, _page: &dyn PageDriver, _credentials: &Credentials) -> Result<bool> {
        Ok(true)
    }

    async fn apply(
        &self,
        _page: &dyn PageDriver,
        job_url: &str,
        _profile: &ApplicantProfile,
    ) -> Result<ApplyOutcome> {
        self.visited.lock().unwrap().push(job_url.to_string());
        if self.failing_urls.contains(job_url) {
            Ok(ApplyOutcome::failed("Form step not recognised"))
        } else {
            Ok(ApplyOutcome::Submitted)
        }
    }
}

struct Pipeline {
    store: Arc<MemoryStore>,
    engine: DecisionEngine,
    scheduler: ExecutionScheduler,
    board: Arc<ScriptedBoard>,
    sessions: Arc<Sessions>,
}

fn pipeline(failing: &[&str]) -> Pipeline {
    let store = Arc::new(MemoryStore::new());
    let board = Arc::new(ScriptedBoard {
        failing_urls: failing.iter().map(|u| u.to_string()).collect(),
        visited: Mutex::new(Vec::new()),
    });
    let sessions = Arc::new(Sessions::default());

    let mut registry = StrategyRegistry::new();
    registry.register("jobs.example.com", board.clone());
    let flow = ApplyFlow::new(
        store.clone(),
        Arc::new(registry),
        sessions.clone(),
        Arc::new(SharedCredentials::new()),
    );

    Pipeline {
        engine: DecisionEngine::new(store.clone()),
        scheduler: ExecutionScheduler::new(store.clone(), flow, SchedulerSettings::default()),
        store,
        board,
        sessions,
    }
}

fn job_url(id: u64) -> String {
    format!("https://jobs.example.com/openings/{}", id)
}

impl Pipeline {
    fn add_user(&self, id: u64, tier: Tier, quota: u32) -> User {
        let user = User::new(id, tier, quota);
        self.store.insert_user(user.clone());
        self.store.insert_resume(Resume::new(id * 100, id));
        user
    }

    fn add_job(&self, id: u64) -> JobId {
        self.store.insert_job(Job::new(id, job_url(id)));
        JobId(id)
    }

    fn quota_used(&self, user: UserId) -> u32 {
        self.store.user(user).unwrap().unwrap().quota_used_today
    }
}

#[tokio::test]
async fn free_tier_scenario() {
    let p = pipeline(&[]);
    let user = p.add_user(1, Tier::Free, 1);
    let resume = ResumeId(100);

    let low = p.engine.decide_and_queue(&user, p.add_job(1), resume, 0.50).unwrap();
    assert_eq!(low.status, ApplicationStatus::Rejected);
    assert_eq!(p.quota_used(user.id), 0);

    let before = Utc::now();
    let high = p.engine.decide_and_queue(&user, p.add_job(2), resume, 0.85).unwrap();
    assert_eq!(high.status, ApplicationStatus::Queued);
    let scheduled = high.scheduled_at.unwrap();
    assert!(scheduled >= before + Duration::hours(1));
    assert!(scheduled <= Utc::now() + Duration::hours(1));
    assert_eq!(p.quota_used(user.id), 1);

    let err = p
        .engine
        .decide_and_queue(&user, p.add_job(3), resume, 0.99)
        .unwrap_err();
    assert!(matches!(err, PipelineError::QuotaExceeded { .. }));
    assert!(p.store.find_application(user.id, JobId(3)).unwrap().is_none());
}

#[tokio::test]
async fn repeated_decision_returns_same_application() {
    let p = pipeline(&[]);
    let user = p.add_user(1, Tier::Pro, 5);
    let job = p.add_job(1);

    let first = p.engine.decide_and_queue(&user, job, ResumeId(100), 0.7).unwrap();
    let second = p.engine.decide_and_queue(&user, job, ResumeId(100), 0.7).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(p.quota_used(user.id), 1);
}

#[tokio::test]
async fn queue_run_applies_due_items_and_leaves_future_ones() {
    let p = pipeline(&[]);
    let expert = p.add_user(1, Tier::Expert, 5);
    let free = p.add_user(2, Tier::Free, 5);

    let due = p.engine.decide_and_queue(&expert, p.add_job(1), ResumeId(100), 0.1).unwrap();
    let later = p.engine.decide_and_queue(&free, p.add_job(2), ResumeId(200), 0.9).unwrap();

    let report = p.scheduler.process_queue().await.unwrap();
    assert_eq!(report.due, 1);
    assert_eq!(report.applied, 1);

    let applied = p.store.application(due.id).unwrap().unwrap();
    assert_eq!(applied.status, ApplicationStatus::Applied);
    assert!(applied.applied_at.is_some());

    let untouched = p.store.application(later.id).unwrap().unwrap();
    assert_eq!(untouched, later);
    assert_eq!(p.board.visited.lock().unwrap().clone(), vec![job_url(1)]);
}

#[tokio::test]
async fn strategy_failure_does_not_stop_the_run() {
    let p = pipeline(&[&job_url(1)]);
    let user = p.add_user(1, Tier::Pro, 5);

    let failing = p.engine.decide_and_queue(&user, p.add_job(1), ResumeId(100), 0.9).unwrap();
    let passing = p.engine.decide_and_queue(&user, p.add_job(2), ResumeId(100), 0.9).unwrap();

    let report = p.scheduler.process_queue().await.unwrap();
    assert_eq!((report.applied, report.failed), (1, 1));

    let failed = p.store.application(failing.id).unwrap().unwrap();
    assert_eq!(failed.status, ApplicationStatus::Failed);
    assert!(!failed.decision_reason.is_empty());

    let applied = p.store.application(passing.id).unwrap().unwrap();
    assert_eq!(applied.status, ApplicationStatus::Applied);

    assert_eq!(p.sessions.opened.load(Ordering::SeqCst), 2);
    assert_eq!(p.sessions.closed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_item_can_be_requeued_and_retried() {
    let p = pipeline(&[]);
    let user = p.add_user(1, Tier::Pro, 5);
    let app = p.engine.decide_and_queue(&user, p.add_job(1), ResumeId(100), 0.9).unwrap();
    p.store
        .record_outcome(app.id, auto_apply::models::ExecutionOutcome::failed("network"))
        .unwrap();

    assert_eq!(p.scheduler.process_queue().await.unwrap().due, 0);

    p.store.requeue(app.id, Utc::now()).unwrap();
    let report = p.scheduler.process_queue().await.unwrap();
    assert_eq!(report.applied, 1);

    let interview = p.store.mark_interview(app.id).unwrap();
    assert_eq!(interview.status, ApplicationStatus::Interview);
    assert_eq!(p.quota_used(user.id), 1);
}
