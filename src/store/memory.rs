//! 内存存储
//!
//! 所有表放在同一把锁之后，决策写入与配额扣减天然处于同一临界区。
//! 配置了快照文件时，每次修改后整体写成 JSON；写盘失败会回滚内存中的修改。
//! 快照写盘在锁内同步完成，只适合单机、小数据量运行；在多线程运行时里
//! 通过 `block_in_place` 让出当前工作线程。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info};

use super::{ApplicationStore, DecisionCommit, StoreError};
use crate::models::{
    Application, ApplicationId, ApplicationStatus, ExecutionOutcome, Job, JobId, NewApplication,
    Resume, ResumeId, SeedData, User, UserId,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    users: BTreeMap<UserId, User>,
    jobs: BTreeMap<JobId, Job>,
    resumes: BTreeMap<ResumeId, Resume>,
    applications: BTreeMap<ApplicationId, Application>,
    next_application_id: u64,
}

/// 内存存储实现
pub struct MemoryStore {
    tables: Mutex<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                next_application_id: 1,
                ..Default::default()
            }),
            snapshot_path: None,
        }
    }

    /// 由种子数据构建
    pub fn with_seed(seed: SeedData) -> Self {
        let store = Self::new();
        store.load_seed(seed);
        store
    }

    /// 打开快照文件；文件不存在时从空表开始
    pub fn open_snapshot(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tables = if path.exists() {
            let bytes = std::fs::read(&path)
                .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
            let tables: Tables = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
            info!(
                "已从快照恢复 {} 条申请记录: {}",
                tables.applications.len(),
                path.display()
            );
            tables
        } else {
            Tables {
                next_application_id: 1,
                ..Default::default()
            }
        };

        Ok(Self {
            tables: Mutex::new(tables),
            snapshot_path: Some(path),
        })
    }

    /// 合并种子数据（外部记录以种子为准，已有申请不受影响）
    pub fn load_seed(&self, seed: SeedData) {
        if let Ok(mut tables) = self.tables.lock() {
            for user in seed.users {
                tables.users.insert(user.id, user);
            }
            for job in seed.jobs {
                tables.jobs.insert(job.id, job);
            }
            for resume in seed.resumes {
                tables.resumes.insert(resume.id, resume);
            }
        }
    }

    pub fn insert_user(&self, user: User) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.users.insert(user.id, user);
        }
    }

    pub fn insert_job(&self, job: Job) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.jobs.insert(job.id, job);
        }
    }

    pub fn insert_resume(&self, resume: Resume) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.resumes.insert(resume.id, resume);
        }
    }

    /// 申请记录总数
    pub fn application_count(&self) -> usize {
        self.tables
            .lock()
            .map(|tables| tables.applications.len())
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let tables = self.lock()?;
        Ok(f(&tables))
    }

    /// 在锁内执行修改；写快照失败时恢复修改前的状态
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.lock()?;
        let backup = self.snapshot_path.as_ref().map(|_| tables.clone());

        let value = f(&mut tables)?;

        if let (Some(path), Some(backup)) = (self.snapshot_path.as_deref(), backup) {
            if let Err(e) = blocking(|| write_snapshot(path, &tables)) {
                *tables = backup;
                return Err(e);
            }
        }

        Ok(value)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 多线程运行时内告知调度器当前线程将阻塞；其他情况直接执行
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

fn write_snapshot(path: &Path, tables: &Tables) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(tables)
        .map_err(|e| StoreError::Unavailable(format!("snapshot encode: {}", e)))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", parent.display(), e)))?;
    }
    std::fs::write(path, bytes)
        .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
    debug!("快照已写入: {}", path.display());
    Ok(())
}

fn transition(
    app: &mut Application,
    next: ApplicationStatus,
) -> Result<(), StoreError> {
    if !app.status.can_transition_to(next) {
        return Err(StoreError::InvalidTransition {
            id: app.id,
            from: app.status,
            to: next,
        });
    }
    app.status = next;
    Ok(())
}

impl ApplicationStore for MemoryStore {
    fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.read(|t| t.users.get(&id).cloned())
    }

    fn job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        self.read(|t| t.jobs.get(&id).cloned())
    }

    fn resume(&self, id: ResumeId) -> Result<Option<Resume>, StoreError> {
        self.read(|t| t.resumes.get(&id).cloned())
    }

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, StoreError> {
        self.read(|t| t.applications.get(&id).cloned())
    }

    fn find_application(
        &self,
        user_id: UserId,
        job_id: JobId,
    ) -> Result<Option<Application>, StoreError> {
        self.read(|t| {
            t.applications
                .values()
                .find(|app| app.user_id == user_id && app.job_id == job_id)
                .cloned()
        })
    }

    fn commit_decision(&self, draft: NewApplication) -> Result<DecisionCommit, StoreError> {
        self.mutate(|t| {
            if let Some(existing) = t
                .applications
                .values()
                .find(|app| app.user_id == draft.user_id && app.job_id == draft.job_id)
            {
                return Ok(DecisionCommit::Existing(existing.clone()));
            }

            let user = t
                .users
                .get_mut(&draft.user_id)
                .ok_or_else(|| StoreError::NotFound(format!("user {}", draft.user_id)))?;

            if user.quota_exhausted() {
                return Err(StoreError::QuotaExhausted {
                    used: user.quota_used_today,
                    quota: user.daily_quota,
                });
            }

            if draft.consumes_quota() {
                user.quota_used_today += 1;
            }

            let id = ApplicationId(t.next_application_id.max(1));
            t.next_application_id = id.0 + 1;

            let application = Application {
                id,
                user_id: draft.user_id,
                job_id: draft.job_id,
                resume_id: draft.resume_id,
                status: draft.status,
                match_score: draft.match_score,
                decision_reason: draft.decision_reason,
                scheduled_at: draft.scheduled_at,
                applied_at: None,
                created_at: Utc::now(),
            };
            t.applications.insert(id, application.clone());

            Ok(DecisionCommit::Created(application))
        })
    }

    fn due_applications(&self, now: DateTime<Utc>) -> Result<Vec<Application>, StoreError> {
        self.read(|t| {
            let mut due: Vec<Application> = t
                .applications
                .values()
                .filter(|app| app.is_due(now))
                .cloned()
                .collect();
            due.sort_by_key(|app| (app.scheduled_at, app.id));
            due
        })
    }

    fn record_outcome(
        &self,
        id: ApplicationId,
        outcome: ExecutionOutcome,
    ) -> Result<Application, StoreError> {
        self.mutate(|t| {
            let app = t
                .applications
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("application {}", id)))?;

            if app.status != ApplicationStatus::Queued {
                return Err(StoreError::InvalidTransition {
                    id,
                    from: app.status,
                    to: outcome.status,
                });
            }

            transition(app, outcome.status)?;
            app.decision_reason = outcome.reason;
            if outcome.applied_at.is_some() {
                app.applied_at = outcome.applied_at;
            }

            Ok(app.clone())
        })
    }

    fn requeue(&self, id: ApplicationId, at: DateTime<Utc>) -> Result<Application, StoreError> {
        self.mutate(|t| {
            let app = t
                .applications
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("application {}", id)))?;

            transition(app, ApplicationStatus::Queued)?;
            app.scheduled_at = Some(at);
            app.decision_reason = format!("Re-queued by operator for {}", at.to_rfc3339());

            Ok(app.clone())
        })
    }

    fn mark_interview(&self, id: ApplicationId) -> Result<Application, StoreError> {
        self.mutate(|t| {
            let app = t
                .applications
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("application {}", id)))?;

            transition(app, ApplicationStatus::Interview)?;
            app.decision_reason = "Interview scheduled".to_string();

            Ok(app.clone())
        })
    }

    fn applications_for_user(&self, user_id: UserId) -> Result<Vec<Application>, StoreError> {
        self.read(|t| {
            let mut apps: Vec<Application> = t
                .applications
                .values()
                .filter(|app| app.user_id == user_id)
                .cloned()
                .collect();
            apps.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            apps
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tier;
    use chrono::Duration;

    fn store_with_user(quota: u32) -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_user(User::new(1, Tier::Pro, quota));
        store
    }

    fn draft(job: u64, status: ApplicationStatus, scheduled_at: Option<DateTime<Utc>>) -> NewApplication {
        NewApplication {
            user_id: UserId(1),
            job_id: JobId(job),
            resume_id: ResumeId(1),
            status,
            match_score: 0.7,
            decision_reason: "test".to_string(),
            scheduled_at,
        }
    }

    #[test]
    fn test_commit_consumes_quota_for_queued_only() {
        let store = store_with_user(5);
        let now = Utc::now();

        store
            .commit_decision(draft(1, ApplicationStatus::Queued, Some(now)))
            .unwrap();
        store
            .commit_decision(draft(2, ApplicationStatus::Rejected, None))
            .unwrap();

        assert_eq!(store.user(UserId(1)).unwrap().unwrap().quota_used_today, 1);
        assert_eq!(store.application_count(), 2);
    }

    #[test]
    fn test_commit_returns_existing_without_quota() {
        let store = store_with_user(5);
        let first = store
            .commit_decision(draft(1, ApplicationStatus::Queued, Some(Utc::now())))
            .unwrap();
        let second = store
            .commit_decision(draft(1, ApplicationStatus::Queued, Some(Utc::now())))
            .unwrap();

        assert!(matches!(first, DecisionCommit::Created(_)));
        assert!(matches!(second, DecisionCommit::Existing(_)));
        assert_eq!(first.into_application().id, second.into_application().id);
        assert_eq!(store.user(UserId(1)).unwrap().unwrap().quota_used_today, 1);
    }

    #[test]
    fn test_commit_quota_exhausted_creates_nothing() {
        let store = store_with_user(1);
        store
            .commit_decision(draft(1, ApplicationStatus::Queued, Some(Utc::now())))
            .unwrap();

        let err = store
            .commit_decision(draft(2, ApplicationStatus::Queued, Some(Utc::now())))
            .unwrap_err();
        assert!(matches!(err, StoreError::QuotaExhausted { used: 1, quota: 1 }));
        assert_eq!(store.application_count(), 1);
    }

    #[test]
    fn test_commit_unknown_user() {
        let store = MemoryStore::new();
        let err = store
            .commit_decision(draft(1, ApplicationStatus::Queued, Some(Utc::now())))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_due_applications_filters_status_and_time() {
        let store = store_with_user(10);
        let now = Utc::now();
        store
            .commit_decision(draft(1, ApplicationStatus::Queued, Some(now + Duration::hours(1))))
            .unwrap();
        store
            .commit_decision(draft(2, ApplicationStatus::Queued, Some(now - Duration::minutes(5))))
            .unwrap();
        store
            .commit_decision(draft(3, ApplicationStatus::Rejected, None))
            .unwrap();
        store
            .commit_decision(draft(4, ApplicationStatus::Queued, Some(now - Duration::minutes(10))))
            .unwrap();

        let due: Vec<JobId> = store
            .due_applications(now)
            .unwrap()
            .into_iter()
            .map(|app| app.job_id)
            .collect();
        assert_eq!(due, vec![JobId(4), JobId(2)]);
    }

    #[test]
    fn test_record_outcome_only_from_queued() {
        let store = store_with_user(10);
        let app = store
            .commit_decision(draft(1, ApplicationStatus::Queued, Some(Utc::now())))
            .unwrap()
            .into_application();

        let now = Utc::now();
        let applied = store
            .record_outcome(app.id, ExecutionOutcome::applied("done", now))
            .unwrap();
        assert_eq!(applied.status, ApplicationStatus::Applied);
        assert_eq!(applied.applied_at, Some(now));

        let err = store
            .record_outcome(app.id, ExecutionOutcome::failed("late"))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: ApplicationStatus::Applied,
                ..
            }
        ));
        let stored = store.application(app.id).unwrap().unwrap();
        assert_eq!(stored.decision_reason, "done");
    }

    #[test]
    fn test_requeue_and_interview() {
        let store = store_with_user(10);
        let failed = store
            .commit_decision(draft(1, ApplicationStatus::Queued, Some(Utc::now())))
            .unwrap()
            .into_application();
        store
            .record_outcome(failed.id, ExecutionOutcome::failed("stuck"))
            .unwrap();

        let at = Utc::now() + Duration::minutes(30);
        let requeued = store.requeue(failed.id, at).unwrap();
        assert_eq!(requeued.status, ApplicationStatus::Queued);
        assert_eq!(requeued.scheduled_at, Some(at));

        assert!(store.mark_interview(failed.id).is_err());
        store
            .record_outcome(failed.id, ExecutionOutcome::applied("ok", Utc::now()))
            .unwrap();
        let interview = store.mark_interview(failed.id).unwrap();
        assert_eq!(interview.status, ApplicationStatus::Interview);
    }

    #[test]
    fn test_rejected_cannot_be_requeued() {
        let store = store_with_user(10);
        let rejected = store
            .commit_decision(draft(1, ApplicationStatus::Rejected, None))
            .unwrap()
            .into_application();
        assert!(store.requeue(rejected.id, Utc::now()).is_err());
    }

    #[test]
    fn test_applications_for_user_newest_first() {
        let store = store_with_user(10);
        for job in 1..=3 {
            store
                .commit_decision(draft(job, ApplicationStatus::Queued, Some(Utc::now())))
                .unwrap();
        }
        let jobs: Vec<JobId> = store
            .applications_for_user(UserId(1))
            .unwrap()
            .into_iter()
            .map(|app| app.job_id)
            .collect();
        assert_eq!(jobs, vec![JobId(3), JobId(2), JobId(1)]);
        assert!(store.applications_for_user(UserId(2)).unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("applications.json");

        let store = MemoryStore::open_snapshot(&path).unwrap();
        store.insert_user(User::new(1, Tier::Free, 2));
        let app = store
            .commit_decision(draft(9, ApplicationStatus::Queued, Some(Utc::now())))
            .unwrap()
            .into_application();
        drop(store);

        let reopened = MemoryStore::open_snapshot(&path).unwrap();
        let restored = reopened.application(app.id).unwrap().unwrap();
        assert_eq!(restored.job_id, JobId(9));
        assert_eq!(reopened.user(UserId(1)).unwrap().unwrap().quota_used_today, 1);

        let next = reopened
            .commit_decision(draft(10, ApplicationStatus::Queued, Some(Utc::now())))
            .unwrap()
            .into_application();
        assert_ne!(next.id, app.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_snapshot_write_from_worker_task() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("applications.json");
        let store = std::sync::Arc::new(MemoryStore::open_snapshot(&path).unwrap());
        store.insert_user(User::new(1, Tier::Pro, 5));

        let worker = store.clone();
        let app = tokio::spawn(async move {
            worker
                .commit_decision(draft(3, ApplicationStatus::Queued, Some(Utc::now())))
                .map(DecisionCommit::into_application)
        })
        .await
        .unwrap()
        .unwrap();

        let reopened = MemoryStore::open_snapshot(&path).unwrap();
        assert_eq!(reopened.application(app.id).unwrap().unwrap().job_id, JobId(3));
    }

    #[test]
    fn test_snapshot_write_outside_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("applications.json");
        let store = MemoryStore::open_snapshot(&path).unwrap();
        store.insert_user(User::new(1, Tier::Pro, 5));
        store
            .commit_decision(draft(4, ApplicationStatus::Queued, Some(Utc::now())))
            .unwrap();
        assert!(path.exists());
    }
}
