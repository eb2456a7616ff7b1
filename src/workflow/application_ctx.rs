//! 申请处理上下文
//!
//! 封装"我正在处理哪个用户的哪条申请"这一信息，只用于日志

use std::fmt::Display;

use crate::models::{Application, ApplicationId, JobId, UserId};

#[derive(Debug, Clone, Copy)]
pub struct ApplicationCtx {
    pub application_id: ApplicationId,
    pub user_id: UserId,
    pub job_id: JobId,
}

impl ApplicationCtx {
    pub fn new(application: &Application) -> Self {
        Self {
            application_id: application.id,
            user_id: application.user_id,
            job_id: application.job_id,
        }
    }
}

impl Display for ApplicationCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[申请 #{} 用户#{} 职位#{}]",
            self.application_id, self.user_id, self.job_id
        )
    }
}
