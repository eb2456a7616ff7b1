//! 表单填写用的申请人资料

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::job::Resume;
use super::user::User;

/// 可映射到表单字段的资料项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    FirstName,
    LastName,
    Email,
    Phone,
}

/// 申请人资料
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub resume_path: Option<PathBuf>,
}

impl ApplicantProfile {
    /// 由用户与简历记录组装
    pub fn from_records(user: &User, resume: &Resume) -> Self {
        Self {
            first_name: user.first_name.clone().unwrap_or_default(),
            last_name: user.last_name.clone().unwrap_or_default(),
            email: user.email.clone(),
            phone: user.phone.clone().unwrap_or_default(),
            resume_path: resume.file_path.clone(),
        }
    }

    /// 取某一项资料，空字符串视为缺失
    pub fn field(&self, field: ProfileField) -> Option<&str> {
        let value = match field {
            ProfileField::FirstName => &self.first_name,
            ProfileField::LastName => &self.last_name,
            ProfileField::Email => &self.email,
            ProfileField::Phone => &self.phone,
        };
        let value = value.trim();
        (!value.is_empty()).then_some(value)
    }
}
