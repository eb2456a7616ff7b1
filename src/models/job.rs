//! 职位与简历记录

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use super::ids::{JobId, ResumeId, UserId};

/// 职位记录（由抓取服务写入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// 投递入口，也是选择站点策略的依据
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl Job {
    pub fn new(id: u64, url: impl Into<String>) -> Self {
        Self {
            id: JobId(id),
            url: url.into(),
            title: None,
            source: None,
        }
    }

    /// 从 URL 解析出的小写域名（去掉 `www.` 前缀）
    pub fn domain(&self) -> Option<String> {
        domain_of(&self.url)
    }

    /// 来源站点，未设置时退回到域名
    pub fn source(&self) -> Option<String> {
        self.source.clone().or_else(|| self.domain())
    }
}

/// 解析 URL 的主机名
pub fn domain_of(raw_url: &str) -> Option<String> {
    let parsed = Url::parse(raw_url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").map(str::to_string).unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// 简历记录（解析与向量化在外部完成）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resume {
    pub id: ResumeId,
    pub user_id: UserId,
    /// 渲染好的简历文件，表单要求上传时使用
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

impl Resume {
    pub fn new(id: u64, user_id: u64) -> Self {
        Self {
            id: ResumeId(id),
            user_id: UserId(user_id),
            file_path: None,
        }
    }
}
