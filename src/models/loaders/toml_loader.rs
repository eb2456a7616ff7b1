use crate::models::{Job, JobId, Resume, ResumeId, User, UserId};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 启动时待执行的决策请求
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecisionRequest {
    pub user_id: UserId,
    pub job_id: JobId,
    pub resume_id: ResumeId,
    pub match_score: f64,
}

/// 种子数据：外部服务维护的用户、职位、简历记录
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub resumes: Vec<Resume>,
    #[serde(default)]
    pub decisions: Vec<DecisionRequest>,
}

/// 解析种子 TOML 文本
pub fn parse_seed(content: &str) -> Result<SeedData> {
    let seed: SeedData = toml::from_str(content).context("无法解析种子数据")?;
    Ok(seed)
}

/// 从 TOML 文件加载种子数据
pub async fn load_seed_file(path: &Path) -> Result<SeedData> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取种子文件: {}", path.display()))?;

    let seed = parse_seed(&content)
        .with_context(|| format!("无法解析种子文件: {}", path.display()))?;

    tracing::info!(
        "已加载种子数据: {} 个用户, {} 个职位, {} 份简历, {} 条决策请求",
        seed.users.len(),
        seed.jobs.len(),
        seed.resumes.len(),
        seed.decisions.len()
    );

    Ok(seed)
}
