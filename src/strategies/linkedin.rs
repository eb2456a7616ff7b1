//! LinkedIn Easy Apply 策略

use anyhow::Result;
use async_trait::async_trait;
use phf::phf_ordered_map;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{ApplyOutcome, Strategy};
use crate::config::Config;
use crate::infrastructure::PageDriver;
use crate::models::{ApplicantProfile, ProfileField};
use crate::services::{Credentials, FormToolkit};

const LOGIN_URL: &str = "https://www.linkedin.com/login";
const FEED_FRAGMENT: &str = "/feed";
const USERNAME_INPUT: &str = "#username";
const PASSWORD_INPUT: &str = "#password";
const LOGIN_SUBMIT: &str = "button[type='submit']";

const EASY_APPLY_BUTTON: &str = "button.jobs-apply-button--top-card";
const SUBMIT_BUTTON: &str = "Submit application";
const NEXT_BUTTON: &str = "^(Next|Continue)";
const REVIEW_BUTTON: &str = "^Review";

/// 表单标签 → 资料项，按顺序尝试
static PROFILE_FIELDS: phf::OrderedMap<&'static str, ProfileField> = phf_ordered_map! {
    "First name" => ProfileField::FirstName,
    "Last name" => ProfileField::LastName,
    "Email" => ProfileField::Email,
    "Phone" => ProfileField::Phone,
    "Mobile" => ProfileField::Phone,
};

#[derive(Debug, Clone)]
pub struct LinkedInSettings {
    /// 弹窗最多走几步
    pub max_steps: usize,
    /// 每步之前的停顿
    pub step_delay: Duration,
    /// 登录后等待跳转到 feed 的时间
    pub login_timeout: Duration,
}

impl Default for LinkedInSettings {
    fn default() -> Self {
        Self {
            max_steps: 10,
            step_delay: Duration::from_secs(2),
            login_timeout: Duration::from_secs(15),
        }
    }
}

impl LinkedInSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_steps: config.max_apply_steps,
            step_delay: Duration::from_millis(config.step_delay_ms),
            login_timeout: Duration::from_secs(config.login_timeout_secs),
        }
    }
}

pub struct LinkedInStrategy {
    settings: LinkedInSettings,
}

impl LinkedInStrategy {
    pub fn new(settings: LinkedInSettings) -> Self {
        Self { settings }
    }

    async fn fill_profile(&self, form: &FormToolkit<'_>, profile: &ApplicantProfile) -> usize {
        let mut filled = 0;
        for (label, field) in PROFILE_FIELDS.entries() {
            if let Some(value) = profile.field(*field) {
                if form.fill_text_field(label, value).await {
                    filled += 1;
                }
            }
        }
        filled
    }
}

#[async_trait]
impl Strategy for LinkedInStrategy {
    fn name(&self) -> &str {
        "linkedin"
    }

    async fn login(&self, page: &dyn PageDriver, credentials: &Credentials) -> Result<bool> {
        info!("正在打开 LinkedIn 登录页...");
        page.goto(LOGIN_URL).await?;

        if let Some(url) = page.current_url().await? {
            if url.contains(FEED_FRAGMENT) {
                info!("✓ 已处于登录状态");
                return Ok(true);
            }
        }

        let form = FormToolkit::new(page);
        if !form.fill_selector(USERNAME_INPUT, &credentials.username).await
            || !form.fill_selector(PASSWORD_INPUT, &credentials.password).await
        {
            warn!("⚠️  登录表单不完整");
            return Ok(false);
        }
        if !form.click_selector(LOGIN_SUBMIT).await {
            warn!("⚠️  未找到登录按钮");
            return Ok(false);
        }

        let logged_in = page
            .wait_for_url(FEED_FRAGMENT, self.settings.login_timeout)
            .await?;
        if logged_in {
            info!("✅ LinkedIn 登录成功");
        } else {
            warn!(
                "❌ 等待 {:?} 后仍未跳转到 feed，登录失败",
                self.settings.login_timeout
            );
        }
        Ok(logged_in)
    }

    async fn apply(
        &self,
        page: &dyn PageDriver,
        job_url: &str,
        profile: &ApplicantProfile,
    ) -> Result<ApplyOutcome> {
        info!("正在打开职位页面: {}", job_url);
        page.goto(job_url).await?;

        let form = FormToolkit::new(page);
        if !form.has_selector(EASY_APPLY_BUTTON).await {
            warn!("⚠️  未找到 Easy Apply 按钮");
            return Ok(ApplyOutcome::failed(
                "Easy Apply button not found: external application flow or already applied",
            ));
        }
        if !form.click_selector(EASY_APPLY_BUTTON).await {
            return Ok(ApplyOutcome::failed("Easy Apply button could not be clicked"));
        }
        debug!("已点击 Easy Apply");

        let mut resume_uploaded = false;
        for step in 1..=self.settings.max_steps {
            sleep(self.settings.step_delay).await;

            if form.has_button(SUBMIT_BUTTON).await {
                info!("✅ 第 {} 步到达提交按钮", step);
                return Ok(ApplyOutcome::Submitted);
            }

            let filled = self.fill_profile(&form, profile).await;
            if !resume_uploaded {
                if let Some(path) = &profile.resume_path {
                    resume_uploaded = form.upload_file("Resume", path).await;
                }
            }
            debug!("第 {} 步: 填写了 {} 个字段", step, filled);

            if form.click_button(NEXT_BUTTON).await || form.click_button(REVIEW_BUTTON).await {
                continue;
            }

            warn!("⚠️  第 {} 步没有可用的导航按钮", step);
            return Ok(ApplyOutcome::Failed(format!(
                "Application modal stuck at step {}: no Next, Review or Submit control",
                step
            )));
        }

        Ok(ApplyOutcome::Failed(format!(
            "Submit control not reached within {} steps",
            self.settings.max_steps
        )))
    }
}
