//! 测试替身：脚本化页面、会话和策略

use anyhow::{bail, Result};
use async_trait::async_trait;
use regex::RegexBuilder;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::infrastructure::{
    AutomationSession, ElementAction, ElementQuery, PageDriver, SessionFactory,
};
use crate::models::{ApplicantProfile, UserId};
use crate::services::Credentials;
use crate::strategies::{ApplyOutcome, Strategy};

/// 点击后的页面变化
#[derive(Debug, Clone, PartialEq)]
pub enum ClickEffect {
    NextScreen,
    Navigate(String),
}

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub css: Vec<String>,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub role: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub on_click: Option<ClickEffect>,
}

impl FakeElement {
    pub fn button(name: &str) -> Self {
        Self {
            role: Some("button".to_string()),
            name: Some(name.to_string()),
            text: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn input_labeled(label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            ..Self::default()
        }
    }

    pub fn input_placeholder(placeholder: &str) -> Self {
        Self {
            placeholder: Some(placeholder.to_string()),
            ..Self::default()
        }
    }

    pub fn css(selector: &str) -> Self {
        Self {
            css: vec![selector.to_string()],
            ..Self::default()
        }
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click = Some(effect);
        self
    }

    fn matches(&self, query: &ElementQuery) -> bool {
        let contains = |field: &Option<String>, needle: &str| {
            field
                .as_deref()
                .map(|v| v.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false)
        };
        let regex_match = |field: &Option<String>, pattern: &str| {
            let Some(value) = field.as_deref() else {
                return false;
            };
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(|re| re.is_match(value))
                .unwrap_or(false)
        };
        match query {
            ElementQuery::Css { selector } => self.css.iter().any(|c| c == selector),
            ElementQuery::Label { text } => contains(&self.label, text),
            ElementQuery::Placeholder { text } => contains(&self.placeholder, text),
            ElementQuery::Role { role, name } => {
                self.role.as_deref() == Some(role.as_str()) && regex_match(&self.name, name)
            }
            ElementQuery::Text { pattern } => regex_match(&self.text, pattern),
        }
    }
}

/// 页面上记录下来的操作
#[derive(Debug, Clone, PartialEq)]
pub enum PageAction {
    Goto(String),
    Click(ElementQuery),
    Fill(ElementQuery, String),
    SetFiles(ElementQuery, Vec<String>),
}

#[derive(Debug, Default)]
struct PageState {
    screens: Vec<Vec<FakeElement>>,
    screen: usize,
    url: Option<String>,
    actions: Vec<PageAction>,
}

/// 按屏幕脚本化的 [`PageDriver`]
///
/// 每一屏是一组元素；点击带 `NextScreen` 的元素进入下一屏。
#[derive(Debug, Default)]
pub struct ScriptedPage {
    state: Mutex<PageState>,
    fail_goto: bool,
    redirect: Option<String>,
}

impl ScriptedPage {
    pub fn new(screens: Vec<Vec<FakeElement>>) -> Self {
        Self {
            state: Mutex::new(PageState {
                screens,
                ..PageState::default()
            }),
            fail_goto: false,
            redirect: None,
        }
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_goto = true;
        self
    }

    /// 所有导航都落到 `url`（服务端重定向）
    pub fn redirecting_to(mut self, url: &str) -> Self {
        self.redirect = Some(url.to_string());
        self
    }

    pub fn actions(&self) -> Vec<PageAction> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn clicks(&self) -> Vec<ElementQuery> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                PageAction::Click(q) => Some(q),
                _ => None,
            })
            .collect()
    }

    pub fn fills(&self) -> Vec<(ElementQuery, String)> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                PageAction::Fill(q, v) => Some((q, v)),
                _ => None,
            })
            .collect()
    }

    pub fn uploads(&self) -> Vec<Vec<String>> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                PageAction::SetFiles(_, files) => Some(files),
                _ => None,
            })
            .collect()
    }

    pub fn screen(&self) -> usize {
        self.state.lock().unwrap().screen
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn goto(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(PageAction::Goto(url.to_string()));
        if self.fail_goto {
            bail!("net::ERR_NAME_NOT_RESOLVED at {}", url);
        }
        state.url = Some(self.redirect.clone().unwrap_or_else(|| url.to_string()));
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn count(&self, query: &ElementQuery) -> Result<usize> {
        let state = self.state.lock().unwrap();
        Ok(state
            .screens
            .get(state.screen)
            .map(|els| els.iter().filter(|el| el.matches(query)).count())
            .unwrap_or(0))
    }

    async fn perform(&self, query: &ElementQuery, action: &ElementAction) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let element = state
            .screens
            .get(state.screen)
            .and_then(|els| els.iter().find(|el| el.matches(query)))
            .cloned();
        let Some(element) = element else {
            return Ok(false);
        };

        match action {
            ElementAction::Click => {
                state.actions.push(PageAction::Click(query.clone()));
                match element.on_click {
                    Some(ClickEffect::NextScreen) => state.screen += 1,
                    Some(ClickEffect::Navigate(url)) => state.url = Some(url),
                    None => {}
                }
            }
            ElementAction::Fill(value) => {
                state.actions.push(PageAction::Fill(query.clone(), value.clone()));
            }
            ElementAction::SetFiles(files) => {
                state
                    .actions
                    .push(PageAction::SetFiles(query.clone(), files.clone()));
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Default)]
struct SessionCounters {
    created: AtomicUsize,
    started: AtomicUsize,
    stopped: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// 记录会话生命周期的工厂
#[derive(Debug, Default)]
pub struct FakeSessionFactory {
    counters: Arc<SessionCounters>,
    fail_start: bool,
}

impl FakeSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.counters.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.counters.stopped.load(Ordering::SeqCst)
    }

    /// 同时存活的会话数峰值
    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
}

impl SessionFactory for FakeSessionFactory {
    fn create(&self, _user_id: UserId) -> Box<dyn AutomationSession> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeSession {
            counters: Arc::clone(&self.counters),
            fail_start: self.fail_start,
            page: None,
        })
    }
}

struct FakeSession {
    counters: Arc<SessionCounters>,
    fail_start: bool,
    page: Option<ScriptedPage>,
}

#[async_trait]
impl AutomationSession for FakeSession {
    async fn start(&mut self) -> Result<()> {
        if self.fail_start {
            bail!("chrome executable not found");
        }
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(active, Ordering::SeqCst);
        self.page = Some(ScriptedPage::new(vec![]));
        Ok(())
    }

    fn page(&self) -> Option<&dyn PageDriver> {
        self.page.as_ref().map(|p| p as &dyn PageDriver)
    }

    async fn stop(&mut self) -> Result<()> {
        if self.page.take().is_some() {
            self.counters.active.fetch_sub(1, Ordering::SeqCst);
        }
        self.counters.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 策略替身的行为
#[derive(Debug, Clone)]
pub enum StrategyScript {
    Submit,
    Fail(String),
    RejectLogin,
    Panic,
    Hang,
}

pub struct FakeStrategy {
    name: String,
    script: StrategyScript,
    delay: Duration,
    logins: AtomicUsize,
    applies: AtomicUsize,
}

impl FakeStrategy {
    pub fn new(name: &str, script: StrategyScript) -> Self {
        Self {
            name: name.to_string(),
            script,
            delay: Duration::ZERO,
            logins: AtomicUsize::new(0),
            applies: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn applies(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Strategy for FakeStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn login(&self, _page: &dyn PageDriver, _credentials: &Credentials) -> Result<bool> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(!matches!(self.script, StrategyScript::RejectLogin))
    }

    async fn apply(
        &self,
        _page: &dyn PageDriver,
        _job_url: &str,
        _profile: &ApplicantProfile,
    ) -> Result<ApplyOutcome> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match &self.script {
            StrategyScript::Submit | StrategyScript::RejectLogin => Ok(ApplyOutcome::Submitted),
            StrategyScript::Fail(reason) => Ok(ApplyOutcome::Failed(reason.clone())),
            StrategyScript::Panic => panic!("form layout changed"),
            StrategyScript::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ApplyOutcome::Submitted)
            }
        }
    }
}
