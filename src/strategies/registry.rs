use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::linkedin::{LinkedInSettings, LinkedInStrategy};
use super::Strategy;
use crate::models::{domain_of, Job};

/// 域名匹配规则：完全相同的主机名，或其子域名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPattern {
    domain: String,
}

impl DomainPattern {
    pub fn new(domain: impl AsRef<str>) -> Self {
        let domain = domain.as_ref().trim().trim_start_matches('.').to_lowercase();
        let domain = domain.strip_prefix("www.").map(str::to_string).unwrap_or(domain);
        Self { domain }
    }

    pub fn matches(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        host == self.domain
            || host
                .strip_suffix(self.domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

impl fmt::Display for DomainPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.domain)
    }
}

/// 域名 → 策略
#[derive(Default)]
pub struct StrategyRegistry {
    entries: Vec<(DomainPattern, Arc<dyn Strategy>)>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置策略
    pub fn with_defaults(linkedin: LinkedInSettings) -> Self {
        let mut registry = Self::new();
        registry.register("linkedin.com", Arc::new(LinkedInStrategy::new(linkedin)));
        registry
    }

    pub fn register(&mut self, domain: &str, strategy: Arc<dyn Strategy>) -> &mut Self {
        debug!("注册策略 {} -> {}", domain, strategy.name());
        self.entries.push((DomainPattern::new(domain), strategy));
        self
    }

    /// 按主机名查找，先注册的优先；没有兜底策略
    pub fn resolve_host(&self, host: &str) -> Option<Arc<dyn Strategy>> {
        self.entries
            .iter()
            .find(|(pattern, _)| pattern.matches(host))
            .map(|(_, strategy)| Arc::clone(strategy))
    }

    pub fn resolve(&self, job: &Job) -> Option<Arc<dyn Strategy>> {
        domain_of(&job.url).and_then(|host| self.resolve_host(&host))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
