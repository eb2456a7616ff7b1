//! 站点登录凭据
//!
//! 基线实现是进程级共享凭据（来自环境变量）。按用户加密存储凭据不在本 crate 范围内。

use std::collections::HashMap;
use std::fmt;

use crate::config::Config;
use crate::models::UserId;

/// 用户名 + 密码
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// 凭据来源
pub trait CredentialSource: Send + Sync {
    /// 返回某用户在某个策略站点上的凭据，没有配置时返回 `None`
    fn credentials_for(&self, user_id: UserId, strategy: &str) -> Option<Credentials>;
}

/// 所有用户共用的一组凭据，按策略名索引
#[derive(Debug, Clone, Default)]
pub struct SharedCredentials {
    by_strategy: HashMap<String, Credentials>,
}

impl SharedCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, strategy: impl Into<String>, credentials: Credentials) -> Self {
        self.by_strategy.insert(strategy.into(), credentials);
        self
    }

    /// 从配置读取；用户名或密码缺一即视为未配置
    pub fn from_config(config: &Config) -> Self {
        let mut shared = Self::new();
        if let (Some(username), Some(password)) =
            (&config.linkedin_username, &config.linkedin_password)
        {
            shared = shared.with("linkedin", Credentials::new(username, password));
        }
        shared
    }
}

impl CredentialSource for SharedCredentials {
    fn credentials_for(&self, _user_id: UserId, strategy: &str) -> Option<Credentials> {
        self.by_strategy.get(strategy).cloned()
    }
}
