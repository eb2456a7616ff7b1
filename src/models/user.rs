//! 用户与订阅等级

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::UserId;

/// 订阅等级
///
/// 决定每日配额、匹配分阈值和调度优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Free,
    Pro,
    Expert,
}

impl Tier {
    /// 用于拼接说明文字的名称
    pub fn label(self) -> &'static str {
        match self {
            Tier::Free => "Free",
            Tier::Pro => "Pro",
            Tier::Expert => "Expert",
        }
    }

    /// 持久化使用的大写代码
    pub fn code(self) -> &'static str {
        match self {
            Tier::Free => "FREE",
            Tier::Pro => "PRO",
            Tier::Expert => "EXPERT",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

fn default_daily_quota() -> u32 {
    1
}

/// 用户记录（由外部身份服务维护，这里只读配额相关字段）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default = "default_tier")]
    pub tier: Tier,
    #[serde(default = "default_daily_quota")]
    pub daily_quota: u32,
    #[serde(default)]
    pub quota_used_today: u32,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

fn default_tier() -> Tier {
    Tier::Free
}

impl User {
    /// 创建一个只含配额信息的用户
    pub fn new(id: u64, tier: Tier, daily_quota: u32) -> Self {
        Self {
            id: UserId(id),
            tier,
            daily_quota,
            quota_used_today: 0,
            email: String::new(),
            first_name: None,
            last_name: None,
            phone: None,
        }
    }

    /// 今日配额是否已用完
    pub fn quota_exhausted(&self) -> bool {
        self.quota_used_today >= self.daily_quota
    }
}
