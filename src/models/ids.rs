//! 记录主键类型

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

record_id!(
    /// 用户 ID
    UserId
);
record_id!(
    /// 职位 ID
    JobId
);
record_id!(
    /// 简历 ID
    ResumeId
);
record_id!(
    /// 投递申请 ID
    ApplicationId
);
