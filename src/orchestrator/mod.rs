//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `worker` - 应用入口
//! - 组装存储、决策引擎、策略注册表、会话工厂
//! - 把种子决策送进决策引擎
//! - 运行调度循环
//!
//! ### `scheduler` - 执行调度器
//! - 取出到期的申请（Vec<Application>）
//! - 控制并发数量（Semaphore）和执行中集合
//! - 汇总每一轮的统计（CycleReport）
//!
//! ### `executor` - 单条申请执行器
//! - 调用 ApplyFlow
//! - 把结果或故障写回为状态 + 原因
//!
//! ## 层次关系
//!
//! ```text
//! worker (App)
//!     ↓
//! scheduler (处理 Vec<Application>)
//!     ↓
//! executor (处理单个 Application)
//!     ↓
//! workflow::ApplyFlow (会话 → 登录 → 申请)
//!     ↓
//! strategies / services (站点策略、表单工具、决策引擎)
//!     ↓
//! infrastructure (PageDriver、JsExecutor、BrowserSession)
//! ```

pub mod executor;
pub mod scheduler;
pub mod worker;

pub use executor::{process_application, ItemOutcome};
pub use scheduler::{CycleReport, ExecutionScheduler, SchedulerSettings};
pub use worker::{App, DecisionSummary};
