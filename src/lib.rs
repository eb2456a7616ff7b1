//! # Auto Apply
//!
//! 按用户等级决策、按时间调度、用浏览器自动完成职位申请的流水线
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（浏览器、Page），只暴露能力
//! - `PageDriver` - 导航、计数、点击、填写的最小页面接口
//! - `JsExecutor` - 唯一的 page owner，实现 `PageDriver`
//! - `BrowserSession` - 一次执行一个会话，按用户持久化 cookie
//!
//! ### ② 业务能力层（Services / Strategies）
//! - `services/` - 描述"我能做什么"
//! - `DecisionEngine` - 配额闸门 + 等级阈值 + 调度时间
//! - `FormToolkit` - 按标签/placeholder/按钮名操作表单，从不报错
//! - `strategies/` - 站点策略与按域名的注册表（LinkedIn Easy Apply）
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条申请"的完整执行流程
//! - `ApplicationCtx` - 上下文封装（申请 + 用户 + 职位）
//! - `ApplyFlow` - 流程编排（会话 → 登录 → 申请 → 释放会话）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/scheduler` - 轮询到期申请，管理并发
//! - `orchestrator/executor` - 单条申请执行，结果写回
//! - `orchestrator/worker` - 组装组件，运行主循环
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod store;
pub mod strategies;
pub mod utils;
pub mod workflow;

#[cfg(test)]
mod testing;

// 重新导出常用类型
pub use config::{Config, UnsupportedSitePolicy};
pub use error::{PipelineError, Result};
pub use infrastructure::{AutomationSession, BrowserSessionFactory, JsExecutor, PageDriver, SessionFactory};
pub use models::{Application, ApplicationStatus, Job, Resume, Tier, User};
pub use orchestrator::{App, CycleReport, ExecutionScheduler, SchedulerSettings};
pub use services::{DecisionEngine, FormToolkit};
pub use store::{ApplicationStore, MemoryStore, StoreError};
pub use strategies::{ApplyOutcome, Strategy, StrategyRegistry};
pub use workflow::{ApplicationCtx, ApplyFlow, FlowResult};
