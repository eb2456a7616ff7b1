//! 日志工具模块
//!
//! 提供日志初始化和格式化输出的辅助函数

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::sync::Mutex;
use tracing::{info, Subscriber};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::orchestrator::CycleReport;

/// 初始化 tracing，`RUST_LOG` 优先，否则按 `verbose` 选择级别
///
/// 给出 `log_file` 时写入文件头，并把同样的日志追加到该文件。
/// 重复调用时保留第一次的订阅者。
pub fn init(verbose: bool, log_file: Option<&str>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let file = log_file.map(file_layer).transpose()?;
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file)
        .try_init();
    Ok(())
}

/// 写入文件的日志层（无 ANSI 颜色）
fn file_layer<S>(log_file_path: &str) -> Result<impl Layer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    init_log_file(log_file_path)?;
    let file: File = OpenOptions::new()
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("无法打开日志文件: {}", log_file_path))?;
    Ok(fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file)))
}

/// 初始化日志文件
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n投递执行日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 自动投递调度模式");
    info!("📊 最大并发数: {}", config.max_concurrent_applications);
    info!("⏱  轮询间隔: {} 秒", config.poll_interval_secs);
    info!(
        "🌐 浏览器: {}",
        if config.headless { "无头" } else { "有界面" }
    );
    info!("📦 无策略站点: {}", config.unsupported_site_policy);
    info!("{}", "=".repeat(60));
}

/// 记录一轮调度的统计
pub fn log_cycle_report(cycle: u64, report: &CycleReport) {
    if report.due == 0 {
        return;
    }
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 第 {} 轮完成: 到期 {} | 成功 {} | 失败 {} | 无策略 {} | 跳过 {}",
        cycle, report.due, report.applied, report.failed, report.unsupported, report.skipped
    );
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
