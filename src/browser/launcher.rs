use std::path::Path;

use anyhow::Result;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::infrastructure::session::SessionOptions;

/// 启动一个独立的浏览器进程
///
/// 每个会话使用自己的 profile 目录，互不共享 cookie 和缓存。
/// 返回浏览器和事件处理任务句柄，调用方负责在关闭时 abort 句柄。
pub async fn launch_browser(
    options: &SessionOptions,
    profile_dir: &Path,
) -> Result<(Browser, JoinHandle<()>)> {
    info!(
        "🚀 启动浏览器 ({})...",
        if options.headless { "无头" } else { "有界面" }
    );
    debug!("profile 目录: {}", profile_dir.display());

    let (width, height) = options.window;
    let mut builder = BrowserConfig::builder()
        .user_data_dir(profile_dir)
        .window_size(width, height)
        .viewport(Viewport {
            width,
            height,
            ..Viewport::default()
        })
        .args(vec![
            "--no-sandbox".to_string(),                                 // 禁用沙盒，防止权限问题导致的崩溃
            "--disable-dev-shm-usage".to_string(),                      // 防止共享内存不足
            "--disable-blink-features=AutomationControlled".to_string(), // 隐藏自动化标记
            format!("--user-agent={}", options.user_agent),
        ]);

    builder = if options.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(executable) = &options.chrome_executable {
        builder = builder.chrome_executable(executable);
    }

    let config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        anyhow::anyhow!("配置浏览器失败: {}", e)
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        anyhow::anyhow!("启动浏览器失败: {}", e)
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let handle = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    Ok((browser, handle))
}
