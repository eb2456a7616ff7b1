use anyhow::Result;
use auto_apply::utils::logging;
use auto_apply::{App, Config};
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    let log_file = config.output_log_file.clone();
    logging::init(config.verbose_logging, Some(&log_file))?;

    // 初始化应用
    let app = App::initialize(config).await?;

    // Ctrl+C 触发停止信号，当前这一轮会先跑完
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("收到 Ctrl+C，等待当前一轮结束...");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!("无法监听 Ctrl+C: {}", e);
                // 保持发送端存活，否则调度循环会立即退出
                std::future::pending::<()>().await;
            }
        }
    });

    app.run(shutdown_rx).await?;
    info!("日志已保存至: {}", log_file);
    Ok(())
}
