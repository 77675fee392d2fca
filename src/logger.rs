// 日志初始化 - 同时输出到 stderr 和按天轮转的日志文件

use std::path::Path;

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// 默认日志级别
pub const DEFAULT_LOG_LEVEL: &str = "info";

fn build_filter(log_level: Option<&str>) -> Result<EnvFilter> {
    match log_level {
        Some(level) => EnvFilter::try_new(level).map_err(|e| anyhow!("无效的日志级别 {}: {}", level, e)),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))),
    }
}

/// 初始化日志系统
///
/// 命令行传入的级别优先，其次是 RUST_LOG，最后是 info。
/// 返回的 guard 需要保持到程序退出，否则文件日志可能丢失。
pub fn init(log_level: Option<&str>, log_dir: &Path) -> Result<WorkerGuard> {
    let filter = build_filter(log_level)?;

    std::fs::create_dir_all(log_dir)?;

    // 配置日志输出到文件（每天轮转）
    let file_appender = tracing_appender::rolling::daily(log_dir, "spine-advisor.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // 标准输出留给命令结果
    let writer = std::io::stderr.and(non_blocking);

    // 使用本地时区
    let timer = LocalTime::new(time::format_description::parse(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]",
    )?);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_timer(timer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("日志系统初始化失败: {}", e))?;

    tracing::debug!("日志文件位置: {:?}", log_dir);
    Ok(guard)
}
