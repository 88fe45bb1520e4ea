/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use crate::config::Config;
use crate::models::{CurrentTopic, SessionSummary};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// 优先读取 `RUST_LOG`，否则使用 `info`（详细模式下为 `debug`）。
/// 重复调用是安全的。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 学习会话模式");
    info!("🌐 调度服务: {}", config.api_base_url);
    info!(
        "📷 情绪监测: {} (每 {} ms 采样)",
        if config.emotion_monitoring { "开启" } else { "关闭" },
        config.sample_interval_ms
    );
    info!("☕ 默认休息: {}", format_mmss(config.break_duration_secs));
    info!("{}", "=".repeat(60));
}

/// 记录当前主题
pub fn log_topic(current: &CurrentTopic) {
    info!("\n{}", "─".repeat(60));
    info!(
        "📖 主题 {}/{}: {} ({})",
        current.index + 1,
        current.total_topics,
        current.topic.name,
        current.topic.subject
    );
    info!(
        "⏱️ 分配 {} 分钟，剩余 {}",
        current.topic.allocated_minutes,
        format_mmss(current.remaining_seconds())
    );
    info!("{}", "─".repeat(60));
}

/// 打印会话总结
pub fn print_summary(summary: &SessionSummary) {
    info!("\n{}", "=".repeat(60));
    info!("📊 学习会话总结");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!(
        "✅ 完成: {}/{}",
        summary.completed_count, summary.total_topics
    );
    info!("📦 积压: {}", summary.backlog_count);
    info!(
        "⏱️ 学习时长: {}/{} 分钟",
        summary.time_studied_minutes, summary.total_time_minutes
    );
    info!("🔁 重新排期: {} 次", summary.reschedule_count);
    for topic in &summary.backlog_topics {
        info!("   - {} ({})", topic.name, topic.subject);
    }
    info!("{}", "=".repeat(60));
}

/// 把秒数格式化为 MM:SS
pub fn format_mmss(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
