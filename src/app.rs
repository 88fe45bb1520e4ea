//! 终端前端
//!
//! 从标准输入读取命令交给编排器，把快照渲染成一行倒计时，
//! 会话结束后按退出原因决定是否输出总结。

use crate::clients::{SchedulerApi, SchedulerClient};
use crate::config::Config;
use crate::infrastructure::{CaptureSource, DirectoryCapture, NoCamera};
use crate::models::{load_session_plan, SessionState};
use crate::orchestrator::{
    Command, Notification, SessionExit, SessionHandle, SessionOrchestrator, SessionSnapshot,
};
use crate::utils::logging::{format_mmss, log_startup, print_summary};
use crate::workflow::BreakPhase;
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    api: Arc<dyn SchedulerApi>,
    capture: Arc<dyn CaptureSource>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;

        log_startup(&config);

        let api: Arc<dyn SchedulerApi> = Arc::new(SchedulerClient::new(&config)?);
        let capture: Arc<dyn CaptureSource> = match &config.capture_dir {
            Some(dir) => {
                info!("📷 使用画面目录: {}", dir);
                Arc::new(DirectoryCapture::new(dir))
            }
            None => {
                warn!("⚠️ 未配置 CAPTURE_DIR，情绪监测将显示 No Camera");
                Arc::new(NoCamera)
            }
        };

        if let Some(plan_file) = &config.plan_file {
            ensure_session(api.as_ref(), Path::new(plan_file)).await?;
        }

        Ok(Self {
            config,
            api,
            capture,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        let (orchestrator, handle) =
            SessionOrchestrator::new(&self.config, self.api.clone(), self.capture.clone());
        let session = tokio::spawn(orchestrator.run());

        print_help();
        let exit = drive_terminal(handle, session).await?;

        match exit {
            SessionExit::Completed => {
                info!("🎉 学习会话完成");
                match self.api.summary().await {
                    Ok(summary) => print_summary(&summary),
                    Err(e) => warn!("获取会话总结失败: {}", e),
                }
            }
            SessionExit::Ended => {
                info!("🛑 会话已删除，可通过 SESSION_PLAN_FILE 创建新的学习计划");
            }
            SessionExit::LoadFailed => return Err(anyhow!("加载当前会话失败")),
            SessionExit::Shutdown => info!("👋 已退出"),
        }

        Ok(())
    }
}

/// 没有进行中的会话时，按计划文件创建
async fn ensure_session(api: &dyn SchedulerApi, plan_file: &Path) -> Result<()> {
    if api
        .current_topic()
        .await
        .context("查询当前会话失败")?
        .is_some()
    {
        info!("✓ 检测到进行中的会话，跳过创建");
        return Ok(());
    }

    let plan = load_session_plan(plan_file).await?;
    let created = api
        .create_session(&plan)
        .await
        .context("创建会话失败")?;
    info!(
        "✓ 会话已创建: {} ({} 个主题, {} 分钟)",
        created.session_id, created.total_topics, created.total_time_minutes
    );
    Ok(())
}

async fn drive_terminal(
    mut handle: SessionHandle,
    mut session: JoinHandle<SessionExit>,
) -> Result<SessionExit> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let exit = loop {
        tokio::select! {
            biased;

            joined = &mut session => break joined.context("会话任务异常退出")?,
            _ = tokio::signal::ctrl_c() => {
                handle.send(Command::Shutdown);
            }
            Some(notification) = handle.notifications.recv() => render_notification(&notification),
            Ok(()) = handle.snapshot.changed() => {
                let line = render_status(&handle.snapshot.borrow_and_update());
                print!("\r{:<80}", line);
                let _ = std::io::stdout().flush();
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    match parse_command(input) {
                        Some(command) => {
                            handle.send(command);
                        }
                        None => {
                            warn!("未知命令: {}", input);
                            print_help();
                        }
                    }
                }
                Ok(None) | Err(_) => stdin_open = false,
            },
        }
    };

    println!();
    while let Ok(notification) = handle.notifications.try_recv() {
        render_notification(&notification);
    }
    Ok(exit)
}

/// 解析一行命令
pub fn parse_command(input: &str) -> Option<Command> {
    let command = match input.trim().to_lowercase().as_str() {
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "done" => Command::CompleteTopic { completed: true },
        "skip" => Command::CompleteTopic { completed: false },
        "end" => Command::EndSession,
        "break" => Command::AcceptBreak,
        "dismiss" => Command::DismissBreak,
        "+1" => Command::ExtendBreak,
        "endbreak" => Command::EndBreak,
        "monitor on" => Command::SetMonitoring(true),
        "monitor off" => Command::SetMonitoring(false),
        "quit" | "exit" => Command::Shutdown,
        _ => return None,
    };
    Some(command)
}

/// 把快照渲染成一行状态
pub fn render_status(snapshot: &SessionSnapshot) -> String {
    if snapshot.break_phase == BreakPhase::BreakActive {
        return format!(
            "☕ 休息中 {} | +1 延长一分钟, endbreak 结束休息",
            format_mmss(snapshot.break_seconds)
        );
    }

    let topic = match &snapshot.topic {
        Some(topic) => format!(
            "{} ({}) {}/{}",
            topic.name,
            topic.subject,
            snapshot.index + 1,
            snapshot.total_topics
        ),
        None => match snapshot.state {
            SessionState::Completed => "会话已完成".to_string(),
            _ => "加载中...".to_string(),
        },
    };

    let mut line = format!(
        "[{}] {} ⏱️ {} | {}",
        snapshot.state,
        topic,
        format_mmss(snapshot.remaining_seconds),
        snapshot.status
    );
    if snapshot.break_phase == BreakPhase::PromptShown {
        line.push_str(" | 建议休息: break 开始, dismiss 继续学习");
    }
    line
}

fn render_notification(notification: &Notification) {
    println!();
    if notification.is_error() {
        error!("❌ {}: {}", notification.title, notification.message);
    } else {
        info!("💡 {}: {}", notification.title, notification.message);
    }
}

fn print_help() {
    info!("命令: pause | resume | done | skip | end | break | dismiss | +1 | endbreak | monitor on|off | quit");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Familiarity, Topic, TopicStatus};

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("pause"), Some(Command::Pause));
        assert_eq!(
            parse_command(" DONE "),
            Some(Command::CompleteTopic { completed: true })
        );
        assert_eq!(
            parse_command("skip"),
            Some(Command::CompleteTopic { completed: false })
        );
        assert_eq!(parse_command("+1"), Some(Command::ExtendBreak));
        assert_eq!(
            parse_command("monitor off"),
            Some(Command::SetMonitoring(false))
        );
        assert_eq!(parse_command("quit"), Some(Command::Shutdown));
        assert_eq!(parse_command("dance"), None);
    }

    fn topic() -> Topic {
        Topic {
            name: "Sets".to_string(),
            subject: "Math".to_string(),
            familiarity: Familiarity::Known,
            allocated_minutes: 10,
            status: TopicStatus::Active,
            actual_time_spent: None,
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_render_active_topic() {
        let snapshot = SessionSnapshot {
            state: SessionState::Active,
            remaining_seconds: 125,
            topic: Some(topic()),
            index: 0,
            total_topics: 3,
            status: "Monitoring".to_string(),
            ..Default::default()
        };
        let line = render_status(&snapshot);
        assert!(line.contains("Sets (Math) 1/3"));
        assert!(line.contains("02:05"));
        assert!(line.ends_with("Monitoring"));
    }

    #[test]
    fn test_render_break() {
        let snapshot = SessionSnapshot {
            state: SessionState::Paused,
            break_phase: BreakPhase::BreakActive,
            break_seconds: 300,
            ..Default::default()
        };
        assert!(render_status(&snapshot).contains("05:00"));

        let prompt = SessionSnapshot {
            state: SessionState::Active,
            topic: Some(topic()),
            break_phase: BreakPhase::PromptShown,
            ..Default::default()
        };
        assert!(render_status(&prompt).contains("建议休息"));
    }
}
