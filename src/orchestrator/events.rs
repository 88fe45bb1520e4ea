//! 编排层的事件与输出类型
//!
//! 事件循环只有一个入口：`SessionEvent`。倒计时脉冲、采样上报、操作命令、
//! 远程请求的返回都被包装成它，按到达顺序逐个处理。

use crate::error::ApiResult;
use crate::infrastructure::ClockPulse;
use crate::models::{CurrentTopic, SessionState, Topic, TopicCompletion};
use crate::services::SampleReport;
use crate::workflow::{BreakPhase, BreakSync};

/// 操作命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    /// `true` 为完成，`false` 为跳过
    CompleteTopic {
        completed: bool,
    },
    EndSession,
    AcceptBreak,
    DismissBreak,
    ExtendBreak,
    EndBreak,
    SetMonitoring(bool),
    Shutdown,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::CompleteTopic { completed: true } => "complete",
            Command::CompleteTopic { completed: false } => "skip",
            Command::EndSession => "end",
            Command::AcceptBreak => "break",
            Command::DismissBreak => "dismiss",
            Command::ExtendBreak => "extend",
            Command::EndBreak => "endbreak",
            Command::SetMonitoring(_) => "monitor",
            Command::Shutdown => "quit",
        }
    }
}

/// 进行中的远程操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Load,
    Pause,
    Resume,
    Complete,
    Delete,
    BreakSync,
}

impl RemoteOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteOp::Load => "load",
            RemoteOp::Pause => "pause",
            RemoteOp::Resume => "resume",
            RemoteOp::Complete => "complete",
            RemoteOp::Delete => "delete",
            RemoteOp::BreakSync => "reschedule",
        }
    }
}

/// 远程操作的结果
#[derive(Debug)]
pub enum RemoteOutcome {
    Loaded(ApiResult<Option<CurrentTopic>>),
    Paused(ApiResult<()>),
    Resumed(ApiResult<()>),
    TopicCompleted {
        completion: ApiResult<TopicCompletion>,
        /// 会话未结束时紧接着拉取的下一个主题
        next: Option<ApiResult<Option<CurrentTopic>>>,
    },
    Deleted(ApiResult<()>),
    BreakSynced(BreakSync),
}

/// 带 epoch 的远程返回，epoch 不符的直接丢弃
#[derive(Debug)]
pub struct RemoteReply {
    pub epoch: u64,
    pub outcome: RemoteOutcome,
}

#[derive(Debug)]
pub enum SessionEvent {
    Clock(ClockPulse),
    Sample(SampleReport),
    Command(Command),
    Remote(RemoteReply),
}

impl From<ClockPulse> for SessionEvent {
    fn from(pulse: ClockPulse) -> Self {
        SessionEvent::Clock(pulse)
    }
}

impl From<SampleReport> for SessionEvent {
    fn from(report: SampleReport) -> Self {
        SessionEvent::Sample(report)
    }
}

impl From<Command> for SessionEvent {
    fn from(command: Command) -> Self {
        SessionEvent::Command(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// 给前端的一条提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

/// 会话的可见状态
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub remaining_seconds: u64,
    pub topic: Option<Topic>,
    /// 从 0 开始
    pub index: u32,
    pub total_topics: u32,
    pub status: String,
    pub break_phase: BreakPhase,
    pub break_seconds: u64,
    pub monitoring: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            remaining_seconds: 0,
            topic: None,
            index: 0,
            total_topics: 0,
            status: String::new(),
            break_phase: BreakPhase::Dormant,
            break_seconds: 0,
            monitoring: false,
        }
    }
}

/// 会话视图退出的原因，决定前端下一步去哪
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// 所有主题完成，去总结页
    Completed,
    /// 会话被删除，回到计划页
    Ended,
    /// 加载当前会话失败
    LoadFailed,
    Shutdown,
}
