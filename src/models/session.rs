//! 会话领域模型
//!
//! `Session` 只由编排层修改，其余组件只读。

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 会话整体状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Active,
    Paused,
    Completed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Active => "active",
            SessionState::Paused => "paused",
            SessionState::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 熟悉程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Familiarity {
    Known,
    #[default]
    Partial,
    Unknown,
}

/// 主题状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Pending,
    Active,
    Completed,
    Backlog,
}

/// 学习主题（服务端创建，客户端只读）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub subject: String,
    #[serde(rename = "level")]
    pub familiarity: Familiarity,
    #[serde(rename = "time_minutes")]
    pub allocated_minutes: u32,
    pub status: TopicStatus,
    /// 已学习分钟数
    #[serde(default)]
    pub actual_time_spent: Option<u32>,
    #[serde(default)]
    pub started_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
}

/// 本地会话状态
///
/// `remaining_seconds` 是服务端计时的本地镜像，只在两次同步之间有效。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub state: SessionState,
    pub remaining_seconds: u64,
    pub current_topic: Option<Topic>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn is_completed(&self) -> bool {
        self.state == SessionState::Completed
    }
}

/// 一次检测的结果（检测 + 汇总状态）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionSignal {
    pub label: String,
    pub trigger_ready: bool,
}

/// 休息会话，由休息控制器独占
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakSession {
    pub active: bool,
    pub seconds_remaining: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_uses_wire_names() {
        let json = r#"{
            "name": "Limits",
            "subject": "Calculus",
            "level": "unknown",
            "time_minutes": 25,
            "status": "active",
            "actual_time_spent": 3,
            "started_at": "2024-05-01T10:00:00.123456",
            "completed_at": null
        }"#;
        let topic: Topic = serde_json::from_str(json).unwrap();
        assert_eq!(topic.familiarity, Familiarity::Unknown);
        assert_eq!(topic.allocated_minutes, 25);
        assert_eq!(topic.status, TopicStatus::Active);
        assert!(topic.started_at.is_some());
        assert!(topic.completed_at.is_none());
    }

    #[test]
    fn test_session_defaults_to_idle() {
        let session = Session::default();
        assert_eq!(session.state, SessionState::Idle);
        assert_eq!(session.remaining_seconds, 0);
        assert!(session.current_topic.is_none());
        assert_eq!(SessionState::Paused.to_string(), "paused");
    }
}
