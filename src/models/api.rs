//! 调度服务的请求/响应结构

use super::session::{Familiarity, Topic};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 创建会话请求（学习计划）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub total_time_minutes: u32,
    pub subjects: Vec<SubjectPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectPlan {
    pub name: String,
    pub topics: Vec<TopicPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicPlan {
    pub name: String,
    #[serde(default)]
    pub level: Familiarity,
}

/// 创建会话响应
#[derive(Debug, Clone, Deserialize)]
pub struct SessionCreated {
    pub session_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub total_topics: u32,
    #[serde(default)]
    pub total_time_minutes: u32,
}

/// 当前主题
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurrentTopic {
    pub topic: Topic,
    pub index: u32,
    pub total_topics: u32,
    #[serde(default)]
    pub timer_remaining_seconds: Option<u64>,
    #[serde(default)]
    pub timer_started_at: Option<NaiveDateTime>,
}

impl CurrentTopic {
    /// 服务端给出的剩余秒数，缺省视为 0
    pub fn remaining_seconds(&self) -> u64 {
        self.timer_remaining_seconds.unwrap_or(0)
    }
}

/// 完成/跳过主题的响应
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TopicCompletion {
    pub session_complete: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub next_topic: Option<String>,
    #[serde(default)]
    pub next_subject: Option<String>,
}

/// 单帧检测结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EmotionDetection {
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub trigger_ready: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

/// 近期情绪汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EmotionStatus {
    #[serde(default)]
    pub recent_emotions: Vec<String>,
    pub trigger_ready: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// 重新排期结果
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RescheduleReport {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub old_schedule: Vec<serde_json::Value>,
    #[serde(default)]
    pub new_schedule: Vec<serde_json::Value>,
    #[serde(default)]
    pub topics_affected: u32,
}

/// 会话总结
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionSummary {
    #[serde(default)]
    pub session_id: Option<String>,
    pub total_topics: u32,
    pub completed_count: u32,
    pub backlog_count: u32,
    pub total_time_minutes: u32,
    pub time_studied_minutes: u32,
    pub reschedule_count: u32,
    #[serde(default)]
    pub emotions_timeline: Vec<String>,
    #[serde(default)]
    pub backlog_topics: Vec<BacklogTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BacklogTopic {
    pub name: String,
    pub subject: String,
}

/// 服务端错误响应体
///
/// 框架层错误放在 `detail`，业务异常放在 `error`。
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// 优先取 `detail`，没有时取 `error`
    pub fn message(self) -> Option<String> {
        self.detail.or(self.error)
    }
}
