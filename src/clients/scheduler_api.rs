//! 调度服务能力接口
//!
//! 编排层只通过这个 trait 访问远程调度服务，测试中用内存实现替换。

use crate::error::ApiResult;
use crate::models::{
    CurrentTopic, EmotionDetection, EmotionStatus, RescheduleReport, SessionCreated, SessionPlan,
    SessionSummary, TopicCompletion,
};
use async_trait::async_trait;

#[async_trait]
pub trait SchedulerApi: Send + Sync {
    /// 创建会话（设置流程）
    async fn create_session(&self, plan: &SessionPlan) -> ApiResult<SessionCreated>;

    /// 获取当前主题，没有进行中的会话时返回 `None`
    async fn current_topic(&self) -> ApiResult<Option<CurrentTopic>>;

    async fn pause(&self) -> ApiResult<()>;

    async fn resume(&self) -> ApiResult<()>;

    /// 完成（`true`）或跳过（`false`）当前主题
    async fn complete_topic(&self, completed: bool) -> ApiResult<TopicCompletion>;

    async fn delete_session(&self) -> ApiResult<()>;

    async fn summary(&self) -> ApiResult<SessionSummary>;

    /// 上传一帧 JPEG 画面进行情绪检测
    async fn detect_emotion(&self, frame: Vec<u8>) -> ApiResult<EmotionDetection>;

    async fn emotion_status(&self) -> ApiResult<EmotionStatus>;

    /// 休息结束后重新分配剩余主题时间
    async fn trigger_reschedule(&self) -> ApiResult<RescheduleReport>;
}
