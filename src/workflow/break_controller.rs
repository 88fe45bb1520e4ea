//! 休息控制器 - 流程层
//!
//! 状态：`Dormant → PromptShown → BreakActive → Dormant`
//!
//! 休息倒计时只在 `BreakActive` 期间存在。结束休息（手动或倒计时归零）
//! 只有进入 `BreakActive` 之后的第一次调用会返回 `BreakEnd`，持有者拿到它
//! 才去执行 `synchronize`，因此重新排期和刷新各只发生一次。

use crate::clients::SchedulerApi;
use crate::error::ApiResult;
use crate::infrastructure::{Clock, ClockKind, ClockPulse, TickOutcome};
use crate::models::{BreakSession, CurrentTopic, RescheduleReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakPhase {
    Dormant,
    PromptShown,
    BreakActive,
}

impl BreakPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakPhase::Dormant => "dormant",
            BreakPhase::PromptShown => "prompt",
            BreakPhase::BreakActive => "break",
        }
    }
}

/// 休息倒计时一次脉冲的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakTick {
    Stale,
    Ticked(u64),
    /// 倒计时归零，持有者应当结束休息
    Expired,
}

/// 结束休息的凭证，每次休息只会发出一次
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct BreakEnd {
    /// 结束时休息倒计时还剩多少秒
    pub seconds_left: u64,
}

/// 休息结束后的同步结果
#[derive(Debug)]
pub struct BreakSync {
    pub reschedule: ApiResult<RescheduleReport>,
    pub refresh: ApiResult<Option<CurrentTopic>>,
}

/// 休息控制器
pub struct BreakController<E> {
    phase: BreakPhase,
    clock: Option<Clock<E>>,
    period: Duration,
    duration_secs: u64,
    extend_secs: u64,
    events: UnboundedSender<E>,
}

impl<E> BreakController<E>
where
    E: From<ClockPulse> + Send + 'static,
{
    /// 创建休息控制器
    ///
    /// # 参数
    /// - `period`: 倒计时步进间隔
    /// - `duration_secs`: 默认休息时长
    /// - `extend_secs`: 每次延长的秒数
    /// - `events`: 倒计时脉冲发往的事件通道
    pub fn new(
        period: Duration,
        duration_secs: u64,
        extend_secs: u64,
        events: UnboundedSender<E>,
    ) -> Self {
        Self {
            phase: BreakPhase::Dormant,
            clock: None,
            period,
            duration_secs,
            extend_secs,
            events,
        }
    }

    pub fn phase(&self) -> BreakPhase {
        self.phase
    }

    /// 是否已创建休息倒计时
    pub fn has_clock(&self) -> bool {
        self.clock.is_some()
    }

    pub fn session(&self) -> BreakSession {
        match (&self.clock, self.phase) {
            (Some(clock), BreakPhase::BreakActive) => BreakSession {
                active: true,
                seconds_remaining: clock.remaining(),
            },
            _ => BreakSession::default(),
        }
    }

    /// 显示休息提示（不暂停学习）
    pub fn show_prompt(&mut self) -> bool {
        if self.phase != BreakPhase::Dormant {
            return false;
        }
        self.phase = BreakPhase::PromptShown;
        info!("☕ 检测到疲劳，提示休息");
        true
    }

    /// 用户拒绝休息
    pub fn dismiss(&mut self) -> bool {
        if self.phase != BreakPhase::PromptShown {
            return false;
        }
        self.phase = BreakPhase::Dormant;
        info!("用户选择继续学习");
        true
    }

    /// 用户接受休息，开始休息倒计时
    ///
    /// 暂停主倒计时和停用采样器由持有者负责。
    pub fn accept(&mut self) -> bool {
        if self.phase != BreakPhase::PromptShown {
            return false;
        }
        let mut clock = Clock::new(ClockKind::Break, self.period, self.events.clone());
        clock.start(self.duration_secs);
        self.clock = Some(clock);
        self.phase = BreakPhase::BreakActive;
        info!("☕ 开始休息 {} 秒", self.duration_secs);
        true
    }

    /// 延长休息，返回新的剩余秒数
    pub fn extend(&mut self) -> Option<u64> {
        if self.phase != BreakPhase::BreakActive {
            return None;
        }
        let clock = self.clock.as_mut()?;
        if !clock.extend(self.extend_secs) {
            return None;
        }
        info!("☕ 休息延长 {} 秒", self.extend_secs);
        Some(clock.remaining())
    }

    pub fn on_pulse(&mut self, pulse: ClockPulse) -> BreakTick {
        let Some(clock) = self.clock.as_mut() else {
            return BreakTick::Stale;
        };
        match clock.on_pulse(pulse) {
            TickOutcome::Stale => BreakTick::Stale,
            TickOutcome::Ticked(remaining) => BreakTick::Ticked(remaining),
            TickOutcome::Expired => BreakTick::Expired,
        }
    }

    /// 结束休息（幂等）
    ///
    /// 只有进入 `BreakActive` 之后的第一次调用返回 `Some`，同时停止休息倒计时。
    pub fn end(&mut self) -> Option<BreakEnd> {
        if self.phase != BreakPhase::BreakActive {
            return None;
        }
        let seconds_left = match self.clock.take() {
            Some(mut clock) => {
                let left = clock.remaining();
                clock.cancel();
                left
            }
            None => 0,
        };
        self.phase = BreakPhase::Dormant;
        info!("☕ 休息结束");
        Some(BreakEnd { seconds_left })
    }

    /// 拆除：丢弃提示和倒计时，不做同步
    pub fn reset(&mut self) {
        if let Some(mut clock) = self.clock.take() {
            clock.cancel();
        }
        self.phase = BreakPhase::Dormant;
    }

    /// 休息结束后的同步：先重新排期，再刷新当前主题
    ///
    /// 重新排期失败时仍然刷新，两个结果都交给持有者处理。
    pub async fn synchronize(api: Arc<dyn SchedulerApi>) -> BreakSync {
        let reschedule = api.trigger_reschedule().await;
        match &reschedule {
            Ok(report) => info!(
                "🔁 重新排期完成: {} 个主题受影响",
                report.topics_affected
            ),
            Err(e) => warn!("❌ 重新排期失败: {}", e),
        }

        let refresh = api.current_topic().await;
        if let Err(e) = &refresh {
            warn!("刷新当前主题失败: {}", e);
        }

        BreakSync {
            reschedule,
            refresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::models::{
        EmotionDetection, EmotionStatus, SessionCreated, SessionPlan, SessionSummary,
        TopicCompletion,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio::time;

    const PERIOD: Duration = Duration::from_secs(1);

    fn controller() -> (BreakController<ClockPulse>, UnboundedReceiver<ClockPulse>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (BreakController::new(PERIOD, 300, 60, tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_then_dismiss_creates_no_clock() {
        let (mut breaks, _rx) = controller();
        assert!(breaks.show_prompt());
        assert_eq!(breaks.phase(), BreakPhase::PromptShown);
        assert!(!breaks.show_prompt());

        assert!(breaks.dismiss());
        assert_eq!(breaks.phase(), BreakPhase::Dormant);
        assert!(!breaks.has_clock());
        assert_eq!(breaks.session(), BreakSession::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_requires_prompt() {
        let (mut breaks, _rx) = controller();
        assert!(!breaks.accept());
        assert!(!breaks.dismiss());
        assert!(breaks.end().is_none());
        assert!(!breaks.has_clock());
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_starts_default_break() {
        let (mut breaks, _rx) = controller();
        breaks.show_prompt();
        assert!(breaks.accept());
        assert_eq!(breaks.phase(), BreakPhase::BreakActive);
        assert_eq!(
            breaks.session(),
            BreakSession {
                active: true,
                seconds_remaining: 300
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_adds_sixty_seconds() {
        let (mut breaks, mut rx) = controller();
        breaks.show_prompt();
        breaks.accept();

        let pulse = rx.recv().await.unwrap();
        assert_eq!(breaks.on_pulse(pulse), BreakTick::Ticked(299));

        assert_eq!(breaks.extend(), Some(359));
        assert_eq!(breaks.extend(), Some(419));
        let pulse = rx.recv().await.unwrap();
        assert_eq!(breaks.on_pulse(pulse), BreakTick::Ticked(418));
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_outside_break_is_noop() {
        let (mut breaks, _rx) = controller();
        assert_eq!(breaks.extend(), None);
        breaks.show_prompt();
        assert_eq!(breaks.extend(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_is_idempotent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut breaks = BreakController::new(PERIOD, 2, 60, tx);
        breaks.show_prompt();
        breaks.accept();

        let mut expired = false;
        while !expired {
            let pulse = rx.recv().await.unwrap();
            expired = breaks.on_pulse(pulse) == BreakTick::Expired;
        }

        // 自动结束与手动结束同时到达，只有第一次生效
        assert_eq!(breaks.end(), Some(BreakEnd { seconds_left: 0 }));
        assert_eq!(breaks.end(), None);
        assert_eq!(breaks.phase(), BreakPhase::Dormant);
        assert!(!breaks.has_clock());

        time::sleep(PERIOD * 5).await;
        while let Ok(pulse) = rx.try_recv() {
            assert_eq!(breaks.on_pulse(pulse), BreakTick::Stale);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_end_reports_seconds_left() {
        let (mut breaks, _rx) = controller();
        breaks.show_prompt();
        breaks.accept();
        assert_eq!(breaks.end(), Some(BreakEnd { seconds_left: 300 }));
        assert_eq!(breaks.end(), None);
    }

    struct FakeScheduler {
        reschedule_fails: bool,
        reschedules: AtomicUsize,
        refreshes: AtomicUsize,
    }

    fn unused<T>() -> ApiResult<T> {
        Err(ApiError::Status {
            endpoint: "unused".to_string(),
            status: 500,
            detail: None,
        })
    }

    #[async_trait]
    impl SchedulerApi for FakeScheduler {
        async fn create_session(&self, _plan: &SessionPlan) -> ApiResult<SessionCreated> {
            unused()
        }
        async fn current_topic(&self) -> ApiResult<Option<CurrentTopic>> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
        async fn pause(&self) -> ApiResult<()> {
            unused()
        }
        async fn resume(&self) -> ApiResult<()> {
            unused()
        }
        async fn complete_topic(&self, _completed: bool) -> ApiResult<TopicCompletion> {
            unused()
        }
        async fn delete_session(&self) -> ApiResult<()> {
            unused()
        }
        async fn summary(&self) -> ApiResult<SessionSummary> {
            unused()
        }
        async fn detect_emotion(&self, _frame: Vec<u8>) -> ApiResult<EmotionDetection> {
            unused()
        }
        async fn emotion_status(&self) -> ApiResult<EmotionStatus> {
            unused()
        }
        async fn trigger_reschedule(&self) -> ApiResult<RescheduleReport> {
            self.reschedules.fetch_add(1, Ordering::SeqCst);
            if self.reschedule_fails {
                return Err(ApiError::Status {
                    endpoint: "/api/reschedule/trigger".to_string(),
                    status: 503,
                    detail: Some("Ollama error".to_string()),
                });
            }
            Ok(RescheduleReport {
                topics_affected: 2,
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_synchronize_refreshes_after_failed_reschedule() {
        let api = Arc::new(FakeScheduler {
            reschedule_fails: true,
            reschedules: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        });

        let sync = BreakController::<ClockPulse>::synchronize(api.clone()).await;
        assert!(sync.reschedule.is_err());
        assert!(sync.refresh.is_ok());
        assert_eq!(api.reschedules.load(Ordering::SeqCst), 1);
        assert_eq!(api.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_synchronize_success() {
        let api = Arc::new(FakeScheduler {
            reschedule_fails: false,
            reschedules: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        });

        let sync = BreakController::<ClockPulse>::synchronize(api.clone()).await;
        assert_eq!(sync.reschedule.unwrap().topics_affected, 2);
        assert_eq!(api.refreshes.load(Ordering::SeqCst), 1);
    }
}
