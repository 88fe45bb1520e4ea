//! 会话编排器 - 编排层
//!
//! ## 职责
//!
//! 本模块是学习会话的顶层状态机：`Idle → Active ⇄ Paused → Completed`。
//!
//! ## 核心功能
//!
//! 1. **事件循环**：倒计时脉冲、采样上报、操作命令、远程返回都经由同一个通道，逐个处理
//! 2. **主倒计时**：持有主题倒计时，归零时提交一次完成
//! 3. **组合下层**：按状态启停采样器，驱动休息控制器
//! 4. **远程调用**：唯一调用调度服务的模块，请求在后台任务中执行，返回带 epoch
//! 5. **对外输出**：`watch` 快照 + 提示消息流
//!
//! ## 设计特点
//!
//! - **单一写者**：会话状态只在事件循环里修改
//! - **单个在途请求**：远程请求进行中时，新的状态变更命令会被拒绝
//! - **拆除彻底**：退出时停止全部计时器并推进 epoch，迟到的返回被忽略

use super::events::{
    Command, Notification, RemoteOp, RemoteOutcome, RemoteReply, SessionEvent, SessionExit,
    SessionSnapshot,
};
use crate::clients::SchedulerApi;
use crate::config::Config;
use crate::error::{ApiError, SessionError};
use crate::infrastructure::{CaptureSource, Clock, ClockKind, ClockPulse, ClockState, TickOutcome};
use crate::models::{CurrentTopic, EmotionSignal, Session, SessionState};
use crate::services::{SampleReport, SampleSignal, Sampler, SamplerStatus};
use crate::utils::logging::log_topic;
use crate::workflow::{BreakController, BreakPhase, BreakTick};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const MONITORING: &str = "Monitoring";
const ON_BREAK: &str = "BREAK";

/// 等待在途请求结束后再执行的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    Complete,
    BreakSync,
}

/// 前端持有的句柄
pub struct SessionHandle {
    events: UnboundedSender<SessionEvent>,
    pub snapshot: watch::Receiver<SessionSnapshot>,
    pub notifications: UnboundedReceiver<Notification>,
}

impl SessionHandle {
    /// 发送命令；编排器已退出时返回 false
    pub fn send(&self, command: Command) -> bool {
        self.events.send(SessionEvent::Command(command)).is_ok()
    }
}

/// 会话编排器
pub struct SessionOrchestrator {
    api: Arc<dyn SchedulerApi>,
    sample_period: Duration,
    session: Session,
    index: u32,
    total_topics: u32,
    status: String,
    monitoring: bool,
    clock: Clock<SessionEvent>,
    sampler: Sampler<SessionEvent>,
    breaks: BreakController<SessionEvent>,
    epoch: u64,
    pending: Option<RemoteOp>,
    deferred: Option<Deferred>,
    exit: Option<SessionExit>,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    notify_tx: UnboundedSender<Notification>,
}

impl SessionOrchestrator {
    /// 创建编排器和前端句柄
    pub fn new(
        config: &Config,
        api: Arc<dyn SchedulerApi>,
        capture: Arc<dyn CaptureSource>,
    ) -> (Self, SessionHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let clock = Clock::new(ClockKind::Main, config.tick_interval(), events_tx.clone());
        let sampler = Sampler::new(capture, api.clone(), events_tx.clone());
        let breaks = BreakController::new(
            config.tick_interval(),
            config.break_duration_secs,
            config.break_extend_secs,
            events_tx.clone(),
        );

        let handle = SessionHandle {
            events: events_tx.clone(),
            snapshot: snapshot_rx,
            notifications: notify_rx,
        };

        let orchestrator = Self {
            api,
            sample_period: config.sample_interval(),
            session: Session::default(),
            index: 0,
            total_topics: 0,
            status: String::new(),
            monitoring: config.emotion_monitoring,
            clock,
            sampler,
            breaks,
            epoch: 0,
            pending: None,
            deferred: None,
            exit: None,
            events_tx,
            events_rx,
            snapshot_tx,
            notify_tx,
        };
        (orchestrator, handle)
    }

    /// 运行事件循环，直到会话视图退出
    pub async fn run(mut self) -> SessionExit {
        self.start();
        loop {
            if let Some(exit) = self.exit {
                info!("会话视图退出: {:?}", exit);
                return exit;
            }
            match self.events_rx.recv().await {
                Some(event) => self.handle_event(event),
                None => self.finish(SessionExit::Shutdown),
            }
        }
    }

    /// 进入 Idle 并加载当前主题
    pub fn start(&mut self) {
        self.session = Session::default();
        self.status = self.idle_status();
        info!("📡 正在加载当前会话...");
        let api = self.api.clone();
        self.spawn_remote(RemoteOp::Load, async move {
            RemoteOutcome::Loaded(api.current_topic().await)
        });
        self.publish();
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Clock(pulse) => self.on_pulse(pulse),
            SessionEvent::Sample(report) => self.on_sample(report),
            SessionEvent::Command(command) => {
                if let Err(e) = self.on_command(command) {
                    warn!("⚠️ 命令 {} 被拒绝: {}", command.name(), e);
                    self.notify(Notification::error("操作被拒绝", e.to_string()));
                }
            }
            SessionEvent::Remote(reply) => self.on_remote(reply),
        }
        self.publish();
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let on_break = self.breaks.session();
        SessionSnapshot {
            state: self.session.state,
            remaining_seconds: self.session.remaining_seconds,
            topic: self.session.current_topic.clone(),
            index: self.index,
            total_topics: self.total_topics,
            status: self.status.clone(),
            break_phase: self.breaks.phase(),
            break_seconds: on_break.seconds_remaining,
            monitoring: self.monitoring,
        }
    }

    // ========== 操作 ==========

    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.session.state != SessionState::Active {
            return Err(self.invalid("pause"));
        }
        self.ensure_ready("pause")?;
        let api = self.api.clone();
        self.spawn_remote(RemoteOp::Pause, async move {
            RemoteOutcome::Paused(api.pause().await)
        });
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.session.state != SessionState::Paused || self.on_break() {
            return Err(self.invalid("resume"));
        }
        self.ensure_ready("resume")?;
        let api = self.api.clone();
        self.spawn_remote(RemoteOp::Resume, async move {
            RemoteOutcome::Resumed(api.resume().await)
        });
        Ok(())
    }

    /// 完成（`true`）或跳过（`false`）当前主题
    pub fn complete_topic(&mut self, completed: bool) -> Result<(), SessionError> {
        let operation = if completed { "complete" } else { "skip" };
        let allowed = matches!(
            self.session.state,
            SessionState::Active | SessionState::Paused
        );
        if !allowed || self.on_break() {
            return Err(self.invalid(operation));
        }
        self.ensure_ready(operation)?;
        self.start_completion(completed);
        Ok(())
    }

    pub fn end_session(&mut self) -> Result<(), SessionError> {
        if self.session.is_completed() {
            return Err(self.invalid("end"));
        }
        self.ensure_ready("end")?;
        info!("🛑 正在结束会话...");
        let api = self.api.clone();
        self.spawn_remote(RemoteOp::Delete, async move {
            RemoteOutcome::Deleted(api.delete_session().await)
        });
        Ok(())
    }

    /// 处理一次情绪检测结果
    pub fn on_emotion_signal(&mut self, signal: EmotionSignal) {
        if !self.session.is_active() || self.on_break() || self.pending.is_some() {
            debug!("忽略情绪信号: {}", signal.label);
            return;
        }

        debug!("😶 情绪: {} (trigger_ready={})", signal.label, signal.trigger_ready);
        self.status = signal.label;
        if signal.trigger_ready && self.breaks.show_prompt() {
            self.notify(Notification::info(
                "建议休息",
                "检测到疲劳迹象，短暂休息有助于集中注意力",
            ));
        }
    }

    pub fn accept_break(&mut self) -> Result<(), SessionError> {
        if self.breaks.phase() != BreakPhase::PromptShown
            || self.session.state != SessionState::Active
        {
            return Err(self.invalid("break"));
        }
        self.ensure_ready("break")?;

        // 先停主倒计时，两个倒计时不同时运行
        self.clock.pause();
        self.sampler.disable();
        self.session.state = SessionState::Paused;
        self.breaks.accept();
        self.status = ON_BREAK.to_string();
        Ok(())
    }

    pub fn dismiss_break(&mut self) -> Result<(), SessionError> {
        if !self.breaks.dismiss() {
            return Err(self.invalid("dismiss"));
        }
        Ok(())
    }

    pub fn extend_break(&mut self) -> Result<(), SessionError> {
        match self.breaks.extend() {
            Some(_) => Ok(()),
            None => Err(self.invalid("extend")),
        }
    }

    pub fn end_break(&mut self) -> Result<(), SessionError> {
        if !self.on_break() {
            return Err(self.invalid("endbreak"));
        }
        self.finish_break();
        Ok(())
    }

    pub fn set_monitoring(&mut self, enabled: bool) {
        if self.monitoring == enabled {
            return;
        }
        self.monitoring = enabled;
        info!("📷 情绪监测: {}", if enabled { "开启" } else { "关闭" });
        self.sync_sampler();
        if !self.on_break() {
            self.status = self.idle_status();
        }
    }

    // ========== 事件处理 ==========

    fn on_command(&mut self, command: Command) -> Result<(), SessionError> {
        match command {
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::CompleteTopic { completed } => self.complete_topic(completed),
            Command::EndSession => self.end_session(),
            Command::AcceptBreak => self.accept_break(),
            Command::DismissBreak => self.dismiss_break(),
            Command::ExtendBreak => self.extend_break(),
            Command::EndBreak => self.end_break(),
            Command::SetMonitoring(enabled) => {
                self.set_monitoring(enabled);
                Ok(())
            }
            Command::Shutdown => {
                self.finish(SessionExit::Shutdown);
                Ok(())
            }
        }
    }

    fn on_pulse(&mut self, pulse: ClockPulse) {
        match pulse.kind {
            ClockKind::Main => match self.clock.on_pulse(pulse) {
                TickOutcome::Ticked(remaining) => self.session.remaining_seconds = remaining,
                TickOutcome::Expired => {
                    self.session.remaining_seconds = 0;
                    self.on_main_expired();
                }
                TickOutcome::Stale => {}
            },
            ClockKind::Break => {
                if self.breaks.on_pulse(pulse) == BreakTick::Expired {
                    self.finish_break();
                }
            }
        }
    }

    fn on_main_expired(&mut self) {
        info!("⏰ 主题时间到");
        if self.pending.is_some() {
            self.deferred = Some(Deferred::Complete);
        } else {
            self.start_completion(true);
        }
    }

    fn on_sample(&mut self, report: SampleReport) {
        if !self.sampler.accepts(&report) {
            debug!("丢弃过期的采样结果 (generation {})", report.generation);
            return;
        }
        match report.signal {
            SampleSignal::Detected(signal) => self.on_emotion_signal(signal),
            SampleSignal::Status(status) => {
                if self.session.state == SessionState::Active && !self.on_break() {
                    self.status = status.label().to_string();
                }
            }
        }
    }

    fn on_remote(&mut self, reply: RemoteReply) {
        if reply.epoch != self.epoch {
            debug!("忽略过期的远程返回 (epoch {})", reply.epoch);
            return;
        }
        self.pending = None;

        match reply.outcome {
            RemoteOutcome::Loaded(Ok(Some(current))) => self.apply_topic(current),
            RemoteOutcome::Loaded(Ok(None)) => {
                info!("没有进行中的会话");
                self.finish(SessionExit::Completed);
            }
            RemoteOutcome::Loaded(Err(e)) => {
                error!("❌ 加载会话失败: {}", e);
                self.notify(Notification::error("加载会话失败", e.to_string()));
                self.finish(SessionExit::LoadFailed);
            }

            RemoteOutcome::Paused(Ok(())) => {
                if self.session.state == SessionState::Active {
                    self.session.state = SessionState::Paused;
                    self.clock.pause();
                    self.sync_sampler();
                    info!("⏸️ 会话已暂停");
                }
            }
            RemoteOutcome::Paused(Err(e)) => self.report_failure("暂停失败", e),

            RemoteOutcome::Resumed(Ok(())) => {
                if self.session.state == SessionState::Paused {
                    self.session.state = SessionState::Active;
                    self.clock.resume();
                    self.sync_sampler();
                    self.status = self.idle_status();
                    info!("▶️ 会话已继续");
                }
            }
            RemoteOutcome::Resumed(Err(e)) => self.report_failure("继续失败", e),

            RemoteOutcome::TopicCompleted { completion, next } => match completion {
                Err(e) => self.report_failure("提交主题失败", e),
                Ok(done) if done.session_complete => {
                    info!("🎉 所有主题已完成");
                    self.notify(Notification::info(
                        "会话完成",
                        done.message.unwrap_or_else(|| "所有主题已完成".to_string()),
                    ));
                    self.finish(SessionExit::Completed);
                }
                Ok(done) => {
                    let message = done.message.unwrap_or_else(|| match done.next_topic {
                        Some(topic) => format!("下一个主题: {}", topic),
                        None => "进入下一个主题".to_string(),
                    });
                    self.notify(Notification::info("主题完成", message));
                    match next {
                        Some(Ok(Some(current))) => self.apply_topic(current),
                        Some(Ok(None)) | None => self.finish(SessionExit::Completed),
                        Some(Err(e)) => self.report_failure("获取下一个主题失败", e),
                    }
                }
            },

            RemoteOutcome::Deleted(Ok(())) => {
                info!("🛑 会话已结束");
                self.finish(SessionExit::Ended);
            }
            RemoteOutcome::Deleted(Err(e)) => self.report_failure("结束会话失败", e),

            RemoteOutcome::BreakSynced(sync) => {
                match sync.reschedule {
                    Ok(report) => {
                        let message = if report.message.is_empty() {
                            format!("{} 个主题受影响", report.topics_affected)
                        } else {
                            report.message
                        };
                        self.notify(Notification::info("已重新排期", message));
                    }
                    Err(e) => self.notify(Notification::error("重新排期失败", e.to_string())),
                }

                match sync.refresh {
                    Ok(Some(current)) => self.apply_topic(current),
                    Ok(None) => self.finish(SessionExit::Completed),
                    Err(e) => {
                        self.notify(Notification::error("刷新会话失败", e.to_string()));
                        self.session.state = SessionState::Active;
                        self.clock.resume();
                        self.sync_sampler();
                        self.status = self.idle_status();
                    }
                }
            }
        }

        self.run_deferred();
    }

    // ========== 内部辅助 ==========

    fn start_completion(&mut self, completed: bool) {
        info!(
            "📝 提交主题: {}",
            if completed { "完成" } else { "跳过" }
        );
        let api = self.api.clone();
        self.spawn_remote(RemoteOp::Complete, async move {
            let completion = api.complete_topic(completed).await;
            let next = match &completion {
                Ok(done) if !done.session_complete => Some(api.current_topic().await),
                _ => None,
            };
            RemoteOutcome::TopicCompleted { completion, next }
        });
    }

    /// 结束休息；只有第一次调用会触发同步
    fn finish_break(&mut self) {
        let Some(end) = self.breaks.end() else {
            return;
        };
        debug!("休息结束，剩余 {} 秒", end.seconds_left);
        if self.pending.is_some() {
            self.deferred = Some(Deferred::BreakSync);
        } else {
            self.start_break_sync();
        }
    }

    fn start_break_sync(&mut self) {
        let api = self.api.clone();
        self.spawn_remote(RemoteOp::BreakSync, async move {
            RemoteOutcome::BreakSynced(BreakController::<SessionEvent>::synchronize(api).await)
        });
    }

    fn run_deferred(&mut self) {
        if self.exit.is_some() || self.pending.is_some() {
            return;
        }
        match self.deferred.take() {
            Some(Deferred::Complete) => match self.session.state {
                SessionState::Active if self.clock.state() == ClockState::Expired => {
                    self.start_completion(true);
                }
                // 暂停中到期的主题等继续之后再提交
                SessionState::Paused if self.clock.state() == ClockState::Expired => {
                    self.deferred = Some(Deferred::Complete);
                }
                _ => {}
            },
            Some(Deferred::BreakSync) => self.start_break_sync(),
            None => {}
        }
    }

    /// 用服务端的当前主题重新设置会话，主倒计时从服务端剩余时间开始
    fn apply_topic(&mut self, current: CurrentTopic) {
        log_topic(&current);
        self.index = current.index;
        self.total_topics = current.total_topics;
        self.session.remaining_seconds = current.remaining_seconds();
        self.session.current_topic = Some(current.topic);
        self.session.state = SessionState::Active;
        self.clock.start(self.session.remaining_seconds);
        self.sync_sampler();
        self.status = self.idle_status();
    }

    /// 采样器只在 Active、未休息且开启监测时运行
    fn sync_sampler(&mut self) {
        let wanted = self.monitoring && self.session.is_active() && !self.on_break();
        if wanted && !self.sampler.is_enabled() {
            self.sampler.enable(self.sample_period);
        } else if !wanted {
            self.sampler.disable();
        }
    }

    fn spawn_remote<F>(&mut self, op: RemoteOp, call: F)
    where
        F: Future<Output = RemoteOutcome> + Send + 'static,
    {
        self.pending = Some(op);
        let epoch = self.epoch;
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = call.await;
            let _ = events.send(SessionEvent::Remote(RemoteReply { epoch, outcome }));
        });
    }

    fn finish(&mut self, exit: SessionExit) {
        self.teardown();
        if exit == SessionExit::Completed {
            self.session.state = SessionState::Completed;
            self.session.remaining_seconds = 0;
        }
        self.status = SamplerStatus::Off.label().to_string();
        self.exit = Some(exit);
    }

    /// 停止全部计时器和采样，之前发出的请求返回后会被忽略
    fn teardown(&mut self) {
        self.clock.cancel();
        self.sampler.disable();
        self.breaks.reset();
        self.epoch += 1;
        self.pending = None;
        self.deferred = None;
    }

    fn report_failure(&mut self, title: &str, e: ApiError) {
        warn!("❌ {}: {}", title, e);
        let message = e.detail().map(str::to_string).unwrap_or_else(|| e.to_string());
        self.notify(Notification::error(title, message));
    }

    fn ensure_ready(&self, operation: &'static str) -> Result<(), SessionError> {
        match self.pending {
            Some(pending) => Err(SessionError::Busy {
                operation,
                pending: pending.as_str(),
            }),
            None => Ok(()),
        }
    }

    fn invalid(&self, operation: &'static str) -> SessionError {
        let current = match self.breaks.phase() {
            BreakPhase::BreakActive => "break",
            _ => self.session.state.as_str(),
        };
        SessionError::InvalidState { operation, current }
    }

    fn on_break(&self) -> bool {
        self.breaks.phase() == BreakPhase::BreakActive
    }

    fn idle_status(&self) -> String {
        if self.monitoring {
            MONITORING.to_string()
        } else {
            SamplerStatus::Off.label().to_string()
        }
    }

    fn notify(&self, notification: Notification) {
        let _ = self.notify_tx.send(notification);
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}
