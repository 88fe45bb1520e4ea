//! 情绪采样器 - 业务能力层
//!
//! 按固定周期抓取一帧画面并提交检测，结果以 `SampleReport` 交回编排层。
//!
//! - 单飞：上一次检测未完成时直接跳过本次采样，不排队
//! - 停用后仍在进行的检测可以完成，但它的结果带着旧的 generation，会被丢弃
//! - 采集和网络失败只降级状态，不会向上抛错

use crate::clients::SchedulerApi;
use crate::infrastructure::{CaptureGuard, CaptureSource};
use crate::models::EmotionSignal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// 采样器可见状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerStatus {
    Off,
    CameraActive,
    Detecting,
    /// 没有设备或没有权限
    NoCamera,
    CaptureFailed,
    ApiIssue,
}

impl SamplerStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SamplerStatus::Off => "OFF",
            SamplerStatus::CameraActive => "Camera Active",
            SamplerStatus::Detecting => "Detecting...",
            SamplerStatus::NoCamera => "No Camera",
            SamplerStatus::CaptureFailed => "Capture Fail",
            SamplerStatus::ApiIssue => "API Issue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleSignal {
    Detected(EmotionSignal),
    Status(SamplerStatus),
}

/// 采样器上报给持有者的一条消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleReport {
    pub generation: u64,
    pub signal: SampleSignal,
}

/// 情绪采样器
pub struct Sampler<E> {
    capture: Arc<dyn CaptureSource>,
    api: Arc<dyn SchedulerApi>,
    events: UnboundedSender<E>,
    generation: u64,
    in_flight: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl<E> Sampler<E>
where
    E: From<SampleReport> + Send + 'static,
{
    pub fn new(
        capture: Arc<dyn CaptureSource>,
        api: Arc<dyn SchedulerApi>,
        events: UnboundedSender<E>,
    ) -> Self {
        Self {
            capture,
            api,
            events,
            generation: 0,
            in_flight: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// 开始周期采样；已在运行时先停止再重新开始
    pub fn enable(&mut self, period: Duration) {
        self.disable();
        self.generation += 1;

        let task = SamplerTask {
            generation: self.generation,
            period,
            capture: self.capture.clone(),
            api: self.api.clone(),
            events: self.events.clone(),
            in_flight: self.in_flight.clone(),
        };
        debug!("📷 采样器启用 (generation {})", self.generation);
        self.task = Some(tokio::spawn(task.run()));
    }

    /// 停止采样并释放采集设备；返回之前是否在运行
    pub fn disable(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                self.generation += 1;
                debug!("📷 采样器停用");
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.task.is_some()
    }

    /// 是否有检测请求正在进行
    pub fn is_detecting(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// 该上报是否来自当前这一轮采样
    pub fn accepts(&self, report: &SampleReport) -> bool {
        self.is_enabled() && report.generation == self.generation
    }
}

impl<E> Drop for Sampler<E> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// 单飞占位，drop 时释放
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn try_claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(flag.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct SamplerTask<E> {
    generation: u64,
    period: Duration,
    capture: Arc<dyn CaptureSource>,
    api: Arc<dyn SchedulerApi>,
    events: UnboundedSender<E>,
    in_flight: Arc<AtomicBool>,
}

impl<E> SamplerTask<E>
where
    E: From<SampleReport> + Send + 'static,
{
    fn report(&self, signal: SampleSignal) {
        let _ = self.events.send(E::from(SampleReport {
            generation: self.generation,
            signal,
        }));
    }

    async fn run(self) {
        // 设备守卫只活在本任务里，任务被 abort 时随之释放
        let mut guard: Option<CaptureGuard> = None;
        let mut unavailable = false;
        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if guard.is_none() {
                match CaptureGuard::acquire(self.capture.as_ref()).await {
                    Ok(acquired) => {
                        guard = Some(acquired);
                        unavailable = false;
                        self.report(SampleSignal::Status(SamplerStatus::CameraActive));
                    }
                    Err(e) => {
                        if !unavailable {
                            warn!("❌ 采集设备不可用: {}", e);
                            unavailable = true;
                        }
                        let status = if e.is_acquisition() {
                            SamplerStatus::NoCamera
                        } else {
                            SamplerStatus::CaptureFailed
                        };
                        self.report(SampleSignal::Status(status));
                    }
                }
            }

            interval.tick().await;

            let Some(stream) = guard.as_mut() else {
                continue;
            };

            let Some(claim) = InFlight::try_claim(&self.in_flight) else {
                debug!("上一次检测尚未完成，跳过本次采样");
                continue;
            };

            match stream.grab_frame().await {
                Ok(frame) => {
                    self.report(SampleSignal::Status(SamplerStatus::Detecting));
                    tokio::spawn(detect(
                        self.api.clone(),
                        frame,
                        claim,
                        self.events.clone(),
                        self.generation,
                    ));
                }
                Err(e) => {
                    drop(claim);
                    warn!("抓取画面失败: {}", e);
                    self.report(SampleSignal::Status(SamplerStatus::CaptureFailed));
                }
            }
        }
    }
}

/// 一次检测：上传画面，再查询汇总状态
async fn detect<E>(
    api: Arc<dyn SchedulerApi>,
    frame: Vec<u8>,
    claim: InFlight,
    events: UnboundedSender<E>,
    generation: u64,
) where
    E: From<SampleReport> + Send + 'static,
{
    let signal = match api.detect_emotion(frame).await {
        Ok(detection) => match api.emotion_status().await {
            Ok(status) => SampleSignal::Detected(EmotionSignal {
                label: detection.emotion.unwrap_or_else(|| "unknown".to_string()),
                trigger_ready: status.trigger_ready,
            }),
            Err(e) => {
                warn!("情绪状态查询失败: {}", e);
                SampleSignal::Status(SamplerStatus::ApiIssue)
            }
        },
        Err(e) => {
            warn!("情绪检测失败: {}", e);
            SampleSignal::Status(SamplerStatus::ApiIssue)
        }
    };

    drop(claim);
    let _ = events.send(E::from(SampleReport { generation, signal }));
}
