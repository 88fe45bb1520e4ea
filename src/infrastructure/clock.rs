//! 倒计时 - 基础设施层
//!
//! 单个倒计时原语。计数只在事件循环里修改：后台 ticker 只负责按周期
//! 发出 `ClockPulse`，由持有者交回 `Clock::on_pulse` 处理。每次启动、
//! 暂停、取消都会推进 epoch，已经排队的旧脉冲因此失效，不会重复计数。

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// 倒计时用途
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockKind {
    /// 主题学习倒计时
    Main,
    /// 休息倒计时
    Break,
}

/// ticker 发出的一次脉冲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockPulse {
    pub kind: ClockKind,
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Idle,
    Running,
    Paused,
    Expired,
}

/// 处理一次脉冲的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 过期或不属于本倒计时的脉冲，已忽略
    Stale,
    /// 正常步进，附带剩余秒数
    Ticked(u64),
    /// 计数归零，只会出现一次
    Expired,
}

/// 倒计时
///
/// 职责：
/// - 每个周期减 1，归零时报告一次过期后自动停止
/// - 同一实例最多只有一个 ticker
/// - drop 时停止 ticker
pub struct Clock<E> {
    kind: ClockKind,
    period: Duration,
    remaining: u64,
    state: ClockState,
    epoch: u64,
    ticker: Option<JoinHandle<()>>,
    events: UnboundedSender<E>,
}

impl<E> Clock<E>
where
    E: From<ClockPulse> + Send + 'static,
{
    /// 创建新的倒计时（未启动）
    pub fn new(kind: ClockKind, period: Duration, events: UnboundedSender<E>) -> Self {
        Self {
            kind,
            period,
            remaining: 0,
            state: ClockState::Idle,
            epoch: 0,
            ticker: None,
            events,
        }
    }

    /// 开始倒计时；正在运行的倒计时会先被取消
    ///
    /// `seconds` 为 0 时在下一个脉冲过期。
    pub fn start(&mut self, seconds: u64) {
        self.halt();
        self.remaining = seconds;
        self.state = ClockState::Running;
        self.spawn_ticker();
    }

    /// 暂停，保留剩余时间
    pub fn pause(&mut self) -> bool {
        if self.state != ClockState::Running {
            return false;
        }
        self.halt();
        self.state = ClockState::Paused;
        true
    }

    /// 从暂停处继续
    pub fn resume(&mut self) -> bool {
        if self.state != ClockState::Paused {
            return false;
        }
        self.state = ClockState::Running;
        self.spawn_ticker();
        true
    }

    /// 停止并丢弃状态，不报告过期
    pub fn cancel(&mut self) {
        self.halt();
        self.remaining = 0;
        self.state = ClockState::Idle;
    }

    /// 运行中追加时间，不影响已走过的进度
    pub fn extend(&mut self, delta_seconds: u64) -> bool {
        if self.state != ClockState::Running {
            return false;
        }
        self.remaining = self.remaining.saturating_add(delta_seconds);
        true
    }

    /// 处理一次脉冲
    pub fn on_pulse(&mut self, pulse: ClockPulse) -> TickOutcome {
        if pulse.kind != self.kind
            || pulse.epoch != self.epoch
            || self.state != ClockState::Running
        {
            return TickOutcome::Stale;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return TickOutcome::Ticked(self.remaining);
        }

        self.halt();
        self.state = ClockState::Expired;
        TickOutcome::Expired
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    /// 停止 ticker 并让已发出的脉冲失效
    fn halt(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.epoch += 1;
    }

    fn spawn_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }

        let pulse = ClockPulse {
            kind: self.kind,
            epoch: self.epoch,
        };
        let events = self.events.clone();
        let period = self.period;

        self.ticker = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if events.send(E::from(pulse)).is_err() {
                    break;
                }
            }
        }));
    }
}

impl<E> Drop for Clock<E> {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    const PERIOD: Duration = Duration::from_secs(1);

    fn clock(kind: ClockKind) -> (Clock<ClockPulse>, UnboundedReceiver<ClockPulse>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Clock::new(kind, PERIOD, tx), rx)
    }

    /// 把脉冲交回倒计时，直到出现非 Stale 的结果
    async fn next_outcome(
        clock: &mut Clock<ClockPulse>,
        rx: &mut UnboundedReceiver<ClockPulse>,
    ) -> TickOutcome {
        loop {
            let pulse = rx.recv().await.expect("ticker 应该持续发出脉冲");
            match clock.on_pulse(pulse) {
                TickOutcome::Stale => continue,
                outcome => return outcome,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_once_after_exact_ticks() {
        for duration in [1u64, 2, 5, 17] {
            let (mut clock, mut rx) = clock(ClockKind::Main);
            clock.start(duration);

            let mut expected = duration;
            loop {
                match next_outcome(&mut clock, &mut rx).await {
                    TickOutcome::Ticked(remaining) => {
                        expected -= 1;
                        assert_eq!(remaining, expected);
                    }
                    TickOutcome::Expired => {
                        assert_eq!(expected, 1);
                        break;
                    }
                    TickOutcome::Stale => unreachable!(),
                }
            }

            assert_eq!(clock.state(), ClockState::Expired);
            assert_eq!(clock.remaining(), 0);

            // 过期后不会再次过期
            time::sleep(PERIOD * 3).await;
            while let Ok(pulse) = rx.try_recv() {
                assert_eq!(clock.on_pulse(pulse), TickOutcome::Stale);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_keeps_remaining() {
        let (mut clock, mut rx) = clock(ClockKind::Main);
        clock.start(10);
        assert_eq!(next_outcome(&mut clock, &mut rx).await, TickOutcome::Ticked(9));

        assert!(clock.pause());
        assert!(!clock.pause());
        time::sleep(PERIOD * 30).await;
        while let Ok(pulse) = rx.try_recv() {
            assert_eq!(clock.on_pulse(pulse), TickOutcome::Stale);
        }
        assert_eq!(clock.remaining(), 9);

        assert!(clock.resume());
        assert_eq!(clock.remaining(), 9);
        assert_eq!(next_outcome(&mut clock, &mut rx).await, TickOutcome::Ticked(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_pulse_discarded_after_pause() {
        let (mut clock, mut rx) = clock(ClockKind::Main);
        clock.start(5);

        // 脉冲已经发出但还没处理时暂停
        let pulse = rx.recv().await.unwrap();
        clock.pause();
        assert_eq!(clock.on_pulse(pulse), TickOutcome::Stale);
        clock.resume();
        assert_eq!(clock.remaining(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_adds_exactly() {
        let (mut clock, mut rx) = clock(ClockKind::Break);
        clock.start(300);
        assert_eq!(next_outcome(&mut clock, &mut rx).await, TickOutcome::Ticked(299));
        assert_eq!(next_outcome(&mut clock, &mut rx).await, TickOutcome::Ticked(298));

        assert!(clock.extend(60));
        assert_eq!(clock.remaining(), 358);
        assert_eq!(next_outcome(&mut clock, &mut rx).await, TickOutcome::Ticked(357));
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_requires_running() {
        let (mut clock, _rx) = clock(ClockKind::Break);
        assert!(!clock.extend(60));
        clock.start(10);
        clock.pause();
        assert!(!clock.extend(60));
        assert_eq!(clock.remaining(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_never_expires() {
        let (mut clock, mut rx) = clock(ClockKind::Break);
        clock.start(1);
        clock.cancel();
        assert_eq!(clock.state(), ClockState::Idle);

        time::sleep(PERIOD * 5).await;
        while let Ok(pulse) = rx.try_recv() {
            assert_eq!(clock.on_pulse(pulse), TickOutcome::Stale);
        }
        assert_eq!(clock.state(), ClockState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_previous_countdown() {
        let (mut clock, mut rx) = clock(ClockKind::Main);
        clock.start(100);
        clock.start(3);

        assert_eq!(next_outcome(&mut clock, &mut rx).await, TickOutcome::Ticked(2));
        assert_eq!(next_outcome(&mut clock, &mut rx).await, TickOutcome::Ticked(1));
        assert_eq!(next_outcome(&mut clock, &mut rx).await, TickOutcome::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_kind_is_stale() {
        let (mut clock, _rx) = clock(ClockKind::Main);
        clock.start(5);
        let pulse = ClockPulse {
            kind: ClockKind::Break,
            epoch: 1,
        };
        assert_eq!(clock.on_pulse(pulse), TickOutcome::Stale);
        assert_eq!(clock.remaining(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_ticker() {
        let (mut clock, mut rx) = clock(ClockKind::Main);
        clock.start(10);
        drop(clock);
        // 发送端随 ticker 一起释放，通道最终关闭
        let drained = time::timeout(PERIOD * 5, async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok(), "drop 之后 ticker 不应继续运行");
    }
}
