//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责学习会话的状态流转和事件调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `session_orchestrator` - 会话编排器
//! - 持有主倒计时、采样器、休息控制器
//! - 单一事件循环处理所有输入
//! - 唯一调用调度服务、唯一修改会话状态的模块
//! - 输出快照和提示
//!
//! ### `events` - 事件与输出类型
//! - `SessionEvent`：事件循环的唯一输入
//! - `Command`：操作命令
//! - `SessionSnapshot` / `Notification` / `SessionExit`：对前端的输出
//!
//! ## 层次关系
//!
//! ```text
//! session_orchestrator (Session: Idle → Active ⇄ Paused → Completed)
//!     ↓
//! workflow::BreakController (Dormant → PromptShown → BreakActive)
//!     ↓
//! services::Sampler (周期采样 + 单飞检测)
//!     ↓
//! infrastructure (Clock / CaptureSource)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一写者**：会话状态只在事件循环里修改
//! 2. **结果校验**：所有异步结果先核对 epoch / generation 再生效
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **计时器按需启停**：只在需要的状态转换上启动或停止

pub mod events;
pub mod session_orchestrator;

// 重新导出主要类型
pub use events::{
    Command, Notification, NotificationLevel, RemoteOp, RemoteOutcome, RemoteReply,
    SessionEvent, SessionExit, SessionSnapshot,
};
pub use session_orchestrator::{SessionHandle, SessionOrchestrator};
