//! # MindTrack
//!
//! 一个带疲劳检测和休息调度的学习会话运行时
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有计时器和采集设备，只暴露能力
//! - `Clock` - 单个倒计时，脉冲交回持有者处理
//! - `CaptureSource` / `CaptureGuard` - 采集设备及其作用域释放
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `Sampler` - 周期采样，单飞情绪检测
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义一次休息的完整流程
//! - `BreakController` - 提示 → 休息 → 重新排期 → 刷新
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session_orchestrator` - 会话状态机，唯一的事件循环
//!
//! 调度服务的 HTTP 客户端位于 `clients/`，数据结构位于 `models/`。
//!
//! ## 模块结构

pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use clients::{SchedulerApi, SchedulerClient};
pub use config::Config;
pub use error::{ApiError, AppError, AppResult};
pub use infrastructure::{CaptureSource, Clock, DirectoryCapture, NoCamera};
pub use models::{Session, SessionState};
pub use orchestrator::{Command, SessionExit, SessionHandle, SessionOrchestrator};
pub use services::Sampler;
pub use workflow::BreakController;
