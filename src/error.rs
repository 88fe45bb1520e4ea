use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 调度服务 API 错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 采集设备错误
    #[error("采集错误: {0}")]
    Capture(#[from] CaptureError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 学习计划错误
    #[error("计划错误: {0}")]
    Plan(#[from] PlanError),
    /// 会话状态错误
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),
}

/// 调度服务 API 错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败（连接、超时等）
    #[error("API请求失败 ({endpoint}): {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 资源不存在（404）
    #[error("资源不存在 ({endpoint}): {detail:?}")]
    NotFound {
        endpoint: String,
        detail: Option<String>,
    },
    /// 服务端因会话状态拒绝请求（400）
    #[error("请求被拒绝 ({endpoint}): {detail:?}")]
    Rejected {
        endpoint: String,
        detail: Option<String>,
    },
    /// 其他非 2xx 响应
    #[error("API返回错误响应 ({endpoint}): status={status}, detail={detail:?}")]
    Status {
        endpoint: String,
        status: u16,
        detail: Option<String>,
    },
    /// 响应体解析失败
    #[error("JSON解析失败 ({endpoint}): {message}")]
    Decode { endpoint: String, message: String },
}

impl ApiError {
    /// 是否为 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// 服务端返回的 detail 文本（如果有）
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::NotFound { detail, .. }
            | ApiError::Rejected { detail, .. }
            | ApiError::Status { detail, .. } => detail.as_deref(),
            ApiError::Request { .. } | ApiError::Decode { .. } => None,
        }
    }
}

/// 采集设备错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// 设备不存在
    #[error("采集设备不可用: {reason}")]
    DeviceUnavailable { reason: String },
    /// 权限被拒绝
    #[error("采集设备权限被拒绝")]
    PermissionDenied,
    /// 抓取画面失败
    #[error("抓取画面失败: {reason}")]
    FrameFailed { reason: String },
}

impl CaptureError {
    /// 是否为设备获取阶段的错误（设备不存在或无权限）
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            CaptureError::DeviceUnavailable { .. } | CaptureError::PermissionDenied
        )
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 数值必须大于 0
    #[error("配置项 {name} 必须大于 0")]
    MustBePositive { name: String },
    /// 地址无效
    #[error("配置项 {name} 无效: {value}")]
    InvalidValue { name: String, value: String },
}

/// 学习计划错误
#[derive(Debug, Error)]
pub enum PlanError {
    /// 总时长超出范围
    #[error("总时长 {minutes} 分钟超出范围 [1, 600]")]
    TotalTimeOutOfRange { minutes: u32 },
    /// 科目名为空
    #[error("科目名不能为空")]
    EmptySubjectName,
    /// 主题名为空
    #[error("科目 {subject} 中存在空的主题名")]
    EmptyTopicName { subject: String },
    /// 没有任何主题
    #[error("至少需要一个主题")]
    NoTopics,
}

/// 会话状态错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// 当前状态不允许该操作
    #[error("当前状态 {current} 不允许执行 {operation}")]
    InvalidState {
        operation: &'static str,
        current: &'static str,
    },
    /// 已有远程请求在进行中
    #[error("{pending} 请求进行中，暂不能执行 {operation}")]
    Busy {
        operation: &'static str,
        pending: &'static str,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建配置项必须为正数的错误
    pub fn must_be_positive(name: impl Into<String>) -> Self {
        AppError::Config(ConfigError::MustBePositive { name: name.into() })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// API 调用结果类型
pub type ApiResult<T> = Result<T, ApiError>;
