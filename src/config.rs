use crate::error::{AppError, AppResult, ConfigError};
use std::time::Duration;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 调度服务地址
    pub api_base_url: String,
    /// 单个请求超时（秒）
    pub request_timeout_secs: u64,
    /// 倒计时步进间隔（毫秒）
    pub tick_interval_ms: u64,
    /// 情绪采样间隔（毫秒）
    pub sample_interval_ms: u64,
    /// 默认休息时长（秒）
    pub break_duration_secs: u64,
    /// 每次延长休息的时长（秒）
    pub break_extend_secs: u64,
    /// 是否开启情绪监测
    pub emotion_monitoring: bool,
    /// 画面目录（代替摄像头），为空表示没有摄像头
    pub capture_dir: Option<String>,
    /// 学习计划 TOML 文件
    pub plan_file: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 15,
            tick_interval_ms: 1000,
            sample_interval_ms: 3000,
            break_duration_secs: 300,
            break_extend_secs: 60,
            emotion_monitoring: true,
            capture_dir: None,
            plan_file: None,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            api_base_url: std::env::var("MINDTRACK_API_BASE_URL").unwrap_or(default.api_base_url),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            tick_interval_ms: std::env::var("TICK_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.tick_interval_ms),
            sample_interval_ms: std::env::var("SAMPLE_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.sample_interval_ms),
            break_duration_secs: std::env::var("BREAK_DURATION_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.break_duration_secs),
            break_extend_secs: std::env::var("BREAK_EXTEND_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.break_extend_secs),
            emotion_monitoring: std::env::var("EMOTION_MONITORING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.emotion_monitoring),
            capture_dir: std::env::var("CAPTURE_DIR").ok().filter(|v| !v.trim().is_empty()).or(default.capture_dir),
            plan_file: std::env::var("SESSION_PLAN_FILE").ok().filter(|v| !v.trim().is_empty()).or(default.plan_file),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> AppResult<()> {
        let positives = [
            ("request_timeout_secs", self.request_timeout_secs),
            ("tick_interval_ms", self.tick_interval_ms),
            ("sample_interval_ms", self.sample_interval_ms),
            ("break_duration_secs", self.break_duration_secs),
            ("break_extend_secs", self.break_extend_secs),
        ];
        for (name, value) in positives {
            if value == 0 {
                return Err(AppError::must_be_positive(name));
            }
        }

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                name: "api_base_url".to_string(),
                value: self.api_base_url.clone(),
            }
            .into());
        }

        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_default_matches_dashboard_constants() {
        let config = Config::default();
        assert_eq!(config.break_duration_secs, 300);
        assert_eq!(config.break_extend_secs, 60);
        assert_eq!(config.sample_interval(), Duration::from_millis(3000));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_ok!(config.validate());
    }

    #[test]
    fn test_validate_rejects_zero_period() {
        let config = Config {
            tick_interval_ms: 0,
            ..Config::default()
        };
        let err = assert_err!(config.validate());
        assert!(err.to_string().contains("tick_interval_ms"));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = Config {
            api_base_url: "localhost:8000".to_string(),
            ..Config::default()
        };
        assert_err!(config.validate());
    }
}
