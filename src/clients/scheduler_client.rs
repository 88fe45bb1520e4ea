/// 调度服务 HTTP 客户端
///
/// 封装所有与调度服务相关的 HTTP/JSON 调用
use crate::clients::scheduler_api::SchedulerApi;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::models::api::ErrorBody;
use crate::models::{
    CurrentTopic, EmotionDetection, EmotionStatus, RescheduleReport, SessionCreated, SessionPlan,
    SessionSummary, TopicCompletion,
};
use async_trait::async_trait;
use reqwest::{multipart, RequestBuilder, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{json, Value};
use tracing::debug;

const CREATE: &str = "/api/sessions/create";
const CURRENT: &str = "/api/sessions/current";
const PAUSE: &str = "/api/sessions/pause";
const RESUME: &str = "/api/sessions/resume";
const COMPLETE: &str = "/api/sessions/topic/complete";
const DELETE: &str = "/api/sessions/delete";
const SUMMARY: &str = "/api/sessions/summary";
const DETECT: &str = "/api/emotions/detect";
const EMOTION_STATUS: &str = "/api/emotions/status";
const RESCHEDULE: &str = "/api/reschedule/trigger";

/// 调度服务客户端
pub struct SchedulerClient {
    http: reqwest::Client,
    base_url: String,
}

impl SchedulerClient {
    /// 创建新的调度服务客户端
    pub fn new(config: &Config) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|source| ApiError::Request {
                endpoint: config.api_base_url.clone(),
                source,
            })?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// 发送请求并按状态码归类错误
    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> ApiResult<T> {
        debug!("请求调度服务: {}", endpoint);

        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Request {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ApiError::Request {
                endpoint: endpoint.to_string(),
                source,
            })?;

        if !status.is_success() {
            let detail = error_detail(&body);
            debug!("调度服务返回错误 {} ({}): {:?}", status, endpoint, detail);
            return Err(classify_status(endpoint, status, detail));
        }

        serde_json::from_slice(&body).map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

/// 从错误响应体中取出服务端给出的说明
fn error_detail(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::message)
}

/// 把非 2xx 状态码映射为错误分类
fn classify_status(endpoint: &str, status: StatusCode, detail: Option<String>) -> ApiError {
    let endpoint = endpoint.to_string();
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound { endpoint, detail },
        StatusCode::BAD_REQUEST => ApiError::Rejected { endpoint, detail },
        other => ApiError::Status {
            endpoint,
            status: other.as_u16(),
            detail,
        },
    }
}

/// 解析当前主题响应
///
/// 服务端在没有会话时可能返回 200 + `{"detail": ...}`，同样视为"没有会话"。
fn parse_current(value: Value) -> ApiResult<Option<CurrentTopic>> {
    let has_topic = value.get("topic").map(|t| !t.is_null()).unwrap_or(false);
    if !has_topic {
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| ApiError::Decode {
            endpoint: CURRENT.to_string(),
            message: e.to_string(),
        })
}

#[async_trait]
impl SchedulerApi for SchedulerClient {
    async fn create_session(&self, plan: &SessionPlan) -> ApiResult<SessionCreated> {
        self.send(CREATE, self.http.post(self.url(CREATE)).json(plan))
            .await
    }

    async fn current_topic(&self) -> ApiResult<Option<CurrentTopic>> {
        match self
            .send::<Value>(CURRENT, self.http.get(self.url(CURRENT)))
            .await
        {
            Ok(value) => parse_current(value),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn pause(&self) -> ApiResult<()> {
        self.send::<IgnoredAny>(PAUSE, self.http.post(self.url(PAUSE)))
            .await?;
        Ok(())
    }

    async fn resume(&self) -> ApiResult<()> {
        self.send::<IgnoredAny>(RESUME, self.http.post(self.url(RESUME)))
            .await?;
        Ok(())
    }

    async fn complete_topic(&self, completed: bool) -> ApiResult<TopicCompletion> {
        let body = json!({ "completed": completed });
        self.send(COMPLETE, self.http.post(self.url(COMPLETE)).json(&body))
            .await
    }

    async fn delete_session(&self) -> ApiResult<()> {
        self.send::<IgnoredAny>(DELETE, self.http.delete(self.url(DELETE)))
            .await?;
        Ok(())
    }

    async fn summary(&self) -> ApiResult<SessionSummary> {
        self.send(SUMMARY, self.http.get(self.url(SUMMARY))).await
    }

    async fn detect_emotion(&self, frame: Vec<u8>) -> ApiResult<EmotionDetection> {
        let part = multipart::Part::bytes(frame)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")
            .map_err(|source| ApiError::Request {
                endpoint: DETECT.to_string(),
                source,
            })?;
        let form = multipart::Form::new().part("file", part);

        self.send(DETECT, self.http.post(self.url(DETECT)).multipart(form))
            .await
    }

    async fn emotion_status(&self) -> ApiResult<EmotionStatus> {
        self.send(EMOTION_STATUS, self.http.get(self.url(EMOTION_STATUS)))
            .await
    }

    async fn trigger_reschedule(&self) -> ApiResult<RescheduleReport> {
        self.send(RESCHEDULE, self.http.post(self.url(RESCHEDULE)))
            .await
    }
}
