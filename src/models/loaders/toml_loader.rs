use crate::error::PlanError;
use crate::models::api::SessionPlan;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载学习计划，并做基本校验
///
/// 文件格式：
///
/// ```toml
/// total_time_minutes = 90
///
/// [[subjects]]
/// name = "Math"
/// topics = [{ name = "Limits", level = "unknown" }, { name = "Sets" }]
/// ```
pub async fn load_session_plan(toml_file_path: &Path) -> Result<SessionPlan> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let plan: SessionPlan = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    let plan = normalize_plan(plan)
        .with_context(|| format!("学习计划无效: {}", toml_file_path.display()))?;

    tracing::info!(
        "成功加载学习计划: {} 个科目, {} 个主题, {} 分钟",
        plan.subjects.len(),
        plan.subjects.iter().map(|s| s.topics.len()).sum::<usize>(),
        plan.total_time_minutes
    );

    Ok(plan)
}

/// 去掉名称两端空白并校验计划
///
/// 规则与调度服务一致：总时长 1..=600 分钟，名称非空，至少一个主题。
pub fn normalize_plan(mut plan: SessionPlan) -> Result<SessionPlan, PlanError> {
    if plan.total_time_minutes == 0 || plan.total_time_minutes > 600 {
        return Err(PlanError::TotalTimeOutOfRange {
            minutes: plan.total_time_minutes,
        });
    }

    for subject in &mut plan.subjects {
        subject.name = subject.name.trim().to_string();
        if subject.name.is_empty() {
            return Err(PlanError::EmptySubjectName);
        }
        for topic in &mut subject.topics {
            topic.name = topic.name.trim().to_string();
            if topic.name.is_empty() {
                return Err(PlanError::EmptyTopicName {
                    subject: subject.name.clone(),
                });
            }
        }
    }

    if plan.subjects.iter().all(|s| s.topics.is_empty()) {
        return Err(PlanError::NoTopics);
    }

    Ok(plan)
}
