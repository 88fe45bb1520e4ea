pub mod api;
pub mod loaders;
pub mod session;

pub use api::{
    BacklogTopic, CurrentTopic, EmotionDetection, EmotionStatus, RescheduleReport,
    SessionCreated, SessionPlan, SessionSummary, SubjectPlan, TopicCompletion, TopicPlan,
};
pub use loaders::load_session_plan;
pub use session::{
    BreakSession, EmotionSignal, Familiarity, Session, SessionState, Topic, TopicStatus,
};
