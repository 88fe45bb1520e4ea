pub mod scheduler_api;
pub mod scheduler_client;

pub use scheduler_api::SchedulerApi;
pub use scheduler_client::SchedulerClient;
