pub mod sampler;

pub use sampler::{SampleReport, SampleSignal, Sampler, SamplerStatus};
