pub mod image;
pub mod metrics;
pub mod providers;

pub use self::metrics::{get_metrics, init_metrics, record_generation};
pub use providers::{
    GenerationOutput, GenerationParams, MockVisionModel, OpenAiCompatibleConfig,
    OpenAiCompatibleModel, ProviderError, VisionLanguageModel,
};
