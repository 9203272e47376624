pub mod generation;

pub use generation::{
    GenerateRequest, GenerateResponse, VqaResponse, DEFAULT_GENERATE_MAX_NEW_TOKENS,
    DEFAULT_GENERATE_TEMPERATURE, DEFAULT_VQA_MAX_NEW_TOKENS,
};
