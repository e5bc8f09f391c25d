pub mod anthropic;
pub mod openai_compatible;
