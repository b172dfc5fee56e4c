pub mod error;
pub mod kv;
pub mod openai;
pub mod redis;
