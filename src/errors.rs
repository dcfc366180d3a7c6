use thiserror::Error;

use crate::llm::gateway::GenerationError;

/// Failures scoped to a single profile, preview or submit operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoetryError {
    #[error("图片无效：{0}")]
    InvalidImage(String),
    #[error("无效的格式选择：{0}")]
    InvalidFormat(String),
    #[error("无效的风格选择：{0}")]
    InvalidStyle(String),
    #[error("请先上传图片，再开始创作对话。")]
    MissingImage,
    #[error("正在创作中，请等待当前结果返回。")]
    SessionBusy,
    #[error("会话已清除，结果已丢弃。")]
    Discarded,
    #[error("{0}")]
    Generation(String),
}

impl From<GenerationError> for PoetryError {
    fn from(err: GenerationError) -> Self {
        PoetryError::Generation(err.0)
    }
}
