use thiserror::Error;

/// 题库与选择状态相关的错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// 只读题库上尝试了写操作
    #[error("{0} is not supported: questions are read-only")]
    NotSupported(&'static str),
    /// 更新或删除的目标题目不存在
    #[error("question not found: {0}")]
    NotFound(String),
    /// URL 中的题目 id 无法解析，只记录日志，不向用户展示
    #[error("selection does not resolve to a question: {0}")]
    MalformedSelection(String),
    /// 本地存储读写失败
    #[error("storage error: {0}")]
    Storage(String),
    /// 数据文档或快照解析失败
    #[error("parse error: {0}")]
    Parse(String),
    /// 浏览器接口不可用或调用失败
    #[error("browser error: {0}")]
    Browser(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
