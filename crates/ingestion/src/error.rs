//! Ingestion 错误类型

use thiserror::Error;

/// HTTP 服务错误
#[derive(Debug, Error)]
pub enum IngestError {
    /// 监听地址绑定失败
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// 监听地址
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// 服务运行失败
    #[error("http server error: {0}")]
    Serve(String),
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestError>;
