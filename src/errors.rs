//! 错误分类。
//!
//! 各叶子组件返回带类型的 `SiteError`，编排层逐集捕获并折叠成下载结果，
//! 只有致命输入错误会中止整个批次。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SiteError {
    /// 传输层失败（连接、超时、下载流中断）。可由调用方决定是否重试，本层不重试。
    #[error("网络请求失败: {0}")]
    Network(String),

    /// 响应拿到了但结构与预期不符。
    #[error("响应格式异常: {0}")]
    Protocol(String),

    /// 混淆方案元素缺失或无法解析（站点可能已改版）。
    #[error("直链解析失败: {0}")]
    Resolution(String),

    /// 本地目录/文件操作失败。
    #[error("存储操作失败: {0}")]
    Storage(#[from] std::io::Error),

    /// 协作式取消，由进行中的任务在检查点上抛出。
    #[error("操作已取消")]
    Canceled,
}

impl SiteError {
    /// 结果汇报中使用的错误类别标签。
    pub fn kind(&self) -> &'static str {
        match self {
            SiteError::Network(_) => "network",
            SiteError::Protocol(_) => "protocol",
            SiteError::Resolution(_) => "resolution",
            SiteError::Storage(_) => "storage",
            SiteError::Canceled => "canceled",
        }
    }
}

impl From<reqwest::Error> for SiteError {
    fn from(err: reqwest::Error) -> Self {
        SiteError::Network(err.to_string())
    }
}
