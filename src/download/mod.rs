//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`       — 批次请求 / 任务状态机 / 进度事件 / 终态结果
//! - `progress`     — 批次进度汇总与 CLI 进度条
//! - `stream`       — 单集流式落盘（临时文件 + 原子改名）
//! - `pool`         — 固定大小工作线程池
//! - `orchestrator` — 批次编排

pub mod models;
pub mod orchestrator;
pub(crate) mod pool;
pub mod progress;
pub mod stream;
