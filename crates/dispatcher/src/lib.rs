//! # Dispatcher
//!
//! 请求分发模块。
//!
//! 负责：
//! - 将一个逻辑请求 fan-out 到多个上游 endpoint，每个 endpoint 一个任务
//! - 在同一 deadline 下汇总结果：首个成功、全部结果、最快成功、批量请求、单 endpoint 顺序重试
//! - 取消落后的尝试，并为每个失败标注 endpoint

mod collector;
pub mod dispatcher;
pub mod error;
pub mod metrics;

pub use contracts::{
    CallContext, CallError, CallReply, CallResult, CancellationToken, EndpointCall,
    FnRemoteCall, MethodCall, RemoteCall,
};
pub use dispatcher::{DispatchScope, Dispatcher, DispatcherConfig};
pub use error::{DispatchError, EndpointFailure};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
