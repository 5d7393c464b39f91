//! Weixin Server - 公众号消息接入 HTTP 服务

pub mod api;
pub mod gateway;

pub use api::*;
pub use gateway::*;
