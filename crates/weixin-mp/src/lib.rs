//! Weixin MP - 公众号消息接入
//!
//! 服务器验证、消息分发、处理器链以及多公众号管理。

pub mod account;
pub mod factory;
pub mod handler;
pub mod manager;
pub mod registry;

pub use account::*;
pub use factory::*;
pub use handler::*;
pub use manager::*;
pub use registry::*;
