//! Weixin API - 公众号远程接口客户端
//!
//! 包含接口传输层、access_token 管理、自定义菜单和各业务接口。

pub mod client;
pub mod menu;
pub mod models;
pub mod token;
pub mod transport;

pub use client::ApiClient;
pub use menu::{LeafButton, Menu, MenuAction, MenuButton};
pub use models::*;
pub use token::{AccessToken, AccessTokenManager};
pub use transport::{
    ApiRequest, ApiResponse, ApiTransport, HttpMethod, RequestBody, ReqwestTransport,
    check_api_error,
};
