//! 浏览器 API 封装
//!
//! - `http`: 基于 gloo-net 的请求传输，可注入
//! - `storage`: 基于 gloo-storage 的本地存储，可注入
//! - `route` / `router`: 路由定义与路由服务

pub mod http;
pub mod route;
pub mod router;
pub mod storage;
