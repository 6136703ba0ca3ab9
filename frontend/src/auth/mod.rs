//! 认证模块
//!
//! - `provider`: 身份提供方抽象
//! - `firebase`: Firebase REST 实现
//! - `session`: 会话状态与登录/注册/登出
//! - `guard`: 路由守卫决策
//! - `context`: 注入 Leptos 组件树的认证上下文

pub mod context;
pub mod firebase;
pub mod guard;
pub mod provider;
pub mod session;

pub use context::{AuthContext, use_auth};
pub use session::{AuthSession, AuthState, RegisterProfile};
