//! 路由定义模块 - 领域模型
//!
//! 这是纯粹的业务逻辑层，不依赖于 DOM 或 web_sys。
//! 定义了应用的所有路由及其属性。

use std::fmt::Display;

/// 登录页记录来源路径的查询参数
pub const RETURN_PARAM: &str = "from";

/// 应用路由枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppRoute {
    /// 首页
    #[default]
    Home,
    About,
    Login,
    Register,
    /// 提交分析（需要认证）
    Input,
    /// 分析结果（需要认证）
    Result,
    /// 控制面板（需要认证）
    Dashboard,
    /// 页面未找到
    NotFound,
}

impl AppRoute {
    /// 将 URL path 解析为路由枚举（忽略查询串和结尾的 `/`）
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        match path {
            "/" => Self::Home,
            "/about" => Self::About,
            "/login" => Self::Login,
            "/register" => Self::Register,
            "/input" => Self::Input,
            "/result" => Self::Result,
            "/dashboard" => Self::Dashboard,
            _ => Self::NotFound,
        }
    }

    /// 获取路由对应的 URL path
    pub fn to_path(&self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::About => "/about",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Input => "/input",
            Self::Result => "/result",
            Self::Dashboard => "/dashboard",
            Self::NotFound => "/404",
        }
    }

    /// **核心守卫逻辑：定义该路由是否需要认证**
    pub fn requires_auth(&self) -> bool {
        matches!(self, Self::Input | Self::Result | Self::Dashboard)
    }

    /// 定义已认证用户是否应该离开此路由（登录、注册页）
    pub fn should_redirect_when_authenticated(&self) -> bool {
        matches!(self, Self::Login | Self::Register)
    }

    /// 获取认证失败时的重定向目标
    pub fn auth_failure_redirect() -> Self {
        Self::Login
    }

    /// 获取认证成功时的默认重定向目标
    pub fn auth_success_redirect() -> Self {
        Self::Dashboard
    }
}

impl Display for AppRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_path())
    }
}

// =========================================================
// 来源路径
// =========================================================

fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

fn decode_component(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = value.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

/// 站内路径：以单个 `/` 开头（排除 `//host` 形式的外部地址）
fn is_internal_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//")
}

/// 带来源路径的登录地址，如 `/login?from=/dashboard`
pub fn login_redirect(from: &str) -> String {
    format!(
        "{}?{}={}",
        AppRoute::auth_failure_redirect().to_path(),
        RETURN_PARAM,
        encode_component(from)
    )
}

/// 从查询串中取出来源路径；缺失或不是站内路径时返回 `None`
pub fn return_path(search: &str) -> Option<String> {
    search
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == RETURN_PARAM)
        .and_then(|(_, value)| decode_component(value))
        .filter(|path| is_internal_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(AppRoute::from_path("/"), AppRoute::Home);
        assert_eq!(AppRoute::from_path("/dashboard/"), AppRoute::Dashboard);
        assert_eq!(AppRoute::from_path("/login?from=/input"), AppRoute::Login);
        assert_eq!(AppRoute::from_path("/admin"), AppRoute::NotFound);
    }

    #[test]
    fn test_protected_routes() {
        let protected: Vec<_> = [
            AppRoute::Home,
            AppRoute::About,
            AppRoute::Login,
            AppRoute::Register,
            AppRoute::Input,
            AppRoute::Result,
            AppRoute::Dashboard,
        ]
        .into_iter()
        .filter(AppRoute::requires_auth)
        .collect();
        assert_eq!(protected, vec![AppRoute::Input, AppRoute::Result, AppRoute::Dashboard]);
    }

    #[test]
    fn test_return_path_roundtrip_and_rejects_external() {
        let url = login_redirect("/result?id=a b");
        assert_eq!(url, "/login?from=/result%3Fid%3Da%20b");

        let search = url.split_once('?').map(|(_, q)| q).unwrap();
        assert_eq!(return_path(search).as_deref(), Some("/result?id=a b"));

        assert_eq!(return_path("?from=//evil.example"), None);
        assert_eq!(return_path("?from=https%3A%2F%2Fevil.example"), None);
        assert_eq!(return_path("?other=1"), None);
        assert_eq!(return_path("?from=%ZZ"), None);
    }
}
