//! 用户身份模型
//!
//! 身份信息可能来自三个来源：身份提供方、后端资料、本地会话缓存。
//! 每个字段都带有来源标记（`Sourced<T>`），合并时按固定优先级取值：
//! Provider > BackendProfile > Cache > Derived。

use serde::{Deserialize, Serialize};

/// 字段来源
///
/// 声明顺序即优先级：越靠前越权威。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// 身份提供方实时给出的数据
    Provider,
    /// 后端 `/api/auth/status` 返回的资料
    BackendProfile,
    /// 本地会话缓存（未经提供方确认）
    Cache,
    /// 由其他字段推导的兜底值（如用邮箱充当显示名）
    Derived,
}

/// 带来源标记的字段值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    pub value: T,
    pub source: Provenance,
}

impl<T> Sourced<T> {
    pub fn new(value: T, source: Provenance) -> Self {
        Self { value, source }
    }

    /// 在两个候选值中保留优先级更高的那个（同级时保留 `self`）
    pub fn prefer(self, other: Sourced<T>) -> Sourced<T> {
        if other.source < self.source {
            other
        } else {
            self
        }
    }
}

/// 扁平的身份快照
///
/// 本地缓存中的 JSON 形态：`{ id, email, name, emailVerified, photoURL }`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySnapshot {
    pub id: String,
    pub email: String,
    /// 显示名；为空时以邮箱代替
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// 后端返回的用户资料（`/api/auth/status` 中的 `user` 字段）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendProfile {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
}

/// 合并后的用户身份
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Sourced<String>,
    pub email: Sourced<String>,
    pub display_name: Sourced<String>,
    pub email_verified: Sourced<bool>,
    pub photo_url: Option<Sourced<String>>,
}

impl Identity {
    /// 从单一来源的快照构建身份
    pub fn from_snapshot(snapshot: IdentitySnapshot, source: Provenance) -> Self {
        let display_name = match snapshot.name.filter(|n| !n.trim().is_empty()) {
            Some(name) => Sourced::new(name, source),
            None => Sourced::new(snapshot.email.clone(), Provenance::Derived),
        };

        Self {
            id: Sourced::new(snapshot.id, source),
            email: Sourced::new(snapshot.email, source),
            display_name,
            email_verified: Sourced::new(snapshot.email_verified, source),
            photo_url: snapshot.photo_url.map(|url| Sourced::new(url, source)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id.value
    }

    pub fn email(&self) -> &str {
        &self.email.value
    }

    pub fn display_name(&self) -> &str {
        &self.display_name.value
    }

    /// 身份是否已被身份提供方确认（而非仅来自缓存）
    pub fn is_provider_verified(&self) -> bool {
        self.id.source == Provenance::Provider
    }

    /// 按字段合并另一个身份
    ///
    /// 用户 ID 不同视为不同用户：整体保留 ID 来源优先级更高的一方。
    pub fn merge(self, other: Identity) -> Identity {
        if self.id.value != other.id.value {
            return if other.id.source < self.id.source {
                other
            } else {
                self
            };
        }

        let photo_url = match (self.photo_url, other.photo_url) {
            (Some(a), Some(b)) => Some(a.prefer(b)),
            (a, b) => a.or(b),
        };

        Identity {
            id: self.id.prefer(other.id),
            email: self.email.prefer(other.email),
            display_name: self.display_name.prefer(other.display_name),
            email_verified: self.email_verified.prefer(other.email_verified),
            photo_url,
        }
    }

    /// 合并后端资料；资料属于其他用户时原样返回
    pub fn merge_profile(self, profile: &BackendProfile) -> Identity {
        if profile.uid != self.id.value {
            return self;
        }

        let source = Provenance::BackendProfile;
        let mut merged = self;
        if let Some(email) = profile.email.clone().filter(|e| !e.is_empty()) {
            merged.email = merged.email.prefer(Sourced::new(email, source));
        }
        if let Some(name) = profile.name.clone().filter(|n| !n.trim().is_empty()) {
            merged.display_name = merged.display_name.prefer(Sourced::new(name, source));
        }
        if let Some(verified) = profile.email_verified {
            merged.email_verified = merged.email_verified.prefer(Sourced::new(verified, source));
        }
        merged
    }

    /// 导出扁平快照（写入会话缓存）
    pub fn snapshot(&self) -> IdentitySnapshot {
        let name = match self.display_name.source {
            Provenance::Derived => None,
            _ => Some(self.display_name.value.clone()),
        };

        IdentitySnapshot {
            id: self.id.value.clone(),
            email: self.email.value.clone(),
            name,
            email_verified: self.email_verified.value,
            photo_url: self.photo_url.as_ref().map(|p| p.value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: &str, name: Option<&str>) -> IdentitySnapshot {
        IdentitySnapshot {
            id: id.to_string(),
            email: format!("{}@farm.in", id),
            name: name.map(String::from),
            email_verified: false,
            photo_url: None,
        }
    }

    #[test]
    fn test_missing_name_falls_back_to_email() {
        let identity = Identity::from_snapshot(snapshot("u1", None), Provenance::Provider);
        assert_eq!(identity.display_name(), "u1@farm.in");
        assert_eq!(identity.display_name.source, Provenance::Derived);
        // 推导值不写回缓存
        assert_eq!(identity.snapshot().name, None);
    }

    #[test]
    fn test_provider_beats_cache() {
        let cached = Identity::from_snapshot(snapshot("u1", Some("Old Name")), Provenance::Cache);
        let live = Identity::from_snapshot(snapshot("u1", Some("Asha")), Provenance::Provider);

        let merged = cached.merge(live);
        assert_eq!(merged.display_name(), "Asha");
        assert!(merged.is_provider_verified());
    }

    #[test]
    fn test_profile_fills_derived_name_but_not_provider_name() {
        let profile = BackendProfile {
            uid: "u1".into(),
            email: None,
            name: Some("Ramesh".into()),
            email_verified: Some(true),
        };

        let unnamed = Identity::from_snapshot(snapshot("u1", None), Provenance::Provider);
        let merged = unnamed.merge_profile(&profile);
        assert_eq!(merged.display_name(), "Ramesh");
        assert_eq!(merged.display_name.source, Provenance::BackendProfile);
        // 提供方的 email_verified 优先
        assert!(!merged.email_verified.value);

        let named = Identity::from_snapshot(snapshot("u1", Some("Asha")), Provenance::Provider);
        assert_eq!(named.merge_profile(&profile).display_name(), "Asha");
    }

    #[test]
    fn test_profile_for_other_user_is_ignored() {
        let profile = BackendProfile {
            uid: "someone-else".into(),
            email: Some("x@y.z".into()),
            name: Some("X".into()),
            email_verified: None,
        };
        let identity = Identity::from_snapshot(snapshot("u1", None), Provenance::Cache);
        assert_eq!(identity.clone().merge_profile(&profile), identity);
    }

    #[test]
    fn test_different_users_keep_more_authoritative_side() {
        let cached = Identity::from_snapshot(snapshot("old", Some("Old")), Provenance::Cache);
        let live = Identity::from_snapshot(snapshot("new", Some("New")), Provenance::Provider);
        assert_eq!(cached.merge(live).id(), "new");
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut snap = snapshot("u1", Some("Asha"));
        snap.photo_url = Some("https://img".into());
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["emailVerified"], false);
        assert_eq!(json["photoURL"], "https://img");
        assert_eq!(json["name"], "Asha");
    }
}
