//! 身份提供方抽象
//!
//! 与 Firebase Auth 的客户端 SDK 对应：同步的当前用户访问器、登录/注册/登出、
//! ID Token 获取，以及身份变化订阅。

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use agriwaste_shared::{Identity, IdentitySnapshot, Provenance};
use async_trait::async_trait;

use crate::error::AuthResult;

/// 提供方给出的用户
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub email_verified: bool,
    pub photo_url: Option<String>,
}

impl ProviderUser {
    pub fn to_identity(&self) -> Identity {
        Identity::from_snapshot(
            IdentitySnapshot {
                id: self.uid.clone(),
                email: self.email.clone(),
                name: self.display_name.clone(),
                email_verified: self.email_verified,
                photo_url: self.photo_url.clone(),
            },
            Provenance::Provider,
        )
    }
}

pub type IdentityListener = Rc<dyn Fn(Option<ProviderUser>)>;

#[async_trait(?Send)]
pub trait IdentityProvider {
    /// 内存中的当前用户（不发起网络请求）
    fn current_user(&self) -> Option<ProviderUser>;
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderUser>;
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<ProviderUser>;
    async fn update_display_name(&self, name: &str) -> AuthResult<ProviderUser>;
    async fn sign_out(&self) -> AuthResult<()>;
    /// 当前用户的 ID Token，过期时自动刷新
    async fn id_token(&self) -> AuthResult<String>;
    /// 订阅身份变化；返回的 `Subscription` 被 drop 时取消订阅
    fn subscribe(&self, listener: IdentityListener) -> Subscription;
}

/// 订阅句柄
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

/// 监听器列表，供各提供方实现复用
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Rc<RefCell<Vec<(u64, IdentityListener)>>>,
    next_id: Rc<Cell<u64>>,
}

impl ListenerRegistry {
    pub fn subscribe(&self, listener: IdentityListener) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, listener));

        let listeners = Rc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.borrow_mut().retain(|(i, _)| *i != id);
            }
        })
    }

    /// 通知所有监听器；回调期间可以安全地订阅或退订
    pub fn notify(&self, user: Option<&ProviderUser>) {
        let snapshot: Vec<IdentityListener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in snapshot {
            listener(user.cloned());
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let registry = ListenerRegistry::default();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let sub = registry.subscribe(Rc::new(move |user: Option<ProviderUser>| {
            sink.borrow_mut().push(user.map(|u| u.uid));
        }));
        registry.notify(None);
        drop(sub);
        registry.notify(None);

        assert_eq!(*seen.borrow(), vec![None]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_provider_user_identity_is_provider_sourced() {
        let user = ProviderUser {
            uid: "u1".into(),
            email: "a@b.in".into(),
            display_name: None,
            email_verified: true,
            photo_url: None,
        };
        let identity = user.to_identity();
        assert!(identity.is_provider_verified());
        assert_eq!(identity.display_name(), "a@b.in");
    }
}
