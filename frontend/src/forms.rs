//! 表单校验
//!
//! 每个表单返回 `FieldErrors`，字段名与页面上的 input `name` 一致。

use crate::error::FieldErrors;
use crate::web::http::UploadFile;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// `\S+@\S+\.\S+`
pub fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    // 域名部分允许再包含 '@'，只要最后一个 '.' 两侧都非空
    match domain.rfind('.') {
        Some(dot) => dot > 0 && dot + 1 < domain.len(),
        None => false,
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if email.trim().is_empty() {
        errors.insert("email", "Email is required");
    } else if !looks_like_email(email.trim()) {
        errors.insert("email", "Email is invalid");
    }
}

fn check_password(errors: &mut FieldErrors, password: &str) {
    if password.is_empty() {
        errors.insert("password", "Password is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.insert("password", "Password must be at least 6 characters");
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone: String,
    pub location: String,
    pub accept_terms: bool,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.name.trim().is_empty() {
            errors.insert("name", "Name is required");
        }
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);
        if self.confirm_password != self.password {
            errors.insert("confirm_password", "Passwords do not match");
        }
        if self.phone.trim().is_empty() {
            errors.insert("phone", "Phone number is required");
        }
        if self.location.trim().is_empty() {
            errors.insert("location", "Location is required");
        }
        if !self.accept_terms {
            errors.insert("accept_terms", "You must accept the terms and conditions");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextForm {
    pub waste_type: String,
    pub quantity: String,
    pub location: String,
}

impl TextForm {
    /// 校验通过时返回解析后的数量
    pub fn validate(&self) -> Result<f64, FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.waste_type.trim().is_empty() {
            errors.insert("waste_type", "Please select a waste type");
        }
        let quantity = self.quantity.trim().parse::<f64>().ok().filter(|q| q.is_finite());
        match quantity {
            None if self.quantity.trim().is_empty() => errors.insert("quantity", "Quantity is required"),
            Some(q) if q > 0.0 => {}
            _ => errors.insert("quantity", "Please enter a valid quantity"),
        }
        errors.into_result()?;
        Ok(quantity.unwrap_or_default())
    }

    pub fn location(&self) -> Option<String> {
        Some(self.location.trim())
            .filter(|l| !l.is_empty())
            .map(String::from)
    }
}

pub fn validate_image(file: &UploadFile) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if !file.content_type.starts_with("image/") {
        errors.insert("image", "Please upload an image file");
    } else if file.size > MAX_IMAGE_BYTES {
        errors.insert("image", "Image must be smaller than 10MB");
    }
    errors.into_result()
}
