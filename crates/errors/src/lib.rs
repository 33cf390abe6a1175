//! relay-errors - 统一错误处理
//!
//! 基于 RFC 7807 Problem Details 规范

use serde::{Deserialize, Serialize};
use thiserror::Error;

const PROBLEM_BASE: &str = "https://relay.local/problems";

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    /// 消息中间件不可用或拒绝了消息
    #[error("Broker unavailable: {0}")]
    Broker(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn broker(msg: impl Into<String>) -> Self {
        Self::Broker(msg.into())
    }

    pub fn external_service(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// 转换为 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
            Self::Database(_) => 500,
            Self::Broker(_) => 500,
            Self::ExternalService(_) => 502,
            Self::Config(_) => 500,
        }
    }

    /// 是否为调用方可修正的错误（4xx）
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// 转换为 Problem Details
    pub fn to_problem_details(&self) -> ProblemDetails {
        ProblemDetails {
            r#type: format!("{}/{}", PROBLEM_BASE, self.problem_slug()),
            title: self.problem_title().to_string(),
            status: self.status_code(),
            detail: self.to_string(),
            instance: None,
        }
    }

    fn problem_slug(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not-found",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
            Self::Database(_) => "database",
            Self::Broker(_) => "broker-unavailable",
            Self::ExternalService(_) => "external-service",
            Self::Config(_) => "configuration",
        }
    }

    fn problem_title(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Resource Not Found",
            Self::Validation(_) => "Validation Error",
            Self::Conflict(_) => "Conflict",
            Self::Internal(_) => "Internal Server Error",
            Self::Database(_) => "Database Error",
            Self::Broker(_) => "Broker Unavailable",
            Self::ExternalService(_) => "External Service Error",
            Self::Config(_) => "Configuration Error",
        }
    }
}

/// RFC 7807 Problem Details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::not_found("x").status_code(), 404);
        assert_eq!(AppError::validation("x").status_code(), 400);
        assert_eq!(AppError::broker("x").status_code(), 500);
        assert_eq!(AppError::external_service("x").status_code(), 502);
        assert!(AppError::validation("x").is_client_error());
        assert!(!AppError::database("x").is_client_error());
    }

    #[test]
    fn test_broker_problem_details() {
        let problem = AppError::broker("connection refused").to_problem_details();
        assert_eq!(problem.status, 500);
        assert_eq!(problem.title, "Broker Unavailable");
        assert!(problem.r#type.ends_with("/broker-unavailable"));
        assert!(problem.detail.contains("connection refused"));

        let json = serde_json::to_value(&problem).unwrap();
        assert!(json.get("instance").is_none());
    }
}
