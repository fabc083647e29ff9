use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    pub page: Option<u64>,
    pub size: Option<u64>,
    pub total: Option<u64>,
}

impl Meta {
    pub fn new(page: u64, size: u64, total: u64) -> Self {
        Self {
            page: Some(page),
            size: Some(size),
            total: Some(total),
        }
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            size: None,
            total: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}
