use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl PageParams {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.page < 1 {
            return Err(ServiceError::Validation("page must be at least 1".into()));
        }
        if self.limit < 1 || self.limit > 100 {
            return Err(ServiceError::Validation(
                "limit must be between 1 and 100".into(),
            ));
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageResult<T> {
    pub total_page: i64,
    pub total_data: i64,
    pub next_page: Option<i64>,
    pub previous_page: Option<i64>,
    pub page: i64,
    pub limit: i64,
    pub data: Vec<T>,
}

impl<T> PageResult<T> {
    pub fn new(params: PageParams, total: i64, data: Vec<T>) -> Self {
        let total_page = if total == 0 {
            0
        } else {
            (total + params.limit - 1) / params.limit
        };
        Self {
            total_page,
            total_data: total,
            next_page: (params.page < total_page).then(|| params.page + 1),
            previous_page: (params.page > 1).then(|| params.page - 1),
            page: params.page,
            limit: params.limit,
            data,
        }
    }
}
