use axum::{http::StatusCode, Json};

use crate::{errors::ServiceError, ApiResponse, PaginatedResponse};

/// Result of an endpoint that creates a resource.
pub type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ServiceError>;

/// Standard created response
pub fn created<T>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Wraps one page of rows with its paging metadata.
pub fn paginate<T>(items: Vec<T>, total: u64, page: u64, limit: u64) -> PaginatedResponse<T> {
    let limit = limit.max(1);
    PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages: total.div_ceil(limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_round_up() {
        let page = paginate(vec![1, 2], 41, 1, 20);
        assert_eq!(page.total_pages, 3);
        assert_eq!(paginate(Vec::<u8>::new(), 0, 1, 20).total_pages, 0);
    }
}
