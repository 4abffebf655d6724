/// Common types and utilities shared across handlers and services
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Builds a document name such as `RO-1a2b3c4d00004000800000000000000f` from a
/// prefix and the full row id, so names are as unique as the ids themselves.
pub fn document_name(prefix: &str, id: Uuid) -> String {
    format!("{}-{}", prefix, id.simple())
}

/// Optional date window for report filters. Dates are inclusive and formatted `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRangeParams {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

impl DateRangeParams {
    pub fn new(from_date: Option<&str>, to_date: Option<&str>) -> Self {
        Self {
            from_date: from_date.map(str::to_string),
            to_date: to_date.map(str::to_string),
        }
    }

    /// Converts the string bounds into a UTC window covering whole days.
    /// The start is inclusive; the end is exclusive, at midnight after `to_date`.
    pub fn to_datetime_range(
        &self,
    ) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ServiceError> {
        let start = self
            .from_date
            .as_deref()
            .map(|raw| parse_date(raw, "from_date"))
            .transpose()?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc());

        let end = self
            .to_date
            .as_deref()
            .map(|raw| parse_date(raw, "to_date"))
            .transpose()?
            .and_then(|d| d.succ_opt())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc());

        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return Err(ServiceError::ValidationError(
                    "from_date must not be after to_date".to_string(),
                ));
            }
        }

        Ok((start, end))
    }
}

pub fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
        ServiceError::ValidationError(format!("Invalid {} '{}': {}", field, raw, e))
    })
}
