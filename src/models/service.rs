use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

/// A menu offering customers can order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price: BigDecimal,
    pub image_url: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateService {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price: BigDecimal,
    pub image_url: Option<String>,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

impl CreateService {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_name(&self.name)?;
        validate_category(&self.category)?;
        validate_price(&self.price)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateService {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<BigDecimal>,
    pub image_url: Option<String>,
    pub is_available: Option<bool>,
}

impl UpdateService {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(category) = &self.category {
            validate_category(category)?;
        }
        if let Some(price) = &self.price {
            validate_price(price)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceUpdate {
    pub service_id: Uuid,
    pub price: BigDecimal,
}

#[derive(Debug, Deserialize)]
pub struct ServiceListQuery {
    pub category: Option<String>,
    #[serde(default)]
    pub include_unavailable: bool,
}

fn validate_name(name: &str) -> Result<(), AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 120 {
        return Err(AppError::ValidationError("Service name must be 1-120 characters".to_string()));
    }
    Ok(())
}

fn validate_category(category: &str) -> Result<(), AppError> {
    let trimmed = category.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 60 {
        return Err(AppError::ValidationError("Category must be 1-60 characters".to_string()));
    }
    Ok(())
}

pub fn validate_price(price: &BigDecimal) -> Result<(), AppError> {
    if *price <= BigDecimal::zero() {
        return Err(AppError::ValidationError("Price must be greater than zero".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_price_must_be_positive() {
        assert!(validate_price(&BigDecimal::from_str("149.00").unwrap()).is_ok());
        assert!(validate_price(&BigDecimal::zero()).is_err());
        assert!(validate_price(&BigDecimal::from_str("-1").unwrap()).is_err());
    }

    #[test]
    fn test_update_validates_present_fields() {
        let update = UpdateService { price: Some(BigDecimal::zero()), ..Default::default() };
        assert!(update.validate().is_err());
        assert!(UpdateService::default().validate().is_ok());
    }

    #[test]
    fn test_create_service_defaults_to_available() {
        let create: CreateService = serde_json::from_value(serde_json::json!({
            "name": "Paneer Tikka",
            "category": "starters",
            "price": "249.50"
        }))
        .unwrap();

        assert!(create.is_available);
        assert!(create.validate().is_ok());
    }
}
