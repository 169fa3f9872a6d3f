use std::collections::HashSet;
use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

pub const MAX_ITEM_QUANTITY: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Forward moves along the delivery pipeline, plus early cancellation.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Preparing)
                | (Preparing, OutForDelivery)
                | (OutForDelivery, Delivered)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn ensure_transition(&self, next: OrderStatus) -> Result<(), AppError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(AppError::ValidationError(format!(
                "Cannot move order from {} to {}",
                self, next
            )))
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub assigned_to: Option<Uuid>,
    pub status: OrderStatus,
    pub total_amount: BigDecimal,
    pub delivery_address: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub service_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderStatusHistory {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLine {
    pub service_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub items: Vec<OrderLine>,
    pub delivery_address: String,
    pub notes: Option<String>,
}

impl PlaceOrder {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.items.is_empty() {
            return Err(AppError::ValidationError("An order needs at least one item".to_string()));
        }

        let mut seen = HashSet::with_capacity(self.items.len());
        for line in &self.items {
            if !(1..=MAX_ITEM_QUANTITY).contains(&line.quantity) {
                return Err(AppError::ValidationError(format!(
                    "Quantity must be between 1 and {}",
                    MAX_ITEM_QUANTITY
                )));
            }
            if !seen.insert(line.service_id) {
                return Err(AppError::ValidationError(format!(
                    "Service {} appears more than once",
                    line.service_id
                )));
            }
        }

        if self.delivery_address.trim().is_empty() {
            return Err(AppError::ValidationError("Delivery address is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatus {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct AssignOrder {
    pub team_member_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderStats {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub delivered_orders: i64,
    pub cancelled_orders: i64,
    pub revenue: BigDecimal,
    pub total_customers: i64,
    pub total_team_members: i64,
    pub available_services: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn order_with(items: Vec<OrderLine>) -> PlaceOrder {
        PlaceOrder { items, delivery_address: "12 MG Road, Pune".to_string(), notes: None }
    }

    #[test]
    fn test_delivery_pipeline() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Preparing));
        assert!(OrderStatus::Preparing.can_transition_to(OrderStatus::OutForDelivery));
        assert!(OrderStatus::OutForDelivery.can_transition_to(OrderStatus::Delivered));

        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Preparing.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Confirmed.ensure_transition(OrderStatus::Cancelled).is_ok());
    }

    #[test]
    fn test_place_order_validation() {
        let service_id = Uuid::new_v4();
        assert!(order_with(vec![OrderLine { service_id, quantity: 2 }]).validate().is_ok());
        assert!(order_with(vec![]).validate().is_err());
        assert!(order_with(vec![OrderLine { service_id, quantity: 0 }]).validate().is_err());
        assert!(order_with(vec![OrderLine { service_id, quantity: 51 }]).validate().is_err());
        assert!(order_with(vec![
            OrderLine { service_id, quantity: 1 },
            OrderLine { service_id, quantity: 1 },
        ])
        .validate()
        .is_err());

        let mut blank_address = order_with(vec![OrderLine { service_id, quantity: 1 }]);
        blank_address.delivery_address = "   ".to_string();
        assert!(blank_address.validate().is_err());
    }

    fn any_status() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(OrderStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn terminal_states_never_move(from in any_status(), to in any_status()) {
            if from.is_terminal() {
                prop_assert!(!from.can_transition_to(to));
            }
        }

        #[test]
        fn no_status_transitions_to_itself(status in any_status()) {
            prop_assert!(!status.can_transition_to(status));
        }

        #[test]
        fn nothing_returns_to_pending(from in any_status()) {
            prop_assert!(!from.can_transition_to(OrderStatus::Pending));
        }
    }
}
