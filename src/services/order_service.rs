//! Order placement, visibility and the delivery status machine.

use std::collections::HashMap;
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use sqlx::{Connection, PgConnection, Postgres};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Actor;
use crate::database::{boxed_operation, BoxedOperation, DatabaseManager, PgTransactionManager};
use crate::error::AppError;
use crate::models::{
    Order, OrderItem, OrderStats, OrderStatus, OrderStatusHistory, OrderWithItems, PlaceOrder, Service,
    UserRole,
};
use crate::services::{CatalogService, UserService};

pub struct OrderService {
    db: Arc<DatabaseManager>,
}

#[derive(Debug, Clone)]
struct OrderDraft {
    id: Uuid,
    customer_id: Uuid,
    total_amount: BigDecimal,
    delivery_address: String,
    notes: Option<String>,
}

/// Rows written while placing an order.
enum Placed {
    Order(Order),
    Item(OrderItem),
    History,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// Price the lines from the menu and store order and items atomically.
    ///
    /// The initial history entry goes through a savepoint: if it fails the
    /// order is still committed, just without that entry.
    pub async fn place_order(&self, customer_id: Uuid, request: PlaceOrder) -> Result<OrderWithItems, AppError> {
        request.validate()?;

        let service_ids = request.items.iter().map(|line| line.service_id).collect();
        let menu: HashMap<Uuid, Service> = CatalogService::new(self.db.clone())
            .get_services(service_ids)
            .await?
            .into_iter()
            .map(|service| (service.id, service))
            .collect();

        let order_id = Uuid::new_v4();
        let mut total_amount = BigDecimal::zero();
        let mut items = Vec::with_capacity(request.items.len());

        for line in &request.items {
            let service = menu
                .get(&line.service_id)
                .ok_or_else(|| AppError::NotFound(format!("Service {} not found", line.service_id)))?;
            if !service.is_available {
                return Err(AppError::ValidationError(format!("{} is currently unavailable", service.name)));
            }

            total_amount += &service.price * BigDecimal::from(line.quantity);
            items.push(OrderItem {
                id: Uuid::new_v4(),
                order_id,
                service_id: service.id,
                quantity: line.quantity,
                unit_price: service.price.clone(),
            });
        }

        let draft = OrderDraft {
            id: order_id,
            customer_id,
            total_amount,
            delivery_address: request.delivery_address.trim().to_string(),
            notes: request.notes.filter(|notes| !notes.trim().is_empty()),
        };

        let rows = self
            .db
            .execute(move |conn| {
                let operations = placement_operations(draft.clone(), items.clone());
                Box::pin(async move { PgTransactionManager::transaction(conn, &operations).await })
            })
            .await?;

        let placed = collect_placed(rows)?;
        info!(
            order_id = %placed.order.id,
            customer_id = %customer_id,
            total = %placed.order.total_amount,
            "Order placed"
        );

        Ok(placed)
    }

    pub async fn get_order(&self, actor: Actor, id: Uuid) -> Result<OrderWithItems, AppError> {
        let (order, items) = self
            .db
            .execute(move |conn| {
                Box::pin(async move {
                    let order = fetch_order(&mut *conn, id, false).await?;
                    let items = sqlx::query_as::<_, OrderItem>(
                        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY service_id",
                    )
                    .bind(id)
                    .fetch_all(&mut *conn)
                    .await?;
                    Ok((order, items))
                })
            })
            .await?;

        ensure_visible(&actor, &order)?;
        Ok(OrderWithItems { order, items })
    }

    pub async fn get_history(&self, actor: Actor, id: Uuid) -> Result<Vec<OrderStatusHistory>, AppError> {
        let (order, history) = self
            .db
            .execute(move |conn| {
                Box::pin(async move {
                    let order = fetch_order(&mut *conn, id, false).await?;
                    let history = sqlx::query_as::<_, OrderStatusHistory>(
                        "SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY changed_at",
                    )
                    .bind(id)
                    .fetch_all(&mut *conn)
                    .await?;
                    Ok((order, history))
                })
            })
            .await?;

        ensure_visible(&actor, &order)?;
        Ok(history)
    }

    /// Orders the actor may see, newest first.
    pub async fn list_orders(&self, actor: Actor, status: Option<OrderStatus>) -> Result<Vec<Order>, AppError> {
        let (customer_id, assigned_to) = match actor.role {
            UserRole::Admin => (None, None),
            UserRole::Customer => (Some(actor.id), None),
            UserRole::TeamMember => (None, Some(actor.id)),
        };

        self.db
            .execute(move |conn| {
                Box::pin(async move {
                    let orders = sqlx::query_as::<_, Order>(
                        r#"
                        SELECT * FROM orders
                        WHERE ($1::order_status IS NULL OR status = $1)
                          AND ($2::uuid IS NULL OR customer_id = $2)
                          AND ($3::uuid IS NULL OR assigned_to = $3)
                        ORDER BY created_at DESC
                        "#,
                    )
                    .bind(status)
                    .bind(customer_id)
                    .bind(assigned_to)
                    .fetch_all(conn)
                    .await?;
                    Ok(orders)
                })
            })
            .await
    }

    /// Move an order along the status machine and record the change.
    pub async fn update_status(&self, actor: Actor, id: Uuid, next: OrderStatus) -> Result<Order, AppError> {
        let order = self
            .db
            .execute(move |conn| {
                Box::pin(async move {
                    let mut tx = conn.begin().await?;
                    let order = fetch_order(&mut *tx, id, true).await?;

                    ensure_visible(&actor, &order)?;
                    ensure_may_set_status(&actor, &order, next)?;
                    order.status.ensure_transition(next)?;

                    let updated = sqlx::query_as::<_, Order>(
                        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
                    )
                    .bind(id)
                    .bind(next)
                    .fetch_one(&mut *tx)
                    .await?;
                    record_status(&mut *tx, id, next, Some(actor.id)).await?;

                    tx.commit().await?;
                    Ok(updated)
                })
            })
            .await?;

        info!(order_id = %id, status = %next, actor = %actor.id, "Order status updated");
        Ok(order)
    }

    pub async fn cancel_order(&self, actor: Actor, id: Uuid) -> Result<Order, AppError> {
        self.update_status(actor, id, OrderStatus::Cancelled).await
    }

    pub async fn assign_order(&self, id: Uuid, team_member_id: Uuid) -> Result<Order, AppError> {
        UserService::new(self.db.clone()).get_team_member(team_member_id).await?;

        let order = self
            .db
            .execute(move |conn| {
                Box::pin(async move {
                    let mut tx = conn.begin().await?;
                    let order = fetch_order(&mut *tx, id, true).await?;
                    if order.status.is_terminal() {
                        return Err(AppError::ValidationError(format!(
                            "Order is already {} and cannot be reassigned",
                            order.status
                        )));
                    }

                    let updated = sqlx::query_as::<_, Order>(
                        "UPDATE orders SET assigned_to = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
                    )
                    .bind(id)
                    .bind(team_member_id)
                    .fetch_one(&mut *tx)
                    .await?;

                    tx.commit().await?;
                    Ok(updated)
                })
            })
            .await?;

        info!(order_id = %id, team_member_id = %team_member_id, "Order assigned");
        Ok(order)
    }

    pub async fn stats(&self) -> Result<OrderStats, AppError> {
        self.db
            .execute(|conn| {
                Box::pin(async move {
                    let stats = sqlx::query_as::<_, OrderStats>(
                        r#"
                        SELECT
                            (SELECT COUNT(*) FROM orders) AS total_orders,
                            (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders,
                            (SELECT COUNT(*) FROM orders WHERE status = 'delivered') AS delivered_orders,
                            (SELECT COUNT(*) FROM orders WHERE status = 'cancelled') AS cancelled_orders,
                            (SELECT COALESCE(SUM(total_amount), 0) FROM orders WHERE status = 'delivered') AS revenue,
                            (SELECT COUNT(*) FROM users WHERE role = 'customer') AS total_customers,
                            (SELECT COUNT(*) FROM users WHERE role = 'team_member') AS total_team_members,
                            (SELECT COUNT(*) FROM services WHERE is_available) AS available_services
                        "#,
                    )
                    .fetch_one(conn)
                    .await?;
                    Ok(stats)
                })
            })
            .await
    }
}

fn collect_placed(rows: Vec<Placed>) -> Result<OrderWithItems, AppError> {
    let mut order = None;
    let mut items = Vec::new();
    for row in rows {
        match row {
            Placed::Order(row) => order = Some(row),
            Placed::Item(item) => items.push(item),
            Placed::History => {}
        }
    }

    let order = order.ok_or_else(|| AppError::InternalError("Order row missing after insert".to_string()))?;
    Ok(OrderWithItems { order, items })
}

fn placement_operations(draft: OrderDraft, items: Vec<OrderItem>) -> Vec<BoxedOperation<Postgres, Placed>> {
    let mut operations = Vec::with_capacity(items.len() + 2);
    let order_id = draft.id;
    let customer_id = draft.customer_id;

    operations.push(boxed_operation::<Postgres, _, _>(move |conn| {
        let draft = draft.clone();
        Box::pin(async move {
            let order = sqlx::query_as::<_, Order>(
                r#"
                INSERT INTO orders (id, customer_id, status, total_amount, delivery_address, notes)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(draft.id)
            .bind(draft.customer_id)
            .bind(OrderStatus::Pending)
            .bind(draft.total_amount)
            .bind(draft.delivery_address)
            .bind(draft.notes)
            .fetch_one(conn)
            .await?;
            Ok(Placed::Order(order))
        })
    }));

    for item in items {
        operations.push(boxed_operation::<Postgres, _, _>(move |conn| {
            let item = item.clone();
            Box::pin(async move {
                let item = sqlx::query_as::<_, OrderItem>(
                    r#"
                    INSERT INTO order_items (id, order_id, service_id, quantity, unit_price)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING *
                    "#,
                )
                .bind(item.id)
                .bind(item.order_id)
                .bind(item.service_id)
                .bind(item.quantity)
                .bind(item.unit_price)
                .fetch_one(conn)
                .await?;
                Ok(Placed::Item(item))
            })
        }));
    }

    operations.push(boxed_operation::<Postgres, _, _>(move |conn| {
        Box::pin(async move {
            let entry = PgTransactionManager::savepoint(conn, move |conn| {
                Box::pin(record_status(conn, order_id, OrderStatus::Pending, Some(customer_id)))
            })
            .await;

            if let Err(e) = entry {
                warn!(order_id = %order_id, "Initial status history not recorded: {}", e);
            }
            Ok(Placed::History)
        })
    }));

    operations
}

async fn fetch_order(conn: &mut PgConnection, id: Uuid, for_update: bool) -> Result<Order, AppError> {
    let sql = if for_update {
        "SELECT * FROM orders WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT * FROM orders WHERE id = $1"
    };

    sqlx::query_as::<_, Order>(sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", id)))
}

async fn record_status(
    conn: &mut PgConnection,
    order_id: Uuid,
    status: OrderStatus,
    changed_by: Option<Uuid>,
) -> Result<OrderStatusHistory, AppError> {
    let entry = sqlx::query_as::<_, OrderStatusHistory>(
        r#"
        INSERT INTO order_status_history (id, order_id, status, changed_by)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(order_id)
    .bind(status)
    .bind(changed_by)
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

/// Orders outside the actor's view are reported as missing.
fn ensure_visible(actor: &Actor, order: &Order) -> Result<(), AppError> {
    let visible = match actor.role {
        UserRole::Admin => true,
        UserRole::Customer => order.customer_id == actor.id,
        UserRole::TeamMember => order.assigned_to == Some(actor.id),
    };

    if visible {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("Order {} not found", order.id)))
    }
}

/// Customers may only cancel their pending orders; team members work the
/// pipeline but cannot cancel; admins may make any valid move.
fn ensure_may_set_status(actor: &Actor, order: &Order, next: OrderStatus) -> Result<(), AppError> {
    match actor.role {
        UserRole::Admin => Ok(()),
        UserRole::TeamMember if next == OrderStatus::Cancelled => Err(AppError::AuthorizationError(
            "Team members cannot cancel orders".to_string(),
        )),
        UserRole::TeamMember => Ok(()),
        UserRole::Customer if next != OrderStatus::Cancelled => Err(AppError::AuthorizationError(
            "Customers can only cancel orders".to_string(),
        )),
        UserRole::Customer if order.status != OrderStatus::Pending => Err(AppError::ValidationError(
            "Only pending orders can be cancelled".to_string(),
        )),
        UserRole::Customer => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order(customer_id: Uuid, assigned_to: Option<Uuid>, status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            customer_id,
            assigned_to,
            status,
            total_amount: BigDecimal::from(250),
            delivery_address: "221B Baker Street".to_string(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn actor(role: UserRole) -> Actor {
        Actor { id: Uuid::new_v4(), role }
    }

    #[test]
    fn test_visibility_by_role() {
        let customer = actor(UserRole::Customer);
        let rider = actor(UserRole::TeamMember);
        let admin = actor(UserRole::Admin);
        let own = order(customer.id, Some(rider.id), OrderStatus::Pending);
        let other = order(Uuid::new_v4(), None, OrderStatus::Pending);

        assert!(ensure_visible(&customer, &own).is_ok());
        assert!(matches!(ensure_visible(&customer, &other), Err(AppError::NotFound(_))));
        assert!(ensure_visible(&rider, &own).is_ok());
        assert!(ensure_visible(&rider, &other).is_err());
        assert!(ensure_visible(&admin, &other).is_ok());
    }

    #[test]
    fn test_customers_cancel_only_pending_orders() {
        let customer = actor(UserRole::Customer);
        let pending = order(customer.id, None, OrderStatus::Pending);
        let confirmed = order(customer.id, None, OrderStatus::Confirmed);

        assert!(ensure_may_set_status(&customer, &pending, OrderStatus::Cancelled).is_ok());
        assert!(ensure_may_set_status(&customer, &confirmed, OrderStatus::Cancelled).is_err());
        assert!(matches!(
            ensure_may_set_status(&customer, &pending, OrderStatus::Confirmed),
            Err(AppError::AuthorizationError(_))
        ));
    }

    #[test]
    fn test_placed_rows_assemble_into_order() {
        let placed = order(Uuid::new_v4(), None, OrderStatus::Pending);
        let item = OrderItem {
            id: Uuid::new_v4(),
            order_id: placed.id,
            service_id: Uuid::new_v4(),
            quantity: 2,
            unit_price: BigDecimal::from(125),
        };

        let rows = vec![Placed::Order(placed.clone()), Placed::Item(item.clone()), Placed::History];
        let assembled = collect_placed(rows).unwrap();
        assert_eq!(assembled.order.id, placed.id);
        assert_eq!(assembled.items.len(), 1);
        assert_eq!(assembled.items[0].id, item.id);

        // history without the order row is an internal failure
        assert!(matches!(
            collect_placed(vec![Placed::History]),
            Err(AppError::InternalError(_))
        ));
    }

    #[test]
    fn test_team_members_cannot_cancel() {
        let rider = actor(UserRole::TeamMember);
        let assigned = order(Uuid::new_v4(), Some(rider.id), OrderStatus::Confirmed);

        assert!(ensure_may_set_status(&rider, &assigned, OrderStatus::Preparing).is_ok());
        assert!(ensure_may_set_status(&rider, &assigned, OrderStatus::Cancelled).is_err());
        assert!(ensure_may_set_status(&actor(UserRole::Admin), &assigned, OrderStatus::Cancelled).is_ok());
    }
}
