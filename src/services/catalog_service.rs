use std::sync::Arc;

use sqlx::Postgres;
use tracing::info;
use uuid::Uuid;

use crate::database::{boxed_operation, BoxedOperation, DatabaseManager};
use crate::error::AppError;
use crate::models::{validate_price, CreateService, PriceUpdate, Service, UpdateService};

/// The menu: services customers can order.
pub struct CatalogService {
    db: Arc<DatabaseManager>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    pub async fn list_services(
        &self,
        category: Option<String>,
        include_unavailable: bool,
    ) -> Result<Vec<Service>, AppError> {
        self.db
            .execute(move |conn| {
                let category = category.clone();
                Box::pin(async move {
                    let services = sqlx::query_as::<_, Service>(
                        r#"
                        SELECT * FROM services
                        WHERE ($1::text IS NULL OR category = $1)
                          AND ($2 OR is_available)
                        ORDER BY category, name
                        "#,
                    )
                    .bind(category)
                    .bind(include_unavailable)
                    .fetch_all(conn)
                    .await?;
                    Ok(services)
                })
            })
            .await
    }

    pub async fn get_service(&self, id: Uuid) -> Result<Service, AppError> {
        self.db
            .execute(move |conn| {
                Box::pin(async move {
                    sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = $1")
                        .bind(id)
                        .fetch_optional(conn)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Service {} not found", id)))
                })
            })
            .await
    }

    /// Load the given services; missing IDs are simply absent from the result.
    pub async fn get_services(&self, ids: Vec<Uuid>) -> Result<Vec<Service>, AppError> {
        self.db
            .execute(move |conn| {
                let ids = ids.clone();
                Box::pin(async move {
                    let services = sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = ANY($1)")
                        .bind(ids)
                        .fetch_all(conn)
                        .await?;
                    Ok(services)
                })
            })
            .await
    }

    pub async fn create_service(&self, create: CreateService) -> Result<Service, AppError> {
        create.validate()?;
        let id = Uuid::new_v4();

        let service = self
            .db
            .execute(move |conn| {
                let create = create.clone();
                Box::pin(async move { insert_service(conn, id, create).await })
            })
            .await?;

        info!(service_id = %service.id, "Created service {}", service.name);
        Ok(service)
    }

    pub async fn update_service(&self, id: Uuid, update: UpdateService) -> Result<Service, AppError> {
        update.validate()?;

        self.db
            .execute(move |conn| {
                let update = update.clone();
                Box::pin(async move {
                    sqlx::query_as::<_, Service>(
                        r#"
                        UPDATE services
                        SET name = COALESCE($2, name),
                            description = COALESCE($3, description),
                            category = COALESCE($4, category),
                            price = COALESCE($5, price),
                            image_url = COALESCE($6, image_url),
                            is_available = COALESCE($7, is_available),
                            updated_at = NOW()
                        WHERE id = $1
                        RETURNING *
                        "#,
                    )
                    .bind(id)
                    .bind(update.name.map(|name| name.trim().to_string()))
                    .bind(update.description)
                    .bind(update.category.map(|category| category.trim().to_string()))
                    .bind(update.price)
                    .bind(update.image_url)
                    .bind(update.is_available)
                    .fetch_optional(conn)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Service {} not found", id)))
                })
            })
            .await
    }

    /// Services that appear on orders cannot be deleted, only made unavailable.
    pub async fn delete_service(&self, id: Uuid) -> Result<(), AppError> {
        let deleted = self
            .db
            .execute(move |conn| {
                Box::pin(async move {
                    let result = sqlx::query("DELETE FROM services WHERE id = $1")
                        .bind(id)
                        .execute(conn)
                        .await
                        .map_err(|e| match AppError::from(e) {
                            AppError::ValidationError(_) => AppError::Conflict(
                                "Service is referenced by orders; mark it unavailable instead".to_string(),
                            ),
                            other => other,
                        })?;
                    Ok(result.rows_affected())
                })
            })
            .await?;

        if deleted == 0 {
            return Err(AppError::NotFound(format!("Service {} not found", id)));
        }
        info!(service_id = %id, "Deleted service");
        Ok(())
    }

    /// Insert many services in batched transactions.
    ///
    /// Not retried: earlier batches may already be committed.
    pub async fn bulk_create(&self, creates: Vec<CreateService>) -> Result<Vec<Service>, AppError> {
        for create in &creates {
            create.validate()?;
        }

        let operations: Vec<BoxedOperation<Postgres, Service>> = creates
            .into_iter()
            .map(|create| {
                let id = Uuid::new_v4();
                boxed_operation::<Postgres, _, _>(move |conn| {
                    let create = create.clone();
                    Box::pin(async move { insert_service(conn, id, create).await })
                })
            })
            .collect();

        let services = self.db.batch(operations).await?;
        info!(count = services.len(), "Bulk created services");
        Ok(services)
    }

    /// Reprice many services; an unknown ID rolls back its whole batch.
    pub async fn bulk_update_prices(&self, updates: Vec<PriceUpdate>) -> Result<Vec<Service>, AppError> {
        for update in &updates {
            validate_price(&update.price)?;
        }

        let operations: Vec<BoxedOperation<Postgres, Service>> = updates
            .into_iter()
            .map(|update| {
                boxed_operation::<Postgres, _, _>(move |conn| {
                    let update = update.clone();
                    Box::pin(async move {
                        sqlx::query_as::<_, Service>(
                            "UPDATE services SET price = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
                        )
                        .bind(update.service_id)
                        .bind(update.price)
                        .fetch_optional(conn)
                        .await?
                        .ok_or_else(|| {
                            AppError::NotFound(format!("Service {} not found", update.service_id))
                        })
                    })
                })
            })
            .collect();

        let services = self.db.batch(operations).await?;
        info!(count = services.len(), "Bulk updated service prices");
        Ok(services)
    }
}

async fn insert_service(
    conn: &mut sqlx::PgConnection,
    id: Uuid,
    create: CreateService,
) -> Result<Service, AppError> {
    let service = sqlx::query_as::<_, Service>(
        r#"
        INSERT INTO services (id, name, description, category, price, image_url, is_available)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(create.name.trim())
    .bind(create.description)
    .bind(create.category.trim())
    .bind(create.price)
    .bind(create.image_url)
    .bind(create.is_available)
    .fetch_one(conn)
    .await?;
    Ok(service)
}
