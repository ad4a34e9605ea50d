use crate::db::rollback_after_failure;
use crate::errors::AppError;
use crate::models::{
    ContactMessage, ContactMessageInput, CreditSimulation, CreditSimulationInput,
    CreditSimulationPatch, FinancialWorksheet, WorksheetInput, WorksheetPatch,
};
use crate::sparse_update::{update_returning, TableRef};
use sqlx::PgPool;

pub const CREDIT_SIMULATIONS: TableRef = TableRef {
    name: "simulaciones_credito",
    not_found: "Simulación no encontrada",
};

pub const WORKSHEETS: TableRef = TableRef {
    name: "planillas_financieras",
    not_found: "Planilla no encontrada",
};

/// Deletes one row by id inside a transaction.
///
/// Zero affected rows is reported as [`AppError::NotFound`] and nothing is committed.
pub async fn delete_by_id(pool: &PgPool, table: &TableRef, id: i32) -> Result<(), AppError> {
    let sql = format!("DELETE FROM {} WHERE id = $1", table.name);
    let mut tx = pool.begin().await?;

    let result = match sqlx::query(&sql).bind(id).execute(&mut *tx).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Delete from {} id={} failed: {}", table.name, id, e);
            rollback_after_failure(tx, "delete").await;
            return Err(AppError::DatabaseError(e));
        }
    };

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(AppError::NotFound(table.not_found.to_string()));
    }

    tx.commit().await?;
    tracing::info!("Deleted {} id={}", table.name, id);
    Ok(())
}

/// Storage for credit simulations (`simulaciones_credito`).
pub struct CreditStorage {
    pool: PgPool,
}

impl CreditStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a simulation and returns the stored row, including the trigger-computed
    /// `valor_aprobado`.
    pub async fn create(&self, input: CreditSimulationInput) -> Result<CreditSimulation, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, CreditSimulation>(
            r#"
            INSERT INTO simulaciones_credito (
                nombres, apellidos, documento_identidad, edad,
                fecha_nacimiento, ingresos_mensuales, gastos_mensuales,
                valor_patrimonio, dimension_terreno, destinacion_credito,
                numero_empleados
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&input.first_names)
        .bind(&input.last_names)
        .bind(&input.national_id)
        .bind(input.age)
        .bind(input.birth_date)
        .bind(&input.monthly_income)
        .bind(&input.monthly_expenses)
        .bind(&input.asset_value)
        .bind(&input.land_size)
        .bind(&input.credit_purpose)
        .bind(input.employee_count)
        .fetch_one(&mut *tx)
        .await;

        let simulation = match inserted {
            Ok(row) => row,
            Err(e) => {
                tracing::error!("Failed to insert credit simulation: {}", e);
                rollback_after_failure(tx, "credit simulation insert").await;
                return Err(AppError::DatabaseError(e));
            }
        };

        tx.commit().await?;
        tracing::info!(
            "Credit simulation {} stored, approved amount {:?}",
            simulation.id,
            simulation.approved_amount
        );
        Ok(simulation)
    }

    /// All simulations of one applicant, newest first.
    pub async fn list_by_owner(&self, national_id: &str) -> Result<Vec<CreditSimulation>, AppError> {
        let rows = sqlx::query_as::<_, CreditSimulation>(
            r#"
            SELECT * FROM simulaciones_credito
            WHERE documento_identidad = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(national_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn update(
        &self,
        id: i32,
        patch: CreditSimulationPatch,
    ) -> Result<CreditSimulation, AppError> {
        update_returning(&self.pool, &CREDIT_SIMULATIONS, id, patch).await
    }

    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        delete_by_id(&self.pool, &CREDIT_SIMULATIONS, id).await
    }
}

/// Storage for financial worksheets (`planillas_financieras`).
///
/// Profit is not a column; callers derive it from the returned rows.
pub struct WorksheetStorage {
    pool: PgPool,
}

impl WorksheetStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: WorksheetInput) -> Result<FinancialWorksheet, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, FinancialWorksheet>(
            r#"
            INSERT INTO planillas_financieras (
                cedula, ingresos, gastos, inversiones, observaciones
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&input.owner_id)
        .bind(&input.income)
        .bind(&input.expenses)
        .bind(&input.investments)
        .bind(&input.observations)
        .fetch_one(&mut *tx)
        .await;

        let worksheet = match inserted {
            Ok(row) => row,
            Err(e) => {
                tracing::error!("Failed to insert worksheet: {}", e);
                rollback_after_failure(tx, "worksheet insert").await;
                return Err(AppError::DatabaseError(e));
            }
        };

        tx.commit().await?;
        tracing::info!("Worksheet {} stored for owner {}", worksheet.id, worksheet.owner_id);
        Ok(worksheet)
    }

    /// All worksheets of one owner, most recent date first.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FinancialWorksheet>, AppError> {
        let rows = sqlx::query_as::<_, FinancialWorksheet>(
            r#"
            SELECT * FROM planillas_financieras
            WHERE cedula = $1
            ORDER BY fecha DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn update(&self, id: i32, patch: WorksheetPatch) -> Result<FinancialWorksheet, AppError> {
        update_returning(&self.pool, &WORKSHEETS, id, patch).await
    }

    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        delete_by_id(&self.pool, &WORKSHEETS, id).await
    }
}

/// Storage for contact-form messages (`contactos`).
pub struct ContactStorage {
    pool: PgPool,
}

impl ContactStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: ContactMessageInput) -> Result<ContactMessage, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, ContactMessage>(
            r#"
            INSERT INTO contactos (
                nombres, apellidos, cedula, correo, celular, ubicacion, direccion, mensaje
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&input.first_names)
        .bind(&input.last_names)
        .bind(&input.national_id)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.location)
        .bind(&input.address)
        .bind(&input.message)
        .fetch_one(&mut *tx)
        .await;

        let contact = match inserted {
            Ok(row) => row,
            Err(e) => {
                tracing::error!("Failed to insert contact message: {}", e);
                rollback_after_failure(tx, "contact insert").await;
                return Err(AppError::DatabaseError(e));
            }
        };

        tx.commit().await?;
        tracing::info!("Contact message {} stored", contact.id);
        Ok(contact)
    }

    /// Every message, newest first.
    pub async fn list(&self) -> Result<Vec<ContactMessage>, AppError> {
        let rows = sqlx::query_as::<_, ContactMessage>(
            "SELECT * FROM contactos ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
