//! Sparse (partial) record updates.
//!
//! Each entity exposes a typed patch whose `Option` members are the only columns an update
//! may touch. The patch turns into an ordered list of assignments, which is rendered into a
//! single `UPDATE ... RETURNING *` statement and executed inside a transaction.

use crate::db::rollback_after_failure;
use crate::errors::AppError;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::{postgres::PgRow, FromRow, PgPool, Postgres, QueryBuilder};

/// A table the CRUD layer writes to, with the message used when an id has no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRef {
    pub name: &'static str,
    pub not_found: &'static str,
}

/// A value bound to one column of an update.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i32),
    Numeric(BigDecimal),
    Date(NaiveDate),
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<BigDecimal> for FieldValue {
    fn from(value: BigDecimal) -> Self {
        FieldValue::Numeric(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: &'static str,
    pub value: FieldValue,
}

/// Ordered collection of assignments; absent values are skipped.
#[derive(Debug, Default)]
pub struct Assignments(Vec<Assignment>);

impl Assignments {
    pub fn set<V: Into<FieldValue>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.0.push(Assignment {
                column,
                value: value.into(),
            });
        }
        self
    }

    pub fn into_vec(self) -> Vec<Assignment> {
        self.0
    }
}

/// A partial update restricted to an allow-list of columns.
pub trait Patch {
    /// Columns the patch may touch, in the order they appear in the statement.
    const ALLOWED: &'static [&'static str];

    /// Supplied fields only, in `ALLOWED` order.
    fn assignments(self) -> Vec<Assignment>;
}

/// Renders `UPDATE <table> SET c1 = $1, ... WHERE id = $n RETURNING *`.
///
/// Fails with [`AppError::NothingToUpdate`] when there is nothing to set.
pub fn build_update(
    table: &TableRef,
    id: i32,
    assignments: Vec<Assignment>,
) -> Result<QueryBuilder<'static, Postgres>, AppError> {
    if assignments.is_empty() {
        return Err(AppError::NothingToUpdate);
    }

    let mut query = QueryBuilder::<Postgres>::new(format!("UPDATE {} SET ", table.name));
    {
        let mut set = query.separated(", ");
        for Assignment { column, value } in assignments {
            set.push(column);
            set.push_unseparated(" = ");
            match value {
                FieldValue::Text(v) => set.push_bind_unseparated(v),
                FieldValue::Integer(v) => set.push_bind_unseparated(v),
                FieldValue::Numeric(v) => set.push_bind_unseparated(v),
                FieldValue::Date(v) => set.push_bind_unseparated(v),
            };
        }
    }
    query
        .push(" WHERE id = ")
        .push_bind(id)
        .push(" RETURNING *");

    Ok(query)
}

/// Applies `patch` to the row `id` of `table` and returns the row as stored afterwards.
///
/// An empty patch is rejected before any connection is acquired. A statement failure rolls
/// the transaction back explicitly; an unknown id leaves the table untouched.
pub async fn update_returning<T, P>(
    pool: &PgPool,
    table: &TableRef,
    id: i32,
    patch: P,
) -> Result<T, AppError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    P: Patch,
{
    let mut query = build_update(table, id, patch.assignments())?;
    tracing::debug!("Sparse update on {}: {}", table.name, query.sql());

    let mut tx = pool.begin().await?;

    let updated = match query.build_query_as::<T>().fetch_optional(&mut *tx).await {
        Ok(row) => row,
        Err(e) => {
            tracing::error!("Update of {} id={} failed: {}", table.name, id, e);
            rollback_after_failure(tx, "update").await;
            return Err(AppError::DatabaseError(e));
        }
    };

    match updated {
        Some(row) => {
            tx.commit().await?;
            tracing::info!("Updated {} id={}", table.name, id);
            Ok(row)
        }
        None => {
            tx.rollback().await?;
            Err(AppError::NotFound(table.not_found.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const SAMPLE: TableRef = TableRef {
        name: "planillas_financieras",
        not_found: "No encontrada",
    };

    struct SamplePatch {
        cedula: Option<String>,
        ingresos: Option<BigDecimal>,
        observaciones: Option<String>,
    }

    impl Patch for SamplePatch {
        const ALLOWED: &'static [&'static str] = &["cedula", "ingresos", "observaciones"];

        fn assignments(self) -> Vec<Assignment> {
            Assignments::default()
                .set("cedula", self.cedula)
                .set("ingresos", self.ingresos)
                .set("observaciones", self.observaciones)
                .into_vec()
        }
    }

    #[test]
    fn test_absent_fields_are_skipped() {
        let patch = SamplePatch {
            cedula: None,
            ingresos: Some(BigDecimal::from(1200)),
            observaciones: None,
        };

        let assignments = patch.assignments();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].column, "ingresos");
        assert_eq!(assignments[0].value, FieldValue::Numeric(BigDecimal::from(1200)));
    }

    #[test]
    fn test_build_update_renders_placeholders_in_order() {
        let patch = SamplePatch {
            cedula: Some("1020".into()),
            ingresos: None,
            observaciones: Some("cosecha de café".into()),
        };

        let query = build_update(&SAMPLE, 7, patch.assignments()).unwrap();
        assert_eq!(
            query.sql(),
            "UPDATE planillas_financieras SET cedula = $1, observaciones = $2 WHERE id = $3 RETURNING *"
        );
    }

    #[test]
    fn test_build_update_rejects_empty_patch() {
        let patch = SamplePatch {
            cedula: None,
            ingresos: None,
            observaciones: None,
        };

        let result = build_update(&SAMPLE, 1, patch.assignments());
        assert!(matches!(result, Err(AppError::NothingToUpdate)));
    }

    #[test]
    fn test_field_value_conversions() {
        assert_eq!(FieldValue::from(3), FieldValue::Integer(3));
        assert_eq!(
            FieldValue::from("x".to_string()),
            FieldValue::Text("x".to_string())
        );
        let date = NaiveDate::from_ymd_opt(1985, 3, 14).unwrap();
        assert_eq!(FieldValue::from(date), FieldValue::Date(date));
        let amount = BigDecimal::from_str("10.50").unwrap();
        assert_eq!(FieldValue::from(amount.clone()), FieldValue::Numeric(amount));
    }

    #[tokio::test]
    async fn test_empty_patch_never_touches_storage() {
        // Lazy pool pointing nowhere: any connection attempt would surface as DatabaseError.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap();

        for id in [1, 999_999] {
            let patch = SamplePatch {
                cedula: None,
                ingresos: None,
                observaciones: None,
            };
            let result: Result<crate::models::FinancialWorksheet, _> =
                update_returning(&pool, &SAMPLE, id, patch).await;
            assert!(matches!(result, Err(AppError::NothingToUpdate)));
        }
    }
}
