use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::env;
use std::str::FromStr;

use agro_finance_api::db::Database;
use agro_finance_api::db_storage::{ContactStorage, CreditStorage, WorksheetStorage};
use agro_finance_api::errors::AppError;
use agro_finance_api::models::{
    CreditSimulationInput, CreditSimulationPatch, NewContactMessage, WorksheetInput,
    WorksheetPatch, WorksheetView,
};

/// Integration tests against a real PostgreSQL database.
/// Marked ignored to avoid touching a live database by accident; set TEST_DATABASE_URL to run.
/// Run with `--test-threads=1`: each test re-applies the schema bootstrap.
async fn connect() -> anyhow::Result<Database> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    db.initialize_schema().await?;
    Ok(db)
}

/// Owner ids unique per run so repeated runs do not see each other's rows.
fn unique_cedula() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("9{:012}", nanos.rem_euclid(1_000_000_000_000))
}

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn sample_credit(cedula: &str) -> CreditSimulationInput {
    CreditSimulationInput {
        first_names: "Ana María".to_string(),
        last_names: "Rojas".to_string(),
        national_id: cedula.to_string(),
        age: 34,
        birth_date: NaiveDate::from_ymd_opt(1990, 3, 14).unwrap(),
        monthly_income: dec("1000"),
        monthly_expenses: dec("400"),
        asset_value: dec("2000"),
        land_size: "2 hectáreas".to_string(),
        credit_purpose: "Compra de semillas".to_string(),
        employee_count: 3,
    }
}

#[tokio::test]
#[ignore]
async fn credit_simulation_lifecycle() -> anyhow::Result<()> {
    let db = connect().await?;
    let storage = CreditStorage::new(db.pool.clone());
    let cedula = unique_cedula();

    let created = storage
        .create(sample_credit(&cedula))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    // (1000 - 400) * 6 + 2000 * 0.10
    assert_eq!(created.approved_amount, Some(dec("3800.00")));

    let updated = storage
        .update(
            created.id,
            CreditSimulationPatch {
                monthly_expenses: Some(dec("1500")),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    // Negative margin counts as zero capacity
    assert_eq!(updated.approved_amount, Some(dec("200.00")));
    assert_eq!(updated.first_names, created.first_names);
    assert_eq!(updated.monthly_income, created.monthly_income);
    assert_eq!(updated.age, created.age);

    let listed = storage
        .list_by_owner(&cedula)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);

    storage
        .delete(created.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let after = storage
        .list_by_owner(&cedula)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(after.is_empty());

    Ok(())
}

#[tokio::test]
#[ignore]
async fn unknown_ids_are_not_found() -> anyhow::Result<()> {
    let db = connect().await?;
    let credits = CreditStorage::new(db.pool.clone());
    let worksheets = WorksheetStorage::new(db.pool.clone());

    let update = credits
        .update(
            i32::MAX,
            CreditSimulationPatch {
                age: Some(40),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(update, Err(AppError::NotFound(_))));

    assert!(matches!(
        credits.delete(i32::MAX).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        worksheets.delete(i32::MAX).await,
        Err(AppError::NotFound(_))
    ));

    Ok(())
}

#[tokio::test]
#[ignore]
async fn worksheet_profit_and_partial_update() -> anyhow::Result<()> {
    let db = connect().await?;
    let storage = WorksheetStorage::new(db.pool.clone());
    let cedula = unique_cedula();

    let created = storage
        .create(WorksheetInput {
            owner_id: cedula.clone(),
            income: dec("5000"),
            expenses: dec("1200.50"),
            investments: dec("800"),
            observations: String::new(),
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(WorksheetView::from(created.clone()).profit, dec("2999.50"));

    let updated = storage
        .update(
            created.id,
            WorksheetPatch {
                observations: Some("Venta de café".to_string()),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(updated.observations.as_deref(), Some("Venta de café"));
    assert_eq!(updated.income, created.income);
    assert_eq!(updated.profit(), dec("2999.50"));

    storage
        .delete(created.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    Ok(())
}

#[tokio::test]
#[ignore]
async fn contact_message_defaults_optional_fields() -> anyhow::Result<()> {
    let db = connect().await?;
    let storage = ContactStorage::new(db.pool.clone());

    let input = NewContactMessage {
        first_names: Some("Luis".to_string()),
        email: Some("luis@example.com".to_string()),
        message: Some("Quiero información del crédito".to_string()),
        ..Default::default()
    }
    .validate()
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let stored = storage
        .create(input)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(stored.phone.as_deref(), Some(""));

    let all = storage
        .list()
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(all.iter().any(|c| c.id == stored.id));

    Ok(())
}
