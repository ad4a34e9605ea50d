//! Creates the tables, the approved-amount function and its trigger, then exits.

use agro_finance_api::db::Database;
use dotenvy::dotenv;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let database_url = env::var("DATABASE_URL")
        .or_else(|_| env::var("DB_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    let db = Database::new(&database_url).await?;
    db.initialize_schema().await?;

    println!("Schema ready");
    Ok(())
}
