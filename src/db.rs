use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};

/// Approved credit: six months of positive monthly margin plus 10% of declared assets.
const APPROVED_AMOUNT_FUNCTION: &str = r#"
CREATE OR REPLACE FUNCTION calcular_credito_aprobado(
    ingresos NUMERIC,
    gastos NUMERIC,
    patrimonio NUMERIC
) RETURNS NUMERIC AS $$
DECLARE
    capacidad NUMERIC;
    aprobado NUMERIC;
BEGIN
    capacidad := GREATEST(ingresos - gastos, 0);
    aprobado := capacidad * 6 + patrimonio * 0.10;
    RETURN ROUND(aprobado, 2);
END;
$$ LANGUAGE plpgsql;
"#;

const CREDIT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS simulaciones_credito (
    id SERIAL PRIMARY KEY,
    fecha TIMESTAMP WITHOUT TIME ZONE DEFAULT NOW(),
    nombres TEXT NOT NULL,
    apellidos TEXT NOT NULL,
    documento_identidad TEXT NOT NULL,
    edad INTEGER,
    fecha_nacimiento DATE,
    ingresos_mensuales NUMERIC DEFAULT 0,
    gastos_mensuales NUMERIC DEFAULT 0,
    valor_patrimonio NUMERIC DEFAULT 0,
    dimension_terreno TEXT,
    destinacion_credito TEXT,
    numero_empleados INTEGER DEFAULT 0,
    valor_aprobado NUMERIC,
    created_at TIMESTAMP WITHOUT TIME ZONE DEFAULT NOW(),
    updated_at TIMESTAMP WITHOUT TIME ZONE DEFAULT NOW()
)
"#;

// Runs on every insert and update, whichever columns changed.
const APPROVED_AMOUNT_TRIGGER_FUNCTION: &str = r#"
CREATE OR REPLACE FUNCTION actualizar_credito_aprobado_trigger()
RETURNS TRIGGER AS $$
BEGIN
    NEW.valor_aprobado := calcular_credito_aprobado(
        COALESCE(NEW.ingresos_mensuales, 0),
        COALESCE(NEW.gastos_mensuales, 0),
        COALESCE(NEW.valor_patrimonio, 0)
    );
    NEW.updated_at := NOW();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;
"#;

const DROP_APPROVED_AMOUNT_TRIGGER: &str =
    "DROP TRIGGER IF EXISTS trg_credito_aprobado ON simulaciones_credito";

const CREATE_APPROVED_AMOUNT_TRIGGER: &str = r#"
CREATE TRIGGER trg_credito_aprobado
BEFORE INSERT OR UPDATE ON simulaciones_credito
FOR EACH ROW
EXECUTE FUNCTION actualizar_credito_aprobado_trigger()
"#;

// No generated profit column: utilidad is derived in-process.
const WORKSHEET_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS planillas_financieras (
    id SERIAL PRIMARY KEY,
    cedula TEXT NOT NULL,
    fecha DATE DEFAULT CURRENT_DATE,
    ingresos NUMERIC DEFAULT 0,
    gastos NUMERIC DEFAULT 0,
    inversiones NUMERIC DEFAULT 0,
    observaciones TEXT,
    created_at TIMESTAMP WITHOUT TIME ZONE DEFAULT NOW(),
    updated_at TIMESTAMP WITHOUT TIME ZONE DEFAULT NOW()
)
"#;

const CONTACT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS contactos (
    id SERIAL PRIMARY KEY,
    nombres TEXT NOT NULL,
    apellidos TEXT,
    cedula TEXT,
    correo TEXT,
    celular TEXT,
    ubicacion TEXT,
    direccion TEXT,
    mensaje TEXT,
    created_at TIMESTAMP WITHOUT TIME ZONE DEFAULT NOW()
)
"#;

/// Schema statements in execution order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    APPROVED_AMOUNT_FUNCTION,
    CREDIT_TABLE,
    APPROVED_AMOUNT_TRIGGER_FUNCTION,
    DROP_APPROVED_AMOUNT_TRIGGER,
    CREATE_APPROVED_AMOUNT_TRIGGER,
    WORKSHEET_TABLE,
    CONTACT_TABLE,
];

/// Rolls back a transaction whose statement failed, logging (not returning) a rollback error
/// so the original failure is the one reported.
pub async fn rollback_after_failure(tx: Transaction<'_, Postgres>, operation: &str) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!("Rollback after failed {} also failed: {}", operation, e);
    }
}

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates the approved-amount function, the three tables and the credit trigger.
    ///
    /// Idempotent; everything runs in one transaction so a failure leaves the schema untouched.
    pub async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for statement in SCHEMA_STATEMENTS {
            if let Err(e) = sqlx::query(statement).execute(&mut *tx).await {
                tracing::error!("Schema initialization failed: {}", e);
                rollback_after_failure(tx, "schema initialization").await;
                return Err(e);
            }
        }

        tx.commit().await?;
        tracing::info!("Database schema initialization completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_is_recreated_after_its_function() {
        let function_pos = SCHEMA_STATEMENTS
            .iter()
            .position(|s| s.contains("FUNCTION actualizar_credito_aprobado_trigger()"))
            .unwrap();
        let drop_pos = SCHEMA_STATEMENTS
            .iter()
            .position(|s| s.starts_with("DROP TRIGGER"))
            .unwrap();
        let create_pos = SCHEMA_STATEMENTS
            .iter()
            .position(|s| s.contains("CREATE TRIGGER trg_credito_aprobado"))
            .unwrap();

        assert!(function_pos < drop_pos);
        assert!(drop_pos < create_pos);
    }

    #[test]
    fn test_approved_amount_formula() {
        let sql = APPROVED_AMOUNT_FUNCTION;

        // Negative margins count as zero capacity
        assert!(sql.contains("capacidad := GREATEST(ingresos - gastos, 0);"));
        // (1000 - 400) * 6 + 2000 * 0.10 = 3800.00
        assert!(sql.contains("aprobado := capacidad * 6 + patrimonio * 0.10;"));
        assert!(sql.contains("RETURN ROUND(aprobado, 2);"));
        assert!(sql.contains("RETURNS NUMERIC"));

        assert!(APPROVED_AMOUNT_TRIGGER_FUNCTION.contains("COALESCE(NEW.ingresos_mensuales, 0)"));
        assert!(APPROVED_AMOUNT_TRIGGER_FUNCTION.contains("COALESCE(NEW.gastos_mensuales, 0)"));
        assert!(APPROVED_AMOUNT_TRIGGER_FUNCTION.contains("COALESCE(NEW.valor_patrimonio, 0)"));
        assert!(CREATE_APPROVED_AMOUNT_TRIGGER.contains("BEFORE INSERT OR UPDATE"));
        assert_eq!(SCHEMA_STATEMENTS[0], APPROVED_AMOUNT_FUNCTION);
    }

    #[test]
    fn test_tables_are_idempotent() {
        for statement in SCHEMA_STATEMENTS.iter().filter(|s| s.contains("CREATE TABLE")) {
            assert!(statement.contains("IF NOT EXISTS"), "{}", statement);
        }
    }
}
