use crate::errors::AppError;
use crate::sparse_update::{Assignment, Assignments, Patch};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============ Validation helpers ============

/// Unwraps a required payload member, naming it in the error when absent.
pub fn require<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::BadRequest(format!("Falta campo {}", field)))
}

/// Like [`require`], but blank strings count as missing.
pub fn require_text(value: Option<String>, field: &str) -> Result<String, AppError> {
    require(value.filter(|v| !v.trim().is_empty()), field)
}

fn zero_if_null(value: &Option<BigDecimal>) -> BigDecimal {
    value.clone().unwrap_or_else(|| BigDecimal::from(0))
}

/// Reads NUMERIC request members from JSON numbers or numeric strings.
///
/// Fractional JSON numbers go through their shortest decimal form, so `1000.1` is stored as
/// `1000.1` and not as the exact binary expansion of the float.
mod amount {
    use bigdecimal::BigDecimal;
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;
    use std::str::FromStr;

    struct AmountVisitor;

    fn parse<E: de::Error>(text: &str) -> Result<Option<BigDecimal>, E> {
        BigDecimal::from_str(text.trim())
            .map(Some)
            .map_err(|_| E::custom(format!("invalid amount: {}", text)))
    }

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = Option<BigDecimal>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number or a numeric string")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
            deserializer.deserialize_any(AmountVisitor)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(BigDecimal::from(v)))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(BigDecimal::from(v)))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            if !v.is_finite() {
                return Err(E::custom("amount must be finite"));
            }
            // Display prints the shortest string that round-trips to `v`
            parse(&v.to_string())
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            parse(v)
        }
    }

    pub fn optional<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<BigDecimal>, D::Error> {
        deserializer.deserialize_option(AmountVisitor)
    }
}

// ============ Credit simulations ============

/// A credit simulation request as stored in `simulaciones_credito`.
///
/// `approved_amount` is maintained by the `trg_credito_aprobado` trigger on every insert and
/// update; it is never written by this service.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CreditSimulation {
    pub id: i32,
    #[sqlx(rename = "fecha")]
    #[serde(rename = "fecha")]
    pub requested_at: Option<NaiveDateTime>,
    #[sqlx(rename = "nombres")]
    #[serde(rename = "nombres")]
    pub first_names: String,
    #[sqlx(rename = "apellidos")]
    #[serde(rename = "apellidos")]
    pub last_names: String,
    #[sqlx(rename = "documento_identidad")]
    #[serde(rename = "documento_identidad")]
    pub national_id: String,
    #[sqlx(rename = "edad")]
    #[serde(rename = "edad")]
    pub age: Option<i32>,
    #[sqlx(rename = "fecha_nacimiento")]
    #[serde(rename = "fecha_nacimiento")]
    pub birth_date: Option<NaiveDate>,
    #[sqlx(rename = "ingresos_mensuales")]
    #[serde(rename = "ingresos_mensuales")]
    pub monthly_income: Option<BigDecimal>,
    #[sqlx(rename = "gastos_mensuales")]
    #[serde(rename = "gastos_mensuales")]
    pub monthly_expenses: Option<BigDecimal>,
    #[sqlx(rename = "valor_patrimonio")]
    #[serde(rename = "valor_patrimonio")]
    pub asset_value: Option<BigDecimal>,
    #[sqlx(rename = "dimension_terreno")]
    #[serde(rename = "dimension_terreno")]
    pub land_size: Option<String>,
    #[sqlx(rename = "destinacion_credito")]
    #[serde(rename = "destinacion_credito")]
    pub credit_purpose: Option<String>,
    #[sqlx(rename = "numero_empleados")]
    #[serde(rename = "numero_empleados")]
    pub employee_count: Option<i32>,
    #[sqlx(rename = "valor_aprobado")]
    #[serde(rename = "valor_aprobado")]
    pub approved_amount: Option<BigDecimal>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Body of `POST /api/credito`. Every member is required; see [`NewCreditSimulation::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCreditSimulation {
    #[serde(rename = "nombres")]
    pub first_names: Option<String>,
    #[serde(rename = "apellidos")]
    pub last_names: Option<String>,
    #[serde(rename = "documento_identidad")]
    pub national_id: Option<String>,
    #[serde(rename = "edad")]
    pub age: Option<i32>,
    #[serde(rename = "fecha_nacimiento")]
    pub birth_date: Option<NaiveDate>,
    #[serde(rename = "ingresos_mensuales", default, deserialize_with = "amount::optional")]
    pub monthly_income: Option<BigDecimal>,
    #[serde(rename = "gastos_mensuales", default, deserialize_with = "amount::optional")]
    pub monthly_expenses: Option<BigDecimal>,
    #[serde(rename = "valor_patrimonio", default, deserialize_with = "amount::optional")]
    pub asset_value: Option<BigDecimal>,
    #[serde(rename = "dimension_terreno")]
    pub land_size: Option<String>,
    #[serde(rename = "destinacion_credito")]
    pub credit_purpose: Option<String>,
    #[serde(rename = "numero_empleados")]
    pub employee_count: Option<i32>,
}

/// A credit simulation with every required field present.
#[derive(Debug, Clone)]
pub struct CreditSimulationInput {
    pub first_names: String,
    pub last_names: String,
    pub national_id: String,
    pub age: i32,
    pub birth_date: NaiveDate,
    pub monthly_income: BigDecimal,
    pub monthly_expenses: BigDecimal,
    pub asset_value: BigDecimal,
    pub land_size: String,
    pub credit_purpose: String,
    pub employee_count: i32,
}

impl NewCreditSimulation {
    /// Checks presence in the order the form lists the fields; the first gap is reported.
    pub fn validate(self) -> Result<CreditSimulationInput, AppError> {
        Ok(CreditSimulationInput {
            first_names: require_text(self.first_names, "nombres")?,
            last_names: require_text(self.last_names, "apellidos")?,
            national_id: require_text(self.national_id, "documento_identidad")?,
            age: require(self.age, "edad")?,
            birth_date: require(self.birth_date, "fecha_nacimiento")?,
            monthly_income: require(self.monthly_income, "ingresos_mensuales")?,
            monthly_expenses: require(self.monthly_expenses, "gastos_mensuales")?,
            asset_value: require(self.asset_value, "valor_patrimonio")?,
            land_size: require_text(self.land_size, "dimension_terreno")?,
            credit_purpose: require_text(self.credit_purpose, "destinacion_credito")?,
            employee_count: require(self.employee_count, "numero_empleados")?,
        })
    }
}

/// Body of `PUT /api/credito/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreditSimulationPatch {
    #[serde(rename = "nombres")]
    pub first_names: Option<String>,
    #[serde(rename = "apellidos")]
    pub last_names: Option<String>,
    #[serde(rename = "documento_identidad")]
    pub national_id: Option<String>,
    #[serde(rename = "edad")]
    pub age: Option<i32>,
    #[serde(rename = "fecha_nacimiento")]
    pub birth_date: Option<NaiveDate>,
    #[serde(rename = "ingresos_mensuales", default, deserialize_with = "amount::optional")]
    pub monthly_income: Option<BigDecimal>,
    #[serde(rename = "gastos_mensuales", default, deserialize_with = "amount::optional")]
    pub monthly_expenses: Option<BigDecimal>,
    #[serde(rename = "valor_patrimonio", default, deserialize_with = "amount::optional")]
    pub asset_value: Option<BigDecimal>,
    #[serde(rename = "dimension_terreno")]
    pub land_size: Option<String>,
    #[serde(rename = "destinacion_credito")]
    pub credit_purpose: Option<String>,
    #[serde(rename = "numero_empleados")]
    pub employee_count: Option<i32>,
}

impl Patch for CreditSimulationPatch {
    const ALLOWED: &'static [&'static str] = &[
        "nombres",
        "apellidos",
        "documento_identidad",
        "edad",
        "fecha_nacimiento",
        "ingresos_mensuales",
        "gastos_mensuales",
        "valor_patrimonio",
        "dimension_terreno",
        "destinacion_credito",
        "numero_empleados",
    ];

    fn assignments(self) -> Vec<Assignment> {
        Assignments::default()
            .set("nombres", self.first_names)
            .set("apellidos", self.last_names)
            .set("documento_identidad", self.national_id)
            .set("edad", self.age)
            .set("fecha_nacimiento", self.birth_date)
            .set("ingresos_mensuales", self.monthly_income)
            .set("gastos_mensuales", self.monthly_expenses)
            .set("valor_patrimonio", self.asset_value)
            .set("dimension_terreno", self.land_size)
            .set("destinacion_credito", self.credit_purpose)
            .set("numero_empleados", self.employee_count)
            .into_vec()
    }
}

// ============ Financial worksheets ============

/// A financial worksheet row from `planillas_financieras`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FinancialWorksheet {
    pub id: i32,
    #[sqlx(rename = "cedula")]
    #[serde(rename = "cedula")]
    pub owner_id: String,
    #[sqlx(rename = "fecha")]
    #[serde(rename = "fecha")]
    pub date: Option<NaiveDate>,
    #[sqlx(rename = "ingresos")]
    #[serde(rename = "ingresos")]
    pub income: Option<BigDecimal>,
    #[sqlx(rename = "gastos")]
    #[serde(rename = "gastos")]
    pub expenses: Option<BigDecimal>,
    #[sqlx(rename = "inversiones")]
    #[serde(rename = "inversiones")]
    pub investments: Option<BigDecimal>,
    #[sqlx(rename = "observaciones")]
    #[serde(rename = "observaciones")]
    pub observations: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl FinancialWorksheet {
    /// `income - expenses - investments`, with missing amounts counted as zero.
    pub fn profit(&self) -> BigDecimal {
        zero_if_null(&self.income) - zero_if_null(&self.expenses) - zero_if_null(&self.investments)
    }
}

/// A worksheet as returned by the API: the stored row plus its derived profit.
#[derive(Debug, Clone, Serialize)]
pub struct WorksheetView {
    #[serde(flatten)]
    pub worksheet: FinancialWorksheet,
    #[serde(rename = "utilidad")]
    pub profit: BigDecimal,
}

impl From<FinancialWorksheet> for WorksheetView {
    fn from(worksheet: FinancialWorksheet) -> Self {
        let profit = worksheet.profit();
        Self { worksheet, profit }
    }
}

/// Body of `POST /api/planilla`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewWorksheet {
    #[serde(rename = "cedula")]
    pub owner_id: Option<String>,
    #[serde(rename = "ingresos", default, deserialize_with = "amount::optional")]
    pub income: Option<BigDecimal>,
    #[serde(rename = "gastos", default, deserialize_with = "amount::optional")]
    pub expenses: Option<BigDecimal>,
    #[serde(rename = "inversiones", default, deserialize_with = "amount::optional")]
    pub investments: Option<BigDecimal>,
    #[serde(rename = "observaciones")]
    pub observations: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorksheetInput {
    pub owner_id: String,
    pub income: BigDecimal,
    pub expenses: BigDecimal,
    pub investments: BigDecimal,
    pub observations: String,
}

impl NewWorksheet {
    pub fn validate(self) -> Result<WorksheetInput, AppError> {
        Ok(WorksheetInput {
            owner_id: require_text(self.owner_id, "cedula")?,
            income: require(self.income, "ingresos")?,
            expenses: require(self.expenses, "gastos")?,
            investments: require(self.investments, "inversiones")?,
            observations: self.observations.unwrap_or_default(),
        })
    }
}

/// Body of `PUT /api/planilla/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorksheetPatch {
    #[serde(rename = "cedula")]
    pub owner_id: Option<String>,
    #[serde(rename = "ingresos", default, deserialize_with = "amount::optional")]
    pub income: Option<BigDecimal>,
    #[serde(rename = "gastos", default, deserialize_with = "amount::optional")]
    pub expenses: Option<BigDecimal>,
    #[serde(rename = "inversiones", default, deserialize_with = "amount::optional")]
    pub investments: Option<BigDecimal>,
    #[serde(rename = "observaciones")]
    pub observations: Option<String>,
}

impl Patch for WorksheetPatch {
    const ALLOWED: &'static [&'static str] =
        &["cedula", "ingresos", "gastos", "inversiones", "observaciones"];

    fn assignments(self) -> Vec<Assignment> {
        Assignments::default()
            .set("cedula", self.owner_id)
            .set("ingresos", self.income)
            .set("gastos", self.expenses)
            .set("inversiones", self.investments)
            .set("observaciones", self.observations)
            .into_vec()
    }
}

// ============ Contact messages ============

/// A message left through the contact form (`contactos`). Create and list only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: i32,
    #[sqlx(rename = "nombres")]
    #[serde(rename = "nombres")]
    pub first_names: String,
    #[sqlx(rename = "apellidos")]
    #[serde(rename = "apellidos")]
    pub last_names: Option<String>,
    #[sqlx(rename = "cedula")]
    #[serde(rename = "cedula")]
    pub national_id: Option<String>,
    #[sqlx(rename = "correo")]
    #[serde(rename = "correo")]
    pub email: Option<String>,
    #[sqlx(rename = "celular")]
    #[serde(rename = "celular")]
    pub phone: Option<String>,
    #[sqlx(rename = "ubicacion")]
    #[serde(rename = "ubicacion")]
    pub location: Option<String>,
    #[sqlx(rename = "direccion")]
    #[serde(rename = "direccion")]
    pub address: Option<String>,
    #[sqlx(rename = "mensaje")]
    #[serde(rename = "mensaje")]
    pub message: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

/// Body of `POST /api/contacto`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewContactMessage {
    #[serde(rename = "nombres")]
    pub first_names: Option<String>,
    #[serde(rename = "apellidos")]
    pub last_names: Option<String>,
    #[serde(rename = "cedula")]
    pub national_id: Option<String>,
    #[serde(rename = "correo")]
    pub email: Option<String>,
    #[serde(rename = "celular")]
    pub phone: Option<String>,
    #[serde(rename = "ubicacion")]
    pub location: Option<String>,
    #[serde(rename = "direccion")]
    pub address: Option<String>,
    #[serde(rename = "mensaje")]
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ContactMessageInput {
    pub first_names: String,
    pub last_names: String,
    pub national_id: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub address: String,
    pub message: String,
}

impl NewContactMessage {
    /// Name, email and message are required; the rest default to empty strings.
    pub fn validate(self) -> Result<ContactMessageInput, AppError> {
        Ok(ContactMessageInput {
            first_names: require_text(self.first_names, "nombres")?,
            email: require_text(self.email, "correo")?,
            message: require_text(self.message, "mensaje")?,
            last_names: self.last_names.unwrap_or_default(),
            national_id: self.national_id.unwrap_or_default(),
            phone: self.phone.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            address: self.address.unwrap_or_default(),
        })
    }
}

// ============ Query / response shapes ============

/// `?cedula=` filter shared by the list-by-owner endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwnerQuery {
    pub cedula: Option<String>,
}

impl OwnerQuery {
    pub fn require_owner(self) -> Result<String, AppError> {
        self.cedula
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Se requiere parámetro 'cedula'".to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub mensaje: String,
}

/// Today's advice as served by `GET /api/consejo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceResponse {
    pub fecha: NaiveDate,
    pub consejo: String,
}
