//! Input schemas for every write operation and the rules they declare.
//!
//! Forms deserialize with every field optional, and typed investment fields
//! arrive as raw JSON values, so a missing or malformed value becomes a field
//! error instead of a body rejection.

use std::str::FromStr;
use std::sync::LazyLock;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::FieldErrors;
use crate::models::{CreateClient, CreateInvestment, UpdateClient, UpdateInvestment};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

// Plain decimal notation only; exponents would let a short input expand to an
// arbitrarily large scale.
static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)$").expect("decimal pattern compiles")
});

pub const MAX_TEXT: usize = 255;

/// Fractional digits an amount may carry (`NUMERIC(15,2)`).
pub const AMOUNT_SCALE: i64 = 2;
/// Integer digits an amount may carry (`NUMERIC(15,2)`).
pub const AMOUNT_INTEGER_DIGITS: usize = 13;

const AMOUNT_TOO_PRECISE: &str = "O valor do investimento deve ter no máximo duas casas decimais.";
const AMOUNT_TOO_LARGE: &str = "O valor do investimento excede o limite permitido.";

#[derive(Debug, Clone, Copy)]
pub enum TextRule {
    Required,
    MaxLen(usize),
    MinLen(usize),
    Email,
}

/// Applies `rules` in order, stopping at the first failure. An absent
/// optional value skips everything but `Required`.
pub fn check_text(errors: &mut FieldErrors, field: &str, value: Option<&str>, rules: &[TextRule]) {
    let value = value.map(str::trim);
    for rule in rules {
        let failure = match (rule, value) {
            (TextRule::Required, None) => Some(format!("O campo {} é obrigatório.", field)),
            (TextRule::Required, Some(v)) if v.is_empty() => {
                Some(format!("O campo {} é obrigatório.", field))
            }
            (_, None) => None,
            (TextRule::Required, Some(_)) => None,
            (TextRule::MaxLen(max), Some(v)) if v.chars().count() > *max => Some(format!(
                "O campo {} não pode ter mais de {} caracteres.",
                field, max
            )),
            (TextRule::MinLen(min), Some(v)) if v.chars().count() < *min => Some(format!(
                "O campo {} deve ter pelo menos {} caracteres.",
                field, min
            )),
            (TextRule::Email, Some(v)) if !EMAIL_RE.is_match(v) => Some(format!(
                "O campo {} deve ser um endereço de e-mail válido.",
                field
            )),
            _ => None,
        };
        if let Some(message) = failure {
            errors.add(field, message);
            return;
        }
    }
}

pub fn check_required<T>(errors: &mut FieldErrors, field: &str, value: &Option<T>) {
    if value.is_none() {
        errors.add(field, format!("O campo {} é obrigatório.", field));
    }
}

/// A raw form value with JSON `null` and blank strings treated as absent.
fn present(value: &Option<Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(other) => Some(other),
    }
}

/// Parses an identifier field. Absent yields `None` without an error.
pub fn parse_uuid(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<Value>,
) -> Option<Uuid> {
    let value = present(value)?;
    match value.as_str().map(|s| Uuid::parse_str(s.trim())) {
        Some(Ok(id)) => Some(id),
        _ => {
            errors.add(field, format!("O campo {} selecionado é inválido.", field));
            None
        }
    }
}

/// Parses a monetary amount given as a JSON number or a decimal string,
/// rejecting anything finer than cents or wider than the column.
pub fn parse_amount(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<Value>,
) -> Option<BigDecimal> {
    let text = match present(value)? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => String::new(),
    };
    if !DECIMAL_RE.is_match(&text) {
        errors.add(field, format!("O campo {} deve ser um número.", field));
        return None;
    }

    let unsigned = text.trim_start_matches(['+', '-']);
    let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if fraction.len() > AMOUNT_SCALE as usize {
        errors.add(field, AMOUNT_TOO_PRECISE);
        return None;
    }
    if integer.trim_start_matches('0').len() > AMOUNT_INTEGER_DIGITS {
        errors.add(field, AMOUNT_TOO_LARGE);
        return None;
    }

    match BigDecimal::from_str(&text) {
        Ok(amount) => Some(amount),
        Err(_) => {
            errors.add(field, format!("O campo {} deve ser um número.", field));
            None
        }
    }
}

/// Parses a calendar date. A date-time keeps only its date part as written.
pub fn parse_date(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<Value>,
) -> Option<NaiveDate> {
    let value = present(value)?;
    let parsed = value.as_str().map(str::trim).and_then(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                    .ok()
                    .map(|dt| dt.date())
            })
    });
    if parsed.is_none() {
        errors.add(field, format!("O campo {} deve ser uma data válida.", field));
    }
    parsed
}

/// Lower bound an investment amount must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountFloor {
    /// New contributions: at least one currency unit.
    Contribution,
    /// Corrections to an existing contribution: not negative.
    Adjustment,
}

impl AmountFloor {
    pub fn minimum(self) -> BigDecimal {
        match self {
            AmountFloor::Contribution => BigDecimal::from(1),
            AmountFloor::Adjustment => BigDecimal::from(0),
        }
    }

    fn message(self) -> &'static str {
        match self {
            AmountFloor::Contribution => "O valor do investimento deve ser no mínimo R$ 1,00.",
            AmountFloor::Adjustment => "O valor do investimento não pode ser negativo.",
        }
    }
}

/// Amount and date rules shared by investment creation and update, at the
/// form boundary and again in the service. Precision is checked on the scale
/// before any comparison.
pub fn check_contribution(
    amount: Option<&BigDecimal>,
    floor: AmountFloor,
    investment_date: Option<NaiveDate>,
    today: NaiveDate,
) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if let Some(amount) = amount {
        let (_, scale) = amount.as_bigint_and_exponent();
        if scale > AMOUNT_SCALE {
            errors.add("amount", AMOUNT_TOO_PRECISE);
        } else if amount.abs() >= amount_ceiling() {
            errors.add("amount", AMOUNT_TOO_LARGE);
        } else if *amount < floor.minimum() {
            errors.add("amount", floor.message());
        }
    }
    if let Some(date) = investment_date {
        if date > today {
            errors.add("investment_date", "A data do investimento não pode ser futura.");
        }
    }
    errors
}

fn amount_ceiling() -> BigDecimal {
    BigDecimal::from(10_000_000_000_000_i64)
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreClientForm {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl StoreClientForm {
    pub fn validate(self, user_id: Uuid) -> Result<CreateClient, FieldErrors> {
        let mut errors = FieldErrors::new();
        check_text(
            &mut errors,
            "name",
            self.name.as_deref(),
            &[TextRule::Required, TextRule::MaxLen(MAX_TEXT)],
        );
        check_text(
            &mut errors,
            "email",
            self.email.as_deref(),
            &[TextRule::Required, TextRule::Email, TextRule::MaxLen(MAX_TEXT)],
        );
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(CreateClient {
            user_id: Some(user_id),
            name: trimmed(self.name).unwrap_or_default(),
            email: trimmed(self.email),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateClientForm {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UpdateClientForm {
    pub fn validate(self) -> Result<UpdateClient, FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.name.is_some() {
            check_text(
                &mut errors,
                "name",
                self.name.as_deref(),
                &[TextRule::Required, TextRule::MaxLen(MAX_TEXT)],
            );
        }
        if self.email.is_some() {
            check_text(
                &mut errors,
                "email",
                self.email.as_deref(),
                &[TextRule::Required, TextRule::Email, TextRule::MaxLen(MAX_TEXT)],
            );
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(UpdateClient {
            name: trimmed(self.name),
            email: trimmed(self.email),
        })
    }
}

/// Typed fields kept as submitted so the raw input can be echoed back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreInvestmentForm {
    pub client_id: Option<Value>,
    pub asset_id: Option<Value>,
    pub amount: Option<Value>,
    pub investment_date: Option<Value>,
}

impl StoreInvestmentForm {
    /// Referenced ids that parse, for existence and ownership lookups.
    pub fn references(&self) -> (Option<Uuid>, Option<Uuid>) {
        let mut ignored = FieldErrors::new();
        (
            parse_uuid(&mut ignored, "client_id", &self.client_id),
            parse_uuid(&mut ignored, "asset_id", &self.asset_id),
        )
    }

    pub fn validate(self, today: NaiveDate) -> Result<CreateInvestment, FieldErrors> {
        let mut errors = FieldErrors::new();
        let client_id = parse_uuid(&mut errors, "client_id", &self.client_id);
        let asset_id = parse_uuid(&mut errors, "asset_id", &self.asset_id);
        let amount = parse_amount(&mut errors, "amount", &self.amount);
        let investment_date = parse_date(&mut errors, "investment_date", &self.investment_date);

        check_required(&mut errors, "client_id", &client_id);
        check_required(&mut errors, "asset_id", &asset_id);
        check_required(&mut errors, "amount", &amount);
        check_required(&mut errors, "investment_date", &investment_date);
        errors.merge(check_contribution(
            amount.as_ref(),
            AmountFloor::Contribution,
            investment_date,
            today,
        ));

        match (client_id, asset_id, amount, investment_date) {
            (Some(client_id), Some(asset_id), Some(amount), Some(investment_date))
                if errors.is_empty() =>
            {
                Ok(CreateInvestment {
                    client_id,
                    asset_id,
                    amount,
                    investment_date,
                })
            }
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateInvestmentForm {
    pub client_id: Option<Value>,
    pub asset_id: Option<Value>,
    pub amount: Option<Value>,
    pub investment_date: Option<Value>,
}

impl UpdateInvestmentForm {
    pub fn references(&self) -> (Option<Uuid>, Option<Uuid>) {
        let mut ignored = FieldErrors::new();
        (
            parse_uuid(&mut ignored, "client_id", &self.client_id),
            parse_uuid(&mut ignored, "asset_id", &self.asset_id),
        )
    }

    pub fn validate(self, today: NaiveDate) -> Result<UpdateInvestment, FieldErrors> {
        let mut errors = FieldErrors::new();
        let client_id = parse_uuid(&mut errors, "client_id", &self.client_id);
        let asset_id = parse_uuid(&mut errors, "asset_id", &self.asset_id);
        let amount = parse_amount(&mut errors, "amount", &self.amount);
        let investment_date = parse_date(&mut errors, "investment_date", &self.investment_date);
        errors.merge(check_contribution(
            amount.as_ref(),
            AmountFloor::Adjustment,
            investment_date,
            today,
        ));
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(UpdateInvestment {
            client_id,
            asset_id,
            amount,
            investment_date,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterForm {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_text(
            &mut errors,
            "name",
            self.name.as_deref(),
            &[TextRule::Required, TextRule::MaxLen(MAX_TEXT)],
        );
        check_text(
            &mut errors,
            "email",
            self.email.as_deref(),
            &[TextRule::Required, TextRule::Email, TextRule::MaxLen(MAX_TEXT)],
        );
        check_text(
            &mut errors,
            "password",
            self.password.as_deref(),
            &[TextRule::Required, TextRule::MinLen(8), TextRule::MaxLen(MAX_TEXT)],
        );
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginForm {
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn test_client_form_requires_name_and_email() {
        let errors = StoreClientForm::default().validate(Uuid::new_v4()).unwrap_err();
        assert_eq!(errors.get("name"), Some("O campo name é obrigatório."));
        assert_eq!(errors.get("email"), Some("O campo email é obrigatório."));
    }

    #[test]
    fn test_client_form_rejects_invalid_email() {
        let form = StoreClientForm {
            name: Some("Ana Costa".into()),
            email: Some("not-an-email".into()),
        };
        let errors = form.validate(Uuid::new_v4()).unwrap_err();
        assert!(errors.has("email"));
        assert!(!errors.has("name"));
    }

    #[test]
    fn test_client_form_enforces_max_length() {
        let form = StoreClientForm {
            name: Some("a".repeat(256)),
            email: Some(format!("{}@x.com", "a".repeat(250))),
        };
        let errors = form.validate(Uuid::new_v4()).unwrap_err();
        assert!(errors.has("name"));
        assert!(errors.has("email"));

        let form = StoreClientForm {
            name: Some("a".repeat(255)),
            email: Some("ana@x.com".into()),
        };
        assert!(form.validate(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_client_form_trims_and_sets_owner() {
        let owner = Uuid::new_v4();
        let form = StoreClientForm {
            name: Some("  Ana Costa ".into()),
            email: Some(" ana@x.com".into()),
        };
        let client = form.validate(owner).unwrap();
        assert_eq!(client.user_id, Some(owner));
        assert_eq!(client.name, "Ana Costa");
        assert_eq!(client.email.as_deref(), Some("ana@x.com"));
    }

    #[test]
    fn test_partial_client_update_only_checks_present_fields() {
        let update = UpdateClientForm {
            name: None,
            email: Some("novo@x.com".into()),
        }
        .validate()
        .unwrap();
        assert!(update.name.is_none());

        let errors = UpdateClientForm {
            name: Some("   ".into()),
            email: None,
        }
        .validate()
        .unwrap_err();
        assert!(errors.has("name"));
    }

    #[test]
    fn test_investment_form_reports_every_missing_field() {
        let errors = StoreInvestmentForm::default().validate(today()).unwrap_err();
        for field in ["client_id", "asset_id", "amount", "investment_date"] {
            assert!(errors.has(field), "missing error for {}", field);
        }
    }

    fn store_form(amount: Value, investment_date: &str) -> StoreInvestmentForm {
        StoreInvestmentForm {
            client_id: Some(json!(Uuid::new_v4())),
            asset_id: Some(json!(Uuid::new_v4())),
            amount: Some(amount),
            investment_date: Some(json!(investment_date)),
        }
    }

    #[test]
    fn test_investment_form_applies_contribution_rules() {
        let errors = store_form(json!("0.99"), "2025-03-15")
            .validate(today())
            .unwrap_err();
        assert_eq!(
            errors.get("amount"),
            Some("O valor do investimento deve ser no mínimo R$ 1,00.")
        );
        assert_eq!(
            errors.get("investment_date"),
            Some("A data do investimento não pode ser futura.")
        );
    }

    #[test]
    fn test_investment_form_parses_numbers_and_strings() {
        let input = store_form(json!(1500.5), "2025-03-14").validate(today()).unwrap();
        assert_eq!(input.amount, BigDecimal::from_str("1500.5").unwrap());

        let input = store_form(json!(" 1500.50 "), "2025-03-14").validate(today()).unwrap();
        assert_eq!(input.amount, BigDecimal::from_str("1500.50").unwrap());
        assert_eq!(input.investment_date, today());
    }

    #[rstest]
    #[case(json!("abc"), "O campo amount deve ser um número.")]
    #[case(json!("1e-2000000"), "O campo amount deve ser um número.")]
    #[case(json!(true), "O campo amount deve ser um número.")]
    #[case(json!("1.005"), "O valor do investimento deve ter no máximo duas casas decimais.")]
    #[case(json!(1.005), "O valor do investimento deve ter no máximo duas casas decimais.")]
    #[case(json!("12345678901234"), "O valor do investimento excede o limite permitido.")]
    #[case(json!("0.5"), "O valor do investimento deve ser no mínimo R$ 1,00.")]
    fn test_investment_form_rejects_bad_amounts(#[case] amount: Value, #[case] message: &str) {
        let errors = store_form(amount, "2025-03-14").validate(today()).unwrap_err();
        assert_eq!(errors.get("amount"), Some(message));
    }

    #[test]
    fn test_amount_limit_ignores_leading_zeros() {
        let input = store_form(json!("0009999999999999.99"), "2025-03-14")
            .validate(today())
            .unwrap();
        assert_eq!(input.amount, BigDecimal::from_str("9999999999999.99").unwrap());
    }

    #[rstest]
    #[case("2025-03-14", true)]
    #[case("2025-03-14T10:00:00", true)]
    #[case("2025-03-14 10:00:00", true)]
    #[case("2025-03-14T10:00:00-03:00", true)]
    #[case("14/03/2025", false)]
    #[case("2025-02-30", false)]
    fn test_investment_date_formats(#[case] date: &str, #[case] accepted: bool) {
        let result = store_form(json!("100"), date).validate(today());
        match result {
            Ok(input) => {
                assert!(accepted, "{} should be rejected", date);
                assert_eq!(input.investment_date, today());
            }
            Err(errors) => {
                assert!(!accepted, "{} should be accepted", date);
                assert_eq!(
                    errors.get("investment_date"),
                    Some("O campo investment_date deve ser uma data válida.")
                );
            }
        }
    }

    #[test]
    fn test_malformed_ids_are_invalid_selections() {
        let form = StoreInvestmentForm {
            client_id: Some(json!("not-a-uuid")),
            asset_id: Some(json!(42)),
            ..store_form(json!("100"), "2025-03-14")
        };
        assert_eq!(form.references(), (None, None));

        let errors = form.validate(today()).unwrap_err();
        assert_eq!(errors.get("client_id"), Some("O campo client_id selecionado é inválido."));
        assert_eq!(errors.get("asset_id"), Some("O campo asset_id selecionado é inválido."));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let form = StoreInvestmentForm {
            client_id: Some(Value::Null),
            asset_id: Some(json!("  ")),
            amount: Some(json!("")),
            investment_date: None,
        };
        let errors = form.validate(today()).unwrap_err();
        assert_eq!(errors.get("asset_id"), Some("O campo asset_id é obrigatório."));
        assert_eq!(errors.get("amount"), Some("O campo amount é obrigatório."));
    }

    #[test]
    fn test_update_form_allows_zero_but_not_negative() {
        let zero = UpdateInvestmentForm {
            amount: Some(json!(0)),
            ..Default::default()
        };
        assert!(zero.validate(today()).is_ok());

        let negative = UpdateInvestmentForm {
            amount: Some(json!("-0.01")),
            ..Default::default()
        };
        assert!(negative.validate(today()).unwrap_err().has("amount"));
    }

    #[test]
    fn test_contribution_checks_precision_before_floor() {
        let fine = BigDecimal::from_str("0.001").unwrap();
        let errors = check_contribution(Some(&fine), AmountFloor::Adjustment, None, today());
        assert_eq!(
            errors.get("amount"),
            Some("O valor do investimento deve ter no máximo duas casas decimais.")
        );

        let huge = BigDecimal::from_str("1e20").unwrap();
        let errors = check_contribution(Some(&huge), AmountFloor::Contribution, None, today());
        assert_eq!(
            errors.get("amount"),
            Some("O valor do investimento excede o limite permitido.")
        );
    }

    #[test]
    fn test_register_form_requires_long_password() {
        let form = RegisterForm {
            name: Some("Consultor".into()),
            email: Some("consultor@x.com".into()),
            password: Some("short".into()),
        };
        assert!(form.validate().unwrap_err().has("password"));
    }
}
