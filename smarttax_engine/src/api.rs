//! HTTP API for the SmartTax engine.
//!
//! This module exposes a small REST API around the computation engine
//! using the [`axum`](https://crates.io/crates/axum) framework.  Clients
//! post already-parsed salary and capital-gains figures and receive the
//! itemised tax result in JSON, wrapped in a `{ "success": …, "data": … }`
//! envelope.  Document parsing, authentication and persistence live
//! elsewhere.

use crate::config::ServerConfig;
use crate::engine::{compute_batch, compute_tax};
use crate::error::InputError;
use crate::format::{format_inr, Settlement};
use crate::models::{TaxCalculationRequest, TaxInput, TaxResult};
use crate::tax::{rate_table_registry, RateTable};
use anyhow::{bail, Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Application state shared across requests.
pub struct AppState {
    pub rate_tables: RwLock<HashMap<String, RateTable>>,
    pub default_fiscal_year: String,
}

impl AppState {
    pub fn new(
        rate_tables: HashMap<String, RateTable>,
        default_fiscal_year: String,
    ) -> Result<Self> {
        if !rate_tables.contains_key(&default_fiscal_year) {
            bail!("no rate table for default fiscal year {default_fiscal_year}");
        }
        Ok(Self {
            rate_tables: RwLock::new(rate_tables),
            default_fiscal_year,
        })
    }

    /// Looks up the rate table for `fiscal_year`, or the default one.
    async fn rate_table(&self, fiscal_year: Option<&str>) -> Result<RateTable, ApiError> {
        lookup(
            &*self.rate_tables.read().await,
            &self.default_fiscal_year,
            fiscal_year,
        )
        .cloned()
    }
}

fn lookup<'a>(
    tables: &'a HashMap<String, RateTable>,
    default_fiscal_year: &str,
    fiscal_year: Option<&str>,
) -> Result<&'a RateTable, ApiError> {
    let version = fiscal_year.unwrap_or(default_fiscal_year);
    tables
        .get(version)
        .ok_or_else(|| ApiError::UnknownFiscalYear(version.to_string()))
}

/// Request-level failures.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("no rate table for fiscal year {0}")]
    UnknownFiscalYear(String),
    /// The body was not JSON of the expected shape.
    #[error("{}", .0.body_text())]
    Body(#[from] JsonRejection),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Input(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::UnknownFiscalYear(_) => StatusCode::NOT_FOUND,
            ApiError::Body(rejection) => rejection.status(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::info!(error = %self, "rejected tax calculation");
        (self.status(), Json(Envelope::<()>::err(&self))).into_response()
    }
}

/// The response envelope clients expect.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(error: &impl std::fmt::Display) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// Conditions worth surfacing to the user that do not block computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Warning {
    /// Gross salary is zero; the salary document was probably not parsed.
    ZeroGrossSalary,
    /// Slab tax is due although no salary was reported.
    SalaryDataMissing,
}

/// Flags inputs that suggest an upstream parsing failure.
pub fn collect_warnings(input: &TaxInput, result: &TaxResult) -> Vec<Warning> {
    let mut warnings = Vec::new();
    if input.gross_salary.is_zero() {
        warnings.push(Warning::ZeroGrossSalary);
        if result.final_tax_summary.salary_plus_debt_mf_tax > Decimal::ZERO {
            warnings.push(Warning::SalaryDataMissing);
        }
    }
    warnings
}

/// Echo of the stock gain buckets, keyed by request names.
#[derive(Debug, Serialize)]
pub struct ParsedStockGains {
    pub stcg_before: Decimal,
    pub stcg_after: Decimal,
    pub ltcg_before: Decimal,
    pub ltcg_after: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTaxComputation {
    pub stcg_tax: Decimal,
    pub ltcg_tax: Decimal,
}

/// Echo of the mutual fund gain buckets, keyed by request names.
#[derive(Debug, Serialize)]
pub struct ParsedMutualFundGains {
    pub equity_stcg: Decimal,
    pub equity_ltcg: Decimal,
    pub debt_stcg: Decimal,
    pub debt_ltcg: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityMutualFunds {
    pub stcg: Decimal,
    pub ltcg: Decimal,
    /// The statutory exemption, not the amount used.
    pub ltcg_exemption: Decimal,
    pub taxable_ltcg: Decimal,
    pub equity_mf_tax: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtMutualFunds {
    pub debt_stcg: Decimal,
    pub debt_ltcg: Decimal,
    pub added_to_income: Decimal,
}

/// Body of a successful calculation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxCalculationResponse {
    #[serde(flatten)]
    pub result: TaxResult,
    pub taxable_income: Decimal,
    pub parsed_stock_gains: ParsedStockGains,
    pub stock_tax_computation: StockTaxComputation,
    pub parsed_mutual_fund_gains: ParsedMutualFundGains,
    pub equity_mutual_funds: EquityMutualFunds,
    pub debt_mutual_funds: DebtMutualFunds,
    pub fiscal_year: String,
    pub warnings: Vec<Warning>,
    pub calculated_at: DateTime<Utc>,
}

impl TaxCalculationResponse {
    fn new(input: &TaxInput, result: TaxResult, table: &RateTable) -> Self {
        Self {
            taxable_income: result.salary_taxable_income,
            parsed_stock_gains: ParsedStockGains {
                stcg_before: input.stcg_before,
                stcg_after: input.stcg_after,
                ltcg_before: input.ltcg_before,
                ltcg_after: input.ltcg_after,
            },
            stock_tax_computation: StockTaxComputation {
                stcg_tax: result.equity_stock_tax.stcg_tax,
                ltcg_tax: result.equity_stock_tax.ltcg_tax,
            },
            parsed_mutual_fund_gains: ParsedMutualFundGains {
                equity_stcg: input.equity_mf_stcg,
                equity_ltcg: input.equity_mf_ltcg,
                debt_stcg: input.debt_mf_stcg,
                debt_ltcg: input.debt_mf_ltcg,
            },
            equity_mutual_funds: EquityMutualFunds {
                stcg: input.equity_mf_stcg,
                ltcg: input.equity_mf_ltcg,
                ltcg_exemption: table.equity_mf.ltcg_exemption,
                taxable_ltcg: result.equity_mf_tax.taxable_ltcg,
                equity_mf_tax: result.equity_mf_tax.total,
            },
            debt_mutual_funds: DebtMutualFunds {
                debt_stcg: input.debt_mf_stcg,
                debt_ltcg: input.debt_mf_ltcg,
                added_to_income: input.debt_mf_gains(),
            },
            fiscal_year: table.version.clone(),
            warnings: collect_warnings(input, &result),
            calculated_at: Utc::now(),
            result,
        }
    }
}

/// Build the API router around the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/calculate/tax", post(calculate_handler))
        .route("/calculate/tax/batch", post(batch_handler))
        .with_state(state)
}

/// Load rate tables as configured and build the shared state.
pub fn build_state(config: &ServerConfig) -> Result<Arc<AppState>> {
    let tables = rate_table_registry(config.rate_table_dir.as_deref())
        .context("failed to load rate tables")?;
    tracing::info!(versions = ?tables.keys().collect::<Vec<_>>(), "rate tables ready");
    Ok(Arc::new(AppState::new(
        tables,
        config.default_fiscal_year.clone(),
    )?))
}

/// Handler for GET /
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "SmartTax API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Handler for POST /calculate/tax
async fn calculate_handler(
    State(app_state): State<Arc<AppState>>,
    body: Result<Json<TaxCalculationRequest>, JsonRejection>,
) -> Result<Json<Envelope<TaxCalculationResponse>>, ApiError> {
    let Json(request) = body?;
    let table = app_state.rate_table(request.fiscal_year.as_deref()).await?;
    let input = TaxInput::try_from(&request)?;
    let result = compute_tax(&input, &table)?;

    let settlement = Settlement::from_net_payable(result.net_payable);
    tracing::info!(
        fiscal_year = %table.version,
        filing_type = ?result.filing_type,
        liability = %format_inr(result.final_tax_summary.total_tax_liability),
        settlement = %format!("{}: {}", settlement.label(), settlement),
        "calculated tax"
    );

    Ok(Json(Envelope::ok(TaxCalculationResponse::new(
        &input, result, &table,
    ))))
}

/// Handler for POST /calculate/tax/batch
///
/// The body is an array of calculation requests.  Each return is priced
/// under its own fiscal year and succeeds or fails on its own; returns
/// sharing a year are computed together with [`compute_batch`].
async fn batch_handler(
    State(app_state): State<Arc<AppState>>,
    body: Result<Json<Vec<TaxCalculationRequest>>, JsonRejection>,
) -> Result<Json<Envelope<Vec<Envelope<TaxCalculationResponse>>>>, ApiError> {
    let Json(requests) = body?;
    let tables = app_state.rate_tables.read().await;

    let mut items: Vec<Option<Envelope<TaxCalculationResponse>>> =
        requests.iter().map(|_| None).collect();
    let mut by_year: HashMap<&str, (&RateTable, Vec<(usize, TaxInput)>)> = HashMap::new();
    for (index, request) in requests.iter().enumerate() {
        let prepared = lookup(
            &tables,
            &app_state.default_fiscal_year,
            request.fiscal_year.as_deref(),
        )
        .and_then(|table| Ok((table, TaxInput::try_from(request)?)));
        match prepared {
            Ok((table, input)) => by_year
                .entry(table.version.as_str())
                .or_insert_with(|| (table, Vec::new()))
                .1
                .push((index, input)),
            Err(err) => items[index] = Some(Envelope::err(&err)),
        }
    }

    for (table, members) in by_year.into_values() {
        let inputs: Vec<TaxInput> = members.iter().map(|(_, input)| *input).collect();
        let results = compute_batch(&inputs, table);
        for ((index, input), result) in members.into_iter().zip(results) {
            items[index] = Some(match result {
                Ok(result) => Envelope::ok(TaxCalculationResponse::new(&input, result, table)),
                Err(err) => Envelope::err(&err),
            });
        }
    }
    let items: Vec<_> = items.into_iter().flatten().collect();

    tracing::info!(
        returns = items.len(),
        failed = items.iter().filter(|item| !item.success).count(),
        "calculated tax batch"
    );
    Ok(Json(Envelope::ok(items)))
}

/// Launch the API server.  Builds the state from `config` and serves
/// until the process is interrupted.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let state = build_state(&config)?;
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
