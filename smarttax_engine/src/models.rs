//! Data models for the SmartTax engine.
//!
//! The `models` module defines the engine's input and output records.
//! All amounts are Indian rupees held as exact decimals.  The types
//! derive `Serialize` and `Deserialize` so they can be transmitted as
//! JSON; output records use camelCase field names, which clients rely
//! on and must not change.

use crate::error::InputError;
use crate::tax::{RateTable, SaleWindow};
use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Salary and already-parsed capital-gains figures for one return.
///
/// Equity-stock gains arrive pre-split around the rate table's cutoff
/// date; the engine never looks at transaction dates.  Use
/// [`StockGains`] to build those buckets from individual trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxInput {
    /// Total salary income before the standard deduction.
    pub gross_salary: Decimal,
    /// Tax already withheld at source.
    pub tds_paid: Decimal,
    pub stcg_before: Decimal,
    pub stcg_after: Decimal,
    pub ltcg_before: Decimal,
    pub ltcg_after: Decimal,
    pub equity_mf_stcg: Decimal,
    pub equity_mf_ltcg: Decimal,
    /// Debt fund gains are taxed as ordinary income at slab rates.
    pub debt_mf_stcg: Decimal,
    pub debt_mf_ltcg: Decimal,
}

impl TaxInput {
    /// Largest amount accepted in any field (₹10^15).  Every sum and
    /// product the engine forms from in-range fields fits in a `Decimal`.
    pub const MAX_AMOUNT: Decimal = dec!(1000000000000000);

    /// A salary-only input.
    pub fn salaried(gross_salary: Decimal, tds_paid: Decimal) -> Self {
        Self {
            gross_salary,
            tds_paid,
            ..Self::default()
        }
    }

    /// Replaces the four equity-stock buckets with `gains`.
    pub fn with_stock_gains(self, gains: StockGains) -> Self {
        Self {
            stcg_before: gains.stcg_before,
            stcg_after: gains.stcg_after,
            ltcg_before: gains.ltcg_before,
            ltcg_after: gains.ltcg_after,
            ..self
        }
    }

    /// Amounts paired with their request field names.
    fn fields(&self) -> [(&'static str, Decimal); 10] {
        [
            ("gross_salary", self.gross_salary),
            ("tds_paid", self.tds_paid),
            ("stcg_before", self.stcg_before),
            ("stcg_after", self.stcg_after),
            ("ltcg_before", self.ltcg_before),
            ("ltcg_after", self.ltcg_after),
            ("equity_stcg", self.equity_mf_stcg),
            ("equity_ltcg", self.equity_mf_ltcg),
            ("debt_stcg", self.debt_mf_stcg),
            ("debt_ltcg", self.debt_mf_ltcg),
        ]
    }

    /// Rejects any negative amount or one above [`Self::MAX_AMOUNT`].
    pub fn validate(&self) -> Result<(), InputError> {
        for (field, value) in self.fields() {
            if value < Decimal::ZERO {
                return Err(InputError::Negative { field, value });
            }
            if value > Self::MAX_AMOUNT {
                return Err(InputError::OutOfRange {
                    field,
                    max: Self::MAX_AMOUNT,
                });
            }
        }
        Ok(())
    }

    /// True when any capital-gain bucket is non-zero.
    pub fn has_capital_gains(&self) -> bool {
        self.fields()[2..].iter().any(|(_, value)| !value.is_zero())
    }

    /// Total debt fund gains, folded into salary income.
    pub fn debt_mf_gains(&self) -> Decimal {
        self.debt_mf_stcg + self.debt_mf_ltcg
    }
}

/// The JSON body accepted by the calculation endpoint.
///
/// `gross_salary` and `tds_paid` are required; every gain field defaults
/// to zero when absent.  `fiscal_year` selects a rate table version and
/// falls back to the server default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxCalculationRequest {
    pub gross_salary: Option<f64>,
    pub tds_paid: Option<f64>,
    #[serde(default)]
    pub stcg_before: f64,
    #[serde(default)]
    pub stcg_after: f64,
    #[serde(default)]
    pub ltcg_before: f64,
    #[serde(default)]
    pub ltcg_after: f64,
    #[serde(default)]
    pub equity_stcg: f64,
    #[serde(default)]
    pub equity_ltcg: f64,
    #[serde(default)]
    pub debt_stcg: f64,
    #[serde(default)]
    pub debt_ltcg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<String>,
}

fn amount(field: &'static str, value: f64) -> Result<Decimal, InputError> {
    if !value.is_finite() {
        return Err(InputError::NonFinite(field));
    }
    let out_of_range = InputError::OutOfRange {
        field,
        max: TaxInput::MAX_AMOUNT,
    };
    let value = Decimal::from_f64(value).ok_or_else(|| out_of_range.clone())?;
    if value < Decimal::ZERO {
        return Err(InputError::Negative { field, value });
    }
    if value > TaxInput::MAX_AMOUNT {
        return Err(out_of_range);
    }
    Ok(value)
}

fn required(field: &'static str, value: Option<f64>) -> Result<Decimal, InputError> {
    amount(field, value.ok_or(InputError::MissingField(field))?)
}

impl TryFrom<&TaxCalculationRequest> for TaxInput {
    type Error = InputError;

    fn try_from(request: &TaxCalculationRequest) -> Result<Self, Self::Error> {
        Ok(TaxInput {
            gross_salary: required("gross_salary", request.gross_salary)?,
            tds_paid: required("tds_paid", request.tds_paid)?,
            stcg_before: amount("stcg_before", request.stcg_before)?,
            stcg_after: amount("stcg_after", request.stcg_after)?,
            ltcg_before: amount("ltcg_before", request.ltcg_before)?,
            ltcg_after: amount("ltcg_after", request.ltcg_after)?,
            equity_mf_stcg: amount("equity_stcg", request.equity_stcg)?,
            equity_mf_ltcg: amount("equity_ltcg", request.equity_ltcg)?,
            debt_mf_stcg: amount("debt_stcg", request.debt_stcg)?,
            debt_mf_ltcg: amount("debt_ltcg", request.debt_ltcg)?,
        })
    }
}

/// Holding period class of an equity trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldingTerm {
    Short,
    Long,
}

/// A single realised equity trade as reported by a broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTrade {
    pub sale_date: NaiveDate,
    pub term: HoldingTerm,
    /// Realised profit (negative for a loss).
    pub pnl: Decimal,
}

/// Equity-stock gains netted into the four cutoff buckets.
///
/// Buckets are plain sums, so a bucket dominated by losses ends up
/// negative and will be rejected by [`TaxInput::validate`].  Loss
/// set-off across buckets is the caller's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StockGains {
    pub stcg_before: Decimal,
    pub stcg_after: Decimal,
    pub ltcg_before: Decimal,
    pub ltcg_after: Decimal,
}

impl StockGains {
    /// Nets `trades` into buckets using the cutoff date of `table`.
    pub fn from_trades<'a>(
        table: &RateTable,
        trades: impl IntoIterator<Item = &'a StockTrade>,
    ) -> Self {
        let mut gains = Self::default();
        for trade in trades {
            gains.record(table.sale_window(trade.sale_date), trade.term, trade.pnl);
        }
        gains
    }

    pub fn record(&mut self, window: SaleWindow, term: HoldingTerm, pnl: Decimal) {
        let bucket = match (term, window) {
            (HoldingTerm::Short, SaleWindow::Before) => &mut self.stcg_before,
            (HoldingTerm::Short, SaleWindow::After) => &mut self.stcg_after,
            (HoldingTerm::Long, SaleWindow::Before) => &mut self.ltcg_before,
            (HoldingTerm::Long, SaleWindow::After) => &mut self.ltcg_after,
        };
        *bucket += pnl;
    }
}

/// Income tax return form implied by the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilingType {
    /// Salary income only.
    #[serde(rename = "ITR-1")]
    Itr1,
    /// Salary plus equity and mutual fund gains.
    #[serde(rename = "ITR-2")]
    Itr2,
}

impl FilingType {
    pub fn for_input(input: &TaxInput) -> Self {
        if input.has_capital_gains() {
            FilingType::Itr2
        } else {
            FilingType::Itr1
        }
    }
}

/// Equity share capital gains tax breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityStockTax {
    pub stcg_tax: Decimal,
    pub ltcg_tax: Decimal,
    pub total_equity_stock_tax: Decimal,
    /// Portion of the pooled exemption actually used.
    pub ltcg_exemption_applied: Decimal,
    /// Combined LTCG above the exemption.
    pub taxable_ltcg: Decimal,
}

/// Equity mutual fund capital gains tax breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityMfTax {
    pub stcg_tax: Decimal,
    /// LTCG tax after the exemption.
    pub ltcg_tax: Decimal,
    pub exemption_applied: Decimal,
    pub taxable_ltcg: Decimal,
    pub total: Decimal,
}

/// The four-column summary clients display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalTaxSummary {
    pub salary_plus_debt_mf_tax: Decimal,
    pub stock_capital_gains_tax: Decimal,
    pub mutual_fund_equity_tax: Decimal,
    pub total_income_tax_before_cess: Decimal,
    pub cess: Decimal,
    pub total_tax_liability: Decimal,
}

/// Fully itemised result of a tax computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxResult {
    /// Salary after the standard deduction plus debt fund gains.
    pub salary_taxable_income: Decimal,
    /// Slab tax on `salary_taxable_income` before the rebate.
    pub slab_tax: Decimal,
    /// Section 87A relief granted; equals `slab_tax` when the rebate applies.
    pub rebate: Decimal,
    pub equity_stock_tax: EquityStockTax,
    pub equity_mf_tax: EquityMfTax,
    pub final_tax_summary: FinalTaxSummary,
    /// Liability minus TDS; negative means a refund is due.
    pub net_payable: Decimal,
    pub is_refund: bool,
    pub filing_type: FilingType,
}

impl TaxResult {
    pub fn rebate_applied(&self) -> bool {
        !self.rebate.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_request() -> TaxCalculationRequest {
        TaxCalculationRequest {
            gross_salary: Some(1_500_000.0),
            tds_paid: Some(100_000.0),
            ..Default::default()
        }
    }

    #[test]
    fn request_defaults_optional_gains_to_zero() {
        let request: TaxCalculationRequest =
            serde_json::from_str(r#"{"gross_salary": 900000, "tds_paid": 12500.5}"#).unwrap();
        let input = TaxInput::try_from(&request).unwrap();
        assert_eq!(input, TaxInput::salaried(dec!(900000), dec!(12500.5)));
        assert_eq!(request.fiscal_year, None);
    }

    #[test]
    fn request_maps_wire_names() {
        let request: TaxCalculationRequest = serde_json::from_str(
            r#"{
                "gross_salary": 1000000, "tds_paid": 0,
                "stcg_before": 1, "stcg_after": 2, "ltcg_before": 3, "ltcg_after": 4,
                "equity_stcg": 5, "equity_ltcg": 6, "debt_stcg": 7, "debt_ltcg": 8,
                "fiscal_year": "FY2024-25"
            }"#,
        )
        .unwrap();
        let input = TaxInput::try_from(&request).unwrap();
        assert_eq!(input.stcg_before, dec!(1));
        assert_eq!(input.ltcg_after, dec!(4));
        assert_eq!(input.equity_mf_stcg, dec!(5));
        assert_eq!(input.equity_mf_ltcg, dec!(6));
        assert_eq!(input.debt_mf_stcg, dec!(7));
        assert_eq!(input.debt_mf_ltcg, dec!(8));
        assert_eq!(request.fiscal_year.as_deref(), Some("FY2024-25"));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let request = TaxCalculationRequest {
            tds_paid: None,
            ..base_request()
        };
        assert_eq!(
            TaxInput::try_from(&request),
            Err(InputError::MissingField("tds_paid"))
        );
    }

    #[test]
    fn non_finite_amount_is_rejected() {
        let request = TaxCalculationRequest {
            equity_ltcg: f64::NAN,
            ..base_request()
        };
        assert_eq!(
            TaxInput::try_from(&request),
            Err(InputError::NonFinite("equity_ltcg"))
        );
        let request = TaxCalculationRequest {
            gross_salary: Some(f64::INFINITY),
            ..base_request()
        };
        assert_eq!(
            TaxInput::try_from(&request),
            Err(InputError::NonFinite("gross_salary"))
        );
    }

    #[test]
    fn negative_amount_is_rejected() {
        let request = TaxCalculationRequest {
            debt_ltcg: -10.0,
            ..base_request()
        };
        assert_eq!(
            TaxInput::try_from(&request),
            Err(InputError::Negative {
                field: "debt_ltcg",
                value: dec!(-10)
            })
        );
    }

    #[test]
    fn huge_amount_is_out_of_range() {
        let request = TaxCalculationRequest {
            gross_salary: Some(5e28),
            debt_stcg: 5e28,
            ..base_request()
        };
        let out_of_range = |field| InputError::OutOfRange {
            field,
            max: TaxInput::MAX_AMOUNT,
        };
        assert_eq!(TaxInput::try_from(&request), Err(out_of_range("gross_salary")));

        // beyond what a Decimal can hold at all
        let request = TaxCalculationRequest {
            equity_stcg: 1e30,
            ..base_request()
        };
        assert_eq!(TaxInput::try_from(&request), Err(out_of_range("equity_stcg")));

        let request = TaxCalculationRequest {
            tds_paid: Some(1e15),
            ..base_request()
        };
        assert_eq!(
            TaxInput::try_from(&request).map(|input| input.tds_paid),
            Ok(TaxInput::MAX_AMOUNT)
        );
    }

    #[test]
    fn validate_names_first_negative_field() {
        let input = TaxInput {
            ltcg_before: dec!(-1),
            equity_mf_stcg: dec!(-2),
            ..TaxInput::salaried(dec!(100), dec!(0))
        };
        assert_eq!(
            input.validate(),
            Err(InputError::Negative {
                field: "ltcg_before",
                value: dec!(-1)
            })
        );
    }

    #[test]
    fn filing_type_follows_capital_gains() {
        let salaried = TaxInput::salaried(dec!(800000), dec!(0));
        assert_eq!(FilingType::for_input(&salaried), FilingType::Itr1);
        let with_debt = TaxInput {
            debt_mf_ltcg: dec!(1),
            ..salaried
        };
        assert_eq!(FilingType::for_input(&with_debt), FilingType::Itr2);
        assert_eq!(serde_json::to_string(&FilingType::Itr2).unwrap(), r#""ITR-2""#);
    }

    #[test]
    fn stock_gains_split_on_cutoff() {
        let table = RateTable::fy2024_25();
        let trade = |d: u32, m: u32, term, pnl| StockTrade {
            sale_date: NaiveDate::from_ymd_opt(2024, m, d).unwrap(),
            term,
            pnl,
        };
        let trades = [
            trade(10, 5, HoldingTerm::Short, dec!(1000)),
            trade(22, 7, HoldingTerm::Short, dec!(-250)),
            trade(23, 7, HoldingTerm::Short, dec!(400)),
            trade(1, 6, HoldingTerm::Long, dec!(50000)),
            trade(15, 9, HoldingTerm::Long, dec!(80000)),
        ];
        let gains = StockGains::from_trades(&table, &trades);
        assert_eq!(
            gains,
            StockGains {
                stcg_before: dec!(750),
                stcg_after: dec!(400),
                ltcg_before: dec!(50000),
                ltcg_after: dec!(80000),
            }
        );

        let input = TaxInput::salaried(dec!(0), dec!(0)).with_stock_gains(gains);
        assert_eq!(input.stcg_before, dec!(750));
        assert!(input.has_capital_gains());
    }

    #[test]
    fn result_serialises_contract_names() {
        let summary = serde_json::to_value(FinalTaxSummary::default()).unwrap();
        for key in [
            "salaryPlusDebtMfTax",
            "stockCapitalGainsTax",
            "mutualFundEquityTax",
            "totalIncomeTaxBeforeCess",
            "cess",
            "totalTaxLiability",
        ] {
            assert!(summary.get(key).is_some(), "missing {key}");
        }
    }
}
