//! Tax computation engine.
//!
//! The `engine` module turns a [`TaxInput`] into a [`TaxResult`] under a
//! given [`RateTable`].  Computation is a single linear pipeline:
//!
//! 1. salary taxable income (salary less standard deduction, plus debt
//!    fund gains) is taxed on the slab table, subject to the 87A rebate;
//! 2. equity share gains are taxed at flat rates on either side of the
//!    cutoff, with the LTCG exemption pooled across both buckets;
//! 3. equity fund gains are taxed at flat rates with their own exemption;
//! 4. cess is levied on the sum and TDS is set off.
//!
//! Every function here is pure.  [`compute_batch`] uses [`rayon`] to
//! spread independent returns across CPU cores.

use crate::error::InputError;
use crate::models::{EquityMfTax, EquityStockTax, FilingType, FinalTaxSummary, TaxInput, TaxResult};
use crate::tax::{EquityMfRates, EquityStockRates, ExemptionAllocation, RateTable, TaxSlab};
use rayon::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to paise, the precision every reported amount carries.
fn round_paise(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Progressive tax on `amount` over `slabs`.
///
/// Each slab taxes the part of `amount` between its own threshold and
/// the next slab's threshold; the last slab taxes everything above its
/// threshold.  `slabs` must be sorted ascending and start at zero (see
/// [`RateTable::validate`]).
pub fn slab_tax(amount: Decimal, slabs: &[TaxSlab]) -> Decimal {
    let mut tax = Decimal::ZERO;
    for (i, slab) in slabs.iter().enumerate() {
        if amount <= slab.from {
            break;
        }
        let upper = slabs
            .get(i + 1)
            .map_or(amount, |next| next.from.min(amount));
        tax += (upper - slab.from) * slab.rate;
    }
    round_paise(tax)
}

/// Salary after the standard deduction, plus debt fund gains.
pub fn salary_taxable_income(input: &TaxInput, table: &RateTable) -> Decimal {
    (input.gross_salary - table.standard_deduction).max(Decimal::ZERO) + debt_mf_income(input)
}

/// Debt fund gains carry no special rate and are added to salary income.
pub fn debt_mf_income(input: &TaxInput) -> Decimal {
    input.debt_mf_gains()
}

/// Equity share STCG and LTCG tax.
pub fn equity_stock_tax(
    input: &TaxInput,
    rates: &EquityStockRates,
    allocation: ExemptionAllocation,
) -> EquityStockTax {
    let stcg_tax =
        round_paise(input.stcg_before * rates.stcg_before + input.stcg_after * rates.stcg_after);

    let combined = input.ltcg_before + input.ltcg_after;
    let exemption = combined.min(rates.ltcg_exemption);
    let taxable_ltcg = combined - exemption;

    let ltcg_tax = if taxable_ltcg.is_zero() {
        Decimal::ZERO
    } else {
        match allocation {
            ExemptionAllocation::BeforeFirst => {
                let exempt_before = input.ltcg_before.min(exemption);
                let exempt_after = exemption - exempt_before;
                (input.ltcg_before - exempt_before) * rates.ltcg_before
                    + (input.ltcg_after - exempt_after) * rates.ltcg_after
            }
            ExemptionAllocation::Proportional => {
                // shares first, so the product stays within `Decimal` range
                let share_before = input.ltcg_before / combined;
                let share_after = input.ltcg_after / combined;
                taxable_ltcg * share_before * rates.ltcg_before
                    + taxable_ltcg * share_after * rates.ltcg_after
            }
        }
    };
    let ltcg_tax = round_paise(ltcg_tax);

    EquityStockTax {
        stcg_tax,
        ltcg_tax,
        total_equity_stock_tax: stcg_tax + ltcg_tax,
        ltcg_exemption_applied: exemption,
        taxable_ltcg,
    }
}

/// Equity mutual fund STCG and LTCG tax.
pub fn equity_mf_tax(input: &TaxInput, rates: &EquityMfRates) -> EquityMfTax {
    let stcg_tax = round_paise(input.equity_mf_stcg * rates.stcg);
    let exemption_applied = input.equity_mf_ltcg.min(rates.ltcg_exemption);
    let taxable_ltcg = input.equity_mf_ltcg - exemption_applied;
    let ltcg_tax = round_paise(taxable_ltcg * rates.ltcg);
    EquityMfTax {
        stcg_tax,
        ltcg_tax,
        exemption_applied,
        taxable_ltcg,
        total: stcg_tax + ltcg_tax,
    }
}

/// Computes the full, itemised tax result for one return.
///
/// Fails only if `input` carries a negative amount or one above
/// [`TaxInput::MAX_AMOUNT`].
pub fn compute_tax(input: &TaxInput, table: &RateTable) -> Result<TaxResult, InputError> {
    input.validate()?;

    let salary_taxable_income = salary_taxable_income(input, table);
    let slab_tax = slab_tax(salary_taxable_income, &table.slabs);
    // Section 87A: relief covers the slab component only.
    let rebate = if salary_taxable_income <= table.rebate_threshold {
        slab_tax
    } else {
        Decimal::ZERO
    };
    let salary_plus_debt_mf_tax = slab_tax - rebate;

    let equity_stock_tax =
        equity_stock_tax(input, &table.equity_stock, table.ltcg_exemption_allocation);
    let equity_mf_tax = equity_mf_tax(input, &table.equity_mf);

    let total_income_tax_before_cess =
        salary_plus_debt_mf_tax + equity_stock_tax.total_equity_stock_tax + equity_mf_tax.total;
    let cess = round_paise(total_income_tax_before_cess * table.cess_rate);
    let total_tax_liability = total_income_tax_before_cess + cess;
    let net_payable = total_tax_liability - input.tds_paid;

    tracing::debug!(
        version = %table.version,
        %salary_taxable_income,
        %slab_tax,
        %rebate,
        %total_tax_liability,
        %net_payable,
        "computed tax"
    );

    Ok(TaxResult {
        salary_taxable_income,
        slab_tax,
        rebate,
        equity_stock_tax,
        equity_mf_tax,
        final_tax_summary: FinalTaxSummary {
            salary_plus_debt_mf_tax,
            stock_capital_gains_tax: equity_stock_tax.total_equity_stock_tax,
            mutual_fund_equity_tax: equity_mf_tax.total,
            total_income_tax_before_cess,
            cess,
            total_tax_liability,
        },
        net_payable,
        is_refund: net_payable < Decimal::ZERO,
        filing_type: FilingType::for_input(input),
    })
}

/// Computes many independent returns in parallel.
///
/// Results are returned in input order; a rejected input does not affect
/// its neighbours.
pub fn compute_batch(
    inputs: &[TaxInput],
    table: &RateTable,
) -> Vec<Result<TaxResult, InputError>> {
    inputs
        .par_iter()
        .map(|input| compute_tax(input, table))
        .collect()
}
