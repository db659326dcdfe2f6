//! Rupee formatting for logs and human-readable summaries.

use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;

/// Formats `amount` as rupees with Indian digit grouping and two
/// decimals, e.g. `₹12,34,567.89`.
pub fn format_inr(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded < Decimal::ZERO { "-" } else { "" };
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    format!("{sign}₹{}.{fraction}", group_indian(whole))
}

/// Last three digits form one group, the rest are grouped in pairs.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{},{}", groups.join(","), tail)
}

/// What the taxpayer owes or is owed after TDS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    NoDues,
    Payable(Decimal),
    /// Holds the refund magnitude.
    Refund(Decimal),
}

impl Settlement {
    pub fn from_net_payable(net_payable: Decimal) -> Self {
        if net_payable.is_zero() {
            Settlement::NoDues
        } else if net_payable > Decimal::ZERO {
            Settlement::Payable(net_payable)
        } else {
            Settlement::Refund(net_payable.abs())
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Settlement::NoDues => "Net Payable",
            Settlement::Payable(_) => "Tax Payable",
            Settlement::Refund(_) => "Refund Due",
        }
    }
}

impl fmt::Display for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Settlement::NoDues => write!(f, "₹0 (No dues)"),
            Settlement::Payable(amount) | Settlement::Refund(amount) => {
                write!(f, "{}", format_inr(*amount))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn groups_in_lakhs_and_crores() {
        assert_eq!(format_inr(dec!(0)), "₹0.00");
        assert_eq!(format_inr(dec!(999)), "₹999.00");
        assert_eq!(format_inr(dec!(1000)), "₹1,000.00");
        assert_eq!(format_inr(dec!(125000)), "₹1,25,000.00");
        assert_eq!(format_inr(dec!(1234567.891)), "₹12,34,567.89");
        assert_eq!(format_inr(dec!(123456789)), "₹12,34,56,789.00");
    }

    #[test]
    fn negative_amounts_keep_sign() {
        assert_eq!(format_inr(dec!(-50000)), "-₹50,000.00");
    }

    #[test]
    fn rounds_half_paise_up() {
        assert_eq!(format_inr(dec!(5333.325)), "₹5,333.33");
    }

    #[test]
    fn settlement_from_net_payable() {
        assert_eq!(Settlement::from_net_payable(dec!(0)), Settlement::NoDues);
        assert_eq!(
            Settlement::from_net_payable(dec!(16710)),
            Settlement::Payable(dec!(16710))
        );
        let refund = Settlement::from_net_payable(dec!(-50000));
        assert_eq!(refund, Settlement::Refund(dec!(50000)));
        assert_eq!(refund.label(), "Refund Due");
        assert_eq!(refund.to_string(), "₹50,000.00");
        assert_eq!(Settlement::NoDues.to_string(), "₹0 (No dues)");
        assert_eq!(Settlement::NoDues.label(), "Net Payable");
    }
}
