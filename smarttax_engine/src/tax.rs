//! Rate tables for the New Tax Regime.
//!
//! A [`RateTable`] is the versioned set of constants the engine applies:
//! the standard deduction, the progressive slab table, the Section 87A
//! rebate threshold, the cess rate and the capital-gains rates on either
//! side of the cutoff date.  The built-in table for FY 2024-25 is
//! available via [`RateTable::fy2024_25`]; further versions may be
//! stored externally as JSON files and loaded with
//! [`load_rate_tables_from_dir`].

use crate::error::RateTableError;
use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Version string of the built-in rate table.
pub const FY2024_25: &str = "FY2024-25";

/// First sale date taxed at the post-Budget 2024 capital-gains rates.
pub const CAPITAL_GAINS_CUTOFF: NaiveDate = match NaiveDate::from_ymd_opt(2024, 7, 23) {
    Some(date) => date,
    None => panic!("invalid capital gains cutoff"),
};

/// One bracket of the progressive slab table.
///
/// A slab covers `[from, next.from)`; the last slab is open ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSlab {
    /// Income threshold where this slab begins.
    pub from: Decimal,
    /// Marginal rate for income inside this slab (e.g. 0.05 for 5%).
    pub rate: Decimal,
}

/// Equity share rates (Sections 111A and 112A), split at the cutoff date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityStockRates {
    pub stcg_before: Decimal,
    pub stcg_after: Decimal,
    pub ltcg_before: Decimal,
    pub ltcg_after: Decimal,
    /// Annual LTCG exemption, pooled across the before/after buckets.
    pub ltcg_exemption: Decimal,
}

/// Equity mutual fund rates.  No cutoff split applies here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityMfRates {
    pub stcg: Decimal,
    pub ltcg: Decimal,
    pub ltcg_exemption: Decimal,
}

/// How the pooled equity-stock LTCG exemption is spread over the
/// before/after cutoff buckets when both carry gains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptionAllocation {
    /// Apportion the taxable excess by each bucket's share of total LTCG.
    #[default]
    Proportional,
    /// Consume the exemption from the pre-cutoff bucket first and apply
    /// any remainder to the post-cutoff bucket.
    BeforeFirst,
}

/// Which side of the capital-gains cutoff a sale falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleWindow {
    Before,
    After,
}

/// A complete, versioned set of New Regime constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTable {
    /// Version key, e.g. `"FY2024-25"`.
    pub version: String,
    pub standard_deduction: Decimal,
    /// Slabs sorted by `from`, the first one starting at zero.
    pub slabs: Vec<TaxSlab>,
    /// Salary taxable income at or below this amount pays no slab tax.
    pub rebate_threshold: Decimal,
    pub cess_rate: Decimal,
    /// First day on which the post-cutoff capital-gains rates apply.
    pub capital_gains_cutoff: NaiveDate,
    pub equity_stock: EquityStockRates,
    pub equity_mf: EquityMfRates,
    #[serde(default)]
    pub ltcg_exemption_allocation: ExemptionAllocation,
}

impl RateTable {
    /// The FY 2024-25 New Regime table.
    pub fn fy2024_25() -> Self {
        Self {
            version: FY2024_25.to_string(),
            standard_deduction: dec!(75000),
            slabs: vec![
                TaxSlab { from: dec!(0), rate: dec!(0) },
                TaxSlab { from: dec!(400000), rate: dec!(0.05) },
                TaxSlab { from: dec!(800000), rate: dec!(0.10) },
                TaxSlab { from: dec!(1200000), rate: dec!(0.15) },
                TaxSlab { from: dec!(1600000), rate: dec!(0.20) },
                TaxSlab { from: dec!(2000000), rate: dec!(0.25) },
                TaxSlab { from: dec!(2400000), rate: dec!(0.30) },
            ],
            rebate_threshold: dec!(1200000),
            cess_rate: dec!(0.04),
            capital_gains_cutoff: CAPITAL_GAINS_CUTOFF,
            equity_stock: EquityStockRates {
                stcg_before: dec!(0.15),
                stcg_after: dec!(0.20),
                ltcg_before: dec!(0.10),
                ltcg_after: dec!(0.125),
                ltcg_exemption: dec!(125000),
            },
            equity_mf: EquityMfRates {
                stcg: dec!(0.20),
                ltcg: dec!(0.125),
                ltcg_exemption: dec!(125000),
            },
            ltcg_exemption_allocation: ExemptionAllocation::Proportional,
        }
    }

    /// Returns a copy of this table using a different exemption policy.
    pub fn with_exemption_allocation(mut self, allocation: ExemptionAllocation) -> Self {
        self.ltcg_exemption_allocation = allocation;
        self
    }

    /// Classifies a sale date.  The cutoff day itself is post-cutoff.
    pub fn sale_window(&self, sale_date: NaiveDate) -> SaleWindow {
        if sale_date < self.capital_gains_cutoff {
            SaleWindow::Before
        } else {
            SaleWindow::After
        }
    }

    /// Checks that the table is usable by the engine.
    pub fn validate(&self) -> Result<(), RateTableError> {
        let version = || self.version.clone();

        let first = self
            .slabs
            .first()
            .ok_or_else(|| RateTableError::NoSlabs(version()))?;
        if !first.from.is_zero() {
            return Err(RateTableError::FirstSlabNotZero {
                version: version(),
                from: first.from,
            });
        }
        for pair in self.slabs.windows(2) {
            if pair[1].from <= pair[0].from {
                return Err(RateTableError::UnsortedSlabs {
                    version: version(),
                    previous: pair[0].from,
                    next: pair[1].from,
                });
            }
        }

        let amounts = [
            ("standard_deduction", self.standard_deduction),
            ("rebate_threshold", self.rebate_threshold),
            ("equity_stock.ltcg_exemption", self.equity_stock.ltcg_exemption),
            ("equity_mf.ltcg_exemption", self.equity_mf.ltcg_exemption),
        ];
        for (name, value) in amounts {
            if value < Decimal::ZERO {
                return Err(RateTableError::NegativeAmount {
                    version: version(),
                    name,
                    value,
                });
            }
        }

        let rates = self
            .slabs
            .iter()
            .map(|slab| ("slabs.rate", slab.rate))
            .chain([
                ("cess_rate", self.cess_rate),
                ("equity_stock.stcg_before", self.equity_stock.stcg_before),
                ("equity_stock.stcg_after", self.equity_stock.stcg_after),
                ("equity_stock.ltcg_before", self.equity_stock.ltcg_before),
                ("equity_stock.ltcg_after", self.equity_stock.ltcg_after),
                ("equity_mf.stcg", self.equity_mf.stcg),
                ("equity_mf.ltcg", self.equity_mf.ltcg),
            ]);
        for (name, value) in rates {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(RateTableError::RateOutOfRange {
                    version: version(),
                    name,
                    value,
                });
            }
        }
        Ok(())
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::fy2024_25()
    }
}

/// Load all rate tables from a directory.
///
/// Every `.json` file is parsed as a [`RateTable`] and validated.  Files
/// that fail either step are skipped with a warning rather than failing
/// the whole load.  Duplicate versions are not checked here; see
/// [`rate_table_registry`].
pub fn load_rate_tables_from_dir(path: &Path) -> Result<Vec<RateTable>> {
    let mut tables = Vec::new();
    if !path.is_dir() {
        tracing::warn!(path = %path.display(), "rate table directory does not exist");
        return Ok(tables);
    }
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let file = entry.path();
        if !entry.file_type()?.is_file() || file.extension().map_or(true, |ext| ext != "json") {
            continue;
        }
        let data = std::fs::read_to_string(&file)?;
        let table = match serde_json::from_str::<RateTable>(&data) {
            Ok(table) => table,
            Err(err) => {
                tracing::warn!(path = %file.display(), error = %err, "failed to parse rate table");
                continue;
            }
        };
        if let Err(err) = table.validate() {
            tracing::warn!(path = %file.display(), error = %err, "rejected invalid rate table");
            continue;
        }
        tracing::debug!(path = %file.display(), version = %table.version, "loaded rate table");
        tables.push(table);
    }
    Ok(tables)
}

/// Builds the version-keyed set of rate tables: the built-in table plus
/// any tables found in `dir`.  Loaded tables replace built-ins that share
/// their version.
pub fn rate_table_registry(dir: Option<&Path>) -> Result<HashMap<String, RateTable>> {
    let mut registry = HashMap::new();
    let builtin = RateTable::fy2024_25();
    registry.insert(builtin.version.clone(), builtin);
    if let Some(dir) = dir {
        for table in load_rate_tables_from_dir(dir)? {
            if registry.contains_key(&table.version) {
                tracing::info!(version = %table.version, "overriding rate table");
            }
            registry.insert(table.version.clone(), table);
        }
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("smarttax-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn builtin_table_is_valid() {
        let table = RateTable::fy2024_25();
        assert_eq!(table.version, "FY2024-25");
        assert_eq!(table.slabs.len(), 7);
        assert_eq!(table.capital_gains_cutoff.to_string(), "2024-07-23");
        assert_eq!(table.ltcg_exemption_allocation, ExemptionAllocation::Proportional);
        assert_eq!(table.validate(), Ok(()));
    }

    #[test]
    fn sale_on_cutoff_day_is_after() {
        let table = RateTable::fy2024_25();
        let day = |d| NaiveDate::from_ymd_opt(2024, 7, d).unwrap();
        assert_eq!(table.sale_window(day(22)), SaleWindow::Before);
        assert_eq!(table.sale_window(day(23)), SaleWindow::After);
        assert_eq!(table.sale_window(day(24)), SaleWindow::After);
    }

    #[test]
    fn rejects_empty_slabs() {
        let mut table = RateTable::fy2024_25();
        table.slabs.clear();
        assert_eq!(table.validate(), Err(RateTableError::NoSlabs("FY2024-25".into())));
    }

    #[test]
    fn rejects_first_slab_above_zero() {
        let mut table = RateTable::fy2024_25();
        table.slabs[0].from = dec!(100);
        assert!(matches!(
            table.validate(),
            Err(RateTableError::FirstSlabNotZero { .. })
        ));
    }

    #[test]
    fn rejects_unsorted_slabs() {
        let mut table = RateTable::fy2024_25();
        table.slabs.swap(2, 3);
        assert!(matches!(
            table.validate(),
            Err(RateTableError::UnsortedSlabs { .. })
        ));
    }

    #[test]
    fn rejects_rate_above_one() {
        let mut table = RateTable::fy2024_25();
        table.cess_rate = dec!(4);
        assert_eq!(
            table.validate(),
            Err(RateTableError::RateOutOfRange {
                version: "FY2024-25".into(),
                name: "cess_rate",
                value: dec!(4),
            })
        );
    }

    #[test]
    fn rejects_negative_exemption() {
        let mut table = RateTable::fy2024_25();
        table.equity_mf.ltcg_exemption = dec!(-1);
        assert!(matches!(
            table.validate(),
            Err(RateTableError::NegativeAmount { name: "equity_mf.ltcg_exemption", .. })
        ));
    }

    #[test]
    fn allocation_defaults_when_absent_from_json() {
        let mut value = serde_json::to_value(RateTable::fy2024_25()).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .remove("ltcg_exemption_allocation");
        let table: RateTable = serde_json::from_value(value).unwrap();
        assert_eq!(table.ltcg_exemption_allocation, ExemptionAllocation::Proportional);
    }

    #[test]
    fn loads_tables_and_skips_bad_files() {
        let dir = scratch_dir("load");
        let mut next_year = RateTable::fy2024_25();
        next_year.version = "FY2025-26".into();
        next_year.standard_deduction = dec!(100000);
        std::fs::write(dir.join("fy2025_26.json"), serde_json::to_string(&next_year).unwrap())
            .unwrap();
        std::fs::write(dir.join("broken.json"), "{ not json").unwrap();
        let mut invalid = RateTable::fy2024_25();
        invalid.version = "BAD".into();
        invalid.slabs.clear();
        std::fs::write(dir.join("invalid.json"), serde_json::to_string(&invalid).unwrap())
            .unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let tables = load_rate_tables_from_dir(&dir).unwrap();
        assert_eq!(tables, vec![next_year]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn registry_overrides_builtin_version() {
        let dir = scratch_dir("registry");
        let mut patched = RateTable::fy2024_25();
        patched.ltcg_exemption_allocation = ExemptionAllocation::BeforeFirst;
        std::fs::write(dir.join("fy2024_25.json"), serde_json::to_string(&patched).unwrap())
            .unwrap();

        let registry = rate_table_registry(Some(&dir)).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry[FY2024_25].ltcg_exemption_allocation,
            ExemptionAllocation::BeforeFirst
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn registry_without_dir_has_builtin_only() {
        let registry = rate_table_registry(None).unwrap();
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec![FY2024_25]);
    }
}
