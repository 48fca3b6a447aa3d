//! Ad-hoc reports over staging.
//!
//! Both reports take typed rows from the store (bound parameters, no
//! formatted filters) and do the arithmetic in exact decimals here.
//! No matching rows gives an empty table with the usual columns.

use crate::{
    schema::{AGENCY_ID, MONEY_SCALE, PROD_ABBR, WRTN_PREM_AMT},
    store::{CashFlowRow, PremiumRow},
    table::{Table, Value},
    types::{AgencyId, Money, Year},
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Net cash flow (earned premium minus incurred losses) per agency/product,
/// one column per profile year, limited to the `years` most recent years.
///
/// Year columns are sorted ascending before the window is taken, so the kept
/// columns are the largest years present. Missing combinations are 0.
pub fn net_cash_flows(rows: &[CashFlowRow], years: usize) -> Table {
    let mut cells: BTreeMap<(AgencyId, String), BTreeMap<Year, Money>> = BTreeMap::new();
    let mut all_years: BTreeSet<Year> = BTreeSet::new();

    for r in rows {
        let net = r.earned - r.losses;
        *cells
            .entry((r.agency_id, r.prod_abbr.clone()))
            .or_default()
            .entry(r.year)
            .or_default() += net;
        all_years.insert(r.year);
    }

    let kept: Vec<Year> = {
        let skip = all_years.len().saturating_sub(years);
        all_years.into_iter().skip(skip).collect()
    };

    let mut columns = vec![AGENCY_ID.to_string(), PROD_ABBR.to_string()];
    columns.extend(kept.iter().map(ToString::to_string));
    let mut table = Table::new(columns);

    let zero = Money::new(0, MONEY_SCALE);
    for ((agency_id, prod_abbr), by_year) in cells {
        let mut row = vec![Value::Integer(agency_id), Value::Text(prod_abbr)];
        row.extend(
            kept.iter()
                .map(|y| Value::Decimal(by_year.get(y).copied().unwrap_or(zero))),
        );
        table.push_row(row);
    }
    table
}

/// Written premium per product, highest first.
///
/// Products tied on premium keep the order in which they first appear.
pub fn profitability(rows: &[PremiumRow]) -> Table {
    let mut order: Vec<(String, Money)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for r in rows {
        match index.get(r.prod_abbr.as_str()) {
            Some(&i) => order[i].1 += r.written,
            None => {
                index.insert(&r.prod_abbr, order.len());
                order.push((r.prod_abbr.clone(), r.written));
            }
        }
    }
    // sort_by is stable
    order.sort_by(|a, b| b.1.cmp(&a.1));

    let mut table = Table::new([PROD_ABBR, WRTN_PREM_AMT]);
    for (prod_abbr, written) in order {
        table.push_row(vec![Value::Text(prod_abbr), Value::Decimal(written)]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn cf(prod: &str, year: Year, earned: i64, losses: i64) -> CashFlowRow {
        CashFlowRow {
            agency_id: 3,
            prod_abbr: prod.into(),
            year,
            earned: Decimal::new(earned, 0),
            losses: Decimal::new(losses, 0),
        }
    }

    fn premium(prod: &str, written: i64) -> PremiumRow {
        PremiumRow {
            prod_abbr: prod.into(),
            written: Decimal::new(written, 0),
        }
    }

    #[test]
    fn pivots_net_cash_flow_with_zero_fill() {
        let rows = vec![
            cf("123", 2015, 90, 0),
            cf("123", 2015, 110, 20),
            cf("456", 2017, 120, 0),
            cf("123", 2015, 0, 100),
        ];
        let t = net_cash_flows(&rows, 5);
        assert_eq!(t.columns(), ["AGENCY_ID", "PROD_ABBR", "2015", "2017"]);
        assert_eq!(
            t.rows()[0][2..],
            [Value::Decimal(Decimal::new(80, 0)), Value::Decimal(Decimal::ZERO)]
        );
        assert_eq!(
            t.rows()[1][2..],
            [Value::Decimal(Decimal::ZERO), Value::Decimal(Decimal::new(120, 0))]
        );
    }

    #[test]
    fn keeps_only_the_most_recent_years() {
        let rows: Vec<CashFlowRow> = [2019, 2012, 2014, 2013, 2017, 2016, 2015]
            .into_iter()
            .map(|y| cf("123", y, 10, 0))
            .collect();
        let t = net_cash_flows(&rows, 5);
        assert_eq!(
            t.columns(),
            ["AGENCY_ID", "PROD_ABBR", "2014", "2015", "2016", "2017", "2019"]
        );
    }

    #[test]
    fn rows_outside_the_window_still_appear() {
        let rows = vec![cf("123", 2010, 10, 0), cf("456", 2020, 10, 0)];
        let t = net_cash_flows(&rows, 1);
        assert_eq!(t.columns(), ["AGENCY_ID", "PROD_ABBR", "2020"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.rows()[0][2], Value::Decimal(Decimal::ZERO));
    }

    #[test]
    fn empty_cash_flows_keep_index_columns() {
        let t = net_cash_flows(&[], 5);
        assert!(t.is_empty());
        assert_eq!(t.columns(), ["AGENCY_ID", "PROD_ABBR"]);
    }

    #[test]
    fn ranks_products_by_written_premium() {
        let rows = vec![
            premium("123", 100),
            premium("456", 50),
            premium("123", 110),
            premium("789", 400),
            premium("123", 130),
        ];
        let t = profitability(&rows);
        let products: Vec<&str> = t.column("PROD_ABBR").unwrap().filter_map(Value::as_text).collect();
        assert_eq!(products, ["789", "123", "456"]);
        assert_eq!(t.rows()[1][1], Value::Decimal(Decimal::new(340, 0)));
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let rows = vec![premium("B", 10), premium("A", 10), premium("C", 20)];
        let t = profitability(&rows);
        let products: Vec<&str> = t.column("PROD_ABBR").unwrap().filter_map(Value::as_text).collect();
        assert_eq!(products, ["C", "B", "A"]);
    }
}
