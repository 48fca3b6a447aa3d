use super::{stored_money, Store};
use crate::{
    error::EtlResult,
    schema::MONEY_SCALE,
    types::{AgencyId, Money, Year},
};
use rusqlite::{params, Row};

/// One staging line as the cash-flow report needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct CashFlowRow {
    pub agency_id: AgencyId,
    pub prod_abbr: String,
    pub year:      Year,
    pub earned:    Money,
    pub losses:    Money,
}

/// One staging line as the profitability report needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct PremiumRow {
    pub prod_abbr: String,
    pub written:   Money,
}

fn money_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Money> {
    let raw = row.get_ref(idx)?;
    stored_money(raw, MONEY_SCALE)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, raw.data_type(), Box::new(e)))
}

impl Store {
    /// Staging rows for one agency, in load order.
    pub fn cash_flow_rows(&self, agency_id: AgencyId) -> EtlResult<Vec<CashFlowRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT AGENCY_ID, PROD_ABBR, STAT_PROFILE_DATE_YEAR,
                    PRD_ERND_PREM_AMT, PRD_INCRD_LOSSES_AMT
             FROM staging WHERE AGENCY_ID = ?1
             ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![agency_id], |r| {
                Ok(CashFlowRow {
                    agency_id: r.get(0)?,
                    prod_abbr: r.get(1)?,
                    year:      r.get(2)?,
                    earned:    money_at(r, 3)?,
                    losses:    money_at(r, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Staging rows for one agency and profile year, in load order.
    pub fn written_premium_rows(
        &self,
        agency_id: AgencyId,
        year: Year,
    ) -> EtlResult<Vec<PremiumRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT PROD_ABBR, WRTN_PREM_AMT
             FROM staging
             WHERE AGENCY_ID = ?1 AND STAT_PROFILE_DATE_YEAR = ?2
             ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![agency_id, year], |r| {
                Ok(PremiumRow {
                    prod_abbr: r.get(0)?,
                    written:   money_at(r, 1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
