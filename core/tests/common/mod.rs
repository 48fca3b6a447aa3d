//! Shared fixtures: the five-row agency extract and engine setup.

#![allow(dead_code)]

use agency_etl_core::{config::EtlConfig, engine::EtlEngine, store::Store};
use std::path::Path;

pub const HEADER: &str = "AGENCY_ID,PRIMARY_AGENCY_ID,VENDOR,VENDOR_IND,ACTIVE_PRODUCERS,\
AGENCY_APPOINTMENT_YEAR,PROD_ABBR,PROD_LINE,STATE_ABBR,STAT_PROFILE_DATE_YEAR,\
WRTN_PREM_AMT,PRD_ERND_PREM_AMT,PRD_INCRD_LOSSES_AMT,POLY_INFORCE_QTY";

/// Agency 3 has three 2015 lines for product 123 and one 2017 line for 456;
/// agency 4 has a single 2014 line.
pub const ROWS: &[&str] = &[
    "3,3,ABC,Y,2,2015,123,CL,IL,2015,100,90,0,1",
    "3,3,DEF,Y,2,2015,123,CL,IL,2015,110,110,20,2",
    "3,3,ABC,Y,2,2015,456,PL,IL,2017,120,120,0,3",
    "3,3,ABC,Y,2,2014,123,CL,IL,2015,130,0,100,4",
    "4,4,ABC,N,1,2015,456,CL,OH,2014,140,130,0,5",
];

pub fn write_extract(root: &Path, rows: &[&str]) {
    let mut content = String::from(HEADER);
    for r in rows {
        content.push('\n');
        content.push_str(r);
    }
    content.push('\n');
    std::fs::write(root.join("finalapi.csv"), content).expect("write extract");
}

/// In-memory engine rooted at `root`, with the fixture extract written there.
pub fn fixture_engine(root: &Path) -> EtlEngine {
    write_extract(root, ROWS);
    EtlEngine::build(EtlConfig::with_root(root), Store::in_memory().expect("in-memory store"))
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
