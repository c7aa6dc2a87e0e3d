//! Strategy: closed set of decomposition shapes (spec §4.6, §4.7, GLOSSARY).

use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    TopDown,
    BottomUp,
    Spike,
    Incremental,
    Parallel,
    Sequential,
    DeadlineDriven,
    QualityFirst,
    Collaboration,
    Experimental,
}

impl Strategy {
    pub const ALL: [Strategy; 10] = [
        Strategy::TopDown,
        Strategy::BottomUp,
        Strategy::Spike,
        Strategy::Incremental,
        Strategy::Parallel,
        Strategy::Sequential,
        Strategy::DeadlineDriven,
        Strategy::QualityFirst,
        Strategy::Collaboration,
        Strategy::Experimental,
    ];
}
