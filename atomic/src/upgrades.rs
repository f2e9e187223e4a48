use anyhow::Context;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpgradeError {
    #[error("Apricot phase {later} is scheduled but phase {earlier} is not")]
    MissingPhase { earlier: u8, later: u8 },
    #[error("Apricot phase {later} activates at {later_time}, before phase {earlier} at {earlier_time}")]
    OutOfOrder {
        earlier: u8,
        earlier_time: u64,
        later: u8,
        later_time: u64,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Activation timestamps of the protocol upgrades touching atomic transactions.
/// A phase without timestamp is never active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkUpgrades {
    #[serde(
        rename = "apricotPhase1BlockTimestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub apricot_phase_1: Option<u64>,
    #[serde(
        rename = "apricotPhase2BlockTimestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub apricot_phase_2: Option<u64>,
    #[serde(
        rename = "apricotPhase3BlockTimestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub apricot_phase_3: Option<u64>,
    #[serde(
        rename = "apricotPhase4BlockTimestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub apricot_phase_4: Option<u64>,
    #[serde(
        rename = "apricotPhase5BlockTimestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub apricot_phase_5: Option<u64>,
}

/// Flags of the upgrades active at a given block.
/// Selected once per block and passed by value to every check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rules {
    // Outputs of an import must be sorted
    pub is_apricot_phase_1: bool,
    // Flat import fee, import outputs sorted and unique
    pub is_apricot_phase_2: bool,
    // Dynamic fees, import outputs are mandatory
    pub is_apricot_phase_3: bool,
    pub is_apricot_phase_4: bool,
    // Fixed base cost, any chain of the same allychain is a valid peer
    pub is_apricot_phase_5: bool,
}

impl NetworkUpgrades {
    // Phases 1 to `phase` active from genesis, later ones never
    pub fn active_until(phase: u8) -> Self {
        let at = |n: u8| if n <= phase { Some(0) } else { None };
        Self {
            apricot_phase_1: at(1),
            apricot_phase_2: at(2),
            apricot_phase_3: at(3),
            apricot_phase_4: at(4),
            apricot_phase_5: at(5),
        }
    }

    pub fn apricot_phase_0() -> Self {
        Self::active_until(0)
    }

    pub fn apricot_phase_1() -> Self {
        Self::active_until(1)
    }

    pub fn apricot_phase_2() -> Self {
        Self::active_until(2)
    }

    pub fn apricot_phase_3() -> Self {
        Self::active_until(3)
    }

    pub fn apricot_phase_4() -> Self {
        Self::active_until(4)
    }

    pub fn apricot_phase_5() -> Self {
        Self::active_until(5)
    }

    fn phases(&self) -> [Option<u64>; 5] {
        [
            self.apricot_phase_1,
            self.apricot_phase_2,
            self.apricot_phase_3,
            self.apricot_phase_4,
            self.apricot_phase_5,
        ]
    }

    // Each phase must be scheduled at or after the previous one
    pub fn validate(&self) -> Result<(), UpgradeError> {
        let phases = self.phases();
        for (i, pair) in phases.windows(2).enumerate() {
            let earlier = i as u8 + 1;
            let later = earlier + 1;
            match (pair[0], pair[1]) {
                (None, Some(_)) => return Err(UpgradeError::MissingPhase { earlier, later }),
                (Some(earlier_time), Some(later_time)) if later_time < earlier_time => {
                    return Err(UpgradeError::OutOfOrder {
                        earlier,
                        earlier_time,
                        later,
                        later_time,
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn rules(&self, timestamp: u64) -> Rules {
        let active = |phase: Option<u64>| phase.is_some_and(|at| at <= timestamp);
        Rules {
            is_apricot_phase_1: active(self.apricot_phase_1),
            is_apricot_phase_2: active(self.apricot_phase_2),
            is_apricot_phase_3: active(self.apricot_phase_3),
            is_apricot_phase_4: active(self.apricot_phase_4),
            is_apricot_phase_5: active(self.apricot_phase_5),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, UpgradeError> {
        let upgrades: Self = serde_json::from_str(json)?;
        upgrades.validate()?;
        Ok(upgrades)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        debug!("Loading network upgrades from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read network upgrades from {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid network upgrades in {}", path.display()))
    }
}
