use super::AssetId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One instrument in a pressure or temperature inventory read off a flow
/// computer's configuration snapshot (§4.B.3). Not part of the 30-metric
/// grain; kept for audit trail and instrument-uncertainty bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Instrument {
    pub serial: Option<String>,
    pub kind: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub range: Option<String>,
    pub last_calibration: Option<NaiveDateTime>,
    pub standard_uncertainty: Option<f64>,
}

/// A flow-computer configuration snapshot (§4.B.3): serial, collection
/// timestamp, ambient/reference conditions, software version, the primary
/// element's meter-factor/pulse-count pairs, and pressure/temperature
/// instrument inventories. Upserted under `(asset_tag, collected_at)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowComputerFact {
    pub id: Option<i64>,
    pub asset_id: AssetId,
    pub asset_tag: String,
    pub serial: Option<String>,
    pub collected_at: Option<NaiveDateTime>,
    pub ambient_temperature_c: Option<f64>,
    pub ambient_pressure_kpa: Option<f64>,
    pub reference_temperature_c: Option<f64>,
    pub reference_pressure_kpa: Option<f64>,
    pub software_version: Option<String>,
    pub meter_factors: Vec<(f64, f64)>,
    pub pressure_instruments: Vec<Instrument>,
    pub temperature_instruments: Vec<Instrument>,
}

impl FlowComputerFact {
    pub fn natural_key(&self) -> (String, Option<NaiveDateTime>) {
        (self.asset_tag.clone(), self.collected_at)
    }
}
