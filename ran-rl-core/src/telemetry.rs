//! Telemetry schema shared with the external RAN simulator
//!
//! The simulator reports one fixed-layout row of doubles per user per step:
//! the user identifier (IMSI) followed by [`FIELD_COUNT`] link statistics.
//! [`TelemetryRecord::decode_row`] and [`ActionAssignment::encode`] are the
//! only decode/encode boundary; everything behind them works with named
//! fields.

use serde::{Deserialize, Serialize};

use crate::{Result, RlError};

/// Number of per-user statistics in one telemetry row (IMSI excluded)
pub const FIELD_COUNT: usize = 27;

/// Length of one raw telemetry row: IMSI plus the statistics
pub const ROW_LEN: usize = FIELD_COUNT + 1;

/// User identifier (IMSI) as reported by the simulator
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct UserId(pub u32);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Named per-user telemetry statistics, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryField {
    /// Modulation and coding scheme index
    Mcs,
    /// Allocated OFDM symbols
    Symbols,
    /// Signal to interference plus noise ratio
    Sinr,
    /// RLC transmitted packets
    RlcTxPackets,
    /// RLC transmitted bytes
    RlcTxData,
    /// RLC received packets
    RlcRxPackets,
    /// RLC received bytes
    RlcRxData,
    /// RLC delay mean
    RlcDelayMean,
    /// RLC delay standard deviation
    RlcDelayStdev,
    /// RLC delay minimum
    RlcDelayMin,
    /// RLC delay maximum
    RlcDelayMax,
    /// PDCP transmitted packets
    PdcpTxPackets,
    /// PDCP transmitted bytes
    PdcpTxData,
    /// PDCP received packets
    PdcpRxPackets,
    /// PDCP received bytes
    PdcpRxData,
    /// PDCP delay mean
    PdcpDelayMean,
    /// PDCP delay standard deviation
    PdcpDelayStdev,
    /// PDCP delay minimum
    PdcpDelayMin,
    /// PDCP delay maximum
    PdcpDelayMax,
    /// Application transmitted bursts
    AppTxPackets,
    /// Application transmitted bytes
    AppTxData,
    /// Application received bursts
    AppRxPackets,
    /// Application received bytes
    AppRxData,
    /// Application delay mean
    AppDelayMean,
    /// Application delay standard deviation
    AppDelayStdev,
    /// Application delay minimum
    AppDelayMin,
    /// Application delay maximum
    AppDelayMax,
}

impl TelemetryField {
    /// Every field, in wire order
    pub const ALL: [TelemetryField; FIELD_COUNT] = [
        TelemetryField::Mcs,
        TelemetryField::Symbols,
        TelemetryField::Sinr,
        TelemetryField::RlcTxPackets,
        TelemetryField::RlcTxData,
        TelemetryField::RlcRxPackets,
        TelemetryField::RlcRxData,
        TelemetryField::RlcDelayMean,
        TelemetryField::RlcDelayStdev,
        TelemetryField::RlcDelayMin,
        TelemetryField::RlcDelayMax,
        TelemetryField::PdcpTxPackets,
        TelemetryField::PdcpTxData,
        TelemetryField::PdcpRxPackets,
        TelemetryField::PdcpRxData,
        TelemetryField::PdcpDelayMean,
        TelemetryField::PdcpDelayStdev,
        TelemetryField::PdcpDelayMin,
        TelemetryField::PdcpDelayMax,
        TelemetryField::AppTxPackets,
        TelemetryField::AppTxData,
        TelemetryField::AppRxPackets,
        TelemetryField::AppRxData,
        TelemetryField::AppDelayMean,
        TelemetryField::AppDelayStdev,
        TelemetryField::AppDelayMin,
        TelemetryField::AppDelayMax,
    ];

    /// Position of the field within a telemetry row (IMSI excluded)
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Configuration-facing field name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TelemetryField::Mcs => "mcs",
            TelemetryField::Symbols => "symbols",
            TelemetryField::Sinr => "sinr",
            TelemetryField::RlcTxPackets => "rlc_tx_pkt",
            TelemetryField::RlcTxData => "rlc_tx_data",
            TelemetryField::RlcRxPackets => "rlc_rx_pkt",
            TelemetryField::RlcRxData => "rlc_rx_data",
            TelemetryField::RlcDelayMean => "rlc_delay_mean",
            TelemetryField::RlcDelayStdev => "rlc_delay_stdev",
            TelemetryField::RlcDelayMin => "rlc_delay_min",
            TelemetryField::RlcDelayMax => "rlc_delay_max",
            TelemetryField::PdcpTxPackets => "pdcp_tx_pkt",
            TelemetryField::PdcpTxData => "pdcp_tx_data",
            TelemetryField::PdcpRxPackets => "pdcp_rx_pkt",
            TelemetryField::PdcpRxData => "pdcp_rx_data",
            TelemetryField::PdcpDelayMean => "pdcp_delay_mean",
            TelemetryField::PdcpDelayStdev => "pdcp_delay_stdev",
            TelemetryField::PdcpDelayMin => "pdcp_delay_min",
            TelemetryField::PdcpDelayMax => "pdcp_delay_max",
            TelemetryField::AppTxPackets => "app_tx_pkt",
            TelemetryField::AppTxData => "app_tx_data",
            TelemetryField::AppRxPackets => "app_rx_pkt",
            TelemetryField::AppRxData => "app_rx_data",
            TelemetryField::AppDelayMean => "app_delay_mean",
            TelemetryField::AppDelayStdev => "app_delay_stdev",
            TelemetryField::AppDelayMin => "app_delay_min",
            TelemetryField::AppDelayMax => "app_delay_max",
        }
    }

    /// Resolve a configuration-facing name to a field
    ///
    /// Unknown names are a fatal configuration error: the caller must fail
    /// fast rather than silently skip the feature.
    pub fn from_name(name: &str) -> Result<Self> {
        TelemetryField::ALL
            .iter()
            .copied()
            .find(|field| field.name() == name)
            .ok_or_else(|| RlError::Config(format!("unknown telemetry field: {name}")))
    }
}

/// One user's telemetry for one time step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Originating user
    pub imsi: UserId,
    /// Statistics in wire order, indexed by [`TelemetryField::index`]
    pub stats: [f64; FIELD_COUNT],
}

impl TelemetryRecord {
    /// Create a record with all statistics zeroed
    #[must_use]
    pub fn new(imsi: UserId) -> Self {
        Self {
            imsi,
            stats: [0.0; FIELD_COUNT],
        }
    }

    /// Read one statistic
    #[must_use]
    pub fn get(&self, field: TelemetryField) -> f64 {
        self.stats[field.index()]
    }

    /// Write one statistic
    pub fn set(&mut self, field: TelemetryField, value: f64) {
        self.stats[field.index()] = value;
    }

    /// Builder-style statistic assignment
    #[must_use]
    pub fn with(mut self, field: TelemetryField, value: f64) -> Self {
        self.set(field, value);
        self
    }

    /// Decode one raw wire row (IMSI followed by the statistics)
    ///
    /// The only inbound boundary with the external simulator. Rejects rows of
    /// the wrong width and IMSIs that are not representable identifiers.
    pub fn decode_row(row: &[f64]) -> Result<Self> {
        if row.len() != ROW_LEN {
            return Err(RlError::DimensionMismatch {
                expected: ROW_LEN,
                actual: row.len(),
            });
        }
        let imsi = row[0];
        if !imsi.is_finite() || imsi < 0.0 || imsi > f64::from(i16::MAX) || imsi.fract() != 0.0 {
            return Err(RlError::Telemetry(format!("invalid IMSI in row: {imsi}")));
        }
        let mut stats = [0.0; FIELD_COUNT];
        stats.copy_from_slice(&row[1..]);
        Ok(Self {
            imsi: UserId(imsi as u32),
            stats,
        })
    }

    /// Encode the record back into a raw wire row
    #[must_use]
    pub fn encode_row(&self) -> [f64; ROW_LEN] {
        let mut row = [0.0; ROW_LEN];
        row[0] = f64::from(self.imsi.0);
        row[1..].copy_from_slice(&self.stats);
        row
    }
}

/// Per-user telemetry for one time step, one record per controlled user
pub type TelemetrySnapshot = Vec<TelemetryRecord>;

/// Action chosen for one user, addressed by IMSI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionAssignment {
    /// Target user
    pub imsi: UserId,
    /// External action label understood by the simulator
    pub label: i16,
}

impl ActionAssignment {
    /// Create an assignment, rejecting IMSIs outside the wire range
    pub fn new(imsi: UserId, label: i16) -> Result<Self> {
        if imsi.0 > i16::MAX as u32 {
            return Err(RlError::Telemetry(format!(
                "IMSI {imsi} not representable on the wire"
            )));
        }
        Ok(Self { imsi, label })
    }

    /// Encode as the `(imsi, label)` wire pair
    ///
    /// The only outbound boundary with the external simulator.
    #[must_use]
    pub fn encode(&self) -> [i16; 2] {
        [self.imsi.0 as i16, self.label]
    }
}
