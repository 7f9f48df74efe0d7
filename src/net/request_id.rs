//! Request identifier generation.
//!
//! Identifiers travel as `x-request-id` call metadata so the server can
//! correlate log lines. Uniqueness is the only format requirement.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata key carrying the request identifier.
pub const REQUEST_ID_KEY: &str = "x-request-id";

/// Source of unique request identifiers.
pub trait RequestIdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Identifier format selected in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestIdFormat {
    #[default]
    Uuid,
    Snowflake,
}

impl RequestIdFormat {
    /// Construct the generator for this format.
    pub fn build(self) -> Box<dyn RequestIdGenerator> {
        match self {
            RequestIdFormat::Uuid => Box::new(UuidGenerator),
            RequestIdFormat::Snowflake => Box::new(SnowflakeGenerator::with_random_node()),
        }
    }
}

/// Random UUID v4 identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl RequestIdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 13;
const MAX_NODE: u16 = (1 << NODE_BITS) - 1;
const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

/// Time-ordered 64-bit identifiers: millis (41 bits) | node (10) | sequence (13).
///
/// When the sequence space of a millisecond is used up the generator moves
/// its logical clock one millisecond ahead instead of sleeping, so it never
/// blocks the calling task.
#[derive(Debug)]
pub struct SnowflakeGenerator {
    node_id: u16,
    state: Mutex<SnowflakeState>,
}

#[derive(Debug, Default)]
struct SnowflakeState {
    last_ms: u64,
    sequence: u16,
}

impl SnowflakeGenerator {
    /// Create a generator for `node_id` (reduced modulo 1024).
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id: node_id & MAX_NODE,
            state: Mutex::new(SnowflakeState::default()),
        }
    }

    pub fn with_random_node() -> Self {
        Self::new(rand::random::<u16>())
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    fn next_id(&self, now_ms: u64) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if now_ms > state.last_ms {
            state.last_ms = now_ms;
            state.sequence = 0;
        } else if state.sequence == MAX_SEQUENCE {
            state.last_ms += 1;
            state.sequence = 0;
        } else {
            state.sequence += 1;
        }

        (state.last_ms << (NODE_BITS + SEQUENCE_BITS))
            | (u64::from(self.node_id) << SEQUENCE_BITS)
            | u64::from(state.sequence)
    }
}

impl RequestIdGenerator for SnowflakeGenerator {
    fn generate(&self) -> String {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.next_id(now_ms).to_string()
    }
}
