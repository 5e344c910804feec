//! Queue to session orchestration

pub mod manager;

pub use manager::{
    Matchmaker, MatchmakerStats, MSG_BLOCK_ACK, MSG_COOLDOWN_REFUSAL, MSG_NOT_CONNECTED,
    MSG_REPORT_ACK, MSG_RESTRICTED,
};
