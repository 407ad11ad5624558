//! # Tables
//!
//! Every logical store lives in one value so a single transaction can
//! span the event store and the report ledger.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{ReasonReport, RevisionRecord};
use crate::model::Event;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    /// Event id -> event (reasons embedded)
    pub events: BTreeMap<Uuid, Event>,
    /// Ingestion identity -> event id
    pub event_keys: BTreeMap<String, Uuid>,
    /// Report id -> report
    pub reports: BTreeMap<Uuid, ReasonReport>,
    /// Reason id -> its single non-terminal report
    pub open_reports: BTreeMap<Uuid, Uuid>,
    /// Append-only revision log
    pub revisions: Vec<RevisionRecord>,
    /// Last issued append sequence number
    pub sequence: u64,
}

impl Tables {
    /// Next append sequence number
    pub fn next_seq(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}
