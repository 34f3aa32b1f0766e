//! Lifecycle log entries pulled from peer supernodes.
//!
//! Log ids are time-derived: the high 32 bits carry the Unix second the
//! entry was written, the low 32 bits a sequence. [`staleness_cutoff`]
//! relies on that layout.

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinerLogKind {
    New,
    Delete,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerLog {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(rename = "minerID")]
    pub miner_id: NodeId,
    #[serde(rename = "fromStatus")]
    pub from_status: i32,
    #[serde(rename = "toStatus")]
    pub to_status: i32,
    #[serde(rename = "type")]
    pub kind: MinerLogKind,
    pub timestamp: i64,
}

impl MinerLog {
    /// First registration of a miner.
    pub fn is_registration(&self) -> bool {
        self.kind == MinerLogKind::New && self.from_status == -1
    }

    /// Removal of a miner.
    pub fn is_removal(&self) -> bool {
        self.kind == MinerLogKind::Delete && self.to_status == -1
    }
}

/// Highest log id old enough to process: `now - skip_time` in the high 32
/// bits (as a signed 32-bit second count), zero in the low 32 bits.
pub fn staleness_cutoff(now: i64, skip_time: i64) -> i64 {
    let horizon = now.wrapping_sub(skip_time) as i32;
    (horizon as i64) << 32
}

/// One batch of log entries ready to apply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MinerLogPage {
    pub logs: Vec<MinerLog>,
    /// More entries are available past this page.
    pub more: bool,
    /// Cursor for the next request when `more` is set.
    pub next: i64,
}

impl MinerLogPage {
    /// Build a page from a response to a request for `requested` entries
    /// (one more than the batch size).
    ///
    /// Entries past `cutoff` are dropped, stopping at the first one. If the
    /// full request survives, the extra entry becomes `next` and is not part
    /// of the page.
    pub fn from_fetched(mut fetched: Vec<MinerLog>, requested: usize, cutoff: i64) -> Self {
        if let Some(pos) = fetched.iter().position(|log| log.id > cutoff) {
            fetched.truncate(pos);
        }
        if requested > 0 && fetched.len() == requested {
            let next = fetched[requested - 1].id;
            fetched.truncate(requested - 1);
            return Self {
                logs: fetched,
                more: true,
                next,
            };
        }
        Self {
            logs: fetched,
            more: false,
            next: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64) -> MinerLog {
        MinerLog {
            id,
            miner_id: 1,
            from_status: -1,
            to_status: 1,
            kind: MinerLogKind::New,
            timestamp: 0,
        }
    }

    fn id_at(secs: i64, seq: i64) -> i64 {
        (secs << 32) | seq
    }

    #[test]
    fn cutoff_places_horizon_in_high_bits() {
        assert_eq!(staleness_cutoff(1_000, 180), 820i64 << 32);
        assert_eq!(staleness_cutoff(1_000, 180) & 0xffff_ffff, 0);
    }

    #[test]
    fn truncates_at_first_recent_entry() {
        let cutoff = staleness_cutoff(1_000, 180);
        let fetched = vec![entry(id_at(800, 1)), entry(id_at(821, 0)), entry(id_at(810, 0))];
        let page = MinerLogPage::from_fetched(fetched, 11, cutoff);
        assert_eq!(page.logs.len(), 1);
        assert!(!page.more);
    }

    #[test]
    fn boundary_entry_is_kept() {
        let cutoff = staleness_cutoff(1_000, 180);
        let page = MinerLogPage::from_fetched(
            vec![entry(id_at(820, 0)), entry(id_at(820, 1))],
            11,
            cutoff,
        );
        assert_eq!(page.logs, vec![entry(id_at(820, 0))]);
    }

    #[test]
    fn full_page_reports_more_and_holds_back_extra_entry() {
        let fetched: Vec<_> = (1..=4).map(entry).collect();
        let page = MinerLogPage::from_fetched(fetched, 4, i64::MAX);
        assert!(page.more);
        assert_eq!(page.next, 4);
        assert_eq!(page.logs.iter().map(|l| l.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn truncated_full_page_is_not_more() {
        let fetched: Vec<_> = (1..=4).map(entry).collect();
        let page = MinerLogPage::from_fetched(fetched, 4, 3);
        assert!(!page.more);
        assert_eq!(page.logs.len(), 3);
    }

    #[test]
    fn classifies_lifecycle_events() {
        let mut log = entry(1);
        assert!(log.is_registration());
        log.from_status = 0;
        assert!(!log.is_registration());
        log.kind = MinerLogKind::Delete;
        log.to_status = -1;
        assert!(log.is_removal());
    }

    #[test]
    fn parses_remote_json() {
        let raw = r#"[{"_id":1000,"minerID":7,"fromStatus":-1,"toStatus":1,"type":"new","timestamp":55},
                      {"_id":1001,"minerID":8,"fromStatus":1,"toStatus":2,"type":"update","timestamp":56}]"#;
        let logs: Vec<MinerLog> = serde_json::from_str(raw).unwrap();
        assert_eq!(logs[0].kind, MinerLogKind::New);
        assert_eq!(logs[1].kind, MinerLogKind::Unknown);
    }
}
