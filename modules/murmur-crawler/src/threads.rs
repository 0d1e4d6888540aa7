//! Thread reconstruction from reply signals.
//!
//! Replies carry the handles they target; grouping collected records by
//! those handles approximates conversation threads. Reply signals are
//! partial (a mirror shows at most a few target handles per reply), so the
//! result is a best-effort grouping, not a faithful conversation tree.

use std::collections::HashMap;

use tracing::debug;

use murmur_common::Record;

/// Group records into threads keyed by reply-target handle and annotate
/// each member with its position. Threads come first in discovery order of
/// their key, then standalone records in their own discovery order.
pub fn group_threads(records: Vec<Record>) -> Vec<Record> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Record>> = HashMap::new();
    let mut standalone: Vec<Record> = Vec::new();

    for record in records {
        match record.reply_target_handles.clone() {
            Some(handles) if !handles.is_empty() => {
                // A reply naming several handles lands in each of their
                // threads; with partial signals we cannot pick one.
                for handle in handles {
                    if !groups.contains_key(&handle) {
                        order.push(handle.clone());
                    }
                    groups.entry(handle).or_default().push(record.clone());
                }
            }
            _ => standalone.push(record),
        }
    }

    let mut out = Vec::new();
    for handle in order {
        let Some(mut members) = groups.remove(&handle) else {
            continue;
        };
        // Chronological only when every member carries a timestamp;
        // otherwise discovery order is the best available signal.
        if members.iter().all(|m| !m.published_at.is_empty()) {
            members.sort_by(|a, b| a.published_at.cmp(&b.published_at));
        }
        let size = members.len() as u32;
        debug!(handle, size, "Reconstructed thread");
        for (idx, mut member) in members.into_iter().enumerate() {
            member.thread_position = Some(idx as u32 + 1);
            member.thread_size = Some(size);
            member.thread_key = Some(format!("thread_{handle}_{size}"));
            out.push(member);
        }
    }
    out.extend(standalone);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;

    fn reply(id: &str, targets: &[&str], published_at: &str) -> Record {
        let mut r = record(id);
        r.reply_target_handles = Some(targets.iter().map(|t| t.to_string()).collect());
        r.published_at = published_at.to_string();
        r
    }

    #[test]
    fn thread_sorted_chronologically_when_timestamps_present() {
        let records = vec![reply("1", &["host"], "2"), reply("2", &["host"], "1")];
        let grouped = group_threads(records);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].id, "2");
        assert_eq!(grouped[1].id, "1");
        assert_eq!(grouped[0].thread_position, Some(1));
        assert_eq!(grouped[1].thread_position, Some(2));
        assert_eq!(grouped[0].thread_size, Some(2));
        assert_eq!(grouped[0].thread_key.as_deref(), Some("thread_host_2"));
    }

    #[test]
    fn missing_timestamp_keeps_discovery_order() {
        let records = vec![reply("a", &["host"], "9"), reply("b", &["host"], "")];
        let grouped = group_threads(records);
        assert_eq!(grouped[0].id, "a");
        assert_eq!(grouped[1].id, "b");
    }

    #[test]
    fn multi_target_reply_lands_in_each_thread() {
        let records = vec![
            reply("1", &["alice", "bob"], "1"),
            reply("2", &["alice"], "2"),
        ];
        let grouped = group_threads(records);

        // id 1 appears twice, once per thread
        assert_eq!(grouped.len(), 3);
        let alice: Vec<_> = grouped
            .iter()
            .filter(|r| r.thread_key.as_deref() == Some("thread_alice_2"))
            .collect();
        assert_eq!(alice.len(), 2);
        let bob: Vec<_> = grouped
            .iter()
            .filter(|r| r.thread_key.as_deref() == Some("thread_bob_1"))
            .collect();
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0].id, "1");
    }

    #[test]
    fn standalone_records_follow_threads_unannotated() {
        let records = vec![record("solo"), reply("r", &["host"], "1")];
        let grouped = group_threads(records);

        assert_eq!(grouped[0].id, "r");
        assert_eq!(grouped[1].id, "solo");
        assert!(grouped[1].thread_key.is_none());
        assert!(grouped[1].thread_position.is_none());
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(group_threads(Vec::new()).is_empty());
    }
}
