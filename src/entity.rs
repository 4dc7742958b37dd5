use crate::schema::AccountRecord;
use log::warn;
use std::collections::HashSet;

/// Identity key of a record: the alternate name when present, else the primary name.
pub fn entity_key(record: &AccountRecord) -> &str {
    if !record.alternate_name().is_empty() {
        record.alternate_name()
    } else {
        record.primary_name()
    }
}

/// Finds the first record with the given key.
///
/// Linear scan; report snapshots hold tens of accounts. Swap in a per-period
/// key index if that stops being true.
pub fn find_by_key<'a>(records: &'a [AccountRecord], key: &str) -> Option<&'a AccountRecord> {
    records.iter().find(|r| entity_key(r) == key)
}

/// Keeps the first record per entity key, preserving row order.
pub fn dedup_by_key(records: &[AccountRecord]) -> Vec<&AccountRecord> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|record| {
            let key = entity_key(*record);
            let first = seen.insert(key);
            if !first {
                warn!("Duplicate entity key '{}', keeping first occurrence", key);
            }
            first
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(primary: &str, alternate: &str) -> AccountRecord {
        AccountRecord::new(primary, alternate, BTreeMap::new())
    }

    #[test]
    fn test_alternate_name_is_preferred() {
        assert_eq!(entity_key(&record("晨报", "cb")), "cb");
        assert_eq!(entity_key(&record("晨报", "")), "晨报");
        assert_eq!(entity_key(&record("", "")), "");
    }

    #[test]
    fn test_key_is_deterministic() {
        let r = record("晨报", "cb");
        assert_eq!(entity_key(&r), entity_key(&r.clone()));
    }

    #[test]
    fn test_find_by_key_matches_resolved_key() {
        let records = vec![record("晨报", "cb"), record("晚报", "")];
        assert_eq!(find_by_key(&records, "cb").unwrap().primary_name(), "晨报");
        assert_eq!(find_by_key(&records, "晚报").unwrap().primary_name(), "晚报");
        assert!(find_by_key(&records, "晨报").is_none());
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let records = vec![
            record("晨报", "cb"),
            record("晨报二", "cb"),
            record("晚报", ""),
        ];
        let deduped = dedup_by_key(&records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].primary_name(), "晨报");
        assert_eq!(deduped[1].primary_name(), "晚报");
    }
}
