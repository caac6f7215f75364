//! Which input hashes the current transform output was produced from.

use crate::guid::Guid;
use quarry_cache::StampRecord;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stamp {
    /// Asset hash of the last transform attempt.
    pub(crate) asset_hash: u64,
    /// Thumbnail hash of the current thumbnail, if one was created.
    pub(crate) thumb_hash: Option<u64>,
    /// The last attempt for `asset_hash` failed.
    pub(crate) failed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct TransformLedger {
    stamps: HashMap<(Guid, String), Stamp>,
}

impl TransformLedger {
    pub(crate) fn get(&self, guid: Guid, profile: &str) -> Option<&Stamp> {
        self.stamps.get(&(guid, profile.to_string()))
    }

    pub(crate) fn record_success(&mut self, guid: Guid, profile: &str, asset_hash: u64) {
        let stamp = self.stamps.entry((guid, profile.to_string())).or_insert(Stamp {
            asset_hash,
            thumb_hash: None,
            failed: false,
        });
        stamp.asset_hash = asset_hash;
        stamp.failed = false;
    }

    pub(crate) fn record_failure(&mut self, guid: Guid, profile: &str, asset_hash: u64) {
        let stamp = self.stamps.entry((guid, profile.to_string())).or_insert(Stamp {
            asset_hash,
            thumb_hash: None,
            failed: true,
        });
        stamp.asset_hash = asset_hash;
        stamp.failed = true;
    }

    pub(crate) fn record_thumbnail(&mut self, guid: Guid, profile: &str, thumb_hash: u64) {
        if let Some(stamp) = self.stamps.get_mut(&(guid, profile.to_string())) {
            stamp.thumb_hash = Some(thumb_hash);
        }
    }

    pub(crate) fn forget(&mut self, guid: Guid) {
        self.stamps.retain(|(stamped, _), _| *stamped != guid);
    }

    pub(crate) fn load(&mut self, records: Vec<StampRecord>) {
        for record in records {
            let Ok(guid) = Guid::parse(&record.guid) else {
                tracing::debug!(guid = %record.guid, "skipping cached stamp with invalid GUID");
                continue;
            };
            let stamp = Stamp {
                asset_hash: record.asset_hash,
                thumb_hash: record.thumb_hash,
                failed: record.failed,
            };
            self.stamps.insert((guid, record.profile), stamp);
        }
    }

    pub(crate) fn to_records(&self) -> Vec<StampRecord> {
        let mut records: Vec<_> = self
            .stamps
            .iter()
            .map(|((guid, profile), stamp)| StampRecord {
                guid: guid.to_string(),
                profile: profile.clone(),
                asset_hash: stamp.asset_hash,
                thumb_hash: stamp.thumb_hash,
                failed: stamp.failed,
            })
            .collect();
        records.sort_by(|a, b| (&a.guid, &a.profile).cmp(&(&b.guid, &b.profile)));
        records
    }
}
