use std::path::Path;

use tanda_core::circle::Circle;
use tanda_core::error::CircleError;
use tanda_core::event::EventRecord;
use tanda_core::types::CircleId;

/// Persistent state database backed by sled (pure-Rust, no C dependencies).
///
/// Named trees (analogous to column families):
///   circles — CircleId bytes                  → bincode(Circle)
///   events  — CircleId bytes ‖ seq (u64 BE)   → bincode(EventRecord)
///   meta    — utf8 key bytes                  → raw bytes
pub struct StateDb {
    _db: sled::Db,
    circles: sled::Tree,
    events: sled::Tree,
    meta: sled::Tree,
}

impl StateDb {
    /// Open or create the state database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CircleError> {
        let db = sled::open(path).map_err(storage)?;
        Self::from_sled(db)
    }

    /// Open an ephemeral database that is destroyed on drop. Test use only.
    pub fn temporary() -> Result<Self, CircleError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(storage)?;
        Self::from_sled(db)
    }

    fn from_sled(db: sled::Db) -> Result<Self, CircleError> {
        let circles = db.open_tree("circles").map_err(storage)?;
        let events = db.open_tree("events").map_err(storage)?;
        let meta = db.open_tree("meta").map_err(storage)?;
        Ok(Self { _db: db, circles, events, meta })
    }

    // ── Circles ──────────────────────────────────────────────────────────────

    pub fn get_circle(&self, id: &CircleId) -> Result<Option<Circle>, CircleError> {
        match self.circles.get(id.as_bytes()).map_err(storage)? {
            Some(bytes) => {
                let circle = bincode::deserialize(&bytes)
                    .map_err(|e| CircleError::Serialization(e.to_string()))?;
                Ok(Some(circle))
            }
            None => Ok(None),
        }
    }

    pub fn put_circle(&self, circle: &Circle) -> Result<(), CircleError> {
        let bytes = bincode::serialize(circle)
            .map_err(|e| CircleError::Serialization(e.to_string()))?;
        self.circles
            .insert(circle.id.as_bytes(), bytes)
            .map_err(storage)?;
        Ok(())
    }

    pub fn circle_exists(&self, id: &CircleId) -> bool {
        self.circles.contains_key(id.as_bytes()).unwrap_or(false)
    }

    /// All circle ids, in key order.
    pub fn list_circle_ids(&self) -> Result<Vec<CircleId>, CircleError> {
        let mut ids = Vec::new();
        for item in self.circles.iter() {
            let (key, _) = item.map_err(storage)?;
            if key.len() != 32 {
                continue;
            }
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&key);
            ids.push(CircleId::from_bytes(arr));
        }
        Ok(ids)
    }

    // ── Creation sequence ────────────────────────────────────────────────────

    /// Next value of the monotonic circle-creation counter. Feeds circle-id
    /// derivation; callers must hold the engine write lock.
    pub fn next_circle_seq(&self) -> Result<u64, CircleError> {
        let key = b"circle_seq";
        let next = match self.meta.get(key).map_err(storage)? {
            Some(bytes) => u64::from_le_bytes(
                bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| CircleError::Serialization("corrupt circle_seq".into()))?,
            ) + 1,
            None => 1,
        };
        self.meta
            .insert(key, next.to_le_bytes().as_ref())
            .map_err(storage)?;
        Ok(next)
    }

    // ── Events ───────────────────────────────────────────────────────────────

    /// Next per-circle event sequence number. Callers must hold the engine
    /// write lock.
    pub fn next_event_seq(&self, id: &CircleId) -> Result<u64, CircleError> {
        let mut key = b"event_seq:".to_vec();
        key.extend_from_slice(id.as_bytes());
        let next = match self.meta.get(&key).map_err(storage)? {
            Some(bytes) => u64::from_le_bytes(
                bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| CircleError::Serialization("corrupt event_seq".into()))?,
            ) + 1,
            None => 0,
        };
        self.meta
            .insert(key, next.to_le_bytes().as_ref())
            .map_err(storage)?;
        Ok(next)
    }

    pub fn append_event(&self, record: &EventRecord) -> Result<(), CircleError> {
        let bytes = bincode::serialize(record)
            .map_err(|e| CircleError::Serialization(e.to_string()))?;
        self.events
            .insert(event_key(&record.circle_id, record.seq), bytes)
            .map_err(storage)?;
        Ok(())
    }

    /// Events for one circle, ordered by sequence number, starting at
    /// `from_seq`, at most `limit` records.
    pub fn events_for_circle(
        &self,
        id: &CircleId,
        from_seq: u64,
        limit: u32,
    ) -> Result<Vec<EventRecord>, CircleError> {
        let mut out = Vec::new();
        for item in self.events.range(event_key(id, from_seq)..) {
            let (key, value) = item.map_err(storage)?;
            if !key.starts_with(id.as_bytes()) {
                break;
            }
            let record: EventRecord = bincode::deserialize(&value)
                .map_err(|e| CircleError::Serialization(e.to_string()))?;
            out.push(record);
            if out.len() as u32 >= limit {
                break;
            }
        }
        Ok(out)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), CircleError> {
        self._db.flush().map_err(storage)?;
        Ok(())
    }
}

/// Event tree key: circle id then big-endian sequence, so a prefix range scan
/// yields one circle's events in order.
fn event_key(id: &CircleId, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(id.as_bytes());
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn storage(e: sled::Error) -> CircleError {
    CircleError::Storage(e.to_string())
}
