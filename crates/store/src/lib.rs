//! # wavedb store
//!
//! The authoritative in-memory image database and its persistence layer.
//!
//! [`MemDb`] keeps a dense array of per-image metadata indexed by internal
//! ID, a map from external user IDs to internal IDs, and delegates signature
//! indexing to the [`buckets::BucketManager`] inverted index. Internal IDs
//! are private to the store: they are reassigned on removal (swap-with-last)
//! and never escape the public API.
//!
//! Queries score candidates by weighted wavelet-coefficient overlap, seeded
//! with the color-average distance; see [`query`].
//!
//! [`persist::SignatureFile`] streams fixed-size signature records to disk
//! so a database can be rebuilt at startup.
//!
//! ## Concurrency
//!
//! A `MemDb` is a plain value with `&mut self` mutation points; wrap it in a
//! reader-writer lock to share it. Everything that must stay consistent
//! (image array, user-ID map, buckets, ID generator) lives inside the one
//! value, so a single lock covers the whole unit.

pub mod buckets;
mod idgen;
pub mod persist;
mod query;

use hashbrown::HashMap;
use thiserror::Error;

use signature::{DcTriple, Signature};

pub use buckets::BucketManager;
pub use idgen::IdGenerator;
pub use persist::{PersistError, SignatureFile};
pub use query::{max_score, QueryHit, QueryParams};

/// Externally meaningful image identifier, unique per database.
pub type UserId = u64;

/// Dense index into the image array, always in `[0, num_images)`.
/// Reassigned on removal; never exposed outside this crate.
pub(crate) type InternId = u32;

/// Errors surfaced by the in-memory database.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no image with user id {0}")]
    IdNotFound(UserId),
    #[error("image with user id {0} already present")]
    AlreadyHaveId(UserId),
    #[error("internal id space exhausted")]
    CapacityExceeded,
}

/// Per-image metadata held in the dense image array. The signature lives in
/// the bucket manager's mirror, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub user_id: UserId,
    pub dc: DcTriple,
    pub width: u16,
    pub height: u16,
}

/// Full image record as accepted by [`MemDb::add_image`] and returned by
/// [`MemDb::remove_image`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub user_id: UserId,
    pub signature: Signature,
    pub dc: DcTriple,
    pub width: u16,
    pub height: u16,
}

/// In-memory image similarity database.
pub struct MemDb {
    images: Vec<StoredImage>,
    by_user: HashMap<UserId, InternId>,
    buckets: BucketManager,
    idgen: IdGenerator,
}

impl MemDb {
    pub fn new() -> Self {
        Self {
            images: Vec::new(),
            by_user: HashMap::new(),
            buckets: BucketManager::new(),
            idgen: IdGenerator::new(),
        }
    }

    /// Rebuild a database from persisted records.
    pub fn from_file(file: &SignatureFile) -> Result<Self, StoreError> {
        let mut db = Self::new();
        for record in file.iter() {
            db.add_image(record.clone())?;
        }
        Ok(db)
    }

    /// Pure lookup; `None` when the user ID is unknown.
    pub fn has(&self, user_id: UserId) -> Option<&StoredImage> {
        self.by_user
            .get(&user_id)
            .map(|&iid| &self.images[iid as usize])
    }

    /// Like [`has`](Self::has) but an absent ID is an error.
    pub fn get_image(&self, user_id: UserId) -> Result<&StoredImage, StoreError> {
        self.has(user_id).ok_or(StoreError::IdNotFound(user_id))
    }

    /// Full record of a stored image, signature included.
    pub fn image_record(&self, user_id: UserId) -> Result<ImageRecord, StoreError> {
        let iid = *self
            .by_user
            .get(&user_id)
            .ok_or(StoreError::IdNotFound(user_id))?;
        let stored = &self.images[iid as usize];
        Ok(ImageRecord {
            user_id,
            signature: self.buckets.signature(iid).clone(),
            dc: stored.dc,
            width: stored.width,
            height: stored.height,
        })
    }

    /// Insert a signed image record.
    ///
    /// The user ID is observed by the generator even when insertion fails,
    /// so generated IDs keep clear of everything callers have mentioned. On
    /// failure every other structure is left in the pre-call state.
    pub fn add_image(&mut self, record: ImageRecord) -> Result<UserId, StoreError> {
        self.idgen.saw(record.user_id);
        if self.by_user.contains_key(&record.user_id) {
            return Err(StoreError::AlreadyHaveId(record.user_id));
        }
        if self.images.len() >= InternId::MAX as usize {
            return Err(StoreError::CapacityExceeded);
        }

        let iid = self.images.len() as InternId;
        self.by_user.insert(record.user_id, iid);
        self.images.push(StoredImage {
            user_id: record.user_id,
            dc: record.dc,
            width: record.width,
            height: record.height,
        });
        self.buckets.add_signature(iid, record.signature);
        Ok(record.user_id)
    }

    /// Remove an image and return its full record.
    ///
    /// The vacated internal ID is refilled by the last image so IDs stay
    /// contiguous; the moved image's map entry and bucket memberships are
    /// re-keyed accordingly.
    pub fn remove_image(&mut self, user_id: UserId) -> Result<ImageRecord, StoreError> {
        let iid = *self
            .by_user
            .get(&user_id)
            .ok_or(StoreError::IdNotFound(user_id))?;

        let signature = self.buckets.remove_signature(iid);
        self.by_user.remove(&user_id);
        let stored = self.images.swap_remove(iid as usize);
        if (iid as usize) < self.images.len() {
            let moved = self.images[iid as usize].user_id;
            self.by_user.insert(moved, iid);
        }

        Ok(ImageRecord {
            user_id,
            signature,
            dc: stored.dc,
            width: stored.width,
            height: stored.height,
        })
    }

    pub fn num_images(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Next free auto-generated user ID.
    pub fn next_id(&mut self) -> UserId {
        self.idgen.next_id()
    }

    /// Bucket population counts, for diagnostics.
    pub fn bucket_sizes(&self) -> Vec<usize> {
        self.buckets.bucket_sizes()
    }

    pub(crate) fn images(&self) -> &[StoredImage] {
        &self.images
    }

    pub(crate) fn buckets(&self) -> &BucketManager {
        &self.buckets
    }
}

impl Default for MemDb {
    fn default() -> Self {
        Self::new()
    }
}
