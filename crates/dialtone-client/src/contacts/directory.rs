use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use dialtone_shared::error::DirectoryError;
use dialtone_shared::{CanonicalPhone, DirectoryUserRecord, PhoneNormalizer};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

/// Remote user directory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Records whose phone matches any of `phones`. Callers never pass more
    /// than `max_batch_size` values.
    async fn query_by_phone_batch(
        &self,
        phones: &[String],
        max_batch_size: usize,
    ) -> Result<Vec<DirectoryUserRecord>, DirectoryError>;
}

/// Resolves canonical phone numbers to directory users in bounded batches.
#[derive(Clone)]
pub struct DirectoryMatcher {
    directory: Arc<dyn UserDirectory>,
    normalizer: PhoneNormalizer,
    batch_size: usize,
    retry: RetryPolicy,
}

impl DirectoryMatcher {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        normalizer: PhoneNormalizer,
        batch_size: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            directory,
            normalizer,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Map each number in `phones` that a directory user owns to that user.
    ///
    /// Batches run concurrently. A batch that still fails after its retries
    /// contributes nothing; the others are unaffected.
    pub async fn find_by_phones(
        &self,
        phones: &BTreeSet<CanonicalPhone>,
    ) -> HashMap<CanonicalPhone, DirectoryUserRecord> {
        let mut matches = HashMap::new();
        if phones.is_empty() {
            return matches;
        }

        let values: Vec<String> = phones.iter().map(|p| p.as_str().to_string()).collect();
        let batches: Vec<&[String]> = values.chunks(self.batch_size).collect();
        debug!(
            phones = values.len(),
            batches = batches.len(),
            "querying user directory"
        );

        let results = join_all(batches.iter().map(|batch| {
            self.retry.run("directory batch", move || {
                self.directory.query_by_phone_batch(batch, self.batch_size)
            })
        }))
        .await;

        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(records) => {
                    for record in records {
                        self.insert_record(phones, &mut matches, record);
                    }
                }
                Err(e) => {
                    warn!(
                        batch = index,
                        size = batches[index].len(),
                        error = %e,
                        "directory batch failed, skipping its numbers"
                    );
                }
            }
        }

        debug!(matched = matches.len(), "directory lookup finished");
        matches
    }

    /// Key `record` by its re-normalised phone, ignoring records that do not
    /// belong to the requested set.
    fn insert_record(
        &self,
        requested: &BTreeSet<CanonicalPhone>,
        matches: &mut HashMap<CanonicalPhone, DirectoryUserRecord>,
        record: DirectoryUserRecord,
    ) {
        let Some(stored) = record.phone.as_deref() else {
            debug!(user = %record.user_id, "directory record has no phone");
            return;
        };
        let Some(key) = self.normalizer.normalize(stored) else {
            debug!(user = %record.user_id, "directory record phone does not normalise");
            return;
        };
        if !requested.contains(&key) {
            debug!(user = %record.user_id, "directory record outside requested numbers");
            return;
        }
        if let Some(existing) = matches.get(&key) {
            warn!(
                phone = %key,
                kept = %existing.user_id,
                dropped = %record.user_id,
                "two directory users share a phone number"
            );
            return;
        }
        matches.insert(key, record);
    }
}
