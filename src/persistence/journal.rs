//! Append-only journal backed store
//!
//! The journal is a text file with one record per line:
//!
//! ```text
//! <crc32 of body, 8 hex digits> <json body>\n
//! ```
//!
//! A record either puts a whole ad or removes one. Each append is
//! fsynced before the mutation is acknowledged. On open, the journal
//! is replayed into memory; a damaged *last* record can only be the
//! result of a crash mid-append and is dropped, while damage anywhere
//! else is reported as corruption.
use super::*;
use crate::ad::AdId;
use anyhow::{bail, Context};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

pub const JOURNAL_FILE_NAME: &str = "ads.journal";

/// Don't bother compacting journals smaller than this
const COMPACTION_MIN_RECORDS: usize = 64;

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum RecordRef<'a> {
    Put { id: AdIdRef<'a>, ad: &'a Ad },
    Remove { id: AdIdRef<'a> },
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Record {
    Put { id: AdId, ad: Ad },
    Remove { id: AdId },
}

fn encode(record: &RecordRef) -> Result<Vec<u8>> {
    let body = serde_json::to_string(record)?;
    Ok(format!("{:08x} {}\n", crc32fast::hash(body.as_bytes()), body).into_bytes())
}

/// `None` if the line is malformed or fails its checksum
fn decode(line: &[u8]) -> Option<Record> {
    let line = std::str::from_utf8(line).ok()?;
    let (checksum, body) = line.split_once(' ')?;
    let checksum = u32::from_str_radix(checksum, 16).ok()?;
    if crc32fast::hash(body.as_bytes()) != checksum {
        return None;
    }
    serde_json::from_str(body).ok()
}

#[derive(Debug, Default)]
struct Replay {
    ads: BTreeMap<AdId, Ad>,
    records: usize,
    /// Length of the journal prefix made of intact records
    valid_len: u64,
}

fn replay(path: &Path) -> Result<Replay> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read journal {}", path.display()))
        }
    };

    let mut replay = Replay::default();
    let mut offset = 0;

    while offset < data.len() {
        let rest = &data[offset..];
        let Some(line_len) = rest.iter().position(|b| *b == b'\n') else {
            warn!(path = %path.display(), offset, "dropping incomplete journal record");
            break;
        };
        let next_offset = offset + line_len + 1;

        match decode(&rest[..line_len]) {
            Some(Record::Put { id, ad }) => {
                replay.ads.insert(id, ad);
            }
            Some(Record::Remove { id }) => {
                replay.ads.remove(&id);
            }
            None if next_offset == data.len() => {
                warn!(path = %path.display(), offset, "dropping damaged last journal record");
                break;
            }
            None => bail!(
                "journal {} is corrupt at byte offset {}",
                path.display(),
                offset
            ),
        }

        replay.records += 1;
        offset = next_offset;
    }

    replay.valid_len = u64::try_from(offset)?;
    Ok(replay)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

#[derive(Debug)]
struct Journal {
    dir: PathBuf,
    path: PathBuf,
    file: File,
    len: u64,
    records: usize,
    ads: BTreeMap<AdId, Ad>,
}

impl Journal {
    fn append(&mut self, record: &RecordRef) -> Result<()> {
        let bytes = encode(record)?;

        if let Err(e) = self
            .file
            .write_all(&bytes)
            .and_then(|()| self.file.sync_data())
        {
            // Don't leave a half-written record in front of the next one
            if let Err(truncate_err) = self.file.set_len(self.len) {
                warn!(error = %truncate_err, "failed to roll back partial journal append");
            }
            return Err(e).context("failed to append to journal");
        }

        self.len += u64::try_from(bytes.len())?;
        self.records += 1;
        Ok(())
    }

    fn needs_compaction(&self) -> bool {
        COMPACTION_MIN_RECORDS <= self.records && self.ads.len() * 2 < self.records
    }

    /// Rewrite the journal to contain just one `put` per live ad
    fn compact(&mut self) -> Result<()> {
        let tmp_path = self.path.with_extension("journal.tmp");
        let mut len = 0;
        {
            let mut tmp = File::create(&tmp_path)
                .with_context(|| format!("failed to create {}", tmp_path.display()))?;
            for (id, ad) in &self.ads {
                let bytes = encode(&RecordRef::Put { id, ad })?;
                tmp.write_all(&bytes)?;
                len += u64::try_from(bytes.len())?;
            }
            tmp.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path).context("failed to replace journal")?;
        sync_dir(&self.dir)?;

        info!(
            path = %self.path.display(),
            before = self.records,
            after = self.ads.len(),
            "compacted journal"
        );

        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.len = len;
        self.records = self.ads.len();
        Ok(())
    }
}

/// Durable store keeping every ad in memory, with an fsynced journal
/// on disk as the source of truth
#[derive(Debug)]
pub struct JournalAdStore {
    journal: Mutex<Journal>,
}

impl JournalAdStore {
    /// Open (or create) the journal in `data_dir` and replay it
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref().to_owned();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create data dir {}", dir.display()))?;
        let path = dir.join(JOURNAL_FILE_NAME);

        let Replay {
            ads,
            records,
            valid_len,
        } = replay(&path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open journal {}", path.display()))?;

        if file.metadata()?.len() != valid_len {
            warn!(path = %path.display(), valid_len, "truncating journal to last intact record");
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        let mut journal = Journal {
            dir,
            path,
            file,
            len: valid_len,
            records,
            ads,
        };

        if journal.needs_compaction() {
            journal.compact()?;
        }

        debug!(path = %journal.path.display(), ads = journal.ads.len(), "journal replayed");

        Ok(Self {
            journal: Mutex::new(journal),
        })
    }

    pub fn open_shared(data_dir: impl AsRef<Path>) -> Result<SharedAdStore> {
        Ok(Arc::new(Self::open(data_dir)?))
    }

    /// Force a compaction regardless of how much of the journal is dead
    pub fn compact(&self) -> Result<()> {
        self.journal.lock().compact()
    }
}

impl AdStore for JournalAdStore {
    fn get(&self, id: AdIdRef) -> Result<Option<Ad>> {
        Ok(self.journal.lock().ads.get(id).cloned())
    }

    fn insert(&self, id: AdIdRef, ad: Ad) -> Result<()> {
        let mut journal = self.journal.lock();
        journal.append(&RecordRef::Put { id, ad: &ad })?;
        journal.ads.insert(id.to_owned(), ad);
        Ok(())
    }

    fn remove(&self, id: AdIdRef) -> Result<Option<Ad>> {
        let mut journal = self.journal.lock();
        if !journal.ads.contains_key(id) {
            return Ok(None);
        }
        journal.append(&RecordRef::Remove { id })?;
        Ok(journal.ads.remove(id))
    }

    fn values(&self) -> Result<Vec<Ad>> {
        Ok(self.journal.lock().ads.values().cloned().collect())
    }
}
