use super::types::{FsyncMode, Mutation, OplogConfig, OplogEntry, OplogError, OplogResult};
use super::Oplog;
use crate::cluster::types::NodeAddr;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Longest payload a frame may claim. A torn length prefix reads as
/// garbage, so anything larger is treated as a truncated tail rather
/// than allocated.
const MAX_FRAME_BYTES: u64 = 16 * 1024 * 1024;

/// File-backed modification log store, one framed file per node
///
/// Entry format on disk:
/// - size (u64)
/// - checksum (u32, crc32 of the payload)
/// - payload (serialized entry)
///
/// Reads stop at a truncated tail, so a crash mid-append loses at most
/// the entry being written. A checksum mismatch on a complete frame is
/// reported as corruption, not skipped.
pub struct FileOplog {
    dir: PathBuf,
    fsync_mode: FsyncMode,
}

impl FileOplog {
    /// Open a log store rooted at `config.dir`, creating the directory
    /// if it doesn't exist
    pub async fn open(config: OplogConfig) -> OplogResult<Self> {
        tokio::fs::create_dir_all(&config.dir)
            .await
            .map_err(|source| OplogError::Directory {
                dir: config.dir.clone(),
                source,
            })?;

        info!("Oplog store opened at {:?}", config.dir);

        Ok(Self {
            dir: config.dir,
            fsync_mode: config.fsync_mode,
        })
    }

    fn path_for(&self, node: &NodeAddr) -> PathBuf {
        // Address separators are not portable filename characters
        let name = node.as_str().replace([':', '/', '\\'], "_");
        self.dir.join(format!("{name}.oplog"))
    }

    async fn write_frame(&self, path: &PathBuf, payload: &[u8]) -> std::io::Result<()> {
        let checksum = crc32fast::hash(payload);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        file.write_u64(payload.len() as u64).await?;
        file.write_u32(checksum).await?;
        file.write_all(payload).await?;

        match self.fsync_mode {
            FsyncMode::Always => file.sync_all().await?,
            FsyncMode::Never => {
                // No fsync, rely on OS buffer flush
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Oplog for FileOplog {
    async fn append(&self, node: &NodeAddr, mutation: &Mutation) -> OplogResult<()> {
        let entry = OplogEntry {
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap()
                .as_secs(),
            mutation: mutation.clone(),
        };

        let payload = bincode::serialize(&entry).map_err(|e| OplogError::Write {
            node: node.clone(),
            source: std::io::Error::other(e),
        })?;

        debug!("Oplog append for {}: {} ({} bytes)", node, mutation, payload.len());

        self.write_frame(&self.path_for(node), &payload)
            .await
            .map_err(|source| OplogError::Write {
                node: node.clone(),
                source,
            })
    }

    async fn read_all(&self, node: &NodeAddr) -> OplogResult<Vec<OplogEntry>> {
        let mut file = match File::open(self.path_for(node)).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(OplogError::Read {
                    node: node.clone(),
                    source,
                });
            }
        };

        let mut entries = Vec::new();

        loop {
            // Try to read frame size
            let size = match file.read_u64().await {
                Ok(s) => s,
                Err(_) => break, // EOF
            };

            if size > MAX_FRAME_BYTES {
                warn!("Implausible frame size {} in log for {}, stopping replay", size, node);
                break;
            }

            // Read checksum
            let checksum_expected = match file.read_u32().await {
                Ok(c) => c,
                Err(_) => {
                    warn!("Incomplete frame header in log for {}", node);
                    break;
                }
            };

            // Read frame payload
            let mut payload = vec![0u8; size as usize];
            if file.read_exact(&mut payload).await.is_err() {
                warn!("Incomplete frame payload in log for {}", node);
                break;
            }

            // Verify checksum
            let checksum_actual = crc32fast::hash(&payload);
            if checksum_actual != checksum_expected {
                return Err(OplogError::Corrupt {
                    node: node.clone(),
                    reason: format!(
                        "checksum mismatch: expected {checksum_expected}, got {checksum_actual}"
                    ),
                });
            }

            let entry: OplogEntry =
                bincode::deserialize(&payload).map_err(|e| OplogError::Corrupt {
                    node: node.clone(),
                    reason: e.to_string(),
                })?;

            entries.push(entry);
        }

        debug!("Replayed {} log entries for {}", entries.len(), node);
        Ok(entries)
    }

    async fn remove(&self, node: &NodeAddr) -> OplogResult<()> {
        match tokio::fs::remove_file(self.path_for(node)).await {
            Ok(()) => {
                info!("Removed log for {}", node);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(OplogError::Removal {
                node: node.clone(),
                source,
            }),
        }
    }

    async fn recreate(&self, node: &NodeAddr) -> OplogResult<()> {
        self.remove(node).await?;

        File::create(self.path_for(node))
            .await
            .map_err(|source| OplogError::Write {
                node: node.clone(),
                source,
            })?;

        debug!("Recreated empty log for {}", node);
        Ok(())
    }
}
