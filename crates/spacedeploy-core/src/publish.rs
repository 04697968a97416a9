//! Upload the merged tree to the Space as a single commit.
//!
//! Steps:
//! 1. Collect the upload set and hash it
//! 2. Ask the Hub which files must go through LFS (pre-upload check)
//! 3. Upload LFS objects the Hub does not already store
//! 4. Send one commit carrying every file

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::fs::{TreeFile, collect_files, hash_files};
use crate::hub::{
    CommitInfo, CommitOperation, CommitPayload, HubApi, HubError, LfsObject, PreuploadFile,
    RepoId, UploadMode,
};

/// Files per pre-upload request.
const PREUPLOAD_BATCH: usize = 250;
/// Objects per LFS batch request.
const LFS_BATCH: usize = 100;
/// Bytes of each file the Hub inspects to pick an upload mode.
const SAMPLE_SIZE: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to read the upload tree: {0:#}")]
    Scan(anyhow::Error),

    #[error("nothing to upload in {0}")]
    Empty(String),

    #[error("{stage} failed")]
    Hub {
        stage: &'static str,
        #[source]
        source: HubError,
    },

    #[error("unsupported upload: {0}")]
    Unsupported(String),
}

impl PublishError {
    fn hub(stage: &'static str) -> impl FnOnce(HubError) -> Self {
        move |source| PublishError::Hub { stage, source }
    }
}

/// What to publish and where.
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    pub repo_id: &'a RepoId,
    pub revision: &'a str,
    pub tree: &'a Path,
    pub summary: &'a str,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Files included in the commit
    pub files: usize,
    pub lfs_files: usize,
    /// Files the Hub asked us to skip
    pub ignored: usize,
    pub bytes: u64,
    /// BLAKE3 digest of the upload set
    pub digest: String,
    pub commit: CommitInfo,
}

pub async fn publish_tree<A: HubApi>(
    api: &A,
    request: &PublishRequest<'_>,
) -> Result<PublishReport, PublishError> {
    let files = collect_files(request.tree).map_err(PublishError::Scan)?;
    if files.is_empty() {
        return Err(PublishError::Empty(request.tree.display().to_string()));
    }
    let digest = hash_files(&files).map_err(PublishError::Scan)?;
    info!(files = files.len(), digest = %digest, "Prepared upload set");

    let modes = upload_modes(api, request, &files).await?;

    let mut payload = CommitPayload::new(request.summary, request.description.clone());
    let mut lfs_pending = Vec::new();
    let mut ignored = 0;
    let mut bytes = 0;

    for file in &files {
        match modes.get(file.rel_path.as_str()) {
            Some(Verdict::Ignore) => {
                debug!(path = %file.rel_path, "Hub ignores file, skipping");
                ignored += 1;
            }
            Some(Verdict::Lfs) => {
                let oid = sha256_file(&file.abs_path).map_err(PublishError::Scan)?;
                bytes += file.size;
                lfs_pending.push((file, oid));
            }
            Some(Verdict::Regular) | None => {
                let content = std::fs::read(&file.abs_path)
                    .with_context(|| format!("Failed to read {}", file.abs_path.display()))
                    .map_err(PublishError::Scan)?;
                bytes += file.size;
                payload.push(CommitOperation::Inline {
                    path: file.rel_path.clone(),
                    content,
                });
            }
        }
    }

    upload_lfs_objects(api, request, &lfs_pending).await?;
    for (file, oid) in lfs_pending {
        payload.push(CommitOperation::Lfs {
            path: file.rel_path.clone(),
            oid,
            size: file.size,
        });
    }

    let file_count = payload.operations.len();
    let lfs_files = payload.lfs_count();
    if file_count == 0 {
        return Err(PublishError::Empty(request.tree.display().to_string()));
    }

    info!(
        space = %request.repo_id,
        files = file_count,
        lfs = lfs_files,
        bytes,
        "Uploading commit"
    );
    let commit = api
        .commit(request.repo_id, request.revision, &payload)
        .await
        .map_err(PublishError::hub("commit"))?;
    if let Some(url) = &commit.commit_url {
        info!(commit = %url, "Upload complete");
    }

    Ok(PublishReport {
        files: file_count,
        lfs_files,
        ignored,
        bytes,
        digest,
        commit,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Regular,
    Lfs,
    Ignore,
}

async fn upload_modes<A: HubApi>(
    api: &A,
    request: &PublishRequest<'_>,
    files: &[TreeFile],
) -> Result<HashMap<String, Verdict>, PublishError> {
    let mut modes = HashMap::with_capacity(files.len());

    for chunk in files.chunks(PREUPLOAD_BATCH) {
        let batch = chunk
            .iter()
            .map(|file| -> anyhow::Result<PreuploadFile> {
                Ok(PreuploadFile {
                    path: file.rel_path.clone(),
                    sample: STANDARD.encode(read_sample(&file.abs_path)?),
                    size: file.size,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(PublishError::Scan)?;

        let verdicts = api
            .preupload(request.repo_id, request.revision, &batch)
            .await
            .map_err(PublishError::hub("pre-upload check"))?;

        for verdict in verdicts {
            let mode = if verdict.should_ignore {
                Verdict::Ignore
            } else {
                match verdict.upload_mode {
                    UploadMode::Regular => Verdict::Regular,
                    UploadMode::Lfs => Verdict::Lfs,
                }
            };
            modes.insert(verdict.path, mode);
        }
    }

    Ok(modes)
}

async fn upload_lfs_objects<A: HubApi>(
    api: &A,
    request: &PublishRequest<'_>,
    pending: &[(&TreeFile, String)],
) -> Result<(), PublishError> {
    for chunk in pending.chunks(LFS_BATCH) {
        let objects: Vec<LfsObject> = chunk
            .iter()
            .map(|(file, oid)| LfsObject {
                oid: oid.clone(),
                size: file.size,
            })
            .collect();

        let transfers = api
            .lfs_batch(request.repo_id, request.revision, &objects)
            .await
            .map_err(PublishError::hub("LFS negotiation"))?;

        for transfer in &transfers {
            let Some(upload) = &transfer.upload else {
                debug!(oid = %transfer.oid, "LFS object already stored");
                continue;
            };
            if upload.is_multipart() {
                return Err(PublishError::Unsupported(format!(
                    "Hub requested a multipart upload for LFS object {}",
                    transfer.oid
                )));
            }
            let Some((file, object)) = chunk
                .iter()
                .zip(&objects)
                .find(|(_, object)| object.oid == transfer.oid)
                .map(|((file, _), object)| (file, object))
            else {
                return Err(PublishError::Hub {
                    stage: "LFS negotiation",
                    source: HubError::Decode(format!("unknown LFS object {}", transfer.oid)),
                });
            };

            let content = std::fs::read(&file.abs_path)
                .with_context(|| format!("Failed to read {}", file.abs_path.display()))
                .map_err(PublishError::Scan)?;
            info!(path = %file.rel_path, size = file.size, "Uploading LFS object");
            api.lfs_upload(transfer, object, content)
                .await
                .map_err(PublishError::hub("LFS upload"))?;
        }
    }
    Ok(())
}

fn read_sample(path: &Path) -> anyhow::Result<Vec<u8>> {
    let file =
        std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    file.take(SAMPLE_SIZE as u64)
        .read_to_end(&mut sample)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(sample)
}

fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let mut file =
        std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to hash {}", path.display()))?;
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}
