//! In-memory Hub used by the pipeline tests.

use std::cell::RefCell;

use spacedeploy_core::hub::{
    CommitInfo, CommitPayload, HubApi, HubError, Identity, LfsAction, LfsObject, LfsTransfer,
    PreuploadFile, PreuploadVerdict, RepoId, SpaceInfo, SpaceSpec, UploadMode,
};

#[derive(Debug, Default)]
pub struct FakeHub {
    reject_token: bool,
    space_exists: RefCell<bool>,
    lookup_error: bool,
    stall_lookup: bool,
    create_conflict: bool,
    fail_create: bool,
    fail_commit: bool,
    lfs_suffixes: Vec<String>,
    ignored: Vec<String>,
    stored_oids: Vec<String>,

    pub calls: RefCell<Vec<&'static str>>,
    pub created: RefCell<Vec<SpaceSpec>>,
    pub commits: RefCell<Vec<CommitPayload>>,
    pub lfs_uploads: RefCell<Vec<(String, Vec<u8>)>>,
}

impl FakeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting_token(mut self) -> Self {
        self.reject_token = true;
        self
    }

    pub fn with_existing_space(self) -> Self {
        *self.space_exists.borrow_mut() = true;
        self
    }

    pub fn with_lookup_error(mut self) -> Self {
        self.lookup_error = true;
        self
    }

    /// Space lookups never complete.
    pub fn stalling_lookup(mut self) -> Self {
        self.stall_lookup = true;
        self
    }

    pub fn with_create_conflict(mut self) -> Self {
        self.create_conflict = true;
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    /// Files ending in `suffix` are routed through LFS.
    pub fn with_lfs_suffix(mut self, suffix: &str) -> Self {
        self.lfs_suffixes.push(suffix.to_string());
        self
    }

    pub fn ignoring(mut self, path: &str) -> Self {
        self.ignored.push(path.to_string());
        self
    }

    /// LFS objects the Hub already has.
    pub fn with_stored_oid(mut self, oid: &str) -> Self {
        self.stored_oids.push(oid.to_string());
        self
    }

    pub fn space_exists(&self) -> bool {
        *self.space_exists.borrow()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.borrow().iter().filter(|c| **c == call).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.borrow().len()
    }

    fn record(&self, call: &'static str) {
        self.calls.borrow_mut().push(call);
    }

    fn network_error(what: &str) -> HubError {
        HubError::Status {
            url: format!("https://hub.test/{}", what),
            status: 503,
            message: "simulated network error".to_string(),
        }
    }
}

impl HubApi for FakeHub {
    async fn whoami(&self) -> Result<Identity, HubError> {
        self.record("whoami");
        if self.reject_token {
            return Err(HubError::Unauthorized);
        }
        Ok(Identity {
            name: "mariahlamb".to_string(),
        })
    }

    async fn space_info(&self, repo_id: &RepoId) -> Result<SpaceInfo, HubError> {
        self.record("space_info");
        if self.stall_lookup {
            std::future::pending::<()>().await;
        }
        if self.lookup_error {
            return Err(Self::network_error("space_info"));
        }
        if self.space_exists() {
            Ok(SpaceInfo {
                id: repo_id.to_string(),
                sdk: Some("docker".to_string()),
                private: Some(false),
            })
        } else {
            Err(HubError::NotFound(repo_id.to_string()))
        }
    }

    async fn create_space(&self, spec: &SpaceSpec) -> Result<(), HubError> {
        self.record("create_space");
        if self.fail_create {
            return Err(Self::network_error("create"));
        }
        if self.create_conflict || self.space_exists() {
            *self.space_exists.borrow_mut() = true;
            return Err(HubError::Conflict(spec.repo_id.to_string()));
        }
        self.created.borrow_mut().push(spec.clone());
        *self.space_exists.borrow_mut() = true;
        Ok(())
    }

    async fn preupload(
        &self,
        _repo_id: &RepoId,
        _revision: &str,
        files: &[PreuploadFile],
    ) -> Result<Vec<PreuploadVerdict>, HubError> {
        self.record("preupload");
        Ok(files
            .iter()
            .map(|file| PreuploadVerdict {
                path: file.path.clone(),
                upload_mode: if self.lfs_suffixes.iter().any(|s| file.path.ends_with(s)) {
                    UploadMode::Lfs
                } else {
                    UploadMode::Regular
                },
                should_ignore: self.ignored.contains(&file.path),
            })
            .collect())
    }

    async fn lfs_batch(
        &self,
        _repo_id: &RepoId,
        _revision: &str,
        objects: &[LfsObject],
    ) -> Result<Vec<LfsTransfer>, HubError> {
        self.record("lfs_batch");
        Ok(objects
            .iter()
            .map(|object| LfsTransfer {
                oid: object.oid.clone(),
                upload: if self.stored_oids.contains(&object.oid) {
                    None
                } else {
                    Some(LfsAction {
                        href: format!("https://storage.test/{}", object.oid),
                        header: Default::default(),
                    })
                },
                verify: None,
            })
            .collect())
    }

    async fn lfs_upload(
        &self,
        transfer: &LfsTransfer,
        _object: &LfsObject,
        content: Vec<u8>,
    ) -> Result<(), HubError> {
        self.record("lfs_upload");
        self.lfs_uploads
            .borrow_mut()
            .push((transfer.oid.clone(), content));
        Ok(())
    }

    async fn commit(
        &self,
        repo_id: &RepoId,
        revision: &str,
        payload: &CommitPayload,
    ) -> Result<CommitInfo, HubError> {
        self.record("commit");
        if self.fail_commit {
            return Err(Self::network_error("commit"));
        }
        self.commits.borrow_mut().push(payload.clone());
        Ok(CommitInfo {
            commit_url: Some(format!(
                "https://hub.test/spaces/{}/commit/{}",
                repo_id, revision
            )),
            commit_oid: Some("0123456789abcdef".to_string()),
        })
    }
}
