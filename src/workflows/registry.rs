//! Fixed, ordered stage lists for each workflow mode

use super::stage::Stage;
use super::stages::*;
use crate::checkpoint::WorkflowMode;

pub const SUBMIT_STAGE_NAMES: [&str; 11] = [
    "init-local-repo",
    "set-branch-master",
    "commit-initial",
    "create-remote-repo",
    "push-master",
    "detect-or-fork-registry-repo",
    "clone-or-update-fork",
    "write-metadata-file",
    "commit-metadata",
    "push-fork-branch",
    "open-pull-request",
];

pub const UPDATE_STAGE_NAMES: [&str; 5] = [
    "commit-code-changes",
    "push-master",
    "update-metadata-source-commit",
    "commit-metadata-update",
    "push-fork-branch",
];

pub fn submit_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(InitLocalRepo),
        Box::new(SetBranchMaster),
        Box::new(CommitInitial),
        Box::new(CreateRemoteRepo),
        Box::new(PushMaster),
        Box::new(DetectOrForkRegistryRepo),
        Box::new(CloneOrUpdateFork),
        Box::new(WriteMetadataFile),
        Box::new(CommitMetadata),
        Box::new(PushForkBranch),
        Box::new(OpenPullRequest),
    ]
}

pub fn update_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(CommitCodeChanges),
        Box::new(PushMaster),
        Box::new(UpdateMetadataSourceCommit),
        Box::new(CommitMetadataUpdate),
        Box::new(PushForkBranch),
    ]
}

pub fn stages_for(mode: WorkflowMode) -> Vec<Box<dyn Stage>> {
    match mode {
        WorkflowMode::Submit => submit_stages(),
        WorkflowMode::Update => update_stages(),
    }
}
