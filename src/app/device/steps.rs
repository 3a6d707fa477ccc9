//! Install and restore as ordered lists of steps.
//!
//! Each step can be repeated safely on its own: unmount only happens when the
//! probe reports a mount, `rm -rf` and `push` overwrite. A failure stops the
//! list where it is; nothing is rolled back.

use crate::app::adb::command::Secret;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    UnmountIfMounted,
    RemoveStaging,
    PushBundle(String),
    WriteSecret(Secret),
    CreateMarker,
    BindMount,
    RestartBrowser,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::UnmountIfMounted => "unmount_if_mounted",
            Step::RemoveStaging => "remove_staging",
            Step::PushBundle(_) => "push_bundle",
            Step::WriteSecret(_) => "write_secret",
            Step::CreateMarker => "create_marker",
            Step::BindMount => "bind_mount",
            Step::RestartBrowser => "restart_browser",
        }
    }
}

pub fn restore_plan(restart: bool) -> Vec<Step> {
    let mut steps = vec![Step::UnmountIfMounted, Step::RemoveStaging];
    if restart {
        steps.push(Step::RestartBrowser);
    }
    steps
}

/// Always a full restore first; install never updates a live mount in place.
pub fn install_plan(bundle_dir: String, secret: Secret) -> Vec<Step> {
    let mut steps = restore_plan(false);
    steps.extend([
        Step::PushBundle(bundle_dir),
        Step::WriteSecret(secret),
        Step::CreateMarker,
        Step::BindMount,
        Step::RestartBrowser,
    ]);
    steps
}
