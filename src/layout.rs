use std::env;
use std::path::{Path, PathBuf};

use crate::error::SetupError;
use crate::settings::BuildTargetGroup;

/// Must match the define the project's integration tests are compiled under.
pub const INTEGRATION_TEST_DEFINE: &str = "INTEGRATION_TEST";
pub const SCRIPT_PATTERN: &str = "*.cs";

/// Tutorial root relative to the directory holding the executable.
const ROOT_FROM_EXE: [&str; 3] = ["..", "tutorials", "pick_and_place"];

/// Paths of one tutorial checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub external_scripts_dir: PathBuf,
    pub project_dir: PathBuf,
    pub project_scripts_dir: PathBuf,
    pub settings_file: PathBuf,
}

impl ProjectLayout {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let project_dir = root.join("PickAndPlaceProject");
        Self {
            external_scripts_dir: root.join("Scripts"),
            project_scripts_dir: project_dir.join("Assets").join("Scripts"),
            settings_file: project_dir.join("ProjectSettings").join("ProjectSettings.asset"),
            project_dir,
            root,
        }
    }

    /// Layout used when no root is given: the tool lives in a directory next
    /// to `tutorials/`.
    pub fn beside_executable() -> Result<Self, SetupError> {
        let exe = env::current_exe()
            .and_then(|p| p.canonicalize())
            .map_err(|source| SetupError::Read {
                path: PathBuf::from("<current executable>"),
                source,
            })?;
        let dir = exe.parent().ok_or_else(|| SetupError::MissingPath {
            what: "executable directory",
            path: exe.clone(),
        })?;
        Ok(Self::from_root(root_beside(dir)))
    }
}

fn root_beside(dir: &Path) -> PathBuf {
    ROOT_FROM_EXE.iter().fold(dir.to_path_buf(), |p, seg| p.join(seg))
}

/// Everything one run needs, passed explicitly to both steps.
#[derive(Debug, Clone)]
pub struct SetupConfig {
    pub layout: ProjectLayout,
    pub marker: String,
    pub group: BuildTargetGroup,
    pub pattern: String,
    pub dry_run: bool,
}

impl SetupConfig {
    pub fn new(layout: ProjectLayout) -> Self {
        Self {
            layout,
            marker: INTEGRATION_TEST_DEFINE.to_string(),
            group: BuildTargetGroup::Standalone,
            pattern: SCRIPT_PATTERN.to_string(),
            dry_run: false,
        }
    }
}
