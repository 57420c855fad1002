//! Run Configuration: resolved options shared by every pipeline mode
use std::path::PathBuf;

/// Query evaluated per event when none is given.
pub const DEFAULT_QUERY: &str = "res = data";

/// Package holding the BEGIN/MAIN/END rules in staged mode.
pub const DEFAULT_PACKAGE: &str = "main";

/// Output format used when none is given.
pub const DEFAULT_OUTPUT: &str = "json";

/// How the event source treats lines that are not JSON objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Replace the line with an empty event and keep going.
    #[default]
    Lenient,
    /// Stop the run with a decode error.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedConfig {
    /// Files and directories to load; directories are walked recursively.
    pub paths: Vec<PathBuf>,
    pub package: String,
}

impl StagedConfig {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            package: DEFAULT_PACKAGE.to_string(),
        }
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub run_id: String,
    pub policy_paths: Vec<PathBuf>,
    pub data_paths: Vec<PathBuf>,
    pub query: String,
    pub stateful: bool,
    /// Raw `name[=argument]` output selector, parsed by the formatter crate.
    pub output: String,
    pub parse_mode: ParseMode,
    pub staged: Option<StagedConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            policy_paths: Vec::new(),
            data_paths: Vec::new(),
            query: DEFAULT_QUERY.to_string(),
            stateful: false,
            output: DEFAULT_OUTPUT.to_string(),
            parse_mode: ParseMode::default(),
            staged: None,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_paths.push(path.into());
        self
    }

    pub fn with_data(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_paths.push(path.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn stateful(mut self, enabled: bool) -> Self {
        self.stateful = enabled;
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    pub fn staged(mut self, staged: StagedConfig) -> Self {
        self.staged = Some(staged);
        self
    }

    pub fn is_staged(&self) -> bool {
        self.staged.is_some()
    }

    /// Checks that can be made without touching the filesystem.
    pub fn validate(&self) -> crate::Result<()> {
        match &self.staged {
            Some(staged) => {
                if staged.paths.is_empty() {
                    return Err(crate::PregoError::Config(
                        "staged mode needs at least one path to load".to_string(),
                    ));
                }
                if staged.package.trim().is_empty() {
                    return Err(crate::PregoError::Config(
                        "package name must not be empty".to_string(),
                    ));
                }
            }
            None => {
                if self.policy_paths.is_empty() {
                    return Err(crate::PregoError::Config(
                        "at least one policy file is required".to_string(),
                    ));
                }
                if self.query.trim().is_empty() {
                    return Err(crate::PregoError::Config("query must not be empty".to_string()));
                }
            }
        }
        Ok(())
    }
}
