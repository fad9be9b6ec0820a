//! Parsed form of a service declaration.

use std::collections::BTreeMap;
use std::fmt;

/// All declared services, keyed by their resolved name.
pub type ServiceMap = BTreeMap<String, ServiceSpec>;

/// One declared service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSpec {
    /// Unique name, matching `[A-Za-z0-9_]+`.
    pub name: String,
    /// Image reference; defaults to the declaration key.
    pub image: String,
    /// Command overriding the image default.
    pub command: Option<Vec<String>>,
    /// Working directory inside the container.
    pub workdir: Option<String>,
    /// Plain variables injected into the container and published verbatim.
    pub environment: BTreeMap<String, String>,
    /// Template variables in declared order, expanded after startup.
    pub templates: Vec<(String, String)>,
    /// Services that must publish their environment first.
    pub requires: Vec<String>,
    /// Commands run inside the container once it is ready.
    pub setup_commands: Vec<SetupCommand>,
}

impl ServiceSpec {
    /// Creates a service whose image is its own name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            image: name.clone(),
            name,
            ..Self::default()
        }
    }

    /// Sets the image reference.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Adds a `requires` edge.
    #[must_use]
    pub fn requiring(mut self, dependency: impl Into<String>) -> Self {
        self.requires.push(dependency.into());
        self
    }
}

/// A command run inside a ready container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupCommand {
    /// Interpreted by `sh -c`.
    Shell(String),
    /// Passed as argv, no shell involved.
    Exec(Vec<String>),
}

impl SetupCommand {
    /// Returns the argv handed to the engine.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        match self {
            Self::Shell(line) => vec!["sh".into(), "-c".into(), line.clone()],
            Self::Exec(args) => args.clone(),
        }
    }
}

impl fmt::Display for SetupCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(line) => write!(f, "{line}"),
            Self::Exec(args) => write!(f, "{}", args.join(" ")),
        }
    }
}
