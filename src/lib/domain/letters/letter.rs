//! Letter directory

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::domain::{
    addresses::DomainResolver,
    letters::{
        errors::LetterError, BodyTemplate, LetterSpec, LoadOptions, RecipientTable,
    },
    validation::{Violation, Violations},
};

const CONFIG_FILE: &str = "config.yml";
const CONFIG_FILE_ALT: &str = "config.yaml";
const CONTENT_FILE: &str = "content.html";
const RECIPIENTS_FILE: &str = "recipients.csv";
const ATTACHMENTS_DIR: &str = "attachments";

/// Paths to the artifacts of a letter directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterPaths {
    /// The letter directory
    pub root: PathBuf,

    /// The descriptor
    pub config: PathBuf,

    /// The HTML body template
    pub content: PathBuf,

    /// The recipient table
    pub recipients: PathBuf,

    /// The optional attachments directory
    pub attachments: PathBuf,
}

impl LetterPaths {
    /// Resolve the artifact paths of `root`. `config.yaml` is used when
    /// `config.yml` does not exist.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();

        let mut config = root.join(CONFIG_FILE);
        if !config.exists() && root.join(CONFIG_FILE_ALT).exists() {
            config = root.join(CONFIG_FILE_ALT);
        }

        Self {
            config,
            content: root.join(CONTENT_FILE),
            recipients: root.join(RECIPIENTS_FILE),
            attachments: root.join(ATTACHMENTS_DIR),
            root,
        }
    }

    fn validate(&self, violations: &mut Violations) {
        if !self.root.is_dir() {
            violations.push(Violation::new(
                "letter",
                "",
                format!("{} should be a directory", self.root.display()),
            ));
            return;
        }

        for (name, path) in [
            ("config", &self.config),
            ("content", &self.content),
            ("recipients", &self.recipients),
        ] {
            if violations.should_stop() {
                return;
            }

            if !path.exists() {
                violations.push(Violation::new(
                    "letter",
                    name,
                    format!("not found at {}", path.display()),
                ));
            } else if !path.is_file() {
                violations.push(Violation::new(
                    "letter",
                    name,
                    format!("{} should be a file", path.display()),
                ));
            }
        }

        if self.attachments.exists() && !self.attachments.is_dir() {
            violations.push(Violation::new(
                "letter",
                "attachments",
                format!("{} should be a directory", self.attachments.display()),
            ));
        }
    }

    fn section(path: &Path) -> String {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A fully validated letter, ready to be compiled
#[derive(Debug, Clone)]
pub struct Letter {
    paths: LetterPaths,
    spec: LetterSpec,
    template: BodyTemplate,
    recipients: RecipientTable,
}

impl Letter {
    /// Opens and validates a letter directory.
    ///
    /// # Arguments
    /// * `root` - The letter directory.
    /// * `resolver` - Used to check recipient domains.
    /// * `options` - Validation mode and default domain.
    ///
    /// # Returns
    /// The letter, or the first failing stage's [`LetterError`]: directory
    /// layout, descriptor, recipient table, then template fields.
    pub async fn open<D>(
        root: impl AsRef<Path>,
        resolver: &D,
        options: &LoadOptions,
    ) -> Result<Self, LetterError>
    where
        D: DomainResolver + ?Sized,
    {
        let paths = LetterPaths::new(root);
        debug!("opening letter at {}", paths.root.display());

        let mut violations = Violations::new(options.mode);
        paths.validate(&mut violations);
        if !violations.is_empty() {
            return Err(LetterError::InvalidLetter(violations));
        }

        let config = read_to_string(&paths.config).await?;
        let mut spec = LetterSpec::from_yaml(&config, &LetterPaths::section(&paths.config), options)
            .map_err(LetterError::InvalidLetter)?;
        spec.attachments = list_attachments(&paths.attachments).await?;

        let template = BodyTemplate::parse(read_to_string(&paths.content).await?);

        let table = fs::read(&paths.recipients).await.map_err(|source| LetterError::Io {
            path: paths.recipients.clone(),
            source,
        })?;
        let recipients = RecipientTable::load(table.as_slice(), resolver, options).await?;

        template.validate(recipients.headers(), options.mode)?;

        info!(
            "letter {} has {} recipients and {} attachments",
            paths.root.display(),
            recipients.len(),
            spec.attachments.len()
        );

        Ok(Self {
            paths,
            spec,
            template,
            recipients,
        })
    }

    /// Validates a letter directory without keeping it
    pub async fn check<D>(
        root: impl AsRef<Path>,
        resolver: &D,
        options: &LoadOptions,
    ) -> Result<(), LetterError>
    where
        D: DomainResolver + ?Sized,
    {
        Self::open(root, resolver, options).await.map(|_| ())
    }

    /// The artifact paths
    pub fn paths(&self) -> &LetterPaths {
        &self.paths
    }

    /// The descriptor
    pub fn spec(&self) -> &LetterSpec {
        &self.spec
    }

    /// The body template
    pub fn template(&self) -> &BodyTemplate {
        &self.template
    }

    /// The recipient table
    pub fn recipients(&self) -> &RecipientTable {
        &self.recipients
    }
}

async fn read_to_string(path: &Path) -> Result<String, LetterError> {
    fs::read_to_string(path)
        .await
        .map_err(|source| LetterError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn list_attachments(dir: &Path) -> Result<Vec<PathBuf>, LetterError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let io_error = |source| LetterError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(dir).await.map_err(io_error)?;
    let mut attachments = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let is_file = entry.file_type().await.map_err(io_error)?.is_file();

        if hidden || !is_file {
            debug!("skipping attachment entry {}", entry.path().display());
            continue;
        }

        attachments.push(entry.path());
    }

    attachments.sort();

    Ok(attachments)
}
