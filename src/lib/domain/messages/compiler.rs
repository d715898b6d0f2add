//! Message compiler

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use tokio::fs;
use tracing::{debug, info};

use crate::domain::{
    letters::{
        BodyTemplate, LeadingCharacter, Letter, LetterSpec, NameShortener, RecipientNameFormat,
        RecipientRow, RecipientTable, SENDER_FIELD,
    },
    messages::{
        errors::CompileError,
        message::{Attachment, CompiledMessage, ATTACHMENT_CONTENT_TYPE},
    },
    validation::ValidationMode,
};

/// How many messages to compile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompileMode {
    /// One message per recipient
    #[default]
    All,

    /// Only the first recipient's message
    Preview,
}

/// Compiles a letter into one message per recipient
#[derive(Debug)]
pub struct MessageCompiler<'a> {
    spec: &'a LetterSpec,
    template: &'a BodyTemplate,
    sender_name: &'a str,
    names: RecipientNameFormat,
    validation_mode: ValidationMode,
}

impl<'a> MessageCompiler<'a> {
    /// Create a compiler.
    ///
    /// # Arguments
    /// * `spec` - The letter descriptor.
    /// * `template` - The body template.
    /// * `sender_name` - The operator's display name, substituted for `$sender`.
    pub fn new(spec: &'a LetterSpec, template: &'a BodyTemplate, sender_name: &'a str) -> Self {
        let shortener = spec
            .last_name_only
            .then(|| Box::new(LeadingCharacter) as Box<dyn NameShortener>);

        Self {
            spec,
            template,
            sender_name,
            names: RecipientNameFormat::new(spec.recipient_title.clone(), shortener),
            validation_mode: ValidationMode::default(),
        }
    }

    /// Create a compiler for an opened letter
    pub fn for_letter(letter: &'a Letter, sender_name: &'a str) -> Self {
        Self::new(letter.spec(), letter.template(), sender_name)
    }

    /// Replace the name shortening strategy used when `lastNameOnly` is set
    pub fn with_name_shortener(mut self, shortener: Box<dyn NameShortener>) -> Self {
        if self.spec.last_name_only {
            self.names = self.names.with_shortener(shortener);
        }
        self
    }

    /// Set how template violations are reported
    pub fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    /// Compiles the messages of `recipients`, in table order.
    ///
    /// # Returns
    /// - [`Ok`] with the unbound messages.
    /// - [`Err`] with a [`CompileError`] if the template does not match the
    ///   table columns or an attachment cannot be read. Nothing is rendered in
    ///   either case.
    pub async fn compile(
        &self,
        recipients: &RecipientTable,
        mode: CompileMode,
    ) -> Result<Vec<CompiledMessage>, CompileError> {
        self.template
            .validate(recipients.headers(), self.validation_mode)?;

        let attachments = load_attachments(&self.spec.attachments).await?;

        let limit = match mode {
            CompileMode::All => recipients.len(),
            CompileMode::Preview => 1,
        };

        let messages = recipients
            .rows()
            .iter()
            .take(limit)
            .map(|row| self.compile_row(row, attachments.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        info!("compiled {} of {} messages", messages.len(), recipients.len());

        Ok(messages)
    }

    fn compile_row(
        &self,
        row: &RecipientRow,
        attachments: Arc<[Attachment]>,
    ) -> Result<CompiledMessage, CompileError> {
        let cc = self.spec.cc.iter().chain(row.cc()).cloned().collect();
        let bcc = self.spec.bcc.iter().chain(row.bcc()).cloned().collect();

        let name = self.names.format(row.name());

        let mut values: HashMap<&str, &str> = row.columns().collect();
        values.insert("name", &name);
        values.insert(SENDER_FIELD, self.sender_name);

        let html_body = self.template.render(&values)?;

        debug!("compiled message to {}", row.email());

        Ok(CompiledMessage::new(
            row.email().clone(),
            cc,
            bcc,
            self.spec.subject.clone(),
            html_body,
            attachments,
            Some(
                self.spec
                    .from
                    .clone()
                    .unwrap_or_else(|| self.sender_name.to_string()),
            ),
            self.spec.bcc_to_sender,
        ))
    }
}

/// Compiles `recipients` with a default compiler
pub async fn compile(
    recipients: &RecipientTable,
    spec: &LetterSpec,
    template: &BodyTemplate,
    sender_name: &str,
    mode: CompileMode,
) -> Result<Vec<CompiledMessage>, CompileError> {
    MessageCompiler::new(spec, template, sender_name)
        .compile(recipients, mode)
        .await
}

async fn load_attachments(paths: &[PathBuf]) -> Result<Arc<[Attachment]>, CompileError> {
    let mut attachments = Vec::with_capacity(paths.len());

    for path in paths {
        let content = fs::read(path)
            .await
            .map_err(|source| CompileError::Attachment {
                path: path.to_path_buf(),
                source,
            })?;

        attachments.push(Attachment {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            content_type: ATTACHMENT_CONTENT_TYPE,
            content,
        });
    }

    Ok(attachments.into())
}
