use crate::{
    config::{self, document::Dialect},
    diagnostic::{self, Diagnostic},
    error::Error,
    flow::LoginFlow,
    har, normalizer,
    session_configuration::SessionConfiguration,
};
use serde::Serialize;
use std::{fs, io, path::Path};
use tracing::{debug, info, warn};

/// An uploaded or fixture file, routed by the extension of its name.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl InputFile {
    pub fn new<S: Into<String>, B: Into<Vec<u8>>>(name: S, contents: B) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();

        Ok(Self {
            name: path.to_string_lossy().into_owned(),
            contents: fs::read(path)?,
        })
    }

    fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub flow: LoginFlow,
    pub diagnostics: Vec<Diagnostic>,
    /// Output of the configured generator, if any ran successfully.
    pub generated: Option<String>,
}

impl SessionReport {
    pub fn has_errors(&self) -> bool {
        diagnostic::has_errors(&self.diagnostics)
    }
}

enum Routed {
    Trace,
    Config(Dialect),
}

pub struct FlowSession;

impl FlowSession {
    /// Ingests `.har` traces, parses `.loli` / `.sb` documents, normalizes everything
    /// into one flow and hands it to the configured generator.
    ///
    /// Files with any other extension are skipped with a warning. A malformed trace,
    /// a configuration syntax error or a lack of usable input fails the session; a
    /// failing generator only adds a warning.
    pub fn run(
        configuration: &SessionConfiguration,
        inputs: Vec<InputFile>,
    ) -> Result<SessionReport, Error> {
        let mut diagnostics = Vec::new();
        let mut exchanges = Vec::new();
        let mut documents = Vec::new();

        for input in inputs {
            let routed = match input.extension().as_deref() {
                Some("har") => Routed::Trace,
                Some(extension) => match Dialect::from_extension(extension) {
                    Some(dialect) => Routed::Config(dialect),
                    None => {
                        skip(&input, &mut diagnostics);
                        continue;
                    }
                },
                None => {
                    skip(&input, &mut diagnostics);
                    continue;
                }
            };

            match routed {
                Routed::Trace => {
                    let mut ingested = har::ingest_with(&input.contents, configuration.ingest())?;
                    debug!(file = %input.name, exchanges = ingested.len(), "ingested trace");
                    exchanges.append(&mut ingested);
                }
                Routed::Config(dialect) => {
                    let text = std::str::from_utf8(&input.contents)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    let parsed =
                        config::parse(text, Some(configuration.dialect_hint().unwrap_or(dialect)))?;
                    diagnostics.extend(
                        parsed
                            .diagnostics
                            .into_iter()
                            .map(|d| attribute(&input.name, d)),
                    );
                    documents.push(parsed.document);
                }
            }
        }

        let normalized = normalizer::normalize(&exchanges, &documents)?;
        diagnostics.extend(normalized.diagnostics);

        let generated = match configuration.generator() {
            Some(generator) => match generator.generate(&normalized.flow) {
                Ok(output) => Some(output),
                Err(e) => {
                    warn!(error = %e, "flow generator failed");
                    diagnostics.push(Diagnostic::warning(format!("flow generator failed: {}", e)));
                    None
                }
            },
            None => None,
        };

        info!(
            steps = normalized.flow.steps.len(),
            tokens = normalized.flow.tokens.len(),
            complete = normalized.flow.complete,
            diagnostics = diagnostics.len(),
            "session finished"
        );

        Ok(SessionReport {
            flow: normalized.flow,
            diagnostics,
            generated,
        })
    }
}

fn skip(input: &InputFile, diagnostics: &mut Vec<Diagnostic>) {
    warn!(file = %input.name, "unsupported input skipped");
    diagnostics.push(Diagnostic::warning(format!(
        "{}: unsupported file type, expected .har, .loli or .sb",
        input.name
    )));
}

fn attribute(file: &str, mut diagnostic: Diagnostic) -> Diagnostic {
    diagnostic.message = format!("{}: {}", file, diagnostic.message);
    diagnostic
}
