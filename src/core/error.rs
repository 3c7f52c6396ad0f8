use thiserror::Error;

/// Errors that can occur while importing, auditing or encoding fiscal documents.
///
/// Format parsers return these internally; the normalizer turns every one of
/// them into an [`ImportedDocument`](super::ImportedDocument) with
/// `status = error`, so a single bad file never aborts a batch.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuditError {
    /// Malformed or structurally incomplete NFe XML.
    #[error("XML error: {0}")]
    Xml(String),

    /// CSV / XLSX / XLS could not be read.
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    /// PDF could not be loaded or its text could not be read.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// ZIP container could not be opened or an entry could not be read.
    #[error("archive error: {0}")]
    Archive(String),

    /// An external text or field extractor failed.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// The file type is not one the pipeline understands.
    #[error("unsupported file: {0}")]
    Unsupported(String),

    /// Batch-fatal: no document in the batch survived import.
    /// The payload is already a user-facing message.
    #[error("{0}")]
    NoUsableDocuments(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Report serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl AuditError {
    /// Localized message suitable for showing to the person who submitted the batch.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoUsableDocuments(msg) => msg.clone(),
            other => friendly_message(&other.to_string()),
        }
    }
}

/// Map a raw error string to a localized message when a known pattern is
/// recognized (network, quota, auth, malformed data). Unknown messages are
/// returned unchanged.
pub fn friendly_message(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["quota", "rate limit", "429", "resource_exhausted"]) {
        "Limite de uso do serviço externo atingido. Aguarde alguns minutos e tente novamente."
            .into()
    } else if has(&["unauthorized", "401", "403", "api key", "permission denied"]) {
        "Falha de autenticação com o serviço externo. Verifique as credenciais configuradas.".into()
    } else if has(&["network", "connection", "timed out", "timeout", "dns"]) {
        "Falha de comunicação com o serviço externo. Verifique a conexão e tente novamente.".into()
    } else if has(&["xml", "malformed", "parse error", "syntax"]) {
        format!("O arquivo contém dados malformados e não pôde ser lido ({raw}).")
    } else {
        raw.to_string()
    }
}
