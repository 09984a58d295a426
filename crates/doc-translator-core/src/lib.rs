//! Document Translator Core Library
//!
//! This library provides the core functionality for translating documents:
//! - Structured PDF text extraction into colorized markup
//! - Summaries and translations via OpenAI-compatible APIs
//! - Re-encoding results in the uploaded format (text, Markdown, PDF)
//! - A per-session workflow tying the steps together

pub mod config;
pub mod document;
pub mod encode;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod pdf;
pub mod util;
pub mod workflow;

pub use config::{
    AppConfig, DEFAULT_TARGET_LANGUAGE, GatewayConfig, Language, PdfLayout, TARGET_LANGUAGES,
    target_languages,
};
pub use document::{SourceFormat, UploadedDocument};
pub use encode::{EncodedDocument, reencode};
pub use error::{Error, ErrorKind, Result};
pub use extract::{ExtractedText, extract, extract_as};
pub use gateway::{
    GatewayInfo, Instruction, InstructionKind, OpenAiGateway, TextTransform, create_gateway,
};
pub use pdf::{PdfDocument, PdfWriter, extract_markup};
pub use workflow::{LoadedDocument, SessionState, Stage, TranslatedDocument, Workflow};
