//! Pipeline stages for paper analysis.
//!
//! Each submodule implements one step; [`crate::analyze`] strings them
//! together.
//!
//! ## Data Flow
//!
//! ```text
//! identifier ──▶ input ──▶ extract ──▶ llm ──▶ sections
//!  (ArxivId)    (bytes)    (lopdf)    (HTTP)   (parser)
//! ```
//!
//! 1. [`identifier`]: free-form input to a canonical [`identifier::ArxivId`]
//! 2. [`input`]:      download by identifier, or wrap an upload
//! 3. [`extract`]:    PDF bytes to plain text; runs in `spawn_blocking`
//! 4. [`llm`]:        the single inference call; the only stage besides
//!    `input` with network I/O
//! 5. [`sections`]:   split the model response into the seven sections

pub mod extract;
pub mod identifier;
pub mod input;
pub mod llm;
pub mod sections;
