//! Pipeline components for claim processing.
//!
//! Each submodule implements exactly one step. Components communicate only
//! through [`crate::document::DocumentState`]: they read it, return a
//! [`crate::document::StateUpdate`], and the controller applies it.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text ──▶ classify ──▶ ┌ router ─▶ extract ┐ ──▶ aggregate
//! (path/URL) (pdfium)  (1 LLM call) └────── loop ──────┘     (report)
//! ```
//!
//! 1. [`input`]: canonicalise the user-supplied path or URL to a local PDF
//! 2. [`text`]: per-page text via pdfium, in `spawn_blocking`
//! 3. [`classify`]: one batched call assigning pages to document types
//! 4. [`router`]: explicit state machine choosing the next stage
//! 5. [`extract`]: the three extraction stages
//! 6. [`aggregate`]: merge outcomes into the final report
//!
//! [`llm`] is the collaborator seam and [`decode`] the defensive JSON
//! recovery shared by steps 3 and 5.

pub mod aggregate;
pub mod classify;
pub mod decode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod router;
pub mod text;
