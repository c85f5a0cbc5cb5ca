//! Pipeline stages for invoice/certificate verification.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested alone and the two side-effecting ones (rendering and the network
//! call) sit behind traits that tests replace with stubs.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ request ──▶ llm
//! (URL/path) (pdfium)  (base64)  (prompt)    (VLM)
//! ```
//!
//! 1. [`input`]   — load the user-supplied path or URL into a `Document`
//! 2. [`render`]  — rasterise every selected page; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`encode`]  — PNG-encode and base64-wrap each page image
//! 4. [`request`] — pair the instruction with the images of both documents,
//!    invoice first
//! 5. [`llm`]     — issue the single completion call; the only stage with
//!    network I/O

pub mod encode;
pub mod input;
pub mod llm;
pub mod render;
pub mod request;
