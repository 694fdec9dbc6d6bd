//! Turn a photographed receipt into an editable, itemized cart.
//!
//! The pipeline captures an image, sends it to an OCR service, asks an LLM to
//! structure the text as JSON, validates and normalizes that JSON into a
//! [`receipt::Receipt`], and loads it into a [`cart::CartModel`] whose totals
//! are recomputed on every edit. [`pipeline::PipelineController`] drives the
//! whole thing.

pub mod capture;
pub mod cart;
pub mod config;
pub mod data_url;
pub mod errors;
pub mod money;
pub mod ocr;
pub mod pipeline;
pub mod prelude;
pub mod receipt;
pub mod structuring;
pub mod validator;
