//! API Module
//!
//! Chat completion wire types shared by all HTTP provider backends.

pub mod completion;

pub use completion::{Choice, CompletionRequest, CompletionResponse, Message, ResponseMessage, Usage};
