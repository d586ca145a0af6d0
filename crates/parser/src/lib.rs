//! Tag language: vocabulary, action calls and the streaming call parser.
//!
//! Model output embeds action requests as
//!
//! ```text
//! <action_name>
//! <argument>value, verbatim</argument>
//! </action_name>
//! ```
//!
//! [`parse`] splits a model reply into plain text and [`ActionCall`]s
//! without ever failing. Malformed markup degrades to text or to an
//! incomplete call.

pub mod call;
pub mod parse;
pub mod vocabulary;

pub use call::{ActionCall, Arguments};
pub use parse::{parse, Segment};
pub use vocabulary::{ActionSignature, Vocabulary};
