pub mod text;

pub use text::{DocumentReducer, CONTEXT_WINDOW, TOPIC_PHRASES};
