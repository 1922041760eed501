pub mod templates;

pub use templates::{render_value, Addresses, PromptRenderer};
