//! Typed template parameters.
//!
//! A document declares parameters (`params`), and whoever inherits or imports it
//! passes arguments. Resolution happens in two steps:
//!
//! 1. [`bind_params`] checks the arguments against the declarations and builds
//!    a [`Bindings`] table (defaults filled in, unknown names, missing required
//!    parameters and type mismatches rejected)
//! 2. [`interpolate_document`] replaces template expressions and `{{name}}`
//!    placeholders with bound values
//!
//! Placeholders are `{{identifier}}` with no inner whitespace, where an
//! identifier matches `[A-Za-z_][A-Za-z0-9_]*`. `{{ name }}` is left as text.

mod interpolate;
mod params;

pub use interpolate::{
    first_template_expression, has_placeholders, interpolate_content, interpolate_document, interpolate_text, interpolate_value,
};
pub use params::{Bindings, bind_params, find_similar_names};
