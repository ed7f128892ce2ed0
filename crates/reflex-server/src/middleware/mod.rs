//! HTTP middleware layers.

pub(crate) mod headers;
