//! Cross-crate integration tests for cdoc. See `tests/`.
