//! Cross-crate integration tests for the pireduce workspace live in `tests/`.
