//! Cross-crate end-to-end scenarios live under `tests/`.
