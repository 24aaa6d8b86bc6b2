//! Unit tests for the chat module.
