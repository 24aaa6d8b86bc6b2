//! Unit tests for the realtime gateway.
