// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! This crate exists only so `tests/specs` resolves as a workspace
//! member; the actual test files under `entgl/` are wired as `[[test]]`
//! targets in the Cargo.toml of the crate they exercise.
