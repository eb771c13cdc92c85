// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Each submodule compares an allocation rule against a brute-force model.

mod address_assignment;
mod free_runs;
