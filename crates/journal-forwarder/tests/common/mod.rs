// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Common test utilities, mocks, and helpers for integration tests

// Each test binary uses a different subset.
#![allow(dead_code)]

pub mod helpers;
pub mod mocks;
