// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Transport drivers: turn `Action`s from `mtp-core` into raw frames on the
//! wire, and raw frames received on the wire into calls back into the core.

pub mod kernel;
