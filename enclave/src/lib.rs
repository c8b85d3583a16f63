// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

pub mod constants;
pub mod nsm;
pub mod protocol;
