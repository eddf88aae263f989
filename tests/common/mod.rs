#![allow(dead_code)]

pub mod fake_portal;
pub mod wiremock_helpers;
