#![allow(dead_code)]

pub mod git;
pub mod hub;
pub mod logs;

pub use hub::FakeHub;
pub use logs::CapturedLogs;
