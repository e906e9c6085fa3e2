pub mod ask;
pub mod clear;
pub mod history;
pub mod sessions;
