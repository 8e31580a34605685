//! Business logic services

pub mod catalog;
pub mod command;
pub mod coordinator;
pub mod dump;
pub mod naming;
pub mod restore;
pub mod schedule;
