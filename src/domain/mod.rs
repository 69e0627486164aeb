//! Core domain types and logic.

pub mod blueprint;
pub mod blueprint_validation;
pub mod combination;
pub mod decision;
pub mod error;
pub mod formula;
pub mod id_codec;
pub mod presentation;
pub mod resolver;
pub mod rule;
pub mod rule_engine;
pub mod rule_eval;
pub mod rule_parser;
pub mod value_ops;
