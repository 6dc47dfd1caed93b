//! # hassbridge-domain
//!
//! Pure domain model for the hassbridge chat-to-home-automation bridge.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers and the error taxonomy
//! - Define **Entity records** (what the directory knows about each platform object)
//! - Define **Commands** (verbs, verb classes and the quote-aware tokenizer)
//! - Define **Climate settings** (HVAC mode synonyms, temperature parsing)
//! - Define **Resolution results** (`ResolvedTarget`, match tiers, ambiguity)
//! - Define **Outcomes** (`ActionCall`, per-target `CommandResult`)
//! - Define **Messages** (inbound chat messages, outbound replies)
//! - Define the **Context snapshot** rendered by the `info` verb
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;

pub mod climate;
pub mod command;
pub mod context;
pub mod entity;
pub mod message;
pub mod outcome;
pub mod resolution;
