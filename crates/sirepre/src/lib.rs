//! Applicant registration for the SIREPRE transmission-operator call.
//!
//! [`workflows::registration`] is the client-side step machine with resumable
//! local persistence; [`workflows::intake`] is the backend answering every
//! collaborator the flow talks to.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
