//! Guard subsystems, leaves first: verdict and rules, then the exception
//! manager, governance gate and diff source, then the orchestrator.

pub mod diff;
pub mod exceptions;
pub mod governance;
pub mod guard;
pub mod review;
pub mod rules;
pub mod verdict;
