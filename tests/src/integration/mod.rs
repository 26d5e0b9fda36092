//! Cross-crate integration scenarios.

#[cfg(test)]
pub mod harness;

#[cfg(test)]
mod feedback_loop;
#[cfg(test)]
mod http_e2e;
#[cfg(test)]
mod properties;
