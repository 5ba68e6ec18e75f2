//! Room passwords as redacted secrets.
//!
//! Request models hold passwords as [`SecretString`], whose `Debug` prints
//! `[REDACTED]`, so a model can be logged as a whole.

pub use secrecy::{ExposeSecret, SecretString};
