//! # One-Time Code Generator
//!
//! Produces the 6-digit numeric codes used as `ConfirmationCode` and
//! `MFACode`. In deterministic mode — the emulator's default, consistent
//! with the auth state machine's fixed `"999999"` MFA stub — codes are a
//! zero-padded counter seeded from the injected clock; random mode draws
//! from a CSPRNG.

use crate::clock::Clock;
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};

/// Generates one-time codes for confirmation and MFA flows.
pub trait OtpService: Send + Sync {
    fn generate_code(&self) -> String;
}

/// Draws a random 6-digit code from a CSPRNG.
#[derive(Debug, Default)]
pub struct RandomOtpService;

impl OtpService for RandomOtpService {
    fn generate_code(&self) -> String {
        let code = rand::thread_rng().gen_range(0..1_000_000);
        format!("{code:06}")
    }
}

/// Deterministic code generator: a zero-padded counter seeded from the
/// clock's current second, so repeated runs against a fixed clock produce
/// repeatable sequences without needing external state.
pub struct DeterministicOtpService {
    counter: AtomicU32,
}

impl DeterministicOtpService {
    pub fn new(clock: &dyn Clock) -> Self {
        let seed = (clock.now().timestamp() % 1_000_000) as u32;
        Self {
            counter: AtomicU32::new(seed),
        }
    }
}

impl OtpService for DeterministicOtpService {
    fn generate_code(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) % 1_000_000;
        format!("{n:06}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[test]
    fn random_codes_are_six_digits() {
        let otp = RandomOtpService;
        for _ in 0..20 {
            let code = otp.generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn deterministic_codes_increment() {
        let otp = DeterministicOtpService::new(&SystemClock);
        let a = otp.generate_code();
        let b = otp.generate_code();
        assert_ne!(a, b);
        assert_eq!(a.len(), 6);
        assert_eq!(b.len(), 6);
    }
}
