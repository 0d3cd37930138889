//! One-time login codes. Delivery is a log line.

use std::collections::HashMap;

use parking_lot::Mutex;
use rand::Rng;

use super::session::{Session, SessionRegistry};

#[derive(Default)]
pub struct SmsCodes {
    codes: Mutex<HashMap<String, String>>,
}

impl SmsCodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fixed code, used for the configured admin code.
    pub fn seed(&self, account: &str, code: &str) {
        self.codes
            .lock()
            .insert(account.to_string(), code.to_string());
    }

    /// Issue a fresh 6-digit code, replacing any previous one.
    pub fn generate(&self, account: &str) -> String {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        self.codes
            .lock()
            .insert(account.to_string(), code.clone());
        tracing::info!("sms code for {}: {}", account, code);
        code
    }

    /// Consume a matching code and start a session.
    pub fn login_sms(&self, sessions: &SessionRegistry, account: &str, code: &str) -> Option<Session> {
        {
            let mut codes = self.codes.lock();
            match codes.get(account) {
                Some(expected) if expected == code && !code.is_empty() => {
                    codes.remove(account);
                }
                _ => {
                    tracing::warn!("sms login failed account={}", account);
                    return None;
                }
            }
        }
        if !sessions.accounts().exists(account) {
            return None;
        }
        Some(sessions.start(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_digits() {
        let sms = SmsCodes::new();
        for _ in 0..20 {
            let code = sms.generate("a");
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn generate_replaces_previous_code() {
        let sms = SmsCodes::new();
        sms.seed("a", "111111");
        let code = sms.generate("a");
        assert_eq!(sms.codes.lock().get("a"), Some(&code));
    }
}
