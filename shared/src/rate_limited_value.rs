use std::time::Instant;

use thiserror::Error;

/// Errors that can occur when configuring a RateLimitedValue
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateLimitError {
    /// Regeneration rate was negative or not finite
    #[error("Invalid token regeneration rate {tokens_per_second} (must be finite and >= 0)")]
    InvalidRate { tokens_per_second: f64 },

    /// Ceiling was not positive or not finite
    #[error("Invalid maximum token count {max_tokens} (must be finite and > 0)")]
    InvalidMaxTokens { max_tokens: f64 },
}

/// Token bucket used to throttle repeated actions such as reconnect attempts.
///
/// Tokens regenerate lazily: every `consume`/`attempt` first credits
/// `elapsed_millis * tokens_per_second / 1000` tokens, clamped to `max_tokens`.
/// The bucket starts full.
#[derive(Debug, Clone)]
pub struct RateLimitedValue {
    tokens_per_second: f64,
    max_tokens: f64,
    token_count: f64,
    last_regen_time: Instant,
}

impl RateLimitedValue {
    pub fn new(tokens_per_second: f64, max_tokens: f64) -> Result<Self, RateLimitError> {
        Self::new_at(tokens_per_second, max_tokens, Instant::now())
    }

    pub fn new_at(
        tokens_per_second: f64,
        max_tokens: f64,
        now: Instant,
    ) -> Result<Self, RateLimitError> {
        check_rate(tokens_per_second)?;
        check_max_tokens(max_tokens)?;
        Ok(Self {
            tokens_per_second,
            max_tokens,
            token_count: max_tokens,
            last_regen_time: now,
        })
    }

    pub fn tokens_per_second(&self) -> f64 {
        self.tokens_per_second
    }

    pub fn max_tokens(&self) -> f64 {
        self.max_tokens
    }

    pub fn token_count(&self) -> f64 {
        self.token_count
    }

    pub fn set_tokens_per_second(&mut self, tokens_per_second: f64) -> Result<(), RateLimitError> {
        check_rate(tokens_per_second)?;
        self.tokens_per_second = tokens_per_second;
        Ok(())
    }

    /// Changes the ceiling, clamping the current token count to it
    pub fn set_max_tokens(&mut self, max_tokens: f64) -> Result<(), RateLimitError> {
        check_max_tokens(max_tokens)?;
        self.max_tokens = max_tokens;
        self.token_count = self.token_count.min(max_tokens);
        Ok(())
    }

    /// Sets the token count directly, clamped to `[0, max_tokens]`
    pub fn set_token_count(&mut self, token_count: f64) {
        self.token_count = token_count.clamp(0.0, self.max_tokens);
    }

    /// Fill the bucket, bypassing any throttling for the next consume
    pub fn fill_bucket(&mut self) {
        self.token_count = self.max_tokens;
    }

    pub fn regenerate_tokens(&mut self) {
        self.regenerate_tokens_at(Instant::now());
    }

    pub fn regenerate_tokens_at(&mut self, now: Instant) {
        let elapsed_millis = now.saturating_duration_since(self.last_regen_time).as_secs_f64() * 1000.0;
        let regenerated = elapsed_millis * self.tokens_per_second / 1000.0;
        self.token_count = (self.token_count + regenerated).min(self.max_tokens);
        self.last_regen_time = now;
    }

    pub fn is_bucket_full(&self) -> bool {
        self.token_count >= self.max_tokens
    }

    /// Deducts `count` tokens if that many are available, otherwise leaves the
    /// bucket untouched. Returns whether the tokens were consumed.
    pub fn consume(&mut self, count: f64) -> bool {
        self.consume_at(count, Instant::now())
    }

    pub fn consume_at(&mut self, count: f64, now: Instant) -> bool {
        self.regenerate_tokens_at(now);
        if self.token_count >= count {
            self.token_count -= count;
            true
        } else {
            false
        }
    }

    /// Runs `action` only if `count` tokens could be consumed
    pub fn attempt<R>(&mut self, count: f64, action: impl FnOnce() -> R) -> Option<R> {
        self.attempt_at(count, Instant::now(), action)
    }

    pub fn attempt_at<R>(
        &mut self,
        count: f64,
        now: Instant,
        action: impl FnOnce() -> R,
    ) -> Option<R> {
        if self.consume_at(count, now) {
            Some(action())
        } else {
            None
        }
    }
}

fn check_rate(tokens_per_second: f64) -> Result<(), RateLimitError> {
    if !tokens_per_second.is_finite() || tokens_per_second < 0.0 {
        return Err(RateLimitError::InvalidRate { tokens_per_second });
    }
    Ok(())
}

fn check_max_tokens(max_tokens: f64) -> Result<(), RateLimitError> {
    if !max_tokens.is_finite() || max_tokens <= 0.0 {
        return Err(RateLimitError::InvalidMaxTokens { max_tokens });
    }
    Ok(())
}
