//! Trailing-sequence detection for the hidden admin unlock
//!
//! The site reveals its admin form either by typing a short key sequence or
//! by tapping the logo several times. [`matches`] is the pure check;
//! [`KeyBuffer`] and [`UnlockGesture`] keep the bounded input history.

use std::collections::VecDeque;
use thiserror::Error;

/// Key sequence that reveals the unlock form.
pub const UNLOCK_SEQUENCE: [char; 3] = ['g', 'r', 'j'];

/// Logo taps that reveal the unlock form.
pub const LOGO_TAP_THRESHOLD: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("target sequence must not be empty")]
    EmptyTarget,
}

/// Whether the last `target.len()` symbols of `buffer` equal `target`.
///
/// A buffer shorter than the target never matches. An empty target never
/// matches either, so a misconfigured detector cannot fire on every key.
pub fn matches<T: PartialEq>(buffer: &[T], target: &[T]) -> bool {
    if target.is_empty() || buffer.len() < target.len() {
        return false;
    }
    buffer[buffer.len() - target.len()..] == *target
}

/// Bounded FIFO of recent symbols checked against a fixed target.
#[derive(Debug, Clone)]
pub struct KeyBuffer<T> {
    target: Vec<T>,
    capacity: usize,
    symbols: VecDeque<T>,
}

impl<T: PartialEq + Clone> KeyBuffer<T> {
    /// Buffer holding one symbol more than the target.
    pub fn new(target: Vec<T>) -> Result<Self, SequenceError> {
        let capacity = target.len() + 1;
        Self::with_capacity(target, capacity)
    }

    /// Buffer with an explicit capacity, raised to the target length if smaller.
    pub fn with_capacity(target: Vec<T>, capacity: usize) -> Result<Self, SequenceError> {
        if target.is_empty() {
            return Err(SequenceError::EmptyTarget);
        }
        let capacity = capacity.max(target.len());
        Ok(Self {
            target,
            capacity,
            symbols: VecDeque::with_capacity(capacity),
        })
    }

    /// Append a symbol, evicting the oldest past capacity. Returns whether
    /// the buffer now ends with the target.
    pub fn push(&mut self, symbol: T) -> bool {
        self.symbols.push_back(symbol);
        while self.symbols.len() > self.capacity {
            self.symbols.pop_front();
        }
        matches(self.symbols.make_contiguous(), &self.target)
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Key-sequence and logo-tap detector for the admin unlock form.
#[derive(Debug, Clone)]
pub struct UnlockGesture {
    keys: KeyBuffer<char>,
    taps: u32,
    tap_threshold: u32,
}

impl UnlockGesture {
    pub fn new(sequence: &[char], tap_threshold: u32) -> Result<Self, SequenceError> {
        let target: Vec<char> = sequence.iter().map(|c| c.to_ascii_lowercase()).collect();
        Ok(Self {
            keys: KeyBuffer::new(target)?,
            taps: 0,
            tap_threshold: tap_threshold.max(1),
        })
    }

    /// Feed one key press. Only `a..=z` (case-insensitive) is recorded;
    /// anything else is ignored and cannot complete the sequence.
    pub fn key(&mut self, key: char) -> bool {
        let key = key.to_ascii_lowercase();
        if !key.is_ascii_lowercase() {
            return false;
        }
        let fired = self.keys.push(key);
        if fired {
            self.keys.clear();
        }
        fired
    }

    /// Feed one logo tap; fires and resets on reaching the threshold.
    pub fn tap(&mut self) -> bool {
        self.taps += 1;
        if self.taps >= self.tap_threshold {
            self.taps = 0;
            return true;
        }
        false
    }
}

impl Default for UnlockGesture {
    fn default() -> Self {
        Self {
            keys: KeyBuffer {
                target: UNLOCK_SEQUENCE.to_vec(),
                capacity: UNLOCK_SEQUENCE.len() + 1,
                symbols: VecDeque::new(),
            },
            taps: 0,
            tap_threshold: LOGO_TAP_THRESHOLD,
        }
    }
}
