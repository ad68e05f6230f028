//! Random replacement names.
//!
//! Names are drawn from an identifier-safe alphabet: the first character is a
//! letter, the rest are letters or digits. The generator keeps no state; callers
//! own the exclusion set and the randomness source.

use std::collections::HashSet;

use rand::Rng;

use crate::error::{Error, Result};

/// Default length of generated names.
pub const DEFAULT_NAME_LENGTH: usize = 32;

const LEADING: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const TRAILING: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of distinct names of `length` characters, saturating at `u128::MAX`.
pub fn name_space(length: usize) -> u128 {
    if length == 0 {
        return 0;
    }
    let mut total = LEADING.len() as u128;
    for _ in 1..length {
        total = total.saturating_mul(TRAILING.len() as u128);
    }
    total
}

/// Generate a `length`-character name that is not in `excluding`.
pub fn generate<R: Rng + ?Sized>(
    length: usize,
    excluding: &HashSet<String>,
    rng: &mut R,
) -> Result<String> {
    if name_space(length) <= excluding.len() as u128 {
        return Err(Error::generation_exhausted(length, excluding.len(), None));
    }

    loop {
        let candidate = random_name(length, rng);
        if !excluding.contains(&candidate) {
            return Ok(candidate);
        }
    }
}

fn random_name<R: Rng + ?Sized>(length: usize, rng: &mut R) -> String {
    let mut name = String::with_capacity(length);
    name.push(LEADING[rng.gen_range(0..LEADING.len())] as char);
    for _ in 1..length {
        name.push(TRAILING[rng.gen_range(0..TRAILING.len())] as char);
    }
    name
}

/// Whether `name` could have come out of [`generate`].
pub fn is_generated_shape(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes.split_first() {
        Some((first, rest)) => {
            LEADING.contains(first) && rest.iter().all(|b| TRAILING.contains(b))
        }
        None => false,
    }
}
