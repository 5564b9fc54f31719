//! Probabilistic primality testing.
//!
//! Trial division by the primes below 50 settles small and obviously composite
//! candidates; everything else goes through Miller-Rabin with random bases.
//! A prime is never rejected. A composite survives each round with probability
//! at most 1/4, so `rounds` trades speed for the false-positive rate.

use std::time::Instant;

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::Rng;

use crate::domain::number::EvaluatedNumber;

const SMALL_PRIMES: [u32; 15] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47];

pub const DEFAULT_ROUNDS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimalityTest {
  rounds: u32,
}

impl Default for PrimalityTest {
  fn default() -> Self {
    Self::new(DEFAULT_ROUNDS)
  }
}

impl PrimalityTest {
  /// A test running `rounds` Miller-Rabin rounds (at least one)
  pub fn new(rounds: u32) -> Self {
    Self { rounds: rounds.max(1) }
  }

  pub fn rounds(&self) -> u32 {
    self.rounds
  }

  pub fn is_probable_prime(&self, n: &BigUint) -> bool {
    self.is_probable_prime_with(n, &mut rand::thread_rng())
  }

  pub fn is_probable_prime_with<R: Rng + ?Sized>(&self, n: &BigUint, rng: &mut R) -> bool {
    let two = BigUint::from(2u32);
    if n < &two {
      return false;
    }

    for p in SMALL_PRIMES {
      let p = BigUint::from(p);
      if *n == p {
        return true;
      }
      if (n % &p).is_zero() {
        return false;
      }
    }

    // n is odd and above 47 from here on
    let one = BigUint::one();
    let n_minus_one = n - &one;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    'witness: for _ in 0..self.rounds {
      let a = rng.gen_biguint_range(&two, &n_minus_one);
      let mut x = a.modpow(&d, n);
      if x == one || x == n_minus_one {
        continue;
      }

      for _ in 1..s {
        x = (&x * &x) % n;
        if x == n_minus_one {
          continue 'witness;
        }
        if x == one {
          return false;
        }
      }
      return false;
    }

    true
  }

  /// Test `value` and record how long the test took
  pub fn evaluate(&self, value: BigUint) -> EvaluatedNumber {
    let start = Instant::now();
    let is_prime = self.is_probable_prime(&value);
    EvaluatedNumber::new(value, is_prime, start.elapsed())
  }
}
