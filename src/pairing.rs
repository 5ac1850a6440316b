//! Pairing codes: the `<animal><2-digit>` tokens that key every reading stream.
//!
//! A code is picked on the phone when the user pairs and then typed into
//! whatever client wants to read the stream (e.g. `tiger07`). Codes are not
//! reserved anywhere, so two devices can land on the same one.

use rand::Rng;

/// Vocabulary for the word half of a pairing code.
pub const ANIMALS: [&str; 20] = [
    "tiger", "falcon", "wolf", "eagle", "shark", "lion", "bear", "hawk", "fox", "panther",
    "cobra", "raven", "lynx", "orca", "viper", "jaguar", "condor", "badger", "raptor", "phoenix",
];

/// Number of digits after the animal name.
const DIGITS: usize = 2;

/// Generate a random pairing code using the thread-local RNG.
pub fn generate() -> String {
    generate_with(&mut rand::thread_rng())
}

/// Generate a pairing code from the given RNG.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let animal = ANIMALS[rng.gen_range(0..ANIMALS.len())];
    let number: u8 = rng.gen_range(0..100);
    format!("{animal}{number:02}")
}

/// Check that `code` is a known animal followed by exactly two ASCII digits.
///
/// Matching is case-sensitive: `Tiger07` is rejected.
pub fn is_valid(code: &str) -> bool {
    if code.len() <= DIGITS || !code.is_ascii() {
        return false;
    }

    let (word, digits) = code.split_at(code.len() - DIGITS);
    word.bytes().all(|b| b.is_ascii_lowercase())
        && digits.bytes().all(|b| b.is_ascii_digit())
        && ANIMALS.contains(&word)
}
