use rand::seq::SliceRandom;
use rand::Rng;

/// Picks a value from an ordered `(value, weight)` table. Returns `None` only
/// when the table is empty or every weight is zero.
pub fn weighted_choice<T: Copy, R: Rng + ?Sized>(table: &[(T, u32)], rng: &mut R) -> Option<T> {
    table
        .choose_weighted(rng, |(_, weight)| *weight)
        .ok()
        .map(|(value, _)| *value)
}
