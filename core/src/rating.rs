/// A rating value. Ratings are whole numbers and are not clamped; they may go negative.
pub type Rating = i64;

/// The rating assigned to any identity with no prior record.
pub const BASELINE: Rating = 500;

/// The rating change for a normal result.
pub const STAKE: Rating = 25;

/// The rating change for a player who doubled down.
pub const DOUBLED_STAKE: Rating = 50;

/// The signed rating change for a single result.
pub fn delta(doubled: bool, won: bool) -> Rating {
    let stake = if doubled { DOUBLED_STAKE } else { STAKE };
    if won {
        stake
    } else {
        -stake
    }
}

pub fn update(rating: Rating, doubled: bool, won: bool) -> Rating {
    rating + delta(doubled, won)
}
