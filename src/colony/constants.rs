/// Timing constants
pub mod time {
    /// Simulation ticks per second
    pub const TICKS_PER_SECOND: u32 = 20;
    /// Ticks in one in-game hour of real time (20 * 60 * 60)
    pub const TICKS_PER_HOUR: u32 = TICKS_PER_SECOND * 60 * 60;
}

/// Subscriber interest radii
///
/// Clients join the update stream within `working_range + JOIN_MARGIN` of the
/// colony centre and stay subscribed until they leave
/// `working_range * RETAIN_MULTIPLIER`.
pub mod subscription {
    /// Default town hall working range in blocks
    pub const DEFAULT_WORKING_RANGE: u32 = 200;
    /// Extra blocks beyond the working range at which clients join
    pub const JOIN_MARGIN: f64 = 16.0;
    /// Retain radius as a multiple of the working range
    pub const RETAIN_MULTIPLIER: f64 = 2.0;

    /// Join radius for a working range
    #[inline]
    pub fn join_radius(working_range: u32) -> f64 {
        working_range as f64 + JOIN_MARGIN
    }

    /// Retain radius for a working range
    #[inline]
    pub fn retain_radius(working_range: u32) -> f64 {
        working_range as f64 * RETAIN_MULTIPLIER
    }
}

/// Work order constants
pub mod work_orders {
    /// `claimedBy` value of an order nobody has claimed
    pub const UNCLAIMED: i32 = 0;
    /// Priority given to freshly created orders
    pub const DEFAULT_PRIORITY: i32 = 0;
}
