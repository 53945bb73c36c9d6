pub const MAX_CLIENT_NAME_LEN: usize = 200;
pub const MAX_SERVICE_NAME_LEN: usize = 100;
pub const MAX_ACTIVE_APPOINTMENTS: usize = 100_000;
/// Upper bound on `candidate_dates(.., count)`.
pub const MAX_CANDIDATE_DAYS: usize = 90;
pub const MAX_SLOTS_PER_DAY: usize = 96;
