// Hard caps on per-tenant state and request sizes.

pub const MAX_TENANTS: usize = 1024;
pub const MAX_TENANT_NAME_LEN: usize = 64;
pub const MAX_ROOMS_PER_TENANT: usize = 10_000;
pub const MAX_BOOKINGS_PER_ROOM: usize = 50_000;
pub const MAX_PURPOSE_LEN: usize = 256;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_LINE_LEN: usize = 64 * 1024;
/// Upper bound on how far a series-scoped check walks a recurring candidate.
pub const MAX_SERIES_HORIZON_DAYS: u32 = 3660;
